use burrow::Burrow;
use tempfile::TempDir;

fn new_db() -> Burrow {
    let temp = TempDir::new().expect("tempdir");
    Burrow::open(temp.into_path()).expect("open store")
}

#[test]
fn insert_and_read_back() {
    let mut db = new_db();

    db.upsert(b"alpha", b"one");
    db.upsert(b"beta", b"two");
    db.upsert(b"gamma", b"three");

    assert_eq!(db.get(b"alpha"), Some(b"one".to_vec()));
    assert_eq!(db.get(b"beta"), Some(b"two".to_vec()));
    assert_eq!(db.get(b"gamma"), Some(b"three".to_vec()));
    assert_eq!(db.get(b"delta"), None);
    assert_eq!(db.len(), 3);
}

#[test]
fn upsert_overwrites_in_place() {
    let mut db = new_db();

    db.upsert(b"k", b"1");
    db.upsert(b"k", b"2");

    assert_eq!(db.len(), 1);
    assert_eq!(db.get(b"k"), Some(b"2".to_vec()));
    db.check_invariants();
}

#[test]
fn repeated_identical_upsert_is_stable() {
    let mut db = new_db();

    db.upsert(b"k", b"v");
    db.upsert(b"k", b"v");

    assert_eq!(db.len(), 1);
    assert_eq!(db.get(b"k"), Some(b"v".to_vec()));
    assert_eq!(db.debug_leaf_counts(), vec![1]);
}

#[test]
fn oversize_inputs_truncate() {
    let mut db = new_db();

    // keys beyond 31 bytes collapse onto their 31-byte prefix
    let long_a = vec![b'a'; 64];
    let long_b = {
        let mut k = vec![b'a'; 31];
        k.extend_from_slice(b"different-tail");
        k
    };
    db.upsert(&long_a, b"first");
    db.upsert(&long_b, b"second");

    assert_eq!(db.len(), 1, "keys sharing a 31-byte prefix are one key");
    assert_eq!(db.get(&vec![b'a'; 31]), Some(b"second".to_vec()));

    // values beyond 255 bytes come back clipped
    let long_value = vec![b'v'; 400];
    db.upsert(b"big", &long_value);
    assert_eq!(db.get(b"big"), Some(vec![b'v'; 255]));
}
