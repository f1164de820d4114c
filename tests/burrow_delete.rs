use burrow::Burrow;
use tempfile::TempDir;

fn new_db() -> Burrow {
    let temp = TempDir::new().expect("tempdir");
    Burrow::open(temp.into_path()).expect("open store")
}

#[test]
fn single_key_lifecycle_restores_initial_shape() {
    let mut db = new_db();

    db.upsert(b"only", b"one");
    assert!(db.remove(b"only"));

    assert!(db.is_empty());
    assert_eq!(db.height(), 1);
    assert_eq!(db.debug_leaf_counts(), vec![0]);
    db.check_invariants();
}

#[test]
fn remove_missing_returns_false() {
    let mut db = new_db();

    db.upsert(b"present", b"v");
    assert!(!db.remove(b"absent"));
    assert!(db.remove(b"present"));
    assert!(!db.remove(b"present"));
    assert_eq!(db.len(), 0);
}

#[test]
fn forward_removal_rebalances_to_empty() {
    let mut db = new_db();

    for i in 0..200 {
        let key = format!("key-{i:04}");
        db.upsert(key.as_bytes(), b"v");
    }
    assert!(db.height() >= 2);

    // removing in insertion order drains leaves left to right, which leans
    // on right-borrow and right-merge
    for i in 0..200 {
        let key = format!("key-{i:04}");
        assert!(db.remove(key.as_bytes()), "missing {key}");
        assert_eq!(db.len(), 199 - i);
        db.check_invariants();
    }

    assert!(db.is_empty());
    assert_eq!(db.height(), 1);
    assert_eq!(db.debug_leaf_counts(), vec![0]);
}

#[test]
fn descending_removal_stresses_left_paths() {
    let mut db = new_db();

    for i in 0..200 {
        let key = format!("key-{i:04}");
        db.upsert(key.as_bytes(), b"v");
    }

    // draining from the right edge keeps hitting left siblings as donors
    for i in (0..200).rev() {
        let key = format!("key-{i:04}");
        assert!(db.remove(key.as_bytes()), "missing {key}");
        db.check_invariants();
    }

    assert!(db.is_empty());
    assert_eq!(db.height(), 1);
}

#[test]
fn interleaved_inserts_and_removes_hold_shape() {
    let mut db = new_db();

    for i in 0..300 {
        let key = format!("key-{i:04}");
        db.upsert(key.as_bytes(), b"v");
    }
    // carve holes across the whole key space, then refill some
    for i in (0..300).step_by(3) {
        let key = format!("key-{i:04}");
        assert!(db.remove(key.as_bytes()));
    }
    db.check_invariants();
    for i in (0..300).step_by(6) {
        let key = format!("key-{i:04}");
        db.upsert(key.as_bytes(), b"back");
    }
    db.check_invariants();

    assert_eq!(db.len(), 300 - 100 + 50);
    assert_eq!(db.get(b"key-0000"), Some(b"back".to_vec()));
    assert_eq!(db.get(b"key-0003"), None);
    assert_eq!(db.get(b"key-0001"), Some(b"v".to_vec()));
}
