use burrow::Burrow;
use tempfile::TempDir;

fn new_db() -> Burrow {
    let temp = TempDir::new().expect("tempdir");
    Burrow::open(temp.into_path()).expect("open store")
}

#[test]
fn range_scan_single_leaf() {
    let mut db = new_db();
    for (i, c) in (b'a'..=b'z').enumerate() {
        let value = format!("{}", i + 1);
        db.upsert(&[c], value.as_bytes());
    }
    assert_eq!(db.height(), 1, "the alphabet fits one leaf");

    let results = db.get_range(b"f", b"m");
    let keys: Vec<&[u8]> = results.iter().map(|(k, _)| k.as_slice()).collect();
    assert_eq!(keys, vec![b"f", b"g", b"h", b"i", b"j", b"k", b"l", b"m"]);
    // values ride along with their keys
    assert_eq!(results[0].1, b"6".to_vec());
    assert_eq!(results[7].1, b"13".to_vec());
}

#[test]
fn range_scan_across_split_leaves() {
    let mut db = new_db();
    for i in 0..200 {
        let key = format!("key-{i:04}");
        db.upsert(key.as_bytes(), b"v");
    }
    assert!(db.height() >= 2);

    let results = db.get_range(b"key-0050", b"key-0100");
    assert_eq!(results.len(), 51, "both endpoints are included");
    assert_eq!(results.first().unwrap().0, b"key-0050".to_vec());
    assert_eq!(results.last().unwrap().0, b"key-0100".to_vec());
    assert!(results.windows(2).all(|w| w[0].0 < w[1].0));
}

#[test]
fn range_scan_bounds() {
    let mut db = new_db();
    for i in 0..100 {
        let key = format!("key-{i:04}");
        db.upsert(key.as_bytes(), b"v");
    }

    // bounds need not name stored keys
    let results = db.get_range(b"key-0009x", b"key-0012x");
    let keys: Vec<Vec<u8>> = results.into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![b"key-0010".to_vec(), b"key-0011".to_vec(), b"key-0012".to_vec()]);

    // a full cover returns everything in order
    assert_eq!(db.get_range(b"", b"z").len(), 100);

    // inverted bounds yield nothing
    assert!(db.get_range(b"key-0050", b"key-0010").is_empty());
}
