use burrow::Burrow;
use std::fs;
use tempfile::TempDir;

#[test]
fn burrow_new_smoke() {
    let temp_dir = TempDir::new().expect("tempdir");

    let db = Burrow::open(temp_dir.path()).expect("open store");

    assert!(db.is_empty());
    assert_eq!(db.len(), 0);
    assert_eq!(db.height(), 1);

    // ensure the backing file exists
    let expected_path = temp_dir.path().join("burrow.db");
    assert!(
        fs::metadata(expected_path).is_ok(),
        "expected burrow.db to be created"
    );
}

#[test]
fn empty_store_boundaries() {
    let temp = TempDir::new().expect("tempdir");
    let mut db = Burrow::open(temp.into_path()).expect("open store");

    assert_eq!(db.get(b"anything"), None);
    assert!(!db.remove(b"anything"));
    assert!(db.get_range(b"a", b"z").is_empty());
    assert_eq!(db.debug_leaf_counts(), vec![0]);
    db.check_invariants();
}
