use burrow::Burrow;
use tempfile::TempDir;

fn new_db() -> Burrow {
    let temp = TempDir::new().expect("tempdir");
    Burrow::open(temp.into_path()).expect("open store")
}

#[test]
fn first_split_shape_is_deterministic() {
    let mut db = new_db();

    // 31 records fit the root leaf exactly
    for i in 0..31 {
        let key = format!("key-{i:04}");
        db.upsert(key.as_bytes(), b"v");
    }
    assert_eq!(db.height(), 1);
    assert_eq!(db.debug_leaf_counts(), vec![31]);

    // the 32nd forces the split: mid = (32 - 1) / 2 keeps 15 on the left
    db.upsert(b"key-0031", b"v");
    assert_eq!(db.height(), 2);
    assert_eq!(db.debug_leaf_counts(), vec![15, 17]);
    assert_eq!(db.len(), 32);

    for i in 0..32 {
        let key = format!("key-{i:04}");
        assert_eq!(db.get(key.as_bytes()), Some(b"v".to_vec()), "missing {key}");
    }
    db.check_invariants();
}

#[test]
fn sequential_growth_stays_balanced() {
    let mut db = new_db();

    for i in 0..2000 {
        let key = format!("key-{i:04}");
        let value = format!("value-{i}");
        db.upsert(key.as_bytes(), value.as_bytes());
        assert_eq!(db.len(), i + 1);
        if i % 200 == 0 {
            db.check_invariants();
        }
    }

    assert!(db.height() >= 3, "2000 sequential keys cascade a root split");
    db.check_invariants();

    for i in (0..2000).step_by(97) {
        let key = format!("key-{i:04}");
        let value = format!("value-{i}");
        assert_eq!(db.get(key.as_bytes()), Some(value.into_bytes()));
    }
}

#[test]
fn descending_growth_stays_balanced() {
    let mut db = new_db();

    for i in (0..600).rev() {
        let key = format!("key-{i:04}");
        db.upsert(key.as_bytes(), b"v");
        if i % 50 == 0 {
            db.check_invariants();
        }
    }

    assert_eq!(db.len(), 600);
    assert!(db.height() >= 2);
    db.check_invariants();

    // the leaf chain must yield the full ascending sequence
    let all = db.get_range(b"key-0000", b"key-0599");
    assert_eq!(all.len(), 600);
    assert!(all.windows(2).all(|w| w[0].0 < w[1].0));
}
