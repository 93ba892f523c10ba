use std::sync::Arc;

use anyhow::Result;
use rand::prelude::*;
use tempfile::NamedTempFile;

use karstdb::index::DiskExtendibleHashTable;
use karstdb::storage::buffer::BufferPoolManager;
use karstdb::storage::disk::DiskManager;

fn identity(key: &i32) -> u32 {
    *key as u32
}

fn create_test_table(
    header_depth: u32,
    directory_depth: u32,
    bucket_size: u32,
) -> Result<(DiskExtendibleHashTable<i32, i32>, NamedTempFile)> {
    let file = NamedTempFile::new()?;
    let disk_manager = Arc::new(DiskManager::new(file.path())?);
    let bpm = Arc::new(BufferPoolManager::new(64, 2, disk_manager));
    let table = DiskExtendibleHashTable::new(bpm, identity, header_depth, directory_depth, bucket_size)?;
    Ok((table, file))
}

#[test]
fn test_grow_on_collision_then_shrink_to_flat() -> Result<()> {
    // Tiny table: two-entry buckets, directory can reach depth 2.
    let (table, _file) = create_test_table(2, 2, 2)?;

    // The first two keys share a bucket; the third overflows it and forces
    // a split, doubling the directory.
    assert!(table.insert(1, 10)?);
    assert!(table.insert(2, 20)?);
    assert_eq!(table.global_depth(0)?, Some(0));
    assert!(table.insert(3, 30)?);
    assert_eq!(table.global_depth(0)?, Some(1));

    assert_eq!(table.get_value(&1)?, Some(10));
    assert_eq!(table.get_value(&2)?, Some(20));
    assert_eq!(table.get_value(&3)?, Some(30));
    table.verify_integrity()?;

    // Emptying the odd bucket merges it back and the directory shrinks to
    // depth 0.
    assert!(table.remove(&1)?);
    assert!(table.remove(&3)?);
    assert_eq!(table.global_depth(0)?, Some(0));
    assert_eq!(table.get_value(&2)?, Some(20));
    table.verify_integrity()?;
    Ok(())
}

#[test]
fn test_lookup_contract_over_insert_remove() -> Result<()> {
    let (table, _file) = create_test_table(2, 6, 4)?;

    for key in 0..64 {
        assert!(table.insert(key, key * 100)?, "insert {}", key);
    }
    for key in 0..64 {
        assert_eq!(table.get_value(&key)?, Some(key * 100));
    }
    assert_eq!(table.get_value(&999)?, None);

    for key in 0..64 {
        assert!(table.remove(&key)?);
        assert_eq!(table.get_value(&key)?, None);
        assert!(!table.remove(&key)?);
    }
    table.verify_integrity()?;
    Ok(())
}

#[test]
fn test_depth_ceiling_rejects_unsplittable_insert() -> Result<()> {
    // Keys congruent mod 4 collide at every reachable depth.
    let (table, _file) = create_test_table(2, 2, 2)?;
    assert!(table.insert(0, 0)?);
    assert!(table.insert(4, 4)?);
    assert!(!table.insert(8, 8)?);

    // The failed insert must not damage existing entries.
    assert_eq!(table.get_value(&0)?, Some(0));
    assert_eq!(table.get_value(&4)?, Some(4));
    table.verify_integrity()?;
    Ok(())
}

#[test]
fn test_randomized_churn_against_model() -> Result<()> {
    let (table, _file) = create_test_table(2, 9, 8)?;
    let mut rng = StdRng::seed_from_u64(42);
    let mut model = std::collections::HashMap::new();

    for _ in 0..2000 {
        let key = rng.gen_range(0..256);
        if rng.gen_bool(0.6) {
            let inserted = table.insert(key, key * 7)?;
            let expected = !model.contains_key(&key);
            assert_eq!(inserted, expected, "insert {}", key);
            model.entry(key).or_insert(key * 7);
        } else {
            let removed = table.remove(&key)?;
            assert_eq!(removed, model.remove(&key).is_some(), "remove {}", key);
        }
    }

    for key in 0..256 {
        assert_eq!(table.get_value(&key)?, model.get(&key).copied(), "get {}", key);
    }
    table.verify_integrity()?;
    Ok(())
}
