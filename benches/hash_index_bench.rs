use criterion::{criterion_group, criterion_main, Criterion};
use rand::prelude::*;

use std::sync::Arc;

use karstdb::common::config::DEFAULT_LRUK_K;
use karstdb::index::hash::default_hash;
use karstdb::index::DiskExtendibleHashTable;
use karstdb::storage::buffer::BufferPoolManager;
use karstdb::storage::disk::DiskManager;

fn create_bench_index() -> DiskExtendibleHashTable<i64, i64> {
    let temp_file = tempfile::NamedTempFile::new().unwrap();
    let disk_manager = Arc::new(DiskManager::new(temp_file.path()).unwrap());
    std::mem::forget(temp_file);
    let bpm = Arc::new(BufferPoolManager::new(256, DEFAULT_LRUK_K, disk_manager));
    DiskExtendibleHashTable::new(bpm, default_hash, 2, 9, 64).unwrap()
}

fn hash_index_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("HashIndex");

    group.bench_function("insert_1k", |b| {
        b.iter_with_setup(create_bench_index, |index| {
            for key in 0..1000i64 {
                index.insert(key, key).unwrap();
            }
        });
    });

    group.bench_function("point_lookup", |b| {
        let index = create_bench_index();
        for key in 0..1000i64 {
            index.insert(key, key * 3).unwrap();
        }
        let mut rng = StdRng::seed_from_u64(5);
        b.iter(|| {
            let key = rng.gen_range(0..1000i64);
            assert_eq!(index.get_value(&key).unwrap(), Some(key * 3));
        });
    });

    group.finish();
}

criterion_group!(benches, hash_index_benchmark);
criterion_main!(benches);
