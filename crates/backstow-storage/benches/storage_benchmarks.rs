//! Benchmarks for storage engine operations

use backstow_storage::{path, FsEngine, MemoryEngine, StorageEngine};
use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn generate_data(size: usize) -> Bytes {
    Bytes::from((0..size).map(|i| (i % 256) as u8).collect::<Vec<_>>())
}

fn bench_memory_store(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("memory_store");

    for size in [1024, 64 * 1024, 1024 * 1024].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let data = generate_data(size);
            let engine = MemoryEngine::new();
            b.iter(|| {
                rt.block_on(async {
                    engine.store("bench/object", data.clone()).await.unwrap();
                })
            });
        });
    }

    group.finish();
}

fn bench_memory_range(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("memory_range");

    for count in [100, 1_000, 10_000].iter() {
        let engine = MemoryEngine::new();
        rt.block_on(async {
            for i in 0..*count {
                let key = path::join("backups", &format!("b{}.json", i));
                engine.store(&key, Bytes::from_static(b"{}")).await.unwrap();
            }
        });

        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    let mut seen = 0usize;
                    engine
                        .range("backups/", &mut |_, _| {
                            seen += 1;
                            true
                        })
                        .await
                        .unwrap();
                    black_box(seen)
                })
            });
        });
    }

    group.finish();
}

fn bench_fs_store(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let engine = FsEngine::new(dir.path()).unwrap();

    let mut group = c.benchmark_group("fs_store");
    group.sample_size(20);

    for size in [1024, 256 * 1024].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let data = generate_data(size);
            b.iter(|| {
                rt.block_on(async {
                    engine.store("bench/object", data.clone()).await.unwrap();
                })
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_memory_store, bench_memory_range, bench_fs_store);
criterion_main!(benches);
