//! Benchmarks for folder listing and writes

use backstow_core::Folder;
use backstow_storage::MemoryEngine;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

fn populated_folder(rt: &tokio::runtime::Runtime, objects: usize) -> Folder {
    let folder = Folder::new(Arc::new(MemoryEngine::new()), "base");
    rt.block_on(async {
        for i in 0..objects {
            let name = format!("backup_{:04}/files/part_{:06}.tar", i % 50, i);
            folder.put_object_bytes(&name, vec![0u8; 128]).await.unwrap();
        }
    });
    folder
}

fn bench_list_folder(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("list_folder");

    for count in [1_000, 10_000].iter() {
        let folder = populated_folder(&rt, *count);
        group.bench_with_input(BenchmarkId::new("root", count), count, |b, _| {
            b.iter(|| rt.block_on(async { black_box(folder.list_folder().await.unwrap()) }));
        });
        group.bench_with_input(BenchmarkId::new("recursive", count), count, |b, _| {
            b.iter(|| {
                rt.block_on(async { black_box(folder.list_folder_recursive().await.unwrap()) })
            });
        });
    }

    group.finish();
}

fn bench_delete_objects(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("delete_objects_256", |b| {
        b.iter_batched(
            || {
                let folder = populated_folder(&rt, 256);
                let names: Vec<String> = (0..256)
                    .map(|i| format!("backup_{:04}/files/part_{:06}.tar", i % 50, i))
                    .collect();
                (folder, names)
            },
            |(folder, names)| rt.block_on(async { folder.delete_objects(&names).await.unwrap() }),
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_list_folder, bench_delete_objects);
criterion_main!(benches);
