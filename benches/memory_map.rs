// Bulk-insert and organize throughput of the sparse memory map.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use hexmap::{MemoryMap, MemoryRegion};

fn scattered_map(blocks: u32) -> MemoryMap {
    let mut map = MemoryMap::new();
    map.set_suppress_organize(true);
    for i in 0..blocks {
        map.insert(i * 2, &[i as u8]).unwrap();
    }
    map
}

fn bench_insert_scattered(c: &mut Criterion) {
    c.bench_function("insert 10k scattered single bytes", |b| {
        b.iter(|| scattered_map(10_000));
    });
}

fn bench_organize_merge(c: &mut Criterion) {
    c.bench_function("organize 10k adjacent blocks", |b| {
        b.iter_batched(
            || {
                let mut map = MemoryMap::new();
                map.set_suppress_organize(true);
                for i in 0u32..10_000 {
                    map.insert(i, &[i as u8]).unwrap();
                }
                map
            },
            |mut map| {
                map.organize();
                assert_eq!(map.block_count(), 1);
                map
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_fetch_window(c: &mut Criterion) {
    let map = scattered_map(10_000);
    c.bench_function("fetch 16 KiB window over scattered map", |b| {
        b.iter(|| {
            map.fetch(MemoryRegion::new(0, 16 * 1024 - 1)).unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_insert_scattered,
    bench_organize_merge,
    bench_fetch_window
);
criterion_main!(benches);
