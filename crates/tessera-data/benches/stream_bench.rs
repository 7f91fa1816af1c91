use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tessera_core::settings::CacheCapacity;
use tessera_data::{EntryId, ParameterCache, ParameterLayout};

fn bench_stream(c: &mut Criterion) {
    let layout = ParameterLayout::builder("Instance")
        .entry("world", 64)
        .entry("normal", 48)
        .entry("color", 16)
        .build();
    let mut cache = ParameterCache::new(CacheCapacity::Growable {
        initial_bytes: 1 << 20,
    });

    // Setup 10,000 instance containers
    let ids: Vec<_> = (0..10_000)
        .map(|_| cache.register_container(&layout).unwrap())
        .collect();
    let receipt = cache.stream_dirty().finish();
    let _ = cache.commit(receipt);

    let mut group = c.benchmark_group("Parameter Stream");

    group.bench_function("Sparse (1% dirty)", |b| {
        b.iter(|| {
            for id in ids.iter().step_by(100) {
                cache.set_entry_pod(*id, EntryId(0), &[1.0f32; 16]).unwrap();
            }
            let receipt = {
                let stream = cache.stream_dirty();
                black_box(stream.descriptors().map(|d| d.len()).sum::<u64>());
                stream.finish()
            };
            cache.commit(receipt)
        });
    });

    group.bench_function("Full upload", |b| {
        b.iter(|| {
            cache.mark_all_dirty();
            let receipt = {
                let stream = cache.stream_dirty();
                black_box(stream.total_bytes());
                stream.finish()
            };
            cache.commit(receipt)
        });
    });

    group.finish();
}

criterion_group!(benches, bench_stream);
criterion_main!(benches);
