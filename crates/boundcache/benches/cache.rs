use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tempfile::TempDir;
use boundcache::{DiskCache, MemoryCache, RawCodec};

fn bench_memory_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_put");
    group.throughput(Throughput::Elements(1));

    group.bench_function("put_bounded_1000", |b| {
        let cache = MemoryCache::with_count_limit(1000);
        let keys: Vec<String> = (0..5000).map(|i| format!("key{}", i)).collect();

        let mut counter = 0;
        b.iter(|| {
            cache.put(&keys[counter % keys.len()], black_box(counter));
            counter += 1;
        });
    });

    group.finish();
}

fn bench_memory_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_hit", |b| {
        let cache = MemoryCache::new();
        let keys: Vec<String> = (0..100).map(|i| format!("key{}", i)).collect();
        for key in &keys {
            cache.put(key, vec![b'x'; 1024]);
        }

        let mut counter = 0;
        b.iter(|| {
            black_box(cache.get(&keys[counter % 100]));
            counter += 1;
        });
    });

    group.finish();
}

fn bench_disk_mixed(c: &mut Criterion) {
    let mut group = c.benchmark_group("disk_mixed");
    group.sample_size(20);
    group.throughput(Throughput::Elements(1));

    group.bench_function("50_read_50_write_1kb", |b| {
        let dir = TempDir::new().unwrap();
        let cache = DiskCache::open_with_codec(dir.path(), RawCodec).unwrap();
        cache.set_count_limit(50).unwrap();
        let data = vec![b'x'; 1024];
        let keys: Vec<String> = (0..100).map(|i| format!("key{}", i)).collect();

        for key in &keys {
            cache.put(key, &data).unwrap();
        }

        let mut counter = 0usize;
        b.iter(|| {
            let key = &keys[counter % 100];
            if counter % 2 == 0 {
                black_box(cache.get(key).ok());
            } else {
                black_box(cache.put(key, &data).ok());
            }
            counter += 1;
        });
    });

    group.finish();
}

criterion_group!(benches, bench_memory_put, bench_memory_get, bench_disk_mixed);
criterion_main!(benches);
