use cidrtree::{Preallocate, RadixKey, RadixTree, SystemAllocator};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;

/// Random /16../32 IPv4 prefixes from a fixed seed
fn v4_prefixes(count: usize) -> Vec<(u32, u32)> {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    (0..count)
        .map(|_| {
            let mask = u32::prefix_mask(rng.random_range(16..=32));
            (rng.random::<u32>() & mask, mask)
        })
        .collect()
}

fn v6_prefixes(count: usize) -> Vec<([u8; 16], [u8; 16])> {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    (0..count)
        .map(|_| {
            let mask = <[u8; 16]>::prefix_mask(rng.random_range(32..=64));
            let mut key: [u8; 16] = rng.random();
            for (k, m) in key.iter_mut().zip(mask) {
                *k &= m;
            }
            (key, mask)
        })
        .collect()
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");

    for count in [1_000, 10_000, 100_000] {
        let prefixes = v4_prefixes(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("v4", count), &prefixes, |b, prefixes| {
            b.iter(|| {
                let mut tree =
                    RadixTree::<u32>::create(SystemAllocator, Preallocate::Auto).unwrap();
                for (i, (key, mask)) in prefixes.iter().enumerate() {
                    let _ = tree.insert(*key, *mask, i);
                }
                black_box(tree)
            });
        });
    }

    group.finish();
}

fn bench_find(c: &mut Criterion) {
    let mut group = c.benchmark_group("find");
    let queries: Vec<u32> = {
        let mut rng = StdRng::seed_from_u64(0xfeed);
        (0..10_000).map(|_| rng.random()).collect()
    };

    for preallocate in [Preallocate::Disabled, Preallocate::Auto] {
        let mut tree = RadixTree::<u32>::create(SystemAllocator, preallocate).unwrap();
        for (i, (key, mask)) in v4_prefixes(100_000).into_iter().enumerate() {
            let _ = tree.insert(key, mask, i);
        }

        group.throughput(Throughput::Elements(queries.len() as u64));
        group.bench_function(BenchmarkId::new("v4", preallocate), |b| {
            b.iter(|| {
                for query in &queries {
                    black_box(tree.find(*query));
                }
            });
        });
    }

    let mut tree = RadixTree::<[u8; 16]>::new().unwrap();
    let prefixes = v6_prefixes(100_000);
    for (i, (key, mask)) in prefixes.iter().enumerate() {
        let _ = tree.insert(*key, *mask, i);
    }
    group.throughput(Throughput::Elements(prefixes.len() as u64));
    group.bench_function("v6", |b| {
        b.iter(|| {
            for (key, _) in &prefixes {
                black_box(tree.find(*key));
            }
        });
    });

    group.finish();
}

fn bench_churn(c: &mut Criterion) {
    let prefixes = v4_prefixes(10_000);
    let mut tree = RadixTree::<u32>::new().unwrap();

    c.bench_function("delete_reinsert_10k", |b| {
        b.iter(|| {
            for (i, (key, mask)) in prefixes.iter().enumerate() {
                let _ = tree.insert(*key, *mask, i);
            }
            for (key, mask) in &prefixes {
                let _ = tree.delete(*key, *mask);
            }
        });
    });
}

criterion_group!(benches, bench_insert, bench_find, bench_churn);
criterion_main!(benches);
