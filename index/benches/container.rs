use ardent_index::{HashedIndex, MultiIndex, OrderedIndex};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};

#[derive(Clone)]
struct Pending {
    id: u64,
    expiration: u64,
}

type Dedup = MultiIndex<Pending, (HashedIndex<Pending, u64>, OrderedIndex<Pending, u64>)>;

fn dedup() -> Dedup {
    MultiIndex::new((
        HashedIndex::unique(|p: &Pending| p.id),
        OrderedIndex::non_unique(|p: &Pending| p.expiration),
    ))
}

fn populated(size: u64, rng: &mut StdRng) -> Dedup {
    let mut container = dedup();
    for id in 0..size {
        container
            .insert(Pending {
                id,
                expiration: rng.gen_range(0..size),
            })
            .unwrap();
    }
    container
}

fn container(c: &mut Criterion) {
    let mut group = c.benchmark_group("multi_index");
    for size in [1_000u64, 10_000, 100_000] {
        let mut rng = StdRng::seed_from_u64(size);
        let base = populated(size, &mut rng);

        group.bench_function(BenchmarkId::new("find_hit", size), |b| {
            let mut rng = StdRng::seed_from_u64(1);
            b.iter(|| {
                let id = rng.gen_range(0..size);
                black_box(base.view(|i| &i.0).get(&id).map(|p| p.expiration))
            })
        });

        group.bench_function(BenchmarkId::new("insert_duplicate", size), |b| {
            let mut container = populated(size, &mut StdRng::seed_from_u64(size));
            b.iter(|| {
                black_box(
                    container
                        .insert(Pending {
                            id: size / 2,
                            expiration: 0,
                        })
                        .is_err(),
                )
            })
        });

        group.bench_function(BenchmarkId::new("insert_erase", size), |b| {
            let mut container = populated(size, &mut StdRng::seed_from_u64(size));
            let mut next = size;
            b.iter(|| {
                let locator = container
                    .insert(Pending {
                        id: next,
                        expiration: next % size,
                    })
                    .unwrap();
                next += 1;
                black_box(container.erase(locator))
            })
        });

        group.bench_function(BenchmarkId::new("expire_tenth", size), |b| {
            b.iter_batched(
                || populated(size, &mut StdRng::seed_from_u64(size)),
                |mut container| {
                    let by_expiration = container.view(|i| &i.1);
                    let begin = by_expiration.begin();
                    let end = by_expiration.lower_bound(size / 10);
                    black_box(container.erase_range(|i| &i.1, &begin, &end))
                },
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, container);
criterion_main!(benches);
