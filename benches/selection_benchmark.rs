use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use multiroom_booking::{
    Catalog, CatalogStore, Price, RateId, RateOption, Recommendation, Room,
    SelectionStateMachine,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::thread;

// Catalog with `rooms` rooms, 8 rates per room and `bundles` random recommendations
fn build_catalog(rooms: usize, bundles: usize) -> Catalog {
    let mut rng = StdRng::seed_from_u64(7);
    let rates_per_room = 8;

    let room_list = (0..rooms)
        .map(|i| Room::new(format!("room-{}", i).as_str(), 2, vec![]))
        .collect();
    let rates = (0..rooms)
        .map(|room| {
            (0..rates_per_room)
                .map(|i| RateOption::new(format!("r{}-{}", room, i).as_str(), Price::new(80.0, "EUR")))
                .collect::<Vec<_>>()
        })
        .collect();
    let recommendations = (0..bundles)
        .map(|n| {
            let vector = (0..rooms)
                .map(|room| RateId::new(format!("r{}-{}", room, rng.gen_range(0..rates_per_room))))
                .collect();
            Recommendation::new(
                format!("rec-{}", n).as_str(),
                vector,
                Price::new(rng.gen_range(100.0..900.0), "EUR"),
            )
        })
        .collect();

    Catalog::new(room_list, rates, recommendations).unwrap()
}

fn walk(machine: &mut SelectionStateMachine, rng: &mut StdRng) {
    while !machine.is_complete() {
        let pick = machine
            .candidates()
            .choose(rng)
            .map(|option| option.rate_id.clone())
            .unwrap();
        machine.select_rate(&pick).unwrap();
    }
    black_box(machine.validate().unwrap());
}

pub fn selection_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("multi_room_selection");

    // Full walk to a validated selection for growing recommendation counts
    for bundles in [100, 1_000, 10_000].iter() {
        let catalog = Arc::new(build_catalog(4, *bundles));
        group.bench_with_input(BenchmarkId::new("walk", bundles), bundles, |b, _| {
            let mut rng = StdRng::seed_from_u64(11);
            b.iter(|| {
                let mut machine = SelectionStateMachine::new(Arc::clone(&catalog));
                walk(&mut machine, &mut rng);
            });
        });
    }

    // Many booking attempts sharing one stored catalog
    group.bench_function("concurrent_sessions", |b| {
        let store = Arc::new(CatalogStore::default());
        store.insert("IT-bench", build_catalog(3, 1_000), None);

        b.iter(|| {
            let mut handles = vec![];
            for seed in 0..4 {
                let store = Arc::clone(&store);
                handles.push(thread::spawn(move || {
                    let mut rng = StdRng::seed_from_u64(seed);
                    for _ in 0..25 {
                        let mut machine = store.open_session("IT-bench").unwrap();
                        walk(&mut machine, &mut rng);
                        if rng.gen_bool(0.3) {
                            machine.go_back();
                        }
                    }
                }));
            }
            for handle in handles {
                handle.join().unwrap();
            }
            black_box(store.stats())
        });
    });

    group.finish();
}

criterion_group!(benches, selection_benchmark);
criterion_main!(benches);
