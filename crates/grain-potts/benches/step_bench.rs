use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use grain_potts::potts::{Lattice, SpinGrid, DEFAULT_RNG_SEED};

fn polycrystal_lattice(side: usize, grains: u32) -> Lattice {
    let mut rng = StdRng::seed_from_u64(7);
    let spins = (0..side * side * side)
        .map(|_| rng.random_range(1..=grains))
        .collect();
    let grid = SpinGrid::new(side, spins).expect("grid");
    let mut lattice = Lattice::from_grid(&grid, DEFAULT_RNG_SEED);
    lattice.init().expect("init");
    lattice
}

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");

    group.bench_function("L=16 grains=32 x100 steps", |b| {
        b.iter_batched(
            || polycrystal_lattice(16, 32),
            |mut lattice| {
                for _ in 0..100 {
                    lattice.step().expect("step");
                }
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(benches, bench_step);
criterion_main!(benches);
