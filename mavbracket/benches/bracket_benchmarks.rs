use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use mavbracket::bracket::{Bracket, MatchResolver, SeedMethod, TeamId, build};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn teams(n: usize) -> Vec<TeamId> {
    (1..=n as i64).collect()
}

/// Resolve every match, team1 always winning
fn play_out(mut bracket: Bracket) -> Bracket {
    loop {
        let ready: Vec<_> = bracket
            .pending()
            .filter_map(|m| m.team1.map(|t| (m.key, t)))
            .collect();
        if ready.is_empty() {
            return bracket;
        }
        let mut resolver = MatchResolver::new(&mut bracket);
        for (key, winner) in ready {
            resolver.set_winner(key, winner, true).unwrap();
        }
    }
}

/// Benchmark bracket generation across team counts
fn bench_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");
    for n in [8usize, 33, 128, 1000] {
        let ids = teams(n);
        group.bench_with_input(BenchmarkId::new("power", n), &ids, |b, ids| {
            let mut rng = StdRng::seed_from_u64(0);
            b.iter(|| build(ids, &SeedMethod::POWER, &mut rng).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("random", n), &ids, |b, ids| {
            let mut rng = StdRng::seed_from_u64(0);
            b.iter(|| build(ids, &SeedMethod::RANDOM, &mut rng).unwrap());
        });
    }
    group.finish();
}

/// Benchmark resolving a whole bracket
fn bench_full_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_resolution");
    for n in [16usize, 100, 512] {
        let ids = teams(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &ids, |b, ids| {
            b.iter_batched(
                || {
                    build(ids, &SeedMethod::POWER, &mut StdRng::seed_from_u64(0))
                        .unwrap()
                        .bracket
                },
                play_out,
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(brackets, bench_generate, bench_full_resolution);
criterion_main!(brackets);
