//! Criterion benchmarks for the control cycle and its hot engines.
//!
//! Run with:
//! ```bash
//! cargo bench --bench cycle_throughput
//! ```

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use homeostat::domain::models::{ActivityProfile, AllocatorConfig, PhaseConfig, Tier};
use homeostat::services::{select_from_scores, CapitalAllocator};
use homeostat::{Config, Controller, SimulatedExecutor};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn catalog(n: usize) -> Vec<ActivityProfile> {
    (0..n)
        .map(|i| {
            let tier = Tier::ALL[i % Tier::ALL.len()];
            ActivityProfile::new(format!("act-{i}"), tier)
                .with_capital(10.0 + i as f64)
                .with_return(5.0 + (i % 7) as f64 * 4.0)
                .with_risk((i % 10) as f64 / 10.0)
        })
        .collect()
}

fn controller(n: usize, rt: &tokio::runtime::Runtime) -> Controller {
    let config = Config {
        seed: Some(1),
        initial_balance: 1_000_000.0,
        total_budget: 10_000.0,
        activities: catalog(n),
        phases: vec![PhaseConfig::new("all", 0.0, Tier::ALL.to_vec())],
        ..Config::default()
    };
    let controller = Controller::new(config).unwrap();
    rt.block_on(async {
        controller
            .register_default_executor(Arc::new(SimulatedExecutor::new(Some(1))))
            .await;
        controller.initialize().await.unwrap();
    });
    controller
}

// ── full cycle ──────────────────────────────────────────────────────────────

fn bench_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("controller/cycle");

    for n in [5usize, 50, 200] {
        let ctl = controller(n, &rt);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.to_async(&rt).iter(|| async { ctl.cycle().await.unwrap() });
        });
    }
    group.finish();
}

// ── engines ─────────────────────────────────────────────────────────────────

fn bench_allocator_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocator/step");

    for n in [10usize, 100, 1_000] {
        let means: Vec<f64> = (0..n).map(|i| (i % 50) as f64).collect();
        let mut allocator = CapitalAllocator::new(AllocatorConfig::default(), 10_000.0, vec![true; n]);
        let mut cycle = 0u64;
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                cycle += 1;
                black_box(allocator.step(cycle, &means, 10.0, 100.0, 0.05))
            });
        });
    }
    group.finish();
}

fn bench_selection(c: &mut Criterion) {
    let g: Vec<f64> = (0..100).map(|i| f64::from(i) * 0.01 - 0.5).collect();
    let mut rng = StdRng::seed_from_u64(3);

    c.bench_function("selector/boltzmann_k3_of_100", |b| {
        b.iter(|| black_box(select_from_scores(&g, 2.0, 3, &mut rng)));
    });
}

// ── criterion wiring ────────────────────────────────────────────────────────

criterion_group!(benches, bench_cycle, bench_allocator_step, bench_selection);
criterion_main!(benches);
