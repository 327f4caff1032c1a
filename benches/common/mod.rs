#![allow(dead_code)]

use std::hint::black_box;

use criterion::Criterion;
use hyperdrive_math::{
    math::log_exp::{exp, ln},
    FixedPoint, PoolConfig, PoolInfo, State, YieldSpace, DEFAULT_MAX_ITERATIONS, I256,
};

fn fp(s: &str) -> FixedPoint {
    s.parse().unwrap()
}

/// z = 1,000,000, y = 2,000,000, c = µ = 1, t = 0.1, z_min = 0.1, 5% curve fee.
pub fn bench_state(long_exposure: &str) -> State {
    let mut config = PoolConfig {
        initial_share_price: FixedPoint::ONE,
        minimum_share_reserves: fp("0.1"),
        position_duration: 604_800,
        checkpoint_duration: 86_400,
        time_stretch: fp("0.1"),
        ..Default::default()
    };
    config.fees.curve = fp("0.05");
    config.fees.flat = fp("0.0005");
    config.fees.governance = fp("0.15");

    State::new(
        config,
        PoolInfo {
            share_reserves: fp("1000000"),
            bond_reserves: fp("2000000"),
            share_price: FixedPoint::ONE,
            long_exposure: fp(long_exposure),
            ..Default::default()
        },
    )
}

pub fn bench_fixed_point(c: &mut Criterion) {
    let mut group = c.benchmark_group("fixed_point");
    let a = fp("1234.5678");
    let b = fp("0.987654321");

    group.bench_function("mul_div_down", |bench| {
        bench.iter(|| black_box(a).mul_div_down(black_box(b), black_box(a)))
    });
    group.bench_function("pow", |bench| {
        bench.iter(|| black_box(a).pow(black_box(b)))
    });
    group.bench_function("parse", |bench| {
        bench.iter(|| black_box("2583.754033693357393077").parse::<FixedPoint>())
    });
    group.finish();
}

pub fn bench_log_exp(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_exp");
    let x = I256::from_raw(fp("2.5").raw());

    group.bench_function("ln", |bench| bench.iter(|| ln(black_box(x))));
    group.bench_function("exp", |bench| bench.iter(|| exp(black_box(x))));
    group.finish();
}

pub fn bench_pricing(c: &mut Criterion) {
    let mut group = c.benchmark_group("pricing");
    let state = bench_state("0");
    let spot_price = state.calculate_spot_price().unwrap();

    group.bench_function("spot_price", |bench| {
        bench.iter(|| black_box(&state).calculate_spot_price())
    });
    group.bench_function("open_long", |bench| {
        bench.iter(|| black_box(&state).calculate_open_long(black_box(fp("1000"))))
    });
    group.bench_function("open_short", |bench| {
        bench.iter(|| {
            black_box(&state).calculate_open_short(black_box(fp("1000")), spot_price, FixedPoint::ONE)
        })
    });
    group.finish();
}

pub fn bench_solvers(c: &mut Criterion) {
    let mut group = c.benchmark_group("solvers");
    let state = bench_state("0");
    let exposed = bench_state("990000");

    group.bench_function("max_long_solvency_bound", |bench| {
        bench.iter(|| {
            black_box(&exposed).calculate_max_long(
                black_box(fp("1000000000")),
                I256::ZERO,
                DEFAULT_MAX_ITERATIONS,
            )
        })
    });
    group.bench_function("max_short_budget_bound", |bench| {
        bench.iter(|| {
            black_box(&state).calculate_max_short(
                black_box(fp("10000")),
                FixedPoint::ONE,
                I256::ZERO,
                None,
                DEFAULT_MAX_ITERATIONS,
            )
        })
    });
    group.bench_function("targeted_long", |bench| {
        bench.iter(|| {
            black_box(&state).calculate_targeted_long(black_box(fp("3")), I256::ZERO, DEFAULT_MAX_ITERATIONS, None)
        })
    });
    group.bench_function("present_value", |bench| {
        bench.iter(|| black_box(&state).calculate_present_value(black_box(172_805)))
    });
    group.finish();
}
