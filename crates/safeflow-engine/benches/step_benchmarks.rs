//! Benchmarks for the engine step and the voting primitives.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use safeflow_engine::prelude::*;
use safeflow_engine::{median, vote};

fn id(raw: u8) -> SignalId {
    SignalId::new(raw)
}

/// Five triple-redundant merges, each scaled, two of them supervised with
/// limp-home, and a cyclic output per scale. One PID follows two of the
/// scaled values and drives a verified output.
fn populated_engine() -> Result<Engine, EngineError> {
    let mut builder = Engine::builder();
    for m in 0..5u8 {
        let base = m * 3;
        let merged = 18 + m;
        let scaled = 24 + m;
        builder = builder
            .with_signal(SignalConfig::stale_after(id(base), 50_000))
            .with_merge(
                MergeConfig::new(
                    &[id(base), id(base + 1), id(base + 2)],
                    id(merged),
                    VotingMethod::Median,
                )
                .with_tolerance(100),
            )
            .with_scale(ScaleConfig::new(id(merged), id(scaled)).with_factor(900))
            .with_cyclic_output(CyclicOutputConfig::new(id(scaled), u32::from(m), 1_000));
    }
    for m in 0..2u8 {
        builder = builder.with_fault_monitor(
            FaultMonitorConfig::new(id(18 + m), id(30 + m), FaultLevel::Warning)
                .with_range(-10_000, 10_000)
                .with_status_check()
                .with_limp(LimpAction::scale_to(m, 500, 200)),
        );
    }
    builder
        .with_pid(
            PidConfig::new(id(24), id(25), id(29))
                .with_gains(800, 50, 10)
                .with_output_limits(-5000, 5000),
        )
        .with_verified_output(
            VerifiedOutputConfig::new(id(29), id(15), id(16))
                .with_tolerance(20)
                .continuous(),
        )
        .build()
}

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_step");

    let events: Vec<Event> = (0u8..16)
        .map(|raw| Event::ok(id(raw), 3000 + i32::from(raw % 3), 0))
        .collect();

    if let Ok(mut engine) = populated_engine() {
        let mut now = 0u64;
        group.bench_function("populated_16_events", |b| {
            b.iter(|| {
                now += 1_000;
                engine.step(black_box(now), black_box(&events));
                black_box(engine.outputs().len())
            })
        });
    }

    if let Ok(mut engine) = populated_engine() {
        let mut now = 0u64;
        let empty: &[Event] = &[];
        group.bench_function("populated_no_events", |b| {
            b.iter(|| {
                now += 1_000;
                engine.step(black_box(now), black_box(empty));
            })
        });
    }

    group.finish();
}

fn bench_voting(c: &mut Criterion) {
    let mut group = c.benchmark_group("voting");

    for n in [1usize, 3, 5, 8] {
        let values: Vec<i32> = (0..n).map(|i| 1000 - i32::try_from(i).unwrap_or(0) * 7).collect();
        group.bench_with_input(BenchmarkId::new("median", n), &values, |b, v| {
            b.iter(|| median(black_box(v)))
        });
        group.bench_with_input(BenchmarkId::new("majority", n), &values, |b, v| {
            b.iter(|| vote(black_box(v), VotingMethod::Majority, 20, None))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_step, bench_voting);
criterion_main!(benches);
