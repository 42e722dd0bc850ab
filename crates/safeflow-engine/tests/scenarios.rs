//! End-to-end engine scenarios.
//!
//! Each test drives a fully built engine through `step` the way a host
//! would, covering:
//! - median voting with and without a tolerance violation
//! - merge failure keeping the last good value
//! - the fast-path wake on a raw out-of-range sample
//! - limp-home hysteresis on a scale
//! - drift-free cyclic deadlines under call jitter
//! - staleness and idempotent re-stepping
//! - a PID loop feeding a verified actuator output

use std::sync::{Arc, Mutex};

use safeflow_engine::prelude::*;

fn id(raw: u8) -> SignalId {
    SignalId::new(raw)
}

fn redundant_speed_engine(tolerance: u32) -> EngineResult<Engine> {
    Engine::builder()
        .with_merge(
            MergeConfig::new(&[id(0), id(1), id(2)], id(3), VotingMethod::Median)
                .with_tolerance(tolerance),
        )
        .build()
}

fn speed_events(values: [i32; 3], t: Timestamp) -> Vec<Event> {
    values
        .iter()
        .zip(0u8..)
        .map(|(&value, raw)| Event::ok(id(raw), value, t))
        .collect()
}

#[test]
fn test_median_merge_within_tolerance() -> EngineResult<()> {
    let mut engine = redundant_speed_engine(50)?;
    engine.step(1_000, &speed_events([2990, 3000, 3010], 1_000));

    let out = engine.signal(id(3)).copied().unwrap_or_default();
    assert_eq!(out.value, 3000);
    assert_eq!(out.status, SignalStatus::Ok);
    assert_eq!(out.timestamp, 1_000);
    assert!(out.updated);
    Ok(())
}

#[test]
fn test_median_merge_spread_violation() -> EngineResult<()> {
    let mut engine = redundant_speed_engine(50)?;
    engine.step(1_000, &speed_events([2990, 3000, 3500], 1_000));

    let out = engine.signal(id(3)).copied().unwrap_or_default();
    assert_eq!(out.value, 3000);
    assert_eq!(out.status, SignalStatus::Inconsistent);
    Ok(())
}

#[test]
fn test_merge_without_valid_inputs_keeps_value() -> EngineResult<()> {
    let mut engine = redundant_speed_engine(50)?;
    engine.step(1_000, &speed_events([2990, 3000, 3010], 1_000));

    let failed: Vec<Event> = (0u8..3)
        .map(|raw| Event::new(id(raw), 0, SignalStatus::Error, 2_000))
        .collect();
    engine.step(2_000, &failed);

    let out = engine.signal(id(3)).copied().unwrap_or_default();
    assert_eq!(out.status, SignalStatus::Error);
    assert_eq!(out.value, 3000);
    assert_eq!(engine.last_report().merges_without_input, 1);
    Ok(())
}

#[test]
fn test_fast_path_wake_during_same_step() -> EngineResult<()> {
    let calls: Arc<Mutex<Vec<(u8, i32, FaultLevel)>>> = Arc::default();
    let sink = Arc::clone(&calls);

    let monitor =
        FaultMonitorConfig::new(id(5), id(20), FaultLevel::Critical).with_range(0, 5000);
    let mut engine = Engine::builder()
        .with_fault_monitor_wake(monitor, move |m: u8, v: i32, l: FaultLevel| {
            if let Ok(mut log) = sink.lock() {
                log.push((m, v, l));
            }
        })
        .build()?;

    engine.step(10_000, &[Event::ok(id(5), 6000, 10_000)]);

    let log = calls.lock().map(|l| l.clone()).unwrap_or_default();
    // Raw fast-path wake first, then the monitor pass reports the rising edge.
    assert_eq!(
        log,
        vec![(0, 6000, FaultLevel::Critical), (0, 6000, FaultLevel::Critical)]
    );
    assert_eq!(engine.last_report().fast_path_wakes, 1);
    assert_eq!(engine.last_report().monitor_wakes, 1);
    assert_eq!(engine.value(id(20)), Some(FaultLevel::Critical.as_value()));
    Ok(())
}

#[test]
fn test_limp_home_hysteresis() -> EngineResult<()> {
    let mut engine = Engine::builder()
        .with_scale(ScaleConfig::new(id(10), id(11)).with_factor(100))
        .with_fault_monitor(
            FaultMonitorConfig::new(id(5), id(20), FaultLevel::Error)
                .with_range(0, 5000)
                .with_limp(LimpAction::scale_to(0, 50, 500)),
        )
        .build()?;

    let factor = |engine: &Engine| engine.scale(0).map(|s| s.scale_factor);

    // Faulted from 0 ms up to 1000 ms, sampled every 10 ms.
    for t_ms in (0..1000u64).step_by(10) {
        let now = t_ms * 1000;
        engine.step(now, &[Event::ok(id(5), 9000, now)]);
    }
    assert_eq!(factor(&engine), Some(50));
    assert_eq!(engine.limp_state(0), Some(LimpState::Limp));

    for t_ms in (1000..=1400u64).step_by(10) {
        let now = t_ms * 1000;
        engine.step(now, &[Event::ok(id(5), 100, now)]);
    }
    assert_eq!(factor(&engine), Some(50));

    for t_ms in (1410..=1600u64).step_by(10) {
        let now = t_ms * 1000;
        engine.step(now, &[Event::ok(id(5), 100, now)]);
    }
    assert_eq!(factor(&engine), Some(100));
    assert_eq!(engine.limp_state(0), Some(LimpState::Normal));
    assert_eq!(engine.totals().limp_entries, 1);
    assert_eq!(engine.totals().limp_exits, 1);
    Ok(())
}

#[test]
fn test_intermittent_fault_extends_limp() -> EngineResult<()> {
    let mut engine = Engine::builder()
        .with_scale(ScaleConfig::new(id(10), id(11)).with_factor(100))
        .with_fault_monitor(
            FaultMonitorConfig::new(id(5), id(20), FaultLevel::Error)
                .with_range(0, 5000)
                .with_limp(LimpAction::scale_to(0, 50, 500)),
        )
        .build()?;

    engine.step(0, &[Event::ok(id(5), 9000, 0)]);
    engine.step(300_000, &[Event::ok(id(5), 100, 300_000)]);
    // Blip at 400 ms restarts the window.
    engine.step(400_000, &[Event::ok(id(5), 9000, 400_000)]);
    engine.step(700_000, &[Event::ok(id(5), 100, 700_000)]);
    assert_eq!(engine.scale(0).map(|s| s.scale_factor), Some(50));

    engine.step(900_000, &[]);
    assert_eq!(engine.scale(0).map(|s| s.scale_factor), Some(100));
    assert_eq!(engine.totals().limp_entries, 1);
    Ok(())
}

#[test]
fn test_cyclic_output_without_drift() -> EngineResult<()> {
    let mut engine = Engine::builder()
        .with_cyclic_output(
            CyclicOutputConfig::new(id(0), 0x18FE_F100, 100_000).on(OutputKind::J1939, 1),
        )
        .build()?;

    let jitter = [0u64, 700, 1_300, 50, 2_000, 999];
    let mut fired = Vec::new();
    let mut t = 0u64;
    while t < 600_000 {
        let index = usize::try_from(t / 10_000).unwrap_or(0) % jitter.len();
        let now = t + jitter.get(index).copied().unwrap_or(0);
        engine.step(now, &[]);
        fired.extend(engine.outputs().iter().map(|e| (e.kind, e.device_index, e.timestamp)));
        t += 10_000;
    }

    let times: Vec<u64> = fired.iter().map(|&(_, _, ts)| ts / 100_000).collect();
    assert_eq!(times, vec![1, 2, 3, 4, 5]);
    assert!(fired.iter().all(|&(k, d, _)| k == OutputKind::J1939 && d == 1));
    assert_eq!(
        engine.cyclic_outputs().first().map(|c| c.next_deadline()),
        Some(600_000)
    );
    Ok(())
}

#[test]
fn test_staleness_transitions_once() -> EngineResult<()> {
    let mut engine = Engine::builder()
        .with_signal(SignalConfig::stale_after(id(4), 50_000))
        .build()?;

    engine.step(0, &[Event::ok(id(4), 12, 0)]);
    engine.step(50_000, &[]);
    assert_eq!(engine.signal(id(4)).map(|s| s.status), Some(SignalStatus::Ok));

    engine.step(60_000, &[]);
    assert_eq!(
        engine.signal(id(4)).map(|s| s.status),
        Some(SignalStatus::Timeout)
    );
    assert_eq!(engine.last_report().signals_timed_out, 1);

    engine.step(70_000, &[]);
    assert_eq!(
        engine.signal(id(4)).map(|s| s.status),
        Some(SignalStatus::Timeout)
    );
    assert_eq!(engine.last_report().signals_timed_out, 0);

    engine.step(80_000, &[Event::ok(id(4), 13, 80_000)]);
    assert_eq!(engine.signal(id(4)).map(|s| s.status), Some(SignalStatus::Ok));
    Ok(())
}

#[test]
fn test_repeated_step_is_idempotent() -> EngineResult<()> {
    let mut engine = Engine::builder()
        .with_scale(ScaleConfig::new(id(10), id(11)).with_factor(100))
        .with_fault_monitor(
            FaultMonitorConfig::new(id(5), id(20), FaultLevel::Error)
                .with_range(0, 5000)
                .with_limp(LimpAction::scale_to(0, 50, 500)),
        )
        .with_cyclic_output(CyclicOutputConfig::new(id(11), 1, 100_000))
        .build()?;

    engine.step(100_000, &[Event::ok(id(5), 9000, 100_000)]);
    assert_eq!(engine.outputs().len(), 1);

    engine.step(100_000, &[]);
    assert!(engine.outputs().is_empty());
    assert_eq!(engine.limp_state(0), Some(LimpState::Limp));
    assert_eq!(engine.last_report().limp_entries, 0);
    assert_eq!(engine.last_report().limp_exits, 0);
    assert_eq!(engine.last_report().monitor_wakes, 0);
    Ok(())
}

#[test]
fn test_every_due_output_fires_once_per_step() -> EngineResult<()> {
    let mut builder = Engine::builder();
    for n in 0..16u32 {
        builder = builder.with_cyclic_output(CyclicOutputConfig::new(id(0), n, 1));
    }
    let mut engine = builder.build()?;

    // Far past every deadline: each output fires once per step.
    engine.step(1_000, &[]);
    assert_eq!(engine.outputs().len(), 16);
    assert_eq!(engine.last_report().outputs_dropped, 0);
    Ok(())
}

#[test]
fn test_shared_limp_target_rejected() {
    let limp_monitor = |watched: u8, out: u8| {
        FaultMonitorConfig::new(id(watched), id(out), FaultLevel::Error)
            .with_range(0, 5000)
            .with_limp(LimpAction::scale_to(0, 50, 500))
    };
    let result = Engine::builder()
        .with_scale(ScaleConfig::new(id(10), id(11)).with_factor(100))
        .with_fault_monitor(limp_monitor(5, 20))
        .with_fault_monitor(limp_monitor(6, 21))
        .build();
    assert!(matches!(
        result,
        Err(EngineError::SharedLimpTarget {
            first: 0,
            second: 1,
            scale: 0
        })
    ));
}

#[test]
fn test_overlapping_limp_on_separate_scales_restores() -> EngineResult<()> {
    let mut engine = Engine::builder()
        .with_scale(ScaleConfig::new(id(10), id(11)).with_factor(100))
        .with_scale(ScaleConfig::new(id(12), id(13)).with_factor(200))
        .with_fault_monitor(
            FaultMonitorConfig::new(id(5), id(20), FaultLevel::Error)
                .with_range(0, 5000)
                .with_limp(LimpAction::scale_to(0, 50, 100)),
        )
        .with_fault_monitor(
            FaultMonitorConfig::new(id(6), id(21), FaultLevel::Error)
                .with_range(0, 5000)
                .with_limp(LimpAction::scale_to(1, 20, 100)),
        )
        .build()?;
    let factors = |engine: &Engine| {
        (
            engine.scale(0).map(|s| s.scale_factor),
            engine.scale(1).map(|s| s.scale_factor),
        )
    };

    engine.step(0, &[Event::ok(id(5), 9000, 0)]);
    engine.step(10_000, &[Event::ok(id(6), 9000, 10_000)]);
    assert_eq!(factors(&engine), (Some(50), Some(20)));

    // First monitor recovers while the second is still degraded.
    engine.step(20_000, &[Event::ok(id(5), 100, 20_000)]);
    engine.step(200_000, &[]);
    assert_eq!(factors(&engine), (Some(100), Some(20)));

    engine.reset();
    assert_eq!(factors(&engine), (Some(100), Some(200)));
    assert_eq!(engine.limp_state(1), Some(LimpState::Normal));
    Ok(())
}

#[test]
fn test_pid_loop_with_verified_feedback() -> EngineResult<()> {
    let mut engine = Engine::builder()
        .with_pid(
            PidConfig::new(id(0), id(1), id(2))
                .with_gains(500, 0, 0)
                .with_sample_time(10_000),
        )
        .with_verified_output(
            VerifiedOutputConfig::new(id(2), id(3), id(4))
                .with_tolerance(10)
                .with_timeout(20_000),
        )
        .build()?;

    // First pass primes the controller.
    engine.step(
        10_000,
        &[Event::ok(id(0), 1000, 10_000), Event::ok(id(1), 0, 10_000)],
    );
    assert_eq!(engine.value(id(2)), Some(0));

    engine.step(20_000, &[]);
    assert_eq!(engine.value(id(2)), Some(500));
    assert_eq!(engine.value(id(4)), Some(500));

    // Actuator settles within tolerance.
    engine.step(40_000, &[Event::ok(id(3), 495, 40_000)]);
    let out = engine.signal(id(4)).copied().unwrap_or_default();
    assert_eq!((out.value, out.status), (495, SignalStatus::Ok));

    // Command drops but the actuator does not follow.
    engine.step(50_000, &[Event::ok(id(1), 600, 50_000)]);
    assert_eq!(engine.value(id(2)), Some(200));
    engine.step(70_000, &[]);
    let out = engine.signal(id(4)).copied().unwrap_or_default();
    assert_eq!((out.value, out.status), (495, SignalStatus::Error));
    assert_eq!(engine.totals().verifications_failed, 1);

    engine.reset();
    engine.step(
        80_000,
        &[Event::ok(id(0), 1000, 80_000), Event::ok(id(1), 0, 80_000)],
    );
    assert_eq!(engine.value(id(2)), Some(0));
    Ok(())
}
