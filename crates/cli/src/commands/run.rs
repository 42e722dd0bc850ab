//! `sfctl run`: replay an event script through an engine.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use safeflow_config::load_description;
use safeflow_engine::Engine;
use tracing::{debug, info, warn};

use crate::commands::RunArgs;
use crate::error::CliError;
use crate::output::{self, EmittedOutput};
use crate::script::{Schedule, read_script};

/// Run the replay described by `args`.
pub fn execute(args: &RunArgs, json: bool) -> Result<()> {
    let description = load_description(&args.description).map_err(CliError::from)?;
    let events = read_script(&args.events, &description.signal_names())?;
    let schedule = Schedule::new(&events, args.period_us, args.cycles)?;
    info!(
        events = events.len(),
        steps = schedule.steps(),
        period_us = args.period_us,
        "replaying event script"
    );

    let mut engine = description.into_engine().map_err(CliError::from)?;
    let emitted = replay(&mut engine, &schedule, args.realtime, json);

    output::print_run_result(schedule.steps(), &emitted, &engine.totals(), json);
    Ok(())
}

fn replay(
    engine: &mut Engine,
    schedule: &Schedule,
    realtime: bool,
    json: bool,
) -> Vec<EmittedOutput> {
    let period = Duration::from_micros(schedule.period_us());
    let mut next_deadline = Instant::now();
    let mut emitted = Vec::new();

    for (cycle, (now_us, events)) in schedule.iter().enumerate() {
        if realtime {
            // Absolute deadlines: oversleeping one cycle shortens the next.
            if let Some(next) = next_deadline.checked_add(period) {
                next_deadline = next;
            }
            let remaining = next_deadline.saturating_duration_since(Instant::now());
            if !remaining.is_zero() {
                thread::sleep(remaining);
            }
        }

        engine.step(now_us, events);
        let report = engine.last_report();
        debug!(cycle, now_us, events = events.len(), outputs = engine.outputs().len(), "step");
        if report.events_discarded > 0 || report.outputs_dropped > 0 {
            warn!(
                cycle,
                now_us,
                discarded = report.events_discarded,
                dropped = report.outputs_dropped,
                "step lost data"
            );
        }

        for event in engine.outputs() {
            let out = EmittedOutput {
                step_us: now_us,
                event: *event,
            };
            if !json {
                output::print_output_human(&out);
            }
            emitted.push(out);
        }
    }
    emitted
}

#[cfg(test)]
mod tests {
    use super::*;
    use safeflow_engine::{CyclicOutputConfig, Event, SignalId};

    #[test]
    fn test_replay_steps_at_period_multiples() -> Result<()> {
        let id = SignalId::new(0);
        let mut engine = Engine::builder()
            .with_cyclic_output(CyclicOutputConfig::new(id, 0x10, 2000))
            .build()?;
        let events = [
            Event::ok(id, 5, 1000),
            Event::ok(id, 6, 2000),
            Event::ok(id, 7, 4000),
        ];
        let schedule = Schedule::new(&events, 1000, None)?;
        let emitted = replay(&mut engine, &schedule, false, true);
        let fired: Vec<(u64, i32)> = emitted.iter().map(|o| (o.step_us, o.event.value)).collect();
        assert_eq!(fired, vec![(2000, 6), (4000, 7)]);
        assert_eq!(engine.totals().events_ingested, 3);
        Ok(())
    }
}
