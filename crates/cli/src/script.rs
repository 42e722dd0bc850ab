//! Event scripts replayed by `sfctl run`.
//!
//! A script is JSON Lines: one event per line,
//! `{"t_us": 1500, "signal": "pedal_a", "value": 612, "status": "ok"}`.
//! `signal` is either a numeric id or a name from the description;
//! `status` defaults to `ok`. Blank lines and lines starting with `#` are
//! skipped.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use safeflow_engine::{Event, SignalId, SignalStatus, Timestamp};
use serde::Deserialize;

use crate::error::CliError;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum SignalRef {
    Id(u8),
    Name(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScriptLine {
    t_us: Timestamp,
    signal: SignalRef,
    value: i32,
    #[serde(default)]
    status: SignalStatus,
}

/// Read and parse a script file.
pub fn read_script(path: &Path, names: &HashMap<&str, SignalId>) -> Result<Vec<Event>, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::ScriptIo {
        path: path.to_path_buf(),
        source,
    })?;
    parse_script(&text, names)
}

/// Parse script text into events, in script order.
pub fn parse_script(text: &str, names: &HashMap<&str, SignalId>) -> Result<Vec<Event>, CliError> {
    let mut events = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = index.saturating_add(1);
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let parsed: ScriptLine = serde_json::from_str(trimmed)
            .map_err(|source| CliError::ScriptLine { line, source })?;
        let signal = match parsed.signal {
            SignalRef::Id(raw) => SignalId::new(raw),
            SignalRef::Name(name) => match names.get(name.as_str()) {
                Some(id) => *id,
                None => return Err(CliError::UnknownSignal { line, name }),
            },
        };
        events.push(Event::new(signal, parsed.value, parsed.status, parsed.t_us));
    }
    Ok(events)
}

/// Longest replay `sfctl run` accepts.
pub const MAX_REPLAY_STEPS: u64 = 10_000_000;

/// Events bucketed into fixed-period steps.
///
/// Step `k` runs at `(k + 1) * period_us` and receives the events whose
/// time lies in `(k * period_us, (k + 1) * period_us]`; events at time 0
/// go to the first step. Without `cycles`, enough steps are scheduled to
/// cover the last event. Events past the last step are dropped. Only
/// non-empty steps are stored.
#[derive(Debug, Clone)]
pub struct Schedule {
    period_us: u64,
    steps: u64,
    buckets: BTreeMap<u64, Vec<Event>>,
}

impl Schedule {
    /// Bucket `events` into steps of `period_us`.
    ///
    /// # Errors
    ///
    /// [`CliError::ValidationError`] for a zero period or when the replay
    /// would exceed [`MAX_REPLAY_STEPS`].
    pub fn new(events: &[Event], period_us: u64, cycles: Option<u64>) -> Result<Self, CliError> {
        if period_us == 0 {
            return Err(CliError::ValidationError(
                "--period-us must be greater than zero".into(),
            ));
        }
        let step_of = |t: Timestamp| t.div_ceil(period_us).max(1).saturating_sub(1);
        let steps = cycles.unwrap_or_else(|| {
            events
                .iter()
                .map(|e| step_of(e.timestamp).saturating_add(1))
                .max()
                .unwrap_or(1)
        });
        if steps > MAX_REPLAY_STEPS {
            return Err(CliError::ValidationError(format!(
                "replay needs {steps} steps of {period_us} us, more than the limit of {MAX_REPLAY_STEPS}"
            )));
        }

        let mut buckets: BTreeMap<u64, Vec<Event>> = BTreeMap::new();
        for event in events {
            let step = step_of(event.timestamp);
            if step < steps {
                buckets.entry(step).or_default().push(*event);
            }
        }
        Ok(Self {
            period_us,
            steps,
            buckets,
        })
    }

    /// Number of steps to run.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Step period.
    pub fn period_us(&self) -> u64 {
        self.period_us
    }

    /// Each step's time and events, in order.
    pub fn iter(&self) -> impl Iterator<Item = (Timestamp, &[Event])> + '_ {
        (0..self.steps).map(move |k| {
            let now_us = k.saturating_add(1).saturating_mul(self.period_us);
            let events = self.buckets.get(&k).map_or(&[][..], Vec::as_slice);
            (now_us, events)
        })
    }
}
