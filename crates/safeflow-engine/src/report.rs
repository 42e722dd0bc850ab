//! Per-step diagnostic counters.
//!
//! The step never logs and never fails; everything worth flagging is counted
//! here and left for the host's logging layer to report.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Counters collected while running one step (or accumulated over many).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StepReport {
    /// Events written into the signal table.
    pub events_ingested: u32,
    /// Events dropped because their signal id was out of range.
    pub events_discarded: u32,
    /// Wake callbacks fired from the ingestion fast path.
    pub fast_path_wakes: u32,
    /// Wake callbacks fired on fault raise/clear edges.
    pub monitor_wakes: u32,
    /// Signals newly marked as timed out.
    pub signals_timed_out: u32,
    /// Merges that voted on at least one valid input.
    pub merges_run: u32,
    /// Merges that found no valid input and flagged their output.
    pub merges_without_input: u32,
    /// Monitors reporting a fault this step.
    pub monitors_faulted: u32,
    /// Normal to limp transitions.
    pub limp_entries: u32,
    /// Limp to normal transitions.
    pub limp_exits: u32,
    /// Output events appended to the buffer.
    pub outputs_emitted: u32,
    /// Cyclic firings dropped because the buffer was full.
    pub outputs_dropped: u32,
    /// Verified outputs whose feedback did not match the command.
    pub verifications_failed: u32,
}

impl StepReport {
    /// Add `other` into `self`, saturating each counter.
    pub fn accumulate(&mut self, other: &StepReport) {
        self.events_ingested = self.events_ingested.saturating_add(other.events_ingested);
        self.events_discarded = self.events_discarded.saturating_add(other.events_discarded);
        self.fast_path_wakes = self.fast_path_wakes.saturating_add(other.fast_path_wakes);
        self.monitor_wakes = self.monitor_wakes.saturating_add(other.monitor_wakes);
        self.signals_timed_out = self
            .signals_timed_out
            .saturating_add(other.signals_timed_out);
        self.merges_run = self.merges_run.saturating_add(other.merges_run);
        self.merges_without_input = self
            .merges_without_input
            .saturating_add(other.merges_without_input);
        self.monitors_faulted = self.monitors_faulted.saturating_add(other.monitors_faulted);
        self.limp_entries = self.limp_entries.saturating_add(other.limp_entries);
        self.limp_exits = self.limp_exits.saturating_add(other.limp_exits);
        self.outputs_emitted = self.outputs_emitted.saturating_add(other.outputs_emitted);
        self.outputs_dropped = self.outputs_dropped.saturating_add(other.outputs_dropped);
        self.verifications_failed = self
            .verifications_failed
            .saturating_add(other.verifications_failed);
    }

    /// Whether anything the host should warn about happened.
    pub fn has_anomalies(&self) -> bool {
        self.events_discarded > 0
            || self.outputs_dropped > 0
            || self.merges_without_input > 0
            || self.monitors_faulted > 0
            || self.verifications_failed > 0
    }
}

/// Increment a counter without overflow.
#[inline]
pub(crate) fn bump(counter: &mut u32) {
    *counter = counter.saturating_add(1);
}
