//! The engine context and its step.

use heapless::Vec as HVec;

use crate::builder::{EngineBuilder, SignalConfig, apply_signal_configs};
use crate::cyclic::{CyclicOutput, OutputBuffer, OutputEvent, process_cyclic_outputs};
use crate::fault::{FaultMonitor, LimpState, process_fault_monitors};
use crate::ingest::ingest_events;
use crate::pid::{PidController, process_pids};
use crate::report::StepReport;
use crate::signal::{Event, Signal, SignalId, SignalTable, Timestamp};
use crate::staleness::apply_staleness;
use crate::transform::{RemapConfig, ScaleConfig, process_remaps, process_scales};
use crate::verified::{VerifiedOutput, process_verified_outputs};
use crate::voter::{MergeConfig, process_merges};
use crate::{
    MAX_CYCLIC_OUTPUTS, MAX_FAULT_MONITORS, MAX_MERGES, MAX_PIDS, MAX_REMAPS, MAX_SCALES,
    MAX_SIGNALS, MAX_VERIFIED_OUTPUTS,
};

/// Owns the signal table, every configured stage and the output buffer.
///
/// Built once through [`Engine::builder`], then driven by [`Engine::step`]
/// at the host's cadence. All storage is fixed-capacity; `step` neither
/// allocates nor blocks.
#[derive(Debug)]
pub struct Engine {
    pub(crate) table: SignalTable,
    pub(crate) signals: HVec<SignalConfig, MAX_SIGNALS>,
    pub(crate) merges: HVec<MergeConfig, MAX_MERGES>,
    pub(crate) remaps: HVec<RemapConfig, MAX_REMAPS>,
    pub(crate) scales: HVec<ScaleConfig, MAX_SCALES>,
    pub(crate) monitors: HVec<FaultMonitor, MAX_FAULT_MONITORS>,
    pub(crate) pids: HVec<PidController, MAX_PIDS>,
    pub(crate) verified: HVec<VerifiedOutput, MAX_VERIFIED_OUTPUTS>,
    pub(crate) cyclic: HVec<CyclicOutput, MAX_CYCLIC_OUTPUTS>,
    pub(crate) outputs: OutputBuffer,
    pub(crate) last_report: StepReport,
    pub(crate) totals: StepReport,
}

impl Engine {
    /// Start configuring an engine.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Run one cycle at time `now` over `events`.
    ///
    /// Phases run in a fixed order: ingestion (with the fast-path range
    /// check), staleness, merges, fault monitors and limp-home, remaps,
    /// scales, PID controllers, verified outputs, cyclic outputs. The output
    /// buffer is cleared first, so [`Engine::outputs`] afterwards holds
    /// exactly this step's emissions.
    pub fn step(&mut self, now: Timestamp, events: &[Event]) {
        let mut report = StepReport::default();

        self.outputs.clear();
        self.table.clear_updated();

        ingest_events(&mut self.table, &mut self.monitors, events, &mut report);
        apply_staleness(&mut self.table, now, &mut report);
        process_merges(&mut self.table, &self.merges, now, &mut report);
        process_fault_monitors(
            &mut self.table,
            &mut self.monitors,
            &mut self.scales,
            now,
            &mut report,
        );
        process_remaps(&mut self.table, &self.remaps, now);
        process_scales(&mut self.table, &self.scales, now);
        process_pids(&mut self.table, &mut self.pids, now);
        process_verified_outputs(&mut self.table, &mut self.verified, now, &mut report);
        process_cyclic_outputs(&self.table, &mut self.cyclic, &mut self.outputs, now, &mut report);

        self.totals.accumulate(&report);
        self.last_report = report;
    }

    /// Output events produced by the last step.
    pub fn outputs(&self) -> &[OutputEvent] {
        &self.outputs
    }

    /// Counters of the last step.
    pub fn last_report(&self) -> StepReport {
        self.last_report
    }

    /// Counters accumulated since build or the last [`Engine::reset`].
    pub fn totals(&self) -> StepReport {
        self.totals
    }

    /// The signal table.
    pub fn signals(&self) -> &SignalTable {
        &self.table
    }

    /// One signal slot.
    pub fn signal(&self, id: SignalId) -> Option<&Signal> {
        self.table.get(id)
    }

    /// Value of one signal.
    pub fn value(&self, id: SignalId) -> Option<i32> {
        self.table.get(id).map(|s| s.value)
    }

    /// Write a signal directly with OK status. Unknown ids are ignored.
    ///
    /// The dirty flag this sets lasts until the next step begins.
    pub fn set_signal(&mut self, id: SignalId, value: i32, now: Timestamp) {
        self.table.set(id, value, now);
    }

    /// Return to the post-build state, keeping all configuration.
    ///
    /// Degraded scales are restored, controllers re-primed, deadlines
    /// rescheduled, signals zeroed and counters cleared.
    pub fn reset(&mut self) {
        for monitor in self.monitors.iter_mut() {
            monitor.reset(&mut self.scales);
        }
        for pid in self.pids.iter_mut() {
            pid.reset();
        }
        for output in self.verified.iter_mut() {
            output.reset();
        }
        for output in self.cyclic.iter_mut() {
            output.reset();
        }
        self.table = SignalTable::new();
        apply_signal_configs(&mut self.table, &self.signals);
        self.outputs.clear();
        self.last_report = StepReport::default();
        self.totals = StepReport::default();
    }

    /// Limp-home state of a monitor.
    pub fn limp_state(&self, monitor: usize) -> Option<LimpState> {
        self.monitors.get(monitor).map(FaultMonitor::limp_state)
    }

    /// Configured monitors in index order.
    pub fn monitors(&self) -> &[FaultMonitor] {
        &self.monitors
    }

    /// A scale, including any limp-home overrides in effect.
    pub fn scale(&self, index: usize) -> Option<&ScaleConfig> {
        self.scales.get(index)
    }

    /// Configured PID controllers with their state.
    pub fn pids(&self) -> &[PidController] {
        &self.pids
    }

    /// Configured verified outputs with their state.
    pub fn verified_outputs(&self) -> &[VerifiedOutput] {
        &self.verified
    }

    /// Configured merges.
    pub fn merges(&self) -> &[MergeConfig] {
        &self.merges
    }

    /// Configured cyclic outputs with their next deadlines.
    pub fn cyclic_outputs(&self) -> &[CyclicOutput] {
        &self.cyclic
    }
}
