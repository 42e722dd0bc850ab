//! Engine construction and configuration validation.
//!
//! Everything that can be wrong with a configuration is rejected here, once,
//! so the step itself never has to fail. The builder may allocate; the engine
//! it produces does not.

use heapless::Vec as HVec;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cyclic::{CyclicOutput, CyclicOutputConfig, OutputBuffer};
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::fault::{FaultMonitor, FaultMonitorConfig, FaultWake};
use crate::pid::{PidConfig, PidController};
use crate::signal::{SignalId, SignalTable};
use crate::transform::{RemapConfig, ScaleConfig};
use crate::verified::{VerifiedOutput, VerifiedOutputConfig};
use crate::voter::MergeConfig;
use crate::{
    MAX_CYCLIC_OUTPUTS, MAX_FAULT_MONITORS, MAX_MERGES, MAX_PIDS, MAX_REMAPS, MAX_SCALES,
    MAX_SIGNALS, MAX_VERIFIED_OUTPUTS,
};

/// Per-signal static settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(deny_unknown_fields)
)]
pub struct SignalConfig {
    /// Slot.
    pub id: SignalId,
    /// Staleness threshold in microseconds (0 = disabled).
    #[cfg_attr(feature = "serde", serde(default))]
    pub staleness_threshold_us: u64,
}

impl SignalConfig {
    /// Signal with staleness detection after `threshold_us`.
    pub fn stale_after(id: SignalId, threshold_us: u64) -> Self {
        Self {
            id,
            staleness_threshold_us: threshold_us,
        }
    }
}

/// Collects configuration and builds a validated [`Engine`].
#[derive(Default)]
pub struct EngineBuilder {
    signals: Vec<SignalConfig>,
    merges: Vec<MergeConfig>,
    remaps: Vec<RemapConfig>,
    scales: Vec<ScaleConfig>,
    monitors: Vec<(FaultMonitorConfig, Option<Box<dyn FaultWake>>)>,
    pids: Vec<PidConfig>,
    verified: Vec<VerifiedOutputConfig>,
    cyclic: Vec<CyclicOutputConfig>,
}

impl core::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("signals", &self.signals.len())
            .field("merges", &self.merges.len())
            .field("remaps", &self.remaps.len())
            .field("scales", &self.scales.len())
            .field("monitors", &self.monitors.len())
            .field("pids", &self.pids.len())
            .field("verified", &self.verified.len())
            .field("cyclic", &self.cyclic.len())
            .finish()
    }
}

impl EngineBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure a signal slot.
    pub fn with_signal(mut self, signal: SignalConfig) -> Self {
        self.signals.push(signal);
        self
    }

    /// Add a merge.
    pub fn with_merge(mut self, merge: MergeConfig) -> Self {
        self.merges.push(merge);
        self
    }

    /// Add a remap.
    pub fn with_remap(mut self, remap: RemapConfig) -> Self {
        self.remaps.push(remap);
        self
    }

    /// Add a scale. Scales are addressed by insertion index.
    pub fn with_scale(mut self, scale: ScaleConfig) -> Self {
        self.scales.push(scale);
        self
    }

    /// Add a fault monitor without a wake callback.
    pub fn with_fault_monitor(mut self, monitor: FaultMonitorConfig) -> Self {
        self.monitors.push((monitor, None));
        self
    }

    /// Add a fault monitor with a wake callback.
    pub fn with_fault_monitor_wake(
        self,
        monitor: FaultMonitorConfig,
        wake: impl FaultWake + 'static,
    ) -> Self {
        self.with_fault_monitor_boxed(monitor, Box::new(wake))
    }

    /// Add a fault monitor with an already boxed wake callback.
    pub fn with_fault_monitor_boxed(
        mut self,
        monitor: FaultMonitorConfig,
        wake: Box<dyn FaultWake>,
    ) -> Self {
        self.monitors.push((monitor, Some(wake)));
        self
    }

    /// Add a PID controller.
    pub fn with_pid(mut self, pid: PidConfig) -> Self {
        self.pids.push(pid);
        self
    }

    /// Add a verified output.
    pub fn with_verified_output(mut self, output: VerifiedOutputConfig) -> Self {
        self.verified.push(output);
        self
    }

    /// Add a cyclic output.
    pub fn with_cyclic_output(mut self, output: CyclicOutputConfig) -> Self {
        self.cyclic.push(output);
        self
    }

    /// Validate everything and build the engine.
    ///
    /// # Errors
    ///
    /// Returns the first [`EngineError`] found: a capacity overflow, an
    /// out-of-range signal id, or a broken invariant of one of the entries.
    pub fn build(self) -> EngineResult<Engine> {
        let scale_count = self.scales.len();

        let signals = fill::<_, MAX_SIGNALS>("signal", self.signals, |_, s| {
            check_id("signal", s.id)
        })?;
        let merges = fill::<_, MAX_MERGES>("merge", self.merges, validate_merge)?;
        let remaps = fill::<_, MAX_REMAPS>("remap", self.remaps, |_, r| {
            check_id("remap input", r.input)?;
            check_id("remap output", r.output)
        })?;
        let scales = fill::<_, MAX_SCALES>("scale", self.scales, validate_scale)?;
        let monitors: Vec<FaultMonitor> = self
            .monitors
            .into_iter()
            .map(|(config, wake)| match wake {
                Some(wake) => FaultMonitor::with_wake(config, wake),
                None => FaultMonitor::new(config),
            })
            .collect();
        let monitors = fill::<_, MAX_FAULT_MONITORS>("fault monitor", monitors, |i, m| {
            validate_monitor(i, m.config(), scale_count)
        })?;
        check_limp_targets(&monitors)?;
        let pids: Vec<PidController> = self.pids.into_iter().map(PidController::new).collect();
        let pids = fill::<_, MAX_PIDS>("pid", pids, |i, p| validate_pid(i, p.config()))?;
        let verified: Vec<VerifiedOutput> =
            self.verified.into_iter().map(VerifiedOutput::new).collect();
        let verified = fill::<_, MAX_VERIFIED_OUTPUTS>("verified output", verified, |i, v| {
            validate_verified_output(i, v.config())
        })?;
        let cyclic: Vec<CyclicOutput> = self.cyclic.into_iter().map(CyclicOutput::new).collect();
        let cyclic = fill::<_, MAX_CYCLIC_OUTPUTS>("cyclic output", cyclic, |i, c| {
            validate_cyclic(i, c.config())
        })?;

        debug!(
            signals = signals.len(),
            merges = merges.len(),
            remaps = remaps.len(),
            scales = scales.len(),
            monitors = monitors.len(),
            pids = pids.len(),
            verified = verified.len(),
            cyclic = cyclic.len(),
            "engine configuration validated"
        );

        let mut table = SignalTable::new();
        apply_signal_configs(&mut table, &signals);

        Ok(Engine {
            table,
            signals,
            merges,
            remaps,
            scales,
            monitors,
            pids,
            verified,
            cyclic,
            outputs: OutputBuffer::new(),
            last_report: Default::default(),
            totals: Default::default(),
        })
    }
}

pub(crate) fn apply_signal_configs(table: &mut SignalTable, signals: &[SignalConfig]) {
    for config in signals {
        if let Some(slot) = table.get_mut(config.id) {
            slot.staleness_threshold_us = config.staleness_threshold_us;
        }
    }
}

/// Validate each item and move it into a fixed-capacity table.
fn fill<T, const N: usize>(
    table: &'static str,
    items: Vec<T>,
    mut validate: impl FnMut(usize, &T) -> EngineResult<()>,
) -> EngineResult<HVec<T, N>> {
    let mut out = HVec::new();
    for (index, item) in items.into_iter().enumerate() {
        validate(index, &item)?;
        if out.push(item).is_err() {
            return Err(EngineError::CapacityExceeded {
                table,
                capacity: N,
            });
        }
    }
    Ok(out)
}

fn check_id(context: &'static str, id: SignalId) -> EngineResult<()> {
    if id.is_valid() {
        Ok(())
    } else {
        Err(EngineError::SignalOutOfRange {
            context,
            id: id.raw(),
            capacity: MAX_SIGNALS,
        })
    }
}

/// Check a merge against the table and its own invariants.
///
/// # Errors
///
/// See [`EngineError`] for the individual merge variants.
pub fn validate_merge(index: usize, merge: &MergeConfig) -> EngineResult<()> {
    let count = merge.inputs.len();
    if count == 0 {
        return Err(EngineError::NoMergeInputs { merge: index });
    }
    for &input in &merge.inputs {
        check_id("merge input", input)?;
    }
    check_id("merge output", merge.output)?;
    if merge.inputs.contains(&merge.output) {
        return Err(EngineError::MergeFeedsItself {
            merge: index,
            signal: merge.output.raw(),
        });
    }
    if let Some(quorum) = merge.majority_quorum {
        if quorum == 0 || usize::from(quorum) > count {
            return Err(EngineError::InvalidQuorum {
                merge: index,
                quorum,
                inputs: count,
            });
        }
    }
    Ok(())
}

/// Check a scale's ids and clamps.
///
/// # Errors
///
/// [`EngineError::SignalOutOfRange`] or [`EngineError::InvertedClamp`].
pub fn validate_scale(index: usize, scale: &ScaleConfig) -> EngineResult<()> {
    check_id("scale input", scale.input)?;
    check_id("scale output", scale.output)?;
    check_clamp("scale", index, scale.clamp_min, scale.clamp_max)
}

fn check_clamp(
    context: &'static str,
    index: usize,
    min: Option<i32>,
    max: Option<i32>,
) -> EngineResult<()> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => Err(EngineError::InvertedClamp {
            context,
            index,
            min,
            max,
        }),
        _ => Ok(()),
    }
}

/// Check a monitor against its own invariants and the scale table size.
///
/// # Errors
///
/// See [`EngineError`] for the individual monitor variants.
pub fn validate_monitor(
    index: usize,
    monitor: &FaultMonitorConfig,
    scale_count: usize,
) -> EngineResult<()> {
    check_id("fault monitor input", monitor.watched)?;
    check_id("fault monitor output", monitor.fault_output)?;
    if monitor.watched == monitor.fault_output {
        return Err(EngineError::FaultOutputIsWatched {
            monitor: index,
            signal: monitor.watched.raw(),
        });
    }
    if monitor.check_range && monitor.min_value > monitor.max_value {
        return Err(EngineError::InvalidRange {
            monitor: index,
            min: monitor.min_value,
            max: monitor.max_value,
        });
    }
    if monitor.check_staleness && monitor.stale_timeout_us == 0 {
        return Err(EngineError::ZeroStaleTimeout { monitor: index });
    }
    if let Some(limp) = monitor.limp {
        if usize::from(limp.target_scale) >= scale_count {
            return Err(EngineError::UnknownScale {
                monitor: index,
                scale: limp.target_scale,
            });
        }
        check_clamp("limp action", index, limp.clamp_min, limp.clamp_max)?;
    }
    Ok(())
}

/// Reject two monitors degrading the same scale.
///
/// Each monitor saves the scale's parameters on limp entry and restores them
/// on exit, which only round-trips when it is the sole owner of the scale.
fn check_limp_targets(monitors: &[FaultMonitor]) -> EngineResult<()> {
    let mut owner: [Option<usize>; MAX_SCALES] = [None; MAX_SCALES];
    for (index, monitor) in monitors.iter().enumerate() {
        let Some(limp) = monitor.config().limp else {
            continue;
        };
        let Some(slot) = owner.get_mut(usize::from(limp.target_scale)) else {
            continue;
        };
        if let Some(first) = *slot {
            return Err(EngineError::SharedLimpTarget {
                first,
                second: index,
                scale: limp.target_scale,
            });
        }
        *slot = Some(index);
    }
    Ok(())
}

/// Check a PID controller's ids and limits.
///
/// # Errors
///
/// [`EngineError::SignalOutOfRange`], [`EngineError::OutputIsInput`] or
/// [`EngineError::InvertedClamp`].
pub fn validate_pid(index: usize, pid: &PidConfig) -> EngineResult<()> {
    check_id("pid setpoint", pid.setpoint)?;
    check_id("pid measurement", pid.measurement)?;
    check_id("pid output", pid.output)?;
    if pid.output == pid.setpoint || pid.output == pid.measurement {
        return Err(EngineError::OutputIsInput {
            context: "pid",
            index,
            signal: pid.output.raw(),
        });
    }
    check_clamp("pid output", index, Some(pid.output_min), Some(pid.output_max))?;
    check_clamp(
        "pid integral",
        index,
        Some(pid.integral_min),
        Some(pid.integral_max),
    )
}

/// Check a verified output's ids.
///
/// # Errors
///
/// [`EngineError::SignalOutOfRange`] or [`EngineError::OutputIsInput`].
pub fn validate_verified_output(index: usize, output: &VerifiedOutputConfig) -> EngineResult<()> {
    check_id("verified output command", output.command)?;
    check_id("verified output feedback", output.feedback)?;
    check_id("verified output", output.output)?;
    if output.output == output.command || output.output == output.feedback {
        return Err(EngineError::OutputIsInput {
            context: "verified output",
            index,
            signal: output.output.raw(),
        });
    }
    Ok(())
}

/// Check a cyclic output's source and period.
///
/// # Errors
///
/// [`EngineError::SignalOutOfRange`] or [`EngineError::ZeroPeriod`].
pub fn validate_cyclic(index: usize, output: &CyclicOutputConfig) -> EngineResult<()> {
    check_id("cyclic output source", output.source)?;
    if output.period_us == 0 {
        return Err(EngineError::ZeroPeriod { output: index });
    }
    Ok(())
}
