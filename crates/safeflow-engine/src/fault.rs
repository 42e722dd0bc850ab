//! Fault monitors and the limp-home controller.
//!
//! Detection runs in two places:
//!
//! 1. During ingestion, raw event values are range-checked against every
//!    monitor watching that signal and the monitor's wake callback fires
//!    before the step continues (see [`crate::ingest_events`]).
//! 2. After merging, [`process_fault_monitors`] evaluates staleness, range
//!    and status on the processed signal, writes the fault output signal and
//!    drives the limp-home state machine.
//!
//! # Limp-home
//!
//! While a monitor with a [`LimpAction`] reports a fault, the target scale
//! runs on degraded parameters. The original parameters are restored only
//! after the fault has stayed clear for `restore_delay_ms`.
//!
//! ```text
//!            fault            (snapshot, override)
//!   Normal ─────────────────▶ Limp
//!      ▲                        │ fault: clear_ts = now
//!      └────────────────────────┘
//!        !fault && now - clear_ts >= delay   (restore)
//! ```

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::report::{StepReport, bump};
use crate::signal::{Signal, SignalId, SignalStatus, SignalTable, Timestamp};
use crate::transform::{ScaleConfig, ScaleParams};

/// Severity written to a monitor's fault output signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "snake_case")
)]
#[repr(u8)]
pub enum FaultLevel {
    /// No fault.
    #[default]
    Clear = 0,
    /// Level 1.
    Warning = 1,
    /// Level 2.
    Error = 2,
    /// Level 3.
    Critical = 3,
}

impl FaultLevel {
    /// Value stored in the fault output signal.
    pub fn as_value(self) -> i32 {
        i32::from(self as u8)
    }

    /// Level for a fault signal value, if known.
    pub fn from_value(value: i32) -> Option<Self> {
        match value {
            0 => Some(FaultLevel::Clear),
            1 => Some(FaultLevel::Warning),
            2 => Some(FaultLevel::Error),
            3 => Some(FaultLevel::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for FaultLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultLevel::Clear => write!(f, "clear"),
            FaultLevel::Warning => write!(f, "warning"),
            FaultLevel::Error => write!(f, "error"),
            FaultLevel::Critical => write!(f, "critical"),
        }
    }
}

/// Synchronous fault notification.
///
/// Runs inside [`crate::Engine::step`], so implementations must be short,
/// non-blocking and bounded: set a flag, pull a safety line, nothing more.
pub trait FaultWake: Send {
    /// Called with the monitor index, the triggering value and the level.
    fn wake(&mut self, monitor: u8, value: i32, level: FaultLevel);
}

impl<F> FaultWake for F
where
    F: FnMut(u8, i32, FaultLevel) + Send,
{
    fn wake(&mut self, monitor: u8, value: i32, level: FaultLevel) {
        self(monitor, value, level)
    }
}

/// Parameter overrides applied to a scale while a fault persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(deny_unknown_fields)
)]
pub struct LimpAction {
    /// Index of the scale to degrade.
    pub target_scale: u8,
    /// Replacement multiplier; `None` keeps the current one.
    #[cfg_attr(feature = "serde", serde(default))]
    pub scale_factor: Option<i32>,
    /// Replacement lower clamp; `None` keeps the current one.
    #[cfg_attr(feature = "serde", serde(default))]
    pub clamp_min: Option<i32>,
    /// Replacement upper clamp; `None` keeps the current one.
    #[cfg_attr(feature = "serde", serde(default))]
    pub clamp_max: Option<i32>,
    /// Time the fault must stay clear before parameters are restored.
    #[cfg_attr(feature = "serde", serde(default))]
    pub restore_delay_ms: u32,
}

impl LimpAction {
    /// Action overriding only the scale factor.
    pub fn scale_to(target_scale: u8, scale_factor: i32, restore_delay_ms: u32) -> Self {
        Self {
            target_scale,
            scale_factor: Some(scale_factor),
            clamp_min: None,
            clamp_max: None,
            restore_delay_ms,
        }
    }

    /// Apply the overrides on top of `params`.
    pub fn degrade(&self, params: ScaleParams) -> ScaleParams {
        ScaleParams {
            scale_factor: self.scale_factor.unwrap_or(params.scale_factor),
            clamp_min: self.clamp_min.or(params.clamp_min),
            clamp_max: self.clamp_max.or(params.clamp_max),
        }
    }
}

/// Configuration of one fault monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(deny_unknown_fields)
)]
pub struct FaultMonitorConfig {
    /// Supervised signal.
    pub watched: SignalId,
    /// Signal receiving the fault level.
    pub fault_output: SignalId,
    /// Trip when the watched signal is older than `stale_timeout_us`.
    #[cfg_attr(feature = "serde", serde(default))]
    pub check_staleness: bool,
    /// Staleness timeout.
    #[cfg_attr(feature = "serde", serde(default))]
    pub stale_timeout_us: u64,
    /// Trip when the value leaves `[min_value, max_value]`.
    #[cfg_attr(feature = "serde", serde(default))]
    pub check_range: bool,
    /// Lower bound of the range check.
    #[cfg_attr(feature = "serde", serde(default))]
    pub min_value: i32,
    /// Upper bound of the range check.
    #[cfg_attr(feature = "serde", serde(default))]
    pub max_value: i32,
    /// Trip on error, inconsistent or out-of-range status.
    #[cfg_attr(feature = "serde", serde(default))]
    pub check_status: bool,
    /// Level reported while faulted.
    pub fault_level: FaultLevel,
    /// Optional limp-home response.
    #[cfg_attr(feature = "serde", serde(default))]
    pub limp: Option<LimpAction>,
    /// Disabled monitors are skipped everywhere.
    #[cfg_attr(feature = "serde", serde(default = "crate::enabled_by_default"))]
    pub enabled: bool,
}

impl FaultMonitorConfig {
    /// Enabled monitor with no checks configured.
    pub fn new(watched: SignalId, fault_output: SignalId, fault_level: FaultLevel) -> Self {
        Self {
            watched,
            fault_output,
            check_staleness: false,
            stale_timeout_us: 0,
            check_range: false,
            min_value: 0,
            max_value: 0,
            check_status: false,
            fault_level,
            limp: None,
            enabled: true,
        }
    }

    /// Enable the range check.
    pub fn with_range(mut self, min_value: i32, max_value: i32) -> Self {
        self.check_range = true;
        self.min_value = min_value;
        self.max_value = max_value;
        self
    }

    /// Enable the staleness check.
    pub fn with_staleness(mut self, stale_timeout_us: u64) -> Self {
        self.check_staleness = true;
        self.stale_timeout_us = stale_timeout_us;
        self
    }

    /// Enable the status check.
    pub fn with_status_check(mut self) -> Self {
        self.check_status = true;
        self
    }

    /// Attach a limp-home action.
    pub fn with_limp(mut self, limp: LimpAction) -> Self {
        self.limp = Some(limp);
        self
    }

    /// Whether `value` lies outside the configured range.
    #[inline]
    pub fn out_of_range(&self, value: i32) -> bool {
        self.check_range && (value < self.min_value || value > self.max_value)
    }

    /// Evaluate every enabled check against `signal`.
    pub fn detect(&self, signal: &Signal, now: Timestamp) -> bool {
        let stale = self.check_staleness && signal.age(now) > self.stale_timeout_us;
        let status = self.check_status && signal.status.is_fault();
        stale || self.out_of_range(signal.value) || status
    }
}

/// Limp-home state of a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum LimpState {
    /// Target scale runs on its own parameters.
    #[default]
    Normal,
    /// Target scale runs on degraded parameters.
    Limp,
}

#[derive(Debug, Clone, Copy, Default)]
struct MonitorRuntime {
    faulted: bool,
    limp: LimpState,
    saved: ScaleParams,
    fault_clear_ms: u64,
}

/// A configured monitor plus its runtime state and wake callback.
pub struct FaultMonitor {
    config: FaultMonitorConfig,
    wake: Option<Box<dyn FaultWake>>,
    runtime: MonitorRuntime,
}

impl fmt::Debug for FaultMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultMonitor")
            .field("config", &self.config)
            .field("has_wake", &self.wake.is_some())
            .field("runtime", &self.runtime)
            .finish()
    }
}

impl FaultMonitor {
    /// Monitor without a wake callback.
    pub fn new(config: FaultMonitorConfig) -> Self {
        Self {
            config,
            wake: None,
            runtime: MonitorRuntime::default(),
        }
    }

    /// Monitor notifying `wake` on raw range violations and fault edges.
    pub fn with_wake(config: FaultMonitorConfig, wake: Box<dyn FaultWake>) -> Self {
        Self {
            config,
            wake: Some(wake),
            runtime: MonitorRuntime::default(),
        }
    }

    /// Static configuration.
    pub fn config(&self) -> &FaultMonitorConfig {
        &self.config
    }

    /// Current limp-home state.
    pub fn limp_state(&self) -> LimpState {
        self.runtime.limp
    }

    /// Whether the last monitor pass detected a fault.
    pub fn is_faulted(&self) -> bool {
        self.runtime.faulted
    }

    /// Whether a wake callback is attached.
    pub fn has_wake(&self) -> bool {
        self.wake.is_some()
    }

    /// Fire the wake callback, returning whether one was attached.
    pub(crate) fn notify(&mut self, monitor: u8, value: i32, level: FaultLevel) -> bool {
        match self.wake.as_mut() {
            Some(wake) => {
                wake.wake(monitor, value, level);
                true
            }
            None => false,
        }
    }

    /// Forget detection and limp state, restoring any degraded scale.
    pub(crate) fn reset(&mut self, scales: &mut [ScaleConfig]) {
        if self.runtime.limp == LimpState::Limp {
            if let Some(scale) = self
                .config
                .limp
                .and_then(|l| scales.get_mut(usize::from(l.target_scale)))
            {
                scale.set_params(self.runtime.saved);
            }
        }
        self.runtime = MonitorRuntime::default();
    }
}

/// Run every enabled monitor: detect, publish the fault level, fire edge
/// wakes and step the limp-home state machine.
pub fn process_fault_monitors(
    table: &mut SignalTable,
    monitors: &mut [FaultMonitor],
    scales: &mut [ScaleConfig],
    now: Timestamp,
    report: &mut StepReport,
) {
    let now_ms = now / 1000;
    for (index, monitor) in monitors.iter_mut().enumerate() {
        if !monitor.config.enabled {
            continue;
        }
        let Some(watched) = table.get(monitor.config.watched).copied() else {
            continue;
        };

        let faulted = monitor.config.detect(&watched, now);
        if faulted {
            bump(&mut report.monitors_faulted);
        }

        let level = if faulted {
            monitor.config.fault_level
        } else {
            FaultLevel::Clear
        };
        if let Some(out) = table.get_mut(monitor.config.fault_output) {
            let value = level.as_value();
            if out.value != value {
                out.updated = true;
            }
            out.value = value;
            out.status = SignalStatus::Ok;
            out.timestamp = now;
        }

        if faulted != monitor.runtime.faulted {
            let id = u8::try_from(index).unwrap_or(u8::MAX);
            if monitor.notify(id, watched.value, level) {
                bump(&mut report.monitor_wakes);
            }
        }
        monitor.runtime.faulted = faulted;

        if let Some(action) = monitor.config.limp {
            step_limp(monitor, &action, scales, faulted, now_ms, report);
        }
    }
}

fn step_limp(
    monitor: &mut FaultMonitor,
    action: &LimpAction,
    scales: &mut [ScaleConfig],
    faulted: bool,
    now_ms: u64,
    report: &mut StepReport,
) {
    let Some(scale) = scales.get_mut(usize::from(action.target_scale)) else {
        return;
    };
    let rt = &mut monitor.runtime;
    match (rt.limp, faulted) {
        (LimpState::Normal, true) => {
            rt.saved = scale.params();
            scale.set_params(action.degrade(rt.saved));
            rt.limp = LimpState::Limp;
            rt.fault_clear_ms = now_ms;
            bump(&mut report.limp_entries);
        }
        (LimpState::Limp, true) | (LimpState::Normal, false) => {
            rt.fault_clear_ms = now_ms;
        }
        (LimpState::Limp, false) => {
            if now_ms.saturating_sub(rt.fault_clear_ms) >= u64::from(action.restore_delay_ms) {
                scale.set_params(rt.saved);
                rt.limp = LimpState::Normal;
                bump(&mut report.limp_exits);
            }
        }
    }
}
