//! Command/feedback verification for actuator outputs.
//!
//! Each verified output watches a command signal and the feedback signal
//! that should follow it. After the command changes, the output shows the
//! commanded value (status OK, not yet verified) until `verify_timeout_us`
//! has elapsed; then it carries the measured feedback with status OK when
//! `|command - feedback| <= tolerance`, or [`SignalStatus::Error`] when it
//! does not. One-shot outputs hold that verdict until the next command
//! change; continuous outputs re-check on every step.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::report::{StepReport, bump};
use crate::signal::{SignalId, SignalStatus, SignalTable, Timestamp};

/// What kind of actuator is being verified. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum VerifiedKind {
    /// Digital output read back through an input pin.
    #[default]
    Gpio,
    /// PWM duty cycle.
    Pwm,
    /// Analog output level.
    Analog,
    /// Servo or stepper position.
    Position,
    /// Motor speed.
    Speed,
}

/// Configuration of one verified output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(deny_unknown_fields)
)]
pub struct VerifiedOutputConfig {
    /// Commanded value.
    pub command: SignalId,
    /// Measured value that should follow the command.
    pub feedback: SignalId,
    /// Verified result.
    pub output: SignalId,
    /// Actuator kind.
    #[cfg_attr(feature = "serde", serde(default))]
    pub kind: VerifiedKind,
    /// Allowed command/feedback difference.
    #[cfg_attr(feature = "serde", serde(default))]
    pub tolerance: u32,
    /// Settling time after a command change before checking.
    #[cfg_attr(feature = "serde", serde(default))]
    pub verify_timeout_us: u64,
    /// Keep checking after the first verdict.
    #[cfg_attr(feature = "serde", serde(default))]
    pub continuous: bool,
    /// Disabled outputs are skipped.
    #[cfg_attr(feature = "serde", serde(default = "crate::enabled_by_default"))]
    pub enabled: bool,
}

impl VerifiedOutputConfig {
    /// Enabled one-shot check with zero tolerance and no settling time.
    pub fn new(command: SignalId, feedback: SignalId, output: SignalId) -> Self {
        Self {
            command,
            feedback,
            output,
            kind: VerifiedKind::Gpio,
            tolerance: 0,
            verify_timeout_us: 0,
            continuous: false,
            enabled: true,
        }
    }

    /// Set the allowed difference.
    pub fn with_tolerance(mut self, tolerance: u32) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the settling time.
    pub fn with_timeout(mut self, verify_timeout_us: u64) -> Self {
        self.verify_timeout_us = verify_timeout_us;
        self
    }

    /// Re-check on every step once settled.
    pub fn continuous(mut self) -> Self {
        self.continuous = true;
        self
    }

    /// Whether `feedback` is within tolerance of `command`.
    pub fn matches(&self, command: i32, feedback: i32) -> bool {
        let diff = (i64::from(command) - i64::from(feedback)).unsigned_abs();
        diff <= u64::from(self.tolerance)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct VerifyRuntime {
    last_command: Option<i32>,
    command_time: Timestamp,
    waiting: bool,
}

/// A configured verified output plus its state.
#[derive(Debug, Clone, Copy)]
pub struct VerifiedOutput {
    config: VerifiedOutputConfig,
    runtime: VerifyRuntime,
}

impl VerifiedOutput {
    /// Output that treats the first command it sees as a change.
    pub fn new(config: VerifiedOutputConfig) -> Self {
        Self {
            config,
            runtime: VerifyRuntime::default(),
        }
    }

    /// Static configuration.
    pub fn config(&self) -> &VerifiedOutputConfig {
        &self.config
    }

    /// Whether a command is still settling.
    pub fn is_pending(&self) -> bool {
        self.runtime.waiting
    }

    /// Forget the last command.
    pub fn reset(&mut self) {
        self.runtime = VerifyRuntime::default();
    }
}

/// Run every enabled verified output in configuration order.
pub fn process_verified_outputs(
    table: &mut SignalTable,
    outputs: &mut [VerifiedOutput],
    now: Timestamp,
    report: &mut StepReport,
) {
    for vo in outputs.iter_mut().filter(|v| v.config.enabled) {
        let cfg = vo.config;
        let (Some(command), Some(feedback)) =
            (table.get(cfg.command).copied(), table.get(cfg.feedback).copied())
        else {
            continue;
        };
        let rt = &mut vo.runtime;

        if rt.last_command != Some(command.value) {
            rt.last_command = Some(command.value);
            rt.command_time = now;
            rt.waiting = true;
        }

        let settled = rt.waiting && now.saturating_sub(rt.command_time) >= cfg.verify_timeout_us;
        let check = settled || (cfg.continuous && !rt.waiting);
        if settled {
            rt.waiting = false;
        }

        let Some(out) = table.get_mut(cfg.output) else {
            continue;
        };
        if check {
            let verified = feedback.status.is_ok() && cfg.matches(command.value, feedback.value);
            out.value = feedback.value;
            out.status = if verified {
                SignalStatus::Ok
            } else {
                bump(&mut report.verifications_failed);
                SignalStatus::Error
            };
            out.timestamp = now;
            out.updated = true;
        } else if rt.waiting {
            out.updated = out.value != command.value || !out.status.is_ok();
            out.value = command.value;
            out.status = SignalStatus::Ok;
            out.timestamp = now;
        }
    }
}
