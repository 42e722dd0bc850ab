//! Fixed-point PID controllers over the signal table.
//!
//! Gains are scaled by 1000 (`kp = 1500` is 1.5). The integral accumulates
//! `error × seconds`, truncated per step, and is clamped to
//! `[integral_min, integral_max]` for anti-windup. The derivative uses the
//! change in error over `dt`, where `dt` is the fixed `sample_time_us` or,
//! when that is 0, the time since the previous evaluation.
//!
//! A controller needs one pass to learn its starting point, so the first
//! evaluation after build, reset or an invalid input writes nothing.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::signal::{SignalId, SignalStatus, SignalTable, Timestamp};
use crate::transform::saturate_i32;

/// Fixed-point unit of the PID gains.
pub const GAIN_UNIT: i128 = 1000;

const MICROS_PER_SECOND: i128 = 1_000_000;

#[cfg(feature = "serde")]
fn min_i32() -> i32 {
    i32::MIN
}

#[cfg(feature = "serde")]
fn max_i32() -> i32 {
    i32::MAX
}

/// Configuration of one PID controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(deny_unknown_fields)
)]
pub struct PidConfig {
    /// Target value.
    pub setpoint: SignalId,
    /// Measured value.
    pub measurement: SignalId,
    /// Control output.
    pub output: SignalId,
    /// Proportional gain × 1000.
    #[cfg_attr(feature = "serde", serde(default))]
    pub kp: i32,
    /// Integral gain × 1000.
    #[cfg_attr(feature = "serde", serde(default))]
    pub ki: i32,
    /// Derivative gain × 1000.
    #[cfg_attr(feature = "serde", serde(default))]
    pub kd: i32,
    /// Lower output limit.
    #[cfg_attr(feature = "serde", serde(default = "min_i32"))]
    pub output_min: i32,
    /// Upper output limit.
    #[cfg_attr(feature = "serde", serde(default = "max_i32"))]
    pub output_max: i32,
    /// Lower integral limit.
    #[cfg_attr(feature = "serde", serde(default = "min_i32"))]
    pub integral_min: i32,
    /// Upper integral limit.
    #[cfg_attr(feature = "serde", serde(default = "max_i32"))]
    pub integral_max: i32,
    /// Errors with magnitude up to this do not integrate.
    #[cfg_attr(feature = "serde", serde(default))]
    pub deadband: u32,
    /// Fixed `dt` in microseconds; 0 measures it.
    #[cfg_attr(feature = "serde", serde(default))]
    pub sample_time_us: u64,
    /// Zero the integral whenever the setpoint changes.
    #[cfg_attr(feature = "serde", serde(default))]
    pub reset_on_setpoint_change: bool,
    /// Disabled controllers are skipped.
    #[cfg_attr(feature = "serde", serde(default = "crate::enabled_by_default"))]
    pub enabled: bool,
}

impl PidConfig {
    /// Enabled controller with zero gains and no limits.
    pub fn new(setpoint: SignalId, measurement: SignalId, output: SignalId) -> Self {
        Self {
            setpoint,
            measurement,
            output,
            kp: 0,
            ki: 0,
            kd: 0,
            output_min: i32::MIN,
            output_max: i32::MAX,
            integral_min: i32::MIN,
            integral_max: i32::MAX,
            deadband: 0,
            sample_time_us: 0,
            reset_on_setpoint_change: false,
            enabled: true,
        }
    }

    /// Set the three gains (each × 1000).
    pub fn with_gains(mut self, kp: i32, ki: i32, kd: i32) -> Self {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
        self
    }

    /// Limit the output.
    pub fn with_output_limits(mut self, min: i32, max: i32) -> Self {
        self.output_min = min;
        self.output_max = max;
        self
    }

    /// Limit the integral accumulator.
    pub fn with_integral_limits(mut self, min: i32, max: i32) -> Self {
        self.integral_min = min;
        self.integral_max = max;
        self
    }

    /// Use a fixed sample time.
    pub fn with_sample_time(mut self, sample_time_us: u64) -> Self {
        self.sample_time_us = sample_time_us;
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct PidRuntime {
    primed: bool,
    integral: i64,
    last_error: i64,
    last_setpoint: i32,
    last_time: Timestamp,
}

/// A configured controller plus its state.
#[derive(Debug, Clone, Copy)]
pub struct PidController {
    config: PidConfig,
    runtime: PidRuntime,
}

impl PidController {
    /// Controller that primes on its first evaluation.
    pub fn new(config: PidConfig) -> Self {
        Self {
            config,
            runtime: PidRuntime::default(),
        }
    }

    /// Static configuration.
    pub fn config(&self) -> &PidConfig {
        &self.config
    }

    /// Current integral accumulator.
    pub fn integral(&self) -> i64 {
        self.runtime.integral
    }

    /// Forget all state; the next evaluation primes again.
    pub fn reset(&mut self) {
        self.runtime = PidRuntime::default();
    }

    /// One evaluation. Returns the output, or `None` while priming or when
    /// no time has passed.
    pub fn update(&mut self, setpoint: i32, measurement: i32, now: Timestamp) -> Option<i32> {
        let cfg = self.config;
        let rt = &mut self.runtime;

        if !rt.primed {
            *rt = PidRuntime {
                primed: true,
                integral: 0,
                last_error: 0,
                last_setpoint: setpoint,
                last_time: now,
            };
            return None;
        }

        if cfg.reset_on_setpoint_change && setpoint != rt.last_setpoint {
            rt.integral = 0;
            rt.last_setpoint = setpoint;
        }

        let error = i64::from(setpoint) - i64::from(measurement);
        let dt = if cfg.sample_time_us > 0 {
            cfg.sample_time_us
        } else {
            now.saturating_sub(rt.last_time)
        };
        if dt == 0 {
            return None;
        }
        let dt = i128::from(dt);

        let p = i128::from(cfg.kp) * i128::from(error) / GAIN_UNIT;

        let mut i = 0;
        if cfg.ki != 0 {
            if error.unsigned_abs() > u64::from(cfg.deadband) {
                let step = i128::from(error) * dt / MICROS_PER_SECOND;
                let integral = (i128::from(rt.integral) + step)
                    .clamp(i128::from(cfg.integral_min), i128::from(cfg.integral_max));
                rt.integral = i64::try_from(integral).unwrap_or(0);
            }
            i = i128::from(cfg.ki) * i128::from(rt.integral) / GAIN_UNIT;
        }

        let mut d = 0;
        if cfg.kd != 0 {
            let delta = i128::from(error) - i128::from(rt.last_error);
            d = i128::from(cfg.kd) * delta * MICROS_PER_SECOND / (dt * GAIN_UNIT);
        }

        rt.last_error = error;
        rt.last_time = now;

        let total = (p + i + d).clamp(i128::from(cfg.output_min), i128::from(cfg.output_max));
        Some(saturate_i32(i64::try_from(total).unwrap_or(0)))
    }
}

/// Run every enabled controller in configuration order.
///
/// A non-OK setpoint or measurement is copied to the output status (value
/// held) and the controller re-primes once both inputs recover.
pub fn process_pids(table: &mut SignalTable, pids: &mut [PidController], now: Timestamp) {
    for pid in pids.iter_mut().filter(|p| p.config.enabled) {
        let (Some(setpoint), Some(measurement)) = (
            table.get(pid.config.setpoint).copied(),
            table.get(pid.config.measurement).copied(),
        ) else {
            continue;
        };

        let bad = [measurement.status, setpoint.status]
            .into_iter()
            .find(|s| !s.is_ok());
        let result = match bad {
            Some(status) => {
                pid.reset();
                Err(status)
            }
            None => Ok(pid.update(setpoint.value, measurement.value, now)),
        };

        let Some(out) = table.get_mut(pid.config.output) else {
            continue;
        };
        match result {
            Ok(Some(value)) => {
                out.value = value;
                out.status = SignalStatus::Ok;
                out.timestamp = now;
                out.updated = true;
            }
            Ok(None) => {}
            Err(status) => {
                if out.status != status {
                    out.status = status;
                    out.updated = true;
                }
                out.timestamp = now;
            }
        }
    }
}
