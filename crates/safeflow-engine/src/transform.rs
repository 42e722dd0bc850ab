//! Linear signal transforms: remap (deadzone, invert) and scale.
//!
//! Scales are the parameter sets that a [`crate::LimpAction`] overrides.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::signal::{Signal, SignalId, SignalStatus, SignalTable, Timestamp};

/// Fixed-point unit of [`ScaleConfig::scale_factor`] (1000 = 1.0x).
pub const SCALE_UNIT: i64 = 1000;

/// Deadzone and inversion of one signal into another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(deny_unknown_fields)
)]
pub struct RemapConfig {
    /// Source signal.
    pub input: SignalId,
    /// Destination signal.
    pub output: SignalId,
    /// Negate the value.
    #[cfg_attr(feature = "serde", serde(default))]
    pub invert: bool,
    /// Values with magnitude up to this are forced to zero (0 = off).
    #[cfg_attr(feature = "serde", serde(default))]
    pub deadzone: u32,
    /// Disabled remaps are skipped.
    #[cfg_attr(feature = "serde", serde(default = "crate::enabled_by_default"))]
    pub enabled: bool,
}

impl RemapConfig {
    /// Pass-through remap.
    pub fn new(input: SignalId, output: SignalId) -> Self {
        Self {
            input,
            output,
            invert: false,
            deadzone: 0,
            enabled: true,
        }
    }

    /// Apply the remap to a raw value.
    pub fn apply(&self, value: i32) -> i32 {
        if self.deadzone > 0 && value.unsigned_abs() <= self.deadzone {
            return 0;
        }
        if self.invert {
            value.saturating_neg()
        } else {
            value
        }
    }
}

/// Parameters of a scale that limp-home may override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScaleParams {
    /// Multiplier in [`SCALE_UNIT`] fixed point.
    pub scale_factor: i32,
    /// Lower clamp, if any.
    pub clamp_min: Option<i32>,
    /// Upper clamp, if any.
    pub clamp_max: Option<i32>,
}

/// `output = clamp(input * scale_factor / 1000 + offset)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(deny_unknown_fields)
)]
pub struct ScaleConfig {
    /// Source signal.
    pub input: SignalId,
    /// Destination signal.
    pub output: SignalId,
    /// Multiplier in [`SCALE_UNIT`] fixed point.
    #[cfg_attr(feature = "serde", serde(default = "unit_factor"))]
    pub scale_factor: i32,
    /// Added after scaling.
    #[cfg_attr(feature = "serde", serde(default))]
    pub offset: i32,
    /// Lower clamp.
    #[cfg_attr(feature = "serde", serde(default))]
    pub clamp_min: Option<i32>,
    /// Upper clamp.
    #[cfg_attr(feature = "serde", serde(default))]
    pub clamp_max: Option<i32>,
    /// Disabled scales are skipped.
    #[cfg_attr(feature = "serde", serde(default = "crate::enabled_by_default"))]
    pub enabled: bool,
}

#[cfg(feature = "serde")]
fn unit_factor() -> i32 {
    1000
}

impl ScaleConfig {
    /// Unity scale with no offset or clamps.
    pub fn new(input: SignalId, output: SignalId) -> Self {
        Self {
            input,
            output,
            scale_factor: 1000,
            offset: 0,
            clamp_min: None,
            clamp_max: None,
            enabled: true,
        }
    }

    /// Set the multiplier.
    pub fn with_factor(mut self, scale_factor: i32) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    /// Set the offset.
    pub fn with_offset(mut self, offset: i32) -> Self {
        self.offset = offset;
        self
    }

    /// Set both clamps.
    pub fn with_clamp(mut self, min: Option<i32>, max: Option<i32>) -> Self {
        self.clamp_min = min;
        self.clamp_max = max;
        self
    }

    /// Current overridable parameters.
    pub fn params(&self) -> ScaleParams {
        ScaleParams {
            scale_factor: self.scale_factor,
            clamp_min: self.clamp_min,
            clamp_max: self.clamp_max,
        }
    }

    /// Replace the overridable parameters.
    pub fn set_params(&mut self, params: ScaleParams) {
        self.scale_factor = params.scale_factor;
        self.clamp_min = params.clamp_min;
        self.clamp_max = params.clamp_max;
    }

    /// Apply the scale to a raw value.
    pub fn apply(&self, value: i32) -> i32 {
        let wide = i64::from(value) * i64::from(self.scale_factor) / SCALE_UNIT
            + i64::from(self.offset);
        let mut out = saturate_i32(wide);
        if let Some(lo) = self.clamp_min {
            out = out.max(lo);
        }
        if let Some(hi) = self.clamp_max {
            out = out.min(hi);
        }
        out
    }
}

pub(crate) fn saturate_i32(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}

/// Write `value` (or the source's fault status) into the output slot.
fn write_transformed(
    table: &mut SignalTable,
    source: Signal,
    output: SignalId,
    now: Timestamp,
    map: impl FnOnce(i32) -> i32,
) {
    let Some(out) = table.get_mut(output) else {
        return;
    };
    if source.status.is_ok() {
        out.value = map(source.value);
        out.status = SignalStatus::Ok;
    } else {
        out.status = source.status;
    }
    out.timestamp = now;
    out.updated = true;
}

/// Run every enabled remap in configuration order.
pub fn process_remaps(table: &mut SignalTable, remaps: &[RemapConfig], now: Timestamp) {
    for remap in remaps.iter().filter(|r| r.enabled) {
        let Some(source) = table.get(remap.input).copied() else {
            continue;
        };
        write_transformed(table, source, remap.output, now, |v| remap.apply(v));
    }
}

/// Run every enabled scale in configuration order.
pub fn process_scales(table: &mut SignalTable, scales: &[ScaleConfig], now: Timestamp) {
    for scale in scales.iter().filter(|s| s.enabled) {
        let Some(source) = table.get(scale.input).copied() else {
            continue;
        };
        write_transformed(table, source, scale.output, now, |v| scale.apply(v));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Event;

    #[test]
    fn test_remap_deadzone_and_invert() {
        let remap = RemapConfig {
            invert: true,
            deadzone: 10,
            ..RemapConfig::new(SignalId::new(0), SignalId::new(1))
        };
        assert_eq!(remap.apply(5), 0);
        assert_eq!(remap.apply(-10), 0);
        assert_eq!(remap.apply(11), -11);
        assert_eq!(remap.apply(i32::MIN), i32::MAX);
    }

    #[test]
    fn test_scale_fixed_point() {
        let scale = ScaleConfig::new(SignalId::new(0), SignalId::new(1))
            .with_factor(500)
            .with_offset(7);
        assert_eq!(scale.apply(100), 57);
        assert_eq!(scale.apply(-3), 6);
    }

    #[test]
    fn test_scale_saturates_and_clamps() {
        let scale = ScaleConfig::new(SignalId::new(0), SignalId::new(1)).with_factor(4000);
        assert_eq!(scale.apply(i32::MAX), i32::MAX);
        assert_eq!(scale.apply(i32::MIN), i32::MIN);

        let clamped = scale.with_clamp(Some(-100), Some(100));
        assert_eq!(clamped.apply(1000), 100);
        assert_eq!(clamped.apply(-1000), -100);
        assert_eq!(clamped.apply(10), 40);
    }

    #[test]
    fn test_params_roundtrip() {
        let mut scale = ScaleConfig::new(SignalId::new(0), SignalId::new(1))
            .with_clamp(None, Some(9));
        let saved = scale.params();
        scale.set_params(ScaleParams {
            scale_factor: 1,
            clamp_min: Some(0),
            clamp_max: None,
        });
        assert_ne!(scale.params(), saved);
        scale.set_params(saved);
        assert_eq!(scale.params(), saved);
    }

    #[test]
    fn test_process_propagates_bad_status() {
        let mut table = SignalTable::new();
        table.apply(&Event::ok(SignalId::new(1), 55, 0));
        table.apply(&Event::new(SignalId::new(0), 3, SignalStatus::Timeout, 0));
        let scales = [ScaleConfig::new(SignalId::new(0), SignalId::new(1)).with_factor(2000)];
        process_scales(&mut table, &scales, 9);

        let out = table.get(SignalId::new(1)).copied().unwrap_or_default();
        assert_eq!(out.status, SignalStatus::Timeout);
        assert_eq!(out.value, 55);
        assert_eq!(out.timestamp, 9);
    }

    #[test]
    fn test_remap_then_scale_chain() {
        let mut table = SignalTable::new();
        table.apply(&Event::ok(SignalId::new(0), 40, 0));
        let remaps = [RemapConfig {
            invert: true,
            ..RemapConfig::new(SignalId::new(0), SignalId::new(1))
        }];
        let scales = [ScaleConfig::new(SignalId::new(1), SignalId::new(2)).with_factor(1500)];
        process_remaps(&mut table, &remaps, 1);
        process_scales(&mut table, &scales, 1);
        assert_eq!(table.get(SignalId::new(2)).map(|s| s.value), Some(-60));
    }
}
