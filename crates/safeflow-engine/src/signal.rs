//! Signal table, signal status taxonomy and input events.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::MAX_SIGNALS;

/// Monotonic time in microseconds.
pub type Timestamp = u64;

/// Index of a signal slot in the [`SignalTable`].
///
/// Any `u8` can be wrapped; ids at or above [`MAX_SIGNALS`] simply never
/// resolve to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct SignalId(u8);

impl SignalId {
    /// Wrap a raw signal index.
    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    /// Raw index value.
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Slot index into the signal table.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Whether this id addresses a slot of the table.
    pub const fn is_valid(self) -> bool {
        self.index() < MAX_SIGNALS
    }
}

impl From<u8> for SignalId {
    fn from(raw: u8) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-signal status carried alongside every value.
///
/// Statuses are data, never errors: anything other than [`SignalStatus::Ok`]
/// excludes the signal from voting and may trip a fault monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "snake_case")
)]
#[repr(u8)]
pub enum SignalStatus {
    /// Value is valid.
    #[default]
    Ok = 0,
    /// Value is usable with reduced confidence.
    Degraded = 1,
    /// Value lies outside its plausible range.
    OutOfRange = 2,
    /// Producer reported an error, or no valid source was available.
    Error = 3,
    /// Value has not been refreshed within its staleness threshold.
    Timeout = 4,
    /// Redundant sources disagree beyond tolerance.
    Inconsistent = 5,
}

impl SignalStatus {
    /// Numeric status code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Status for a numeric code, if known.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(SignalStatus::Ok),
            1 => Some(SignalStatus::Degraded),
            2 => Some(SignalStatus::OutOfRange),
            3 => Some(SignalStatus::Error),
            4 => Some(SignalStatus::Timeout),
            5 => Some(SignalStatus::Inconsistent),
            _ => None,
        }
    }

    /// `true` only for [`SignalStatus::Ok`].
    pub fn is_ok(self) -> bool {
        self == SignalStatus::Ok
    }

    /// Statuses that trip a fault monitor's status check.
    pub fn is_fault(self) -> bool {
        matches!(
            self,
            SignalStatus::Error | SignalStatus::Inconsistent | SignalStatus::OutOfRange
        )
    }
}

impl fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalStatus::Ok => write!(f, "ok"),
            SignalStatus::Degraded => write!(f, "degraded"),
            SignalStatus::OutOfRange => write!(f, "out of range"),
            SignalStatus::Error => write!(f, "error"),
            SignalStatus::Timeout => write!(f, "timeout"),
            SignalStatus::Inconsistent => write!(f, "inconsistent"),
        }
    }
}

/// Current state of one signal slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Signal {
    /// Engineering value.
    pub value: i32,
    /// Status of `value`.
    pub status: SignalStatus,
    /// Time of the last write.
    pub timestamp: Timestamp,
    /// Staleness threshold in microseconds (0 = disabled).
    pub staleness_threshold_us: u64,
    /// Set when the slot changed during the current step.
    pub updated: bool,
}

impl Signal {
    /// Age relative to `now`; zero for timestamps in the future.
    #[inline]
    pub fn age(&self, now: Timestamp) -> u64 {
        now.saturating_sub(self.timestamp)
    }
}

/// Externally produced update for one signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Event {
    /// Target slot.
    pub signal: SignalId,
    /// Raw value.
    pub value: i32,
    /// Status reported by the producer.
    pub status: SignalStatus,
    /// Sample time.
    pub timestamp: Timestamp,
}

impl Event {
    /// Build an event.
    pub fn new(signal: SignalId, value: i32, status: SignalStatus, timestamp: Timestamp) -> Self {
        Self {
            signal,
            value,
            status,
            timestamp,
        }
    }

    /// Build an event carrying [`SignalStatus::Ok`].
    pub fn ok(signal: SignalId, value: i32, timestamp: Timestamp) -> Self {
        Self::new(signal, value, SignalStatus::Ok, timestamp)
    }
}

/// Fixed-capacity table of every signal in the system.
#[derive(Debug, Clone)]
pub struct SignalTable {
    slots: [Signal; MAX_SIGNALS],
}

impl Default for SignalTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalTable {
    /// Table with every slot zeroed.
    pub fn new() -> Self {
        Self {
            slots: [Signal::default(); MAX_SIGNALS],
        }
    }

    /// Slot for `id`.
    #[inline]
    pub fn get(&self, id: SignalId) -> Option<&Signal> {
        self.slots.get(id.index())
    }

    /// Mutable slot for `id`.
    #[inline]
    pub fn get_mut(&mut self, id: SignalId) -> Option<&mut Signal> {
        self.slots.get_mut(id.index())
    }

    /// Overwrite a slot from an event. Returns `false` for unknown ids.
    pub fn apply(&mut self, event: &Event) -> bool {
        let Some(slot) = self.get_mut(event.signal) else {
            return false;
        };
        slot.updated = slot.value != event.value;
        slot.value = event.value;
        slot.status = event.status;
        slot.timestamp = event.timestamp;
        true
    }

    /// Write `value` with OK status, as a direct host update.
    pub fn set(&mut self, id: SignalId, value: i32, now: Timestamp) -> bool {
        let Some(slot) = self.get_mut(id) else {
            return false;
        };
        slot.value = value;
        slot.status = SignalStatus::Ok;
        slot.timestamp = now;
        slot.updated = true;
        true
    }

    /// Clear every dirty flag.
    pub fn clear_updated(&mut self) {
        for slot in &mut self.slots {
            slot.updated = false;
        }
    }

    /// Slots in id order.
    pub fn iter(&self) -> impl Iterator<Item = (SignalId, &Signal)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, s)| (SignalId::new(i as u8), s))
    }

    /// Mutable slots in id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Signal> + '_ {
        self.slots.iter_mut()
    }

    /// Ids whose dirty flag is set.
    pub fn updated_ids(&self) -> impl Iterator<Item = SignalId> + '_ {
        self.iter().filter(|(_, s)| s.updated).map(|(id, _)| id)
    }

    /// Number of slots.
    pub const fn capacity(&self) -> usize {
        MAX_SIGNALS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_id_bounds() {
        assert!(SignalId::new(0).is_valid());
        assert!(SignalId::new((MAX_SIGNALS - 1) as u8).is_valid());
        assert!(!SignalId::new(MAX_SIGNALS as u8).is_valid());
        assert!(!SignalId::new(u8::MAX).is_valid());
    }

    #[test]
    fn test_status_codes_roundtrip() {
        for code in 0..=5u8 {
            let status = SignalStatus::from_code(code);
            assert_eq!(status.map(SignalStatus::code), Some(code));
        }
        assert_eq!(SignalStatus::from_code(6), None);
    }

    #[test]
    fn test_fault_statuses() {
        assert!(SignalStatus::Error.is_fault());
        assert!(SignalStatus::Inconsistent.is_fault());
        assert!(SignalStatus::OutOfRange.is_fault());
        assert!(!SignalStatus::Timeout.is_fault());
        assert!(!SignalStatus::Degraded.is_fault());
        assert!(!SignalStatus::Ok.is_fault());
    }

    #[test]
    fn test_apply_marks_updated_only_on_change() {
        let mut table = SignalTable::new();
        assert!(table.apply(&Event::ok(SignalId::new(3), 42, 10)));
        assert_eq!(table.get(SignalId::new(3)).map(|s| s.updated), Some(true));

        assert!(table.apply(&Event::ok(SignalId::new(3), 42, 20)));
        let slot = table.get(SignalId::new(3)).copied().unwrap_or_default();
        assert!(!slot.updated);
        assert_eq!(slot.timestamp, 20);
    }

    #[test]
    fn test_apply_rejects_unknown_id() {
        let mut table = SignalTable::new();
        assert!(!table.apply(&Event::ok(SignalId::new(MAX_SIGNALS as u8), 1, 0)));
        assert!(table.updated_ids().next().is_none());
    }

    #[test]
    fn test_age_saturates() {
        let signal = Signal {
            timestamp: 500,
            ..Signal::default()
        };
        assert_eq!(signal.age(400), 0);
        assert_eq!(signal.age(900), 400);
    }
}
