//! Redundancy voting and the merge phase.
//!
//! A merge fuses up to [`MAX_MERGE_INPUTS`] source signals into one output.
//! Only sources with [`SignalStatus::Ok`] take part in the vote; the voting
//! functions here are pure and allocation-free so they can be tested and
//! benchmarked on their own.
//!
//! # Tie-breaks
//!
//! - Even-count medians are the floor average (toward negative infinity) of
//!   the two central values.
//! - `Majority` publishes the median and requires a quorum of values within
//!   `tolerance` of it. The quorum defaults to `ceil(n / 2)`.
//! - For every method, when more than one value voted and `tolerance > 0`, a
//!   spread (`max - min`) above `tolerance` forces
//!   [`SignalStatus::Inconsistent`].

use core::fmt;

use heapless::Vec as HVec;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::MAX_MERGE_INPUTS;
use crate::report::{StepReport, bump};
use crate::signal::{SignalId, SignalStatus, SignalTable, Timestamp};

/// Voting algorithm of a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum VotingMethod {
    /// Middle value.
    #[default]
    Median,
    /// Integer mean, truncated toward zero.
    Average,
    /// Smallest value.
    Min,
    /// Largest value.
    Max,
    /// Median backed by a quorum within tolerance.
    Majority,
}

impl fmt::Display for VotingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VotingMethod::Median => "median",
            VotingMethod::Average => "average",
            VotingMethod::Min => "min",
            VotingMethod::Max => "max",
            VotingMethod::Majority => "majority",
        };
        f.write_str(name)
    }
}

/// Result of a vote: the value to publish and its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteOutcome {
    /// Fused value.
    pub value: i32,
    /// [`SignalStatus::Ok`] or [`SignalStatus::Inconsistent`].
    pub status: SignalStatus,
}

/// Smallest value, `None` when empty.
pub fn min(values: &[i32]) -> Option<i32> {
    values.iter().copied().min()
}

/// Largest value, `None` when empty.
pub fn max(values: &[i32]) -> Option<i32> {
    values.iter().copied().max()
}

/// Integer mean truncated toward zero, `None` when empty.
pub fn average(values: &[i32]) -> Option<i32> {
    if values.is_empty() {
        return None;
    }
    let sum: i64 = values.iter().map(|&v| i64::from(v)).sum();
    let count = i64::try_from(values.len()).ok()?;
    i32::try_from(sum / count).ok()
}

/// Median of at most [`MAX_MERGE_INPUTS`] values, `None` when empty or
/// oversized.
pub fn median(values: &[i32]) -> Option<i32> {
    let mut buf = [0i32; MAX_MERGE_INPUTS];
    let sorted = sort_into(values, &mut buf)?;
    let n = sorted.len();
    let upper = *sorted.get(n / 2)?;
    if n % 2 == 1 {
        return Some(upper);
    }
    let lower = *sorted.get(n / 2 - 1)?;
    let mid = (i64::from(lower) + i64::from(upper)).div_euclid(2);
    i32::try_from(mid).ok()
}

/// `max - min` widened to i64, zero when empty.
pub fn spread(values: &[i32]) -> i64 {
    match (min(values), max(values)) {
        (Some(lo), Some(hi)) => i64::from(hi) - i64::from(lo),
        _ => 0,
    }
}

/// Default majority quorum for `n` voters: `ceil(n / 2)`.
pub const fn default_quorum(n: usize) -> usize {
    n.div_ceil(2)
}

/// Run `method` over `values` and apply the tolerance check.
///
/// Returns `None` when there is nothing to vote on.
pub fn vote(
    values: &[i32],
    method: VotingMethod,
    tolerance: u32,
    quorum: Option<u8>,
) -> Option<VoteOutcome> {
    let (value, mut status) = match method {
        VotingMethod::Min => (min(values)?, SignalStatus::Ok),
        VotingMethod::Max => (max(values)?, SignalStatus::Ok),
        VotingMethod::Average => (average(values)?, SignalStatus::Ok),
        VotingMethod::Median => (median(values)?, SignalStatus::Ok),
        VotingMethod::Majority => {
            let mid = median(values)?;
            let needed = quorum.map_or_else(|| default_quorum(values.len()), usize::from);
            let agreeing = values
                .iter()
                .filter(|&&v| (i64::from(v) - i64::from(mid)).abs() <= i64::from(tolerance))
                .count();
            let status = if agreeing >= needed {
                SignalStatus::Ok
            } else {
                SignalStatus::Inconsistent
            };
            (mid, status)
        }
    };

    if values.len() > 1 && tolerance > 0 && spread(values) > i64::from(tolerance) {
        status = SignalStatus::Inconsistent;
    }

    Some(VoteOutcome { value, status })
}

fn sort_into<'a>(values: &[i32], buf: &'a mut [i32; MAX_MERGE_INPUTS]) -> Option<&'a [i32]> {
    let sorted = buf.get_mut(..values.len())?;
    sorted.copy_from_slice(values);
    // Insertion sort: n <= 8, no allocation, stable timing.
    for i in 1..sorted.len() {
        let mut j = i;
        while j > 0 && sorted.get(j - 1) > sorted.get(j) {
            sorted.swap(j - 1, j);
            j -= 1;
        }
    }
    Some(sorted)
}

/// Configuration of one merge.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(deny_unknown_fields)
)]
pub struct MergeConfig {
    /// Source signals, in vote order.
    pub inputs: HVec<SignalId, MAX_MERGE_INPUTS>,
    /// Fused output signal.
    pub output: SignalId,
    /// Voting algorithm.
    #[cfg_attr(feature = "serde", serde(default))]
    pub method: VotingMethod,
    /// Maximum allowed spread between voting values (0 = unchecked).
    #[cfg_attr(feature = "serde", serde(default))]
    pub tolerance: u32,
    /// Majority quorum override.
    #[cfg_attr(feature = "serde", serde(default))]
    pub majority_quorum: Option<u8>,
    /// Disabled merges are skipped.
    #[cfg_attr(feature = "serde", serde(default = "crate::enabled_by_default"))]
    pub enabled: bool,
}

impl MergeConfig {
    /// Enabled merge with no tolerance check.
    ///
    /// Inputs beyond [`MAX_MERGE_INPUTS`] are ignored; use
    /// [`MergeConfig::try_new`] to reject them instead.
    pub fn new(inputs: &[SignalId], output: SignalId, method: VotingMethod) -> Self {
        let mut list = HVec::new();
        for &id in inputs.iter().take(MAX_MERGE_INPUTS) {
            if list.push(id).is_err() {
                break;
            }
        }
        Self {
            inputs: list,
            output,
            method,
            tolerance: 0,
            majority_quorum: None,
            enabled: true,
        }
    }

    /// Like [`MergeConfig::new`], failing with the input count when too many
    /// inputs are given.
    pub fn try_new(
        inputs: &[SignalId],
        output: SignalId,
        method: VotingMethod,
    ) -> Result<Self, usize> {
        if inputs.len() > MAX_MERGE_INPUTS {
            return Err(inputs.len());
        }
        Ok(Self::new(inputs, output, method))
    }

    /// Set the tolerance.
    pub fn with_tolerance(mut self, tolerance: u32) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set an explicit majority quorum.
    pub fn with_quorum(mut self, quorum: u8) -> Self {
        self.majority_quorum = Some(quorum);
        self
    }
}

/// Run every enabled merge in configuration order.
pub fn process_merges(
    table: &mut SignalTable,
    merges: &[MergeConfig],
    now: Timestamp,
    report: &mut StepReport,
) {
    for merge in merges.iter().filter(|m| m.enabled) {
        let mut buf = [0i32; MAX_MERGE_INPUTS];
        let mut count = 0usize;
        for id in &merge.inputs {
            let Some(signal) = table.get(*id) else {
                continue;
            };
            if !signal.status.is_ok() {
                continue;
            }
            if let Some(slot) = buf.get_mut(count) {
                *slot = signal.value;
                count += 1;
            }
        }
        let valid = buf.get(..count).unwrap_or(&[]);

        let outcome = vote(valid, merge.method, merge.tolerance, merge.majority_quorum);
        let Some(out) = table.get_mut(merge.output) else {
            continue;
        };
        match outcome {
            Some(result) => {
                out.value = result.value;
                out.status = result.status;
                out.timestamp = now;
                out.updated = true;
                bump(&mut report.merges_run);
            }
            None => {
                // Keep the last value; only the status degrades.
                if out.status != SignalStatus::Error {
                    out.status = SignalStatus::Error;
                    out.updated = true;
                }
                bump(&mut report.merges_without_input);
            }
        }
    }
}
