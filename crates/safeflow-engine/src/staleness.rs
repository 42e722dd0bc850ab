//! Staleness detection.

use crate::report::{StepReport, bump};
use crate::signal::{SignalStatus, SignalTable, Timestamp};

/// Mark every signal older than its threshold as [`SignalStatus::Timeout`].
///
/// Signals with a zero threshold are never checked. A signal that is
/// already timed out only has its status re-asserted; it is counted once,
/// on the transition.
pub fn apply_staleness(table: &mut SignalTable, now: Timestamp, report: &mut StepReport) {
    for signal in table.iter_mut() {
        if signal.staleness_threshold_us == 0 {
            continue;
        }
        if signal.age(now) > signal.staleness_threshold_us {
            if signal.status != SignalStatus::Timeout {
                bump(&mut report.signals_timed_out);
            }
            signal.status = SignalStatus::Timeout;
            signal.updated = true;
        }
    }
}
