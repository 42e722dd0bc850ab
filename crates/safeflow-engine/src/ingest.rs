//! Event ingestion and the fast-path range check.

use crate::fault::FaultMonitor;
use crate::report::{StepReport, bump};
use crate::signal::{Event, SignalTable};

/// Copy `events` into the table in order.
///
/// Before each event is written, every enabled range-checking monitor that
/// watches its signal compares the raw value against its bounds and, on a
/// violation, fires its wake callback immediately. Events for unknown
/// signals are dropped and counted.
pub fn ingest_events(
    table: &mut SignalTable,
    monitors: &mut [FaultMonitor],
    events: &[Event],
    report: &mut StepReport,
) {
    for event in events {
        if !event.signal.is_valid() {
            bump(&mut report.events_discarded);
            continue;
        }

        for (index, monitor) in monitors.iter_mut().enumerate() {
            let config = monitor.config();
            if !config.enabled || config.watched != event.signal {
                continue;
            }
            if !config.out_of_range(event.value) {
                continue;
            }
            let level = config.fault_level;
            let id = u8::try_from(index).unwrap_or(u8::MAX);
            if monitor.notify(id, event.value, level) {
                bump(&mut report.fast_path_wakes);
            }
        }

        if table.apply(event) {
            bump(&mut report.events_ingested);
        } else {
            bump(&mut report.events_discarded);
        }
    }
}
