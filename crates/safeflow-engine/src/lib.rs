//! Deterministic signal-processing core for safety-critical control loops.
//!
//! The engine fuses redundant signals, supervises them for faults, degrades
//! downstream scaling while a fault persists ("limp-home") and schedules
//! periodic output events, all inside one bounded [`Engine::step`].
//!
//! # Architecture
//!
//! - **[`SignalTable`]**: fixed array of value/status/timestamp slots
//! - **Ingestion**: copies [`Event`]s in and fires fast-path wake callbacks
//!   on raw range violations
//! - **Staleness**: marks overdue signals as [`SignalStatus::Timeout`]
//! - **Merges**: redundancy voting ([`VotingMethod`]) with a tolerance check
//! - **Fault monitors**: staleness/range/status supervision and the
//!   limp-home override of a [`ScaleConfig`]
//! - **Transforms**: [`RemapConfig`] and [`ScaleConfig`]
//! - **PID control**: fixed-point [`PidController`]s with anti-windup
//! - **Verified outputs**: command/feedback checks ([`VerifiedOutputConfig`])
//! - **Cyclic outputs**: absolute-deadline scheduling into a bounded buffer
//!
//! Each phase is also exposed as a free function so hosts can test or
//! compose them individually.
//!
//! # RT-Safety
//!
//! Once built, the engine is RT-safe:
//! - No heap allocations in [`Engine::step`]
//! - No blocking operations
//! - Bounded execution time (every loop is over a fixed-capacity table)
//! - No error path: anomalies are signal statuses and [`StepReport`]
//!   counters
//!
//! Wake callbacks run inside the step and extend its worst case; keep them
//! short.
//!
//! # Example
//!
//! ```rust
//! use safeflow_engine::prelude::*;
//!
//! # fn main() -> Result<(), EngineError> {
//! let mut engine = Engine::builder()
//!     .with_merge(
//!         MergeConfig::new(
//!             &[SignalId::new(0), SignalId::new(1), SignalId::new(2)],
//!             SignalId::new(3),
//!             VotingMethod::Median,
//!         )
//!         .with_tolerance(50),
//!     )
//!     .with_cyclic_output(CyclicOutputConfig::new(SignalId::new(3), 0x100, 10_000))
//!     .build()?;
//!
//! engine.step(
//!     10_000,
//!     &[
//!         Event::ok(SignalId::new(0), 2990, 10_000),
//!         Event::ok(SignalId::new(1), 3000, 10_000),
//!         Event::ok(SignalId::new(2), 3010, 10_000),
//!     ],
//! );
//!
//! assert_eq!(engine.value(SignalId::new(3)), Some(3000));
//! assert_eq!(engine.outputs().len(), 1);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod builder;
mod cyclic;
mod engine;
mod error;
mod fault;
mod ingest;
mod pid;
mod report;
mod signal;
mod staleness;
mod transform;
mod verified;
mod voter;

pub mod prelude;

pub use builder::{
    EngineBuilder, SignalConfig, validate_cyclic, validate_merge, validate_monitor, validate_pid,
    validate_scale, validate_verified_output,
};
pub use cyclic::{
    CyclicOutput, CyclicOutputConfig, OutputBuffer, OutputEvent, OutputKind,
    process_cyclic_outputs,
};
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use fault::{
    FaultLevel, FaultMonitor, FaultMonitorConfig, FaultWake, LimpAction, LimpState,
    process_fault_monitors,
};
pub use ingest::ingest_events;
pub use pid::{GAIN_UNIT, PidConfig, PidController, process_pids};
pub use report::StepReport;
pub use signal::{Event, Signal, SignalId, SignalStatus, SignalTable, Timestamp};
pub use staleness::apply_staleness;
pub use transform::{
    RemapConfig, SCALE_UNIT, ScaleConfig, ScaleParams, process_remaps, process_scales,
};
pub use verified::{
    VerifiedKind, VerifiedOutput, VerifiedOutputConfig, process_verified_outputs,
};
pub use voter::{
    MergeConfig, VoteOutcome, VotingMethod, average, default_quorum, max, median, min,
    process_merges, spread, vote,
};

/// Number of signal slots.
pub const MAX_SIGNALS: usize = 32;
/// Maximum number of merges.
pub const MAX_MERGES: usize = 8;
/// Maximum inputs per merge.
pub const MAX_MERGE_INPUTS: usize = 8;
/// Maximum number of fault monitors.
pub const MAX_FAULT_MONITORS: usize = 8;
/// Maximum number of scales.
pub const MAX_SCALES: usize = 16;
/// Maximum number of remaps.
pub const MAX_REMAPS: usize = 16;
/// Maximum number of cyclic outputs.
pub const MAX_CYCLIC_OUTPUTS: usize = 16;
/// Maximum number of PID controllers.
pub const MAX_PIDS: usize = 8;
/// Maximum number of verified outputs.
pub const MAX_VERIFIED_OUTPUTS: usize = 16;
/// Capacity of the per-step output buffer.
pub const MAX_OUTPUT_EVENTS: usize = 64;

#[cfg(feature = "serde")]
pub(crate) fn enabled_by_default() -> bool {
    true
}
