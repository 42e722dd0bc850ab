//! Configuration-time errors.
//!
//! Only engine construction can fail. Once built, [`crate::Engine::step`]
//! has no error path: anomalies travel as signal statuses and report
//! counters instead.

use thiserror::Error;

/// Errors raised while assembling an [`crate::Engine`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A configuration entry references a signal outside the table.
    #[error("{context} references signal {id}, table holds {capacity} signals")]
    SignalOutOfRange {
        /// Which entry holds the reference.
        context: &'static str,
        /// The offending raw id.
        id: u8,
        /// Table capacity.
        capacity: usize,
    },

    /// A fixed-capacity table is full.
    #[error("too many {table} entries (capacity {capacity})")]
    CapacityExceeded {
        /// Table name.
        table: &'static str,
        /// Table capacity.
        capacity: usize,
    },

    /// A merge lists no inputs.
    #[error("merge {merge} has no inputs")]
    NoMergeInputs {
        /// Merge index.
        merge: usize,
    },

    /// A merge lists more inputs than it can vote on.
    #[error("merge {merge} has {count} inputs, at most {max} are supported")]
    TooManyMergeInputs {
        /// Merge index.
        merge: usize,
        /// Configured input count.
        count: usize,
        /// Supported maximum.
        max: usize,
    },

    /// A merge's output is also one of its inputs.
    #[error("merge {merge} writes signal {signal}, which is also one of its inputs")]
    MergeFeedsItself {
        /// Merge index.
        merge: usize,
        /// Shared signal id.
        signal: u8,
    },

    /// A majority quorum cannot be met by the configured inputs.
    #[error("merge {merge} majority quorum {quorum} must be between 1 and {inputs}")]
    InvalidQuorum {
        /// Merge index.
        merge: usize,
        /// Configured quorum.
        quorum: u8,
        /// Configured input count.
        inputs: usize,
    },

    /// A monitor writes its fault level into the signal it watches.
    #[error("fault monitor {monitor} uses signal {signal} as both input and fault output")]
    FaultOutputIsWatched {
        /// Monitor index.
        monitor: usize,
        /// Shared signal id.
        signal: u8,
    },

    /// A monitor's range check is empty.
    #[error("fault monitor {monitor} range [{min}, {max}] is empty")]
    InvalidRange {
        /// Monitor index.
        monitor: usize,
        /// Lower bound.
        min: i32,
        /// Upper bound.
        max: i32,
    },

    /// A monitor's staleness check has no timeout.
    #[error("fault monitor {monitor} checks staleness with a zero timeout")]
    ZeroStaleTimeout {
        /// Monitor index.
        monitor: usize,
    },

    /// A limp-home action targets a scale that does not exist.
    #[error("fault monitor {monitor} limp action targets unknown scale {scale}")]
    UnknownScale {
        /// Monitor index.
        monitor: usize,
        /// Target scale index.
        scale: u8,
    },

    /// Two monitors degrade the same scale.
    #[error("fault monitors {first} and {second} both target limp scale {scale}")]
    SharedLimpTarget {
        /// Earlier monitor index.
        first: usize,
        /// Later monitor index.
        second: usize,
        /// Shared scale index.
        scale: u8,
    },

    /// A clamp pair is inverted.
    #[error("{context} {index} clamp [{min}, {max}] is inverted")]
    InvertedClamp {
        /// `"scale"`, `"limp action"`, `"pid output"` or `"pid integral"`.
        context: &'static str,
        /// Owning entry index.
        index: usize,
        /// Lower bound.
        min: i32,
        /// Upper bound.
        max: i32,
    },

    /// A controller or verified output writes one of its own inputs.
    #[error("{context} {index} writes signal {signal}, which is also one of its inputs")]
    OutputIsInput {
        /// `"pid"` or `"verified output"`.
        context: &'static str,
        /// Entry index.
        index: usize,
        /// Shared signal id.
        signal: u8,
    },

    /// A cyclic output has a zero period.
    #[error("cyclic output {output} has a zero period")]
    ZeroPeriod {
        /// Cyclic output index.
        output: usize,
    },
}

/// Result type for engine construction.
pub type EngineResult<T> = Result<T, EngineError>;
