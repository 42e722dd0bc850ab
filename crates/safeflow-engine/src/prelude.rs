//! Prelude for convenient imports.
//!
//! ```rust
//! use safeflow_engine::prelude::*;
//! ```

pub use crate::{
    CyclicOutputConfig, Engine, EngineBuilder, EngineError, EngineResult, Event, FaultLevel,
    FaultMonitorConfig, FaultWake, LimpAction, LimpState, MergeConfig, OutputEvent, OutputKind,
    PidConfig, RemapConfig, ScaleConfig, SignalConfig, SignalId, SignalStatus, StepReport,
    Timestamp, VerifiedKind, VerifiedOutputConfig, VotingMethod,
};
