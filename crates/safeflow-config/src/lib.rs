//! Engine descriptions for SafeFlow.
//!
//! An [`EngineDescription`] is the file form of an engine's configuration:
//! signals (with optional names and staleness thresholds), merges, remaps,
//! scales, fault monitors with limp-home actions, PID controllers, verified
//! outputs and cyclic outputs. It is
//! loaded from JSON or YAML, validated against every engine invariant and
//! turned into a ready-to-step [`safeflow_engine::Engine`].
//!
//! ```yaml
//! name: throttle
//! signals:
//!   - { id: 0, name: pedal_a }
//!   - { id: 1, name: pedal_b }
//! merges:
//!   - { inputs: [0, 1], output: 2, method: average, tolerance: 40 }
//! scales:
//!   - { input: 2, output: 3, scale_factor: 1000, clamp_max: 1000 }
//! fault_monitors:
//!   - watched: 2
//!     fault_output: 4
//!     check_status: true
//!     fault_level: error
//!     limp: { target_scale: 0, scale_factor: 500, restore_delay_ms: 500 }
//! pids:
//!   - { setpoint: 3, measurement: 5, output: 6, kp: 800, ki: 50, output_min: 0, output_max: 1000 }
//! verified_outputs:
//!   - { command: 6, feedback: 7, output: 8, kind: pwm, tolerance: 20, verify_timeout_us: 50000 }
//! cyclic_outputs:
//!   - { source: 3, kind: can, target_id: 0x100, period_us: 10000 }
//! ```

#![warn(missing_docs)]

mod description;
mod error;
mod load;

pub use description::{
    DescriptionSummary, EngineDescription, MergeDescription, SCHEMA_VERSION, SignalDescription,
};
pub use error::{ConfigError, ConfigResult};
pub use load::{Format, load_description};
