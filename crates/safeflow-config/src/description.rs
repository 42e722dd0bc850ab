//! On-disk engine description.

use std::collections::{HashMap, HashSet};

use safeflow_engine::{
    CyclicOutputConfig, Engine, EngineBuilder, EngineError, FaultMonitorConfig, FaultWake,
    MAX_MERGE_INPUTS, MergeConfig, PidConfig, RemapConfig, ScaleConfig, SignalConfig, SignalId,
    VerifiedOutputConfig, VotingMethod,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult};

/// Schema version understood by this crate.
pub const SCHEMA_VERSION: u8 = 1;

fn schema_version_default() -> u8 {
    SCHEMA_VERSION
}

fn enabled() -> bool {
    true
}

/// Complete, versioned description of an engine.
///
/// Wake callbacks cannot be described in a file; attach them with
/// [`EngineDescription::into_engine_with`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineDescription {
    /// Must equal [`SCHEMA_VERSION`].
    #[serde(default = "schema_version_default")]
    pub schema_version: u8,

    /// Free-form label used in logs and reports.
    #[serde(default)]
    pub name: Option<String>,

    /// Signal slots that need a name or a staleness threshold.
    #[serde(default)]
    pub signals: Vec<SignalDescription>,

    /// Redundancy merges in execution order.
    #[serde(default)]
    pub merges: Vec<MergeDescription>,

    /// Remaps in execution order.
    #[serde(default)]
    pub remaps: Vec<RemapConfig>,

    /// Scales, addressed by index from limp actions.
    #[serde(default)]
    pub scales: Vec<ScaleConfig>,

    /// Fault monitors with optional limp-home actions.
    #[serde(default)]
    pub fault_monitors: Vec<FaultMonitorConfig>,

    /// PID controllers in execution order.
    #[serde(default)]
    pub pids: Vec<PidConfig>,

    /// Command/feedback checks in execution order.
    #[serde(default)]
    pub verified_outputs: Vec<VerifiedOutputConfig>,

    /// Periodic output events.
    #[serde(default)]
    pub cyclic_outputs: Vec<CyclicOutputConfig>,
}

impl Default for EngineDescription {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            name: None,
            signals: Vec::new(),
            merges: Vec::new(),
            remaps: Vec::new(),
            scales: Vec::new(),
            fault_monitors: Vec::new(),
            pids: Vec::new(),
            verified_outputs: Vec::new(),
            cyclic_outputs: Vec::new(),
        }
    }
}

/// A named signal slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignalDescription {
    /// Slot.
    pub id: SignalId,
    /// Unique name, usable in event scripts.
    #[serde(default)]
    pub name: Option<String>,
    /// Staleness threshold in microseconds (0 = disabled).
    #[serde(default)]
    pub staleness_threshold_us: u64,
}

/// A merge as written in a file.
///
/// Unlike [`MergeConfig`], the input list is unbounded here so that an
/// oversized list is reported as such instead of as a parse error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeDescription {
    /// Redundant inputs.
    pub inputs: Vec<SignalId>,
    /// Voted result.
    pub output: SignalId,
    /// Voting algorithm.
    #[serde(default)]
    pub method: VotingMethod,
    /// Maximum allowed spread of the valid inputs.
    #[serde(default)]
    pub tolerance: u32,
    /// Agreeing inputs a majority vote needs; defaults to a strict majority.
    #[serde(default)]
    pub majority_quorum: Option<u8>,
    /// Disabled merges are skipped.
    #[serde(default = "enabled")]
    pub enabled: bool,
}

impl MergeDescription {
    fn to_config(&self, index: usize) -> ConfigResult<MergeConfig> {
        let mut config = MergeConfig::try_new(&self.inputs, self.output, self.method).map_err(
            |count| EngineError::TooManyMergeInputs {
                merge: index,
                count,
                max: MAX_MERGE_INPUTS,
            },
        )?;
        config.tolerance = self.tolerance;
        config.majority_quorum = self.majority_quorum;
        config.enabled = self.enabled;
        Ok(config)
    }
}

/// Entry counts of a description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DescriptionSummary {
    /// Described signal slots.
    pub signals: usize,
    /// Merges.
    pub merges: usize,
    /// Remaps.
    pub remaps: usize,
    /// Scales.
    pub scales: usize,
    /// Fault monitors.
    pub fault_monitors: usize,
    /// PID controllers.
    pub pids: usize,
    /// Verified outputs.
    pub verified_outputs: usize,
    /// Cyclic outputs.
    pub cyclic_outputs: usize,
    /// Fault monitors carrying a limp-home action.
    pub limp_actions: usize,
}

impl EngineDescription {
    /// Parse a JSON description.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Json`] on malformed input.
    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parse a YAML description.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Yaml`] on malformed input.
    pub fn from_yaml_str(text: &str) -> ConfigResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Serialize as pretty JSON.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Json`] if serialization fails.
    pub fn to_json_string(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Serialize as YAML.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Yaml`] if serialization fails.
    pub fn to_yaml_string(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Entry counts.
    pub fn summary(&self) -> DescriptionSummary {
        DescriptionSummary {
            signals: self.signals.len(),
            merges: self.merges.len(),
            remaps: self.remaps.len(),
            scales: self.scales.len(),
            fault_monitors: self.fault_monitors.len(),
            pids: self.pids.len(),
            verified_outputs: self.verified_outputs.len(),
            cyclic_outputs: self.cyclic_outputs.len(),
            limp_actions: self.fault_monitors.iter().filter(|m| m.limp.is_some()).count(),
        }
    }

    /// Name given to a signal, if any.
    pub fn signal_name(&self, id: SignalId) -> Option<&str> {
        self.signals
            .iter()
            .find(|s| s.id == id)
            .and_then(|s| s.name.as_deref())
    }

    /// Map of signal names to ids.
    pub fn signal_names(&self) -> HashMap<&str, SignalId> {
        self.signals
            .iter()
            .filter_map(|s| s.name.as_deref().map(|n| (n, s.id)))
            .collect()
    }

    /// Check the description without keeping the engine.
    ///
    /// Suspicious but legal settings are logged as warnings.
    ///
    /// # Errors
    ///
    /// The first schema, naming or engine invariant violation found.
    pub fn validate(&self) -> ConfigResult<()> {
        self.builder()?.build()?;
        self.warn_suspicious();
        Ok(())
    }

    /// Build the engine without wake callbacks.
    ///
    /// # Errors
    ///
    /// See [`EngineDescription::validate`].
    pub fn into_engine(self) -> ConfigResult<Engine> {
        self.into_engine_with(|_, _| None)
    }

    /// Build the engine, asking `wake_factory` for a callback per monitor.
    ///
    /// # Errors
    ///
    /// See [`EngineDescription::validate`].
    pub fn into_engine_with<F>(self, wake_factory: F) -> ConfigResult<Engine>
    where
        F: FnMut(usize, &FaultMonitorConfig) -> Option<Box<dyn FaultWake>>,
    {
        self.warn_suspicious();
        let engine = self.builder_with(wake_factory)?.build()?;
        debug!(name = ?self.name, "engine built from description");
        Ok(engine)
    }

    /// Translate into an [`EngineBuilder`] without wake callbacks.
    ///
    /// # Errors
    ///
    /// Schema, naming and merge input count problems; engine invariants are
    /// checked later by [`EngineBuilder::build`].
    pub fn builder(&self) -> ConfigResult<EngineBuilder> {
        self.builder_with(|_, _| None)
    }

    fn builder_with<F>(&self, mut wake_factory: F) -> ConfigResult<EngineBuilder>
    where
        F: FnMut(usize, &FaultMonitorConfig) -> Option<Box<dyn FaultWake>>,
    {
        self.check_schema()?;
        self.check_signals()?;

        let mut builder = Engine::builder();
        for signal in &self.signals {
            builder = builder.with_signal(SignalConfig {
                id: signal.id,
                staleness_threshold_us: signal.staleness_threshold_us,
            });
        }
        for (index, merge) in self.merges.iter().enumerate() {
            builder = builder.with_merge(merge.to_config(index)?);
        }
        for remap in &self.remaps {
            builder = builder.with_remap(*remap);
        }
        for scale in &self.scales {
            builder = builder.with_scale(*scale);
        }
        for (index, monitor) in self.fault_monitors.iter().enumerate() {
            builder = match wake_factory(index, monitor) {
                Some(wake) => builder.with_fault_monitor_boxed(*monitor, wake),
                None => builder.with_fault_monitor(*monitor),
            };
        }
        for pid in &self.pids {
            builder = builder.with_pid(*pid);
        }
        for output in &self.verified_outputs {
            builder = builder.with_verified_output(*output);
        }
        for output in &self.cyclic_outputs {
            builder = builder.with_cyclic_output(*output);
        }
        Ok(builder)
    }

    fn check_schema(&self) -> ConfigResult<()> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ConfigError::UnsupportedSchema {
                found: self.schema_version,
                supported: SCHEMA_VERSION,
            });
        }
        Ok(())
    }

    fn check_signals(&self) -> ConfigResult<()> {
        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for signal in &self.signals {
            if !ids.insert(signal.id) {
                return Err(ConfigError::DuplicateSignal(signal.id.raw()));
            }
            if let Some(name) = &signal.name {
                if !names.insert(name.as_str()) {
                    return Err(ConfigError::DuplicateSignalName(name.clone()));
                }
            }
        }
        Ok(())
    }

    fn warn_suspicious(&self) {
        for (index, merge) in self.merges.iter().enumerate() {
            if merge.inputs.len() == 1 {
                warn!(merge = index, "merge has a single input and provides no redundancy");
            }
            if merge.method == VotingMethod::Majority && merge.tolerance == 0 {
                warn!(
                    merge = index,
                    "majority merge with zero tolerance requires exact agreement"
                );
            }
        }
        for (index, monitor) in self.fault_monitors.iter().enumerate() {
            if !(monitor.check_range || monitor.check_staleness || monitor.check_status) {
                warn!(monitor = index, "fault monitor has no checks enabled");
            }
        }
        for (index, pid) in self.pids.iter().enumerate() {
            if pid.kp == 0 && pid.ki == 0 && pid.kd == 0 {
                warn!(pid = index, "pid controller has all gains at zero");
            }
        }
    }
}
