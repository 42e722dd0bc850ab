//! Deadline-scheduled cyclic outputs.
//!
//! Each output keeps an absolute deadline that advances by exactly one
//! period per firing. Jitter in when the step is called therefore never
//! accumulates into drift: an output with a 100 ms period fires at 100 ms,
//! 200 ms, 300 ms... no matter how late within each window the step runs.

use core::fmt;

use heapless::Vec as HVec;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::MAX_OUTPUT_EVENTS;
use crate::report::{StepReport, bump};
use crate::signal::{SignalId, SignalTable, Timestamp};

/// Bounded buffer of output events produced by one step.
pub type OutputBuffer = HVec<OutputEvent, MAX_OUTPUT_EVENTS>;

/// Transport an output event is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum OutputKind {
    /// Raw CAN frame.
    #[default]
    Can,
    /// J1939 PGN.
    J1939,
    /// CANopen PDO.
    CanOpen,
    /// Digital output pin.
    Gpio,
    /// Serial line.
    Uart,
    /// SPI device.
    Spi,
    /// I2C device.
    I2c,
    /// PWM channel.
    Pwm,
    /// Analog output.
    Dac,
    /// Modbus register.
    Modbus,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputKind::Can => "can",
            OutputKind::J1939 => "j1939",
            OutputKind::CanOpen => "canopen",
            OutputKind::Gpio => "gpio",
            OutputKind::Uart => "uart",
            OutputKind::Spi => "spi",
            OutputKind::I2c => "i2c",
            OutputKind::Pwm => "pwm",
            OutputKind::Dac => "dac",
            OutputKind::Modbus => "modbus",
        };
        f.write_str(name)
    }
}

/// One emitted value, ready for an external driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OutputEvent {
    /// Transport.
    pub kind: OutputKind,
    /// Protocol address (CAN id, PGN, register, pin...).
    pub target_id: u32,
    /// Which instance of the transport.
    pub device_index: u8,
    /// Source signal value at emission time.
    pub value: i32,
    /// Protocol-specific flags.
    pub flags: u32,
    /// Emission time.
    pub timestamp: Timestamp,
}

/// Configuration of one periodic output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(deny_unknown_fields)
)]
pub struct CyclicOutputConfig {
    /// Signal whose value is emitted.
    pub source: SignalId,
    /// Transport.
    #[cfg_attr(feature = "serde", serde(default))]
    pub kind: OutputKind,
    /// Protocol address.
    pub target_id: u32,
    /// Transport instance.
    #[cfg_attr(feature = "serde", serde(default))]
    pub device_index: u8,
    /// Period in microseconds, must be non-zero.
    pub period_us: u64,
    /// First deadline; defaults to one period after time zero.
    #[cfg_attr(feature = "serde", serde(default))]
    pub first_deadline_us: Option<u64>,
    /// Protocol-specific flags.
    #[cfg_attr(feature = "serde", serde(default))]
    pub flags: u32,
    /// Disabled outputs never fire.
    #[cfg_attr(feature = "serde", serde(default = "crate::enabled_by_default"))]
    pub enabled: bool,
}

impl CyclicOutputConfig {
    /// Enabled CAN output on device 0.
    pub fn new(source: SignalId, target_id: u32, period_us: u64) -> Self {
        Self {
            source,
            kind: OutputKind::Can,
            target_id,
            device_index: 0,
            period_us,
            first_deadline_us: None,
            flags: 0,
            enabled: true,
        }
    }

    /// Set the transport and instance.
    pub fn on(mut self, kind: OutputKind, device_index: u8) -> Self {
        self.kind = kind;
        self.device_index = device_index;
        self
    }

    /// Set the first deadline explicitly.
    pub fn starting_at(mut self, first_deadline_us: u64) -> Self {
        self.first_deadline_us = Some(first_deadline_us);
        self
    }
}

/// A cyclic output and its next deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CyclicOutput {
    config: CyclicOutputConfig,
    next_deadline_us: Timestamp,
}

impl CyclicOutput {
    /// Schedule `config` from its first deadline.
    pub fn new(config: CyclicOutputConfig) -> Self {
        Self {
            config,
            next_deadline_us: Self::initial_deadline(&config),
        }
    }

    fn initial_deadline(config: &CyclicOutputConfig) -> Timestamp {
        config.first_deadline_us.unwrap_or(config.period_us)
    }

    /// Static configuration.
    pub fn config(&self) -> &CyclicOutputConfig {
        &self.config
    }

    /// Time of the next firing.
    pub fn next_deadline(&self) -> Timestamp {
        self.next_deadline_us
    }

    /// Reschedule from the first deadline.
    pub(crate) fn reset(&mut self) {
        self.next_deadline_us = Self::initial_deadline(&self.config);
    }
}

/// Fire every due output into `buffer`.
///
/// An output fires at most once per call. When the buffer is full the firing
/// is dropped without advancing the deadline, so it is retried next step.
pub fn process_cyclic_outputs(
    table: &SignalTable,
    outputs: &mut [CyclicOutput],
    buffer: &mut OutputBuffer,
    now: Timestamp,
    report: &mut StepReport,
) {
    for output in outputs.iter_mut() {
        let config = output.config;
        if !config.enabled || now < output.next_deadline_us {
            continue;
        }
        let Some(source) = table.get(config.source) else {
            continue;
        };
        let event = OutputEvent {
            kind: config.kind,
            target_id: config.target_id,
            device_index: config.device_index,
            value: source.value,
            flags: config.flags,
            timestamp: now,
        };
        if buffer.push(event).is_ok() {
            output.next_deadline_us = output.next_deadline_us.saturating_add(config.period_us);
            bump(&mut report.outputs_emitted);
        } else {
            bump(&mut report.outputs_dropped);
        }
    }
}
