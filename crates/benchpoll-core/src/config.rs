//! Session configuration
//!
//! Serial line parameters, poll timing and fault policy. Loaded from a JSON
//! file or built in code; validated before a session opens the port.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::protocol::{DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT_MS, READY_SENTINEL};

/// Errors raised while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Parity mode of the serial line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

/// Number of stop bits on the serial line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopBits {
    #[default]
    One,
    Two,
}

impl From<StopBits> for serialport::StopBits {
    fn from(stop_bits: StopBits) -> Self {
        match stop_bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// Serial line parameters of the instrument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    /// Serial port name (e.g., "/dev/ttyUSB0" or "COM1")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits per character (5-8)
    pub data_bits: u8,
    /// Parity mode
    pub parity: Parity,
    /// Stop bits
    pub stop_bits: StopBits,
    /// Read timeout in milliseconds
    pub read_timeout_ms: u64,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: StopBits::One,
            read_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl InstrumentConfig {
    /// Default line parameters on the given port
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }

    /// Read timeout as a duration
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Data bits as understood by the serial driver
    pub fn serial_data_bits(&self) -> Result<serialport::DataBits, ConfigError> {
        match self.data_bits {
            5 => Ok(serialport::DataBits::Five),
            6 => Ok(serialport::DataBits::Six),
            7 => Ok(serialport::DataBits::Seven),
            8 => Ok(serialport::DataBits::Eight),
            other => Err(ConfigError::Invalid(format!(
                "data bits must be 5-8, got {other}"
            ))),
        }
    }

    /// Check the line parameters before opening the port
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port.trim().is_empty() {
            return Err(ConfigError::Invalid("port must not be empty".to_string()));
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::Invalid("baud rate must be non-zero".to_string()));
        }
        if self.read_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "read timeout must be non-zero".to_string(),
            ));
        }
        self.serial_data_bits()?;
        Ok(())
    }
}

/// Delays that make up the hardware timing contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollTiming {
    /// Pause between sending a query and reading its reply (ms).
    /// Reading earlier yields spurious empty replies.
    pub settle_ms: u64,
    /// Pause between poll cycles and between initialization commands (ms)
    pub pace_ms: u64,
}

impl Default for PollTiming {
    fn default() -> Self {
        Self {
            settle_ms: 500,
            pace_ms: 1000,
        }
    }
}

impl PollTiming {
    /// Settle delay as a duration
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Pace delay as a duration
    pub fn pace(&self) -> Duration {
        Duration::from_millis(self.pace_ms)
    }
}

/// What to do when the sink fails to accept a measurement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkFaultPolicy {
    /// Count the failure and keep polling
    #[default]
    Isolate,
    /// End the session as faulted
    Abort,
}

/// Everything a poll session needs besides the transport and sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Serial line parameters
    pub instrument: InstrumentConfig,

    /// Settle and pace delays
    #[serde(default)]
    pub timing: PollTiming,

    /// Sink failure handling
    #[serde(default)]
    pub sink_faults: SinkFaultPolicy,

    /// Status value that means a measurement is ready
    #[serde(default = "default_ready_sentinel")]
    pub ready_sentinel: u32,
}

fn default_ready_sentinel() -> u32 {
    READY_SENTINEL
}

impl SessionConfig {
    /// Default timing and policy for the given instrument
    pub fn new(instrument: InstrumentConfig) -> Self {
        Self {
            instrument,
            timing: PollTiming::default(),
            sink_faults: SinkFaultPolicy::default(),
            ready_sentinel: READY_SENTINEL,
        }
    }

    /// Parse a config from JSON text
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Write the config as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Validate every part of the config
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.instrument.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_match_instrument() {
        let config = InstrumentConfig::new("COM1");
        assert_eq!(config.baud_rate, 2400);
        assert_eq!(config.data_bits, 8);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.stop_bits, StopBits::One);
        assert_eq!(config.read_timeout(), Duration::from_secs(2));

        let timing = PollTiming::default();
        assert_eq!(timing.settle(), Duration::from_millis(500));
        assert_eq!(timing.pace(), Duration::from_secs(1));
    }

    #[test]
    fn test_validate_rejects_bad_line_parameters() {
        assert!(InstrumentConfig::default().validate().is_err());

        let mut config = InstrumentConfig::new("/dev/ttyUSB0");
        assert!(config.validate().is_ok());

        config.baud_rate = 0;
        assert!(config.validate().is_err());

        config.baud_rate = 9600;
        config.data_bits = 9;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.data_bits = 7;
        config.read_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_minimal() {
        let config = SessionConfig::from_json(r#"{"instrument": {"port": "COM1"}}"#).unwrap();
        assert_eq!(config, SessionConfig::new(InstrumentConfig::new("COM1")));
    }

    #[test]
    fn test_from_json_full() {
        let json = r#"{
            "instrument": {
                "port": "/dev/ttyS0",
                "baud_rate": 9600,
                "data_bits": 7,
                "parity": "even",
                "stop_bits": "two",
                "read_timeout_ms": 500
            },
            "timing": {"settle_ms": 250, "pace_ms": 2000},
            "sink_faults": "abort",
            "ready_sentinel": 16
        }"#;
        let config = SessionConfig::from_json(json).unwrap();
        assert_eq!(config.instrument.parity, Parity::Even);
        assert_eq!(config.instrument.stop_bits, StopBits::Two);
        assert_eq!(config.instrument.data_bits, 7);
        assert_eq!(config.timing.settle_ms, 250);
        assert_eq!(config.sink_faults, SinkFaultPolicy::Abort);
        assert_eq!(config.ready_sentinel, 16);
    }

    #[test]
    fn test_from_json_requires_port() {
        assert!(matches!(
            SessionConfig::from_json(r#"{"instrument": {}}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SessionConfig::from_json("{"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut config = SessionConfig::new(InstrumentConfig::new("COM3"));
        config.timing.pace_ms = 250;
        config.save(&path).unwrap();

        let loaded = SessionConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            SessionConfig::load(dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
