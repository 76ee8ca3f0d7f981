//! Printer and polling configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::endpoint::PrinterEndpoint;
use crate::error::ConfigError;

/// Timing for the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    /// Seconds between cycle starts.
    pub interval_secs: u64,
    /// Budget for a whole cycle, all sub-queries included.
    pub cycle_timeout_secs: u64,
    /// Budget for one command round trip.
    pub call_timeout_ms: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            cycle_timeout_secs: 5,
            call_timeout_ms: 2000,
        }
    }
}

impl PollSettings {
    /// Interval as a duration.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Cycle budget as a duration.
    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_secs(self.cycle_timeout_secs)
    }

    /// Per-call budget as a duration.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Reject zero durations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::Invalid("interval_secs must be positive".into()));
        }
        if self.cycle_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "cycle_timeout_secs must be positive".into(),
            ));
        }
        if self.call_timeout_ms == 0 {
            return Err(ConfigError::Invalid("call_timeout_ms must be positive".into()));
        }
        Ok(())
    }
}

/// Contents of a config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Which printer to poll.
    pub printer: PrinterEndpoint,
    /// Poll timing.
    #[serde(default)]
    pub polling: PollSettings,
}

impl Config {
    /// Parse TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.polling.validate()?;
        if config.printer.host().is_empty() {
            return Err(ConfigError::Invalid("printer.host is empty".into()));
        }
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }
}
