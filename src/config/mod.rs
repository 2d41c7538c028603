//! # Tower Configuration
//!
//! Timing constants of the landing protocol, observer settings and the event
//! channel capacity. Values come from compiled-in defaults, optionally
//! overridden by `config/tower.toml`, an environment-specific
//! `config/tower.<env>.toml` and `TOWER__SECTION__KEY` environment variables.
//!
//! ```rust,no_run
//! use pitstop_tower::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let landing_wait = manager.config().timing.landing_wait();
//! # let _ = landing_wait;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::defaults;
use crate::utils::time::from_millis;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TowerConfig {
    pub timing: TimingConfig,
    pub logging: LoggingConfig,
    pub events: EventsConfig,
}

/// Protocol timing, all in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Upper bound on any outbound request/response exchange
    pub comms_timeout_ms: u64,
    /// How long an authorized landing may take before the MC reports touchdown
    pub landing_wait_ms: u64,
    /// Half width of the arrival window around the assigned time
    pub half_margin_ms: u64,
    /// Planning horizon offset: plans are computed for `now + planning_lead`
    pub planning_lead_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            comms_timeout_ms: defaults::COMMS_TIMEOUT_MS,
            landing_wait_ms: defaults::LANDING_WAIT_MS,
            half_margin_ms: defaults::HALF_MARGIN_MS,
            planning_lead_ms: defaults::PLANNING_LEAD_MS,
        }
    }
}

impl TimingConfig {
    pub fn comms_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.comms_timeout_ms)
    }

    pub fn landing_wait(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.landing_wait_ms)
    }

    pub fn half_margin(&self) -> chrono::Duration {
        from_millis(self.half_margin_ms)
    }

    pub fn planning_lead(&self) -> chrono::Duration {
        from_millis(self.planning_lead_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory receiving one `PS-<id>` audit file per pit stop; disabled when unset
    pub ps_log_dir: Option<PathBuf>,
    /// Emit JSON formatted log lines
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Broadcast channel capacity of the event publisher
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: defaults::EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl TowerConfig {
    /// Reject values the protocol cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        let positive = [
            ("timing.comms_timeout_ms", self.timing.comms_timeout_ms),
            ("timing.landing_wait_ms", self.timing.landing_wait_ms),
            ("timing.half_margin_ms", self.timing.half_margin_ms),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigurationError::invalid_value(
                    field,
                    "0",
                    "must be greater than 0",
                ));
            }
        }

        if self.events.capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "events.capacity",
                "0",
                "channel capacity must be greater than 0",
            ));
        }

        if let Some(dir) = &self.logging.ps_log_dir {
            if dir.as_os_str().is_empty() {
                return Err(ConfigurationError::validation_error(
                    "logging.ps_log_dir must not be empty when set",
                ));
            }
        }

        Ok(())
    }
}
