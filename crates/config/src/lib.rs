//! Media synchronisation configuration
//!
//! Timing constants of the synchronisation control loop and log output,
//! stored as TOML in the platform config directory and overridable through
//! `MEDIASYNC_*` environment variables.
//!
//! ```rust,no_run
//! use mediasync_config::ConfigManager;
//!
//! let manager = ConfigManager::new().expect("no config directory");
//! let config = manager.load_or_default();
//! println!("heartbeat every {:?}", config.sync.heartbeat_interval());
//! ```

mod error;
mod logging_config;
mod manager;
mod store;
mod sync_config;
mod validation;

pub use error::{ConfigError, ConfigResult, ValidationError};
pub use logging_config::{LogLevel, LoggingConfig};
pub use manager::ConfigManager;
pub use sync_config::SyncConfig;
pub use validation::{HEARTBEAT_RANGE_MS, POLL_RANGE_MS, STREAM_LIMIT_RANGE, WIDENING_RANGE_MS};

use serde::{Deserialize, Serialize};

/// Format version written to new files
pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub version: u32,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Every timing rule this config breaks
    pub fn problems(&self) -> Vec<ValidationError> {
        validation::check(self)
    }

    pub fn is_valid(&self) -> bool {
        self.problems().is_empty()
    }

    /// Applies `MEDIASYNC_*` overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.sync.apply_env(&lookup);
        self.logging.apply_env(&lookup);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            sync: SyncConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
