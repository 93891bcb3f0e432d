//! Log output settings

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Parses a level name, case-insensitively
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    pub level: LogLevel,
    pub timestamps: bool,
}

impl LoggingConfig {
    pub(crate) fn apply_env<F>(&mut self, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("MEDIASYNC_LOGGING_LEVEL") {
            match LogLevel::parse(&raw) {
                Some(level) => self.level = level,
                None => log::warn!("Ignoring MEDIASYNC_LOGGING_LEVEL={:?}: unknown level", raw),
            }
        }
        if let Some(raw) = lookup("MEDIASYNC_LOGGING_TIMESTAMPS") {
            match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "on" => self.timestamps = true,
                "0" | "false" | "off" => self.timestamps = false,
                _ => log::warn!("Ignoring MEDIASYNC_LOGGING_TIMESTAMPS={:?}", raw),
            }
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            timestamps: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_levels() {
        assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse(" warning "), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("verbose"), None);
    }

    #[test]
    fn test_display_matches_env_logger_filters() {
        assert_eq!(LogLevel::Warn.to_string(), "warn");
        assert_eq!(LogLevel::Trace.to_string(), "trace");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = LoggingConfig::default();
        config.apply_env(&|key: &str| match key {
            "MEDIASYNC_LOGGING_LEVEL" => Some("Debug".to_string()),
            "MEDIASYNC_LOGGING_TIMESTAMPS" => Some("off".to_string()),
            _ => None,
        });
        assert_eq!(config.level, LogLevel::Debug);
        assert!(!config.timestamps);
    }

    #[test]
    fn test_unknown_env_values_ignored() {
        let mut config = LoggingConfig::default();
        config.apply_env(&|key: &str| match key {
            "MEDIASYNC_LOGGING_LEVEL" => Some("loud".to_string()),
            "MEDIASYNC_LOGGING_TIMESTAMPS" => Some("maybe".to_string()),
            _ => None,
        });
        assert_eq!(config, LoggingConfig::default());
    }
}
