//! Timing of the synchronisation control loop

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Master observer re-emits its signal this often with no renderer event
    pub heartbeat_interval_ms: u64,

    /// Backstop poll of each correction client once its timeline is bound
    pub poll_interval_ms: u64,

    /// Added to every requested slave tolerance so periodic re-evaluation
    /// does not register as drift
    pub tolerance_widening_ms: u64,

    pub max_broadband_streams_with_broadcast: u32,
    pub max_broadband_streams_no_broadcast: u32,
}

impl SyncConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn tolerance_widening(&self) -> Duration {
        Duration::from_millis(self.tolerance_widening_ms)
    }

    /// Applies `MEDIASYNC_SYNC_*` overrides; unparseable values are logged and skipped
    pub(crate) fn apply_env<F>(&mut self, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        override_millis(lookup, "MEDIASYNC_SYNC_HEARTBEAT_INTERVAL_MS", &mut self.heartbeat_interval_ms);
        override_millis(lookup, "MEDIASYNC_SYNC_POLL_INTERVAL_MS", &mut self.poll_interval_ms);
        override_millis(lookup, "MEDIASYNC_SYNC_TOLERANCE_WIDENING_MS", &mut self.tolerance_widening_ms);
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 10_000,
            poll_interval_ms: 2_000,
            tolerance_widening_ms: 250,
            max_broadband_streams_with_broadcast: 1,
            max_broadband_streams_no_broadcast: 1,
        }
    }
}

fn override_millis<F>(lookup: &F, key: &str, target: &mut u64)
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    let trimmed = raw.trim();
    let parsed = trimmed
        .strip_suffix("ms")
        .unwrap_or(trimmed)
        .trim_end()
        .parse::<u64>();
    match parsed {
        Ok(value) => {
            log::debug!("{} overrides {} ms with {} ms", key, target, value);
            *target = value;
        }
        Err(_) => log::warn!("Ignoring {}={:?}: expected milliseconds", key, raw),
    }
}
