//! Correlation timestamps and drift tolerance

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};

/// Pairs a tick value on the master timeline with the matching tick value
/// on a slave's own timeline
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationTimestamp {
    /// Tick value on the master timeline
    pub tlv_master: f64,
    /// Corresponding tick value on the slave timeline
    pub tlv_other: f64,
}

impl CorrelationTimestamp {
    /// Creates a correlation timestamp without validation
    pub fn new(tlv_master: f64, tlv_other: f64) -> Self {
        Self {
            tlv_master,
            tlv_other,
        }
    }

    /// Returns true if both tick values are numbers
    pub fn is_valid(&self) -> bool {
        !self.tlv_master.is_nan() && !self.tlv_other.is_nan()
    }

    /// Returns the timestamp if both tick values are numbers
    pub fn validated(self) -> Result<Self> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(CoreError::InvalidCorrelationTimestamp {
                tlv_master: self.tlv_master,
                tlv_other: self.tlv_other,
            })
        }
    }

    /// Offset in seconds that maps a master position onto the slave timeline
    ///
    /// `slave = master + offset_seconds(...)`.
    pub fn offset_seconds(&self, master_tick_rate: f64, other_tick_rate: f64) -> f64 {
        self.tlv_other / other_tick_rate - self.tlv_master / master_tick_rate
    }
}

/// Accepted drift between a slave and the master, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Tolerance(f64);

impl Tolerance {
    /// Sanitises an application-supplied tolerance
    ///
    /// Missing, NaN and negative values become zero.
    pub fn from_requested(millis: Option<f64>) -> Self {
        match millis {
            Some(ms) if ms.is_finite() && ms >= 0.0 => Self(ms),
            _ => Self(0.0),
        }
    }

    /// Widens the tolerance by a fixed amount of milliseconds
    pub fn widened(self, by_millis: f64) -> Self {
        Self(self.0 + by_millis.max(0.0))
    }

    /// Returns the tolerance in milliseconds
    pub fn as_millis(&self) -> f64 {
        self.0
    }

    /// Returns the tolerance in seconds
    pub fn as_secs(&self) -> f64 {
        self.0 / 1000.0
    }
}
