//! Error codes and severities for media synchronisation
//!
//! Every failure a synchroniser reports to an application carries one of the
//! numeric codes below. Codes fall into two severity tiers:
//! - **Transient**: reported, but the session and its slaves keep running
//! - **Permanent**: the session latches into its terminal error state
//!
//! `CoreError` covers the few operations in this crate that can fail outright.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    /// Reported through the error event, the session keeps running
    Transient,
    /// The session enters its terminal permanent-error state
    Permanent,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Permanent => write!(f, "permanent"),
        }
    }
}

/// Closed set of error codes raised by synchronisers and correction clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum SyncErrorCode {
    /// Slave cannot buffer far enough to reach the target position
    InsufficientBuffer = 1,
    /// Slave failed to present media, or the master failed
    PresentationFailed = 2,
    /// Slave timeline selector unavailable or unsupported
    TimelineUnavailable = 3,
    /// Media object already added (or is the master)
    AlreadyAdded = 4,
    /// Correlation timestamp is malformed
    InvalidCorrelationTimestamp = 5,
    /// Synchroniser has not been initialised
    NotInitialised = 7,
    /// Media object was never added
    NotFound = 8,
    /// Slave is not in a suitable state to synchronise
    NotInSuitableState = 9,
    /// Slave could not be aligned with the master
    FailedToSynchronise = 11,
    /// Synchroniser is already in its permanent error state
    InPermanentError = 13,
    /// Master failed because of a network error
    MasterNetworkFailure = 14,
    /// Master timeline selector unavailable or unsupported
    MasterTimelineUnavailable = 15,
    /// Master is not in a suitable state to synchronise
    MasterNotInSuitableState = 16,
    /// Synchroniser was already initialised
    AlreadyInitialised = 17,
    /// Superseded by another synchroniser or the master was removed
    Superseded = 18,
    /// The requested combination of streams is not supported
    UnsupportedStreamCombination = 20,
}

impl SyncErrorCode {
    /// All codes in ascending numeric order
    pub const ALL: [SyncErrorCode; 16] = [
        Self::InsufficientBuffer,
        Self::PresentationFailed,
        Self::TimelineUnavailable,
        Self::AlreadyAdded,
        Self::InvalidCorrelationTimestamp,
        Self::NotInitialised,
        Self::NotFound,
        Self::NotInSuitableState,
        Self::FailedToSynchronise,
        Self::InPermanentError,
        Self::MasterNetworkFailure,
        Self::MasterTimelineUnavailable,
        Self::MasterNotInSuitableState,
        Self::AlreadyInitialised,
        Self::Superseded,
        Self::UnsupportedStreamCombination,
    ];

    /// Returns the numeric error code
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Looks up a code by its numeric value
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.code() == code)
    }

    /// Returns the severity tier of this code
    pub fn severity(self) -> ErrorSeverity {
        match self {
            Self::MasterNetworkFailure
            | Self::MasterTimelineUnavailable
            | Self::MasterNotInSuitableState
            | Self::Superseded => ErrorSeverity::Permanent,
            _ => ErrorSeverity::Transient,
        }
    }

    /// Returns true if this code latches the session into permanent error
    pub fn is_permanent(self) -> bool {
        self.severity() == ErrorSeverity::Permanent
    }

    /// Human-readable description
    pub fn description(self) -> &'static str {
        match self {
            Self::InsufficientBuffer => "insufficient buffer size",
            Self::PresentationFailed => "failure to present media",
            Self::TimelineUnavailable => "timeline selector unavailable or unsupported",
            Self::AlreadyAdded => "media object already added",
            Self::InvalidCorrelationTimestamp => "invalid correlation timestamp",
            Self::NotInitialised => "synchroniser not initialised",
            Self::NotFound => "media object not found",
            Self::NotInSuitableState => "media object not in a suitable state to synchronise",
            Self::FailedToSynchronise => "failed to synchronise media",
            Self::InPermanentError => "synchroniser is in permanent error state",
            Self::MasterNetworkFailure => "master media failed with a network error",
            Self::MasterTimelineUnavailable => "master timeline selector unavailable or unsupported",
            Self::MasterNotInSuitableState => "master media not in a suitable state to synchronise",
            Self::AlreadyInitialised => "synchroniser already initialised",
            Self::Superseded => "synchroniser superseded",
            Self::UnsupportedStreamCombination => "unsupported combination of streams",
        }
    }
}

impl fmt::Display for SyncErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.description())
    }
}

impl TryFrom<u16> for SyncErrorCode {
    type Error = CoreError;

    fn try_from(code: u16) -> Result<Self> {
        Self::from_code(code).ok_or(CoreError::UnknownErrorCode(code))
    }
}

/// Kind of failure a renderer reports for its own media
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaErrorKind {
    /// Fetching was aborted
    Aborted,
    /// A network error interrupted fetching
    Network,
    /// The media could not be decoded
    Decode,
    /// The source format is not supported
    SourceNotSupported,
}

impl MediaErrorKind {
    /// Permanent error code a synchroniser raises when its master fails this way
    pub fn master_failure_code(self) -> SyncErrorCode {
        match self {
            Self::Network => SyncErrorCode::MasterNetworkFailure,
            Self::Aborted | Self::Decode | Self::SourceNotSupported => {
                SyncErrorCode::MasterNotInSuitableState
            }
        }
    }
}

/// Errors from core value constructors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Numeric code outside the closed set
    #[error("Unknown sync error code: {0}")]
    UnknownErrorCode(u16),

    /// Correlation timestamp with a non-numeric component
    #[error("Invalid correlation timestamp: tlvMaster={tlv_master}, tlvOther={tlv_other}")]
    InvalidCorrelationTimestamp { tlv_master: f64, tlv_other: f64 },

    /// Timeline tick rate that is not a positive number
    #[error("Invalid timeline tick rate: {0}")]
    InvalidTickRate(f64),

    /// Empty timeline selector
    #[error("Timeline selector must not be empty")]
    EmptySelector,
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
