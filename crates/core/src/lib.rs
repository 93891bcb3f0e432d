//! Core data model for media timeline synchronisation
//!
//! Shared by the sync engine and its embedders: timeline selectors,
//! correlation timestamps, tolerances, the normalised content-time signal
//! and the closed set of error codes a synchroniser can raise.

pub mod error;
pub mod types;

// Re-export commonly used types
pub use error::{CoreError, ErrorSeverity, MediaErrorKind, Result, SyncErrorCode};
pub use types::{
    build_content_id, ContentIdStatus, ContentStatusReport, ContentTimeSignal,
    CorrelationTimestamp, MediaKind, PeriodInfo, PlayState, PresentationStatus, ReadyState,
    RendererId, TimeRanges, Timeline, TimelineProperties, TimelineSelector, Tolerance,
};
