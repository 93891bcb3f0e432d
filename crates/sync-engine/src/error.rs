// crates/sync-engine/src/error.rs
//! Error types for sync operations
//!
//! Expected failures of the session API are reported as `SyncErrorCode`s on
//! the session's event stream. `SyncError` covers what cannot be reported
//! that way: faults raised by the timeline bridge and handles the renderer
//! host does not know.

use mediasync_core::{CoreError, RendererId};
use thiserror::Error;

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during synchronisation
#[derive(Debug, Error)]
pub enum SyncError {
    /// Unexpected fault reported by the timeline bridge
    #[error("Timeline bridge error: {0}")]
    Bridge(String),

    /// Renderer handle not present in the host's table
    #[error("Unknown renderer: {0}")]
    UnknownRenderer(RendererId),

    /// Invalid core value
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Runtime driving the scheduler could not be built
    #[error("Scheduler runtime error: {0}")]
    Runtime(#[from] std::io::Error),

    /// Custom error
    #[error("{0}")]
    Custom(String),
}
