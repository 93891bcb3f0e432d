//! Renderer handles and playback state enums

use serde::{Deserialize, Serialize};
use std::fmt;

/// Non-owning handle to a renderer in the embedding host's table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RendererId(u64);

impl RendererId {
    /// Creates a handle from the host's raw index
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw index
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RendererId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "renderer#{}", self.0)
    }
}

/// What kind of playback source a renderer is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    /// A regular media element with a seekable position
    Element,
    /// A broadcast presentation whose time comes from the bridge
    Broadcast,
}

impl MediaKind {
    pub fn is_broadcast(&self) -> bool {
        matches!(self, MediaKind::Broadcast)
    }
}

/// How much media a renderer has available at its current position
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReadyState {
    HaveNothing = 0,
    HaveMetadata = 1,
    HaveCurrentData = 2,
    HaveFutureData = 3,
    HaveEnoughData = 4,
}

impl ReadyState {
    /// Returns true at or past the "has current data" threshold
    pub fn has_current_data(&self) -> bool {
        *self >= ReadyState::HaveCurrentData
    }
}

/// Presentation state of a broadcast renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayState {
    Unrealized,
    Connecting,
    Presenting,
    Stopped,
}

impl PlayState {
    /// Returns true when the broadcast cannot provide a timeline
    pub fn is_inactive(&self) -> bool {
        matches!(self, PlayState::Unrealized | PlayState::Stopped)
    }
}

/// A DASH period as reported by the renderer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodInfo {
    pub id: String,
    /// Content-identifier ancillary data attached to the period
    pub ci_ancillary: Option<String>,
}

impl PeriodInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ci_ancillary: None,
        }
    }

    pub fn with_ci_ancillary(mut self, data: impl Into<String>) -> Self {
        self.ci_ancillary = Some(data.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_state_threshold() {
        assert!(!ReadyState::HaveNothing.has_current_data());
        assert!(!ReadyState::HaveMetadata.has_current_data());
        assert!(ReadyState::HaveCurrentData.has_current_data());
        assert!(ReadyState::HaveEnoughData.has_current_data());
    }

    #[test]
    fn test_play_state_inactive() {
        assert!(PlayState::Unrealized.is_inactive());
        assert!(PlayState::Stopped.is_inactive());
        assert!(!PlayState::Presenting.is_inactive());
        assert!(!PlayState::Connecting.is_inactive());
    }

    #[test]
    fn test_renderer_id_display() {
        assert_eq!(RendererId::new(7).to_string(), "renderer#7");
    }
}
