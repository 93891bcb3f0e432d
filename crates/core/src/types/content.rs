//! Content identification reported back through the bridge

use super::media::PeriodInfo;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Presentation status of the master content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresentationStatus {
    Okay,
    Transitioning,
    Fault,
}

impl fmt::Display for PresentationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Okay => write!(f, "okay"),
            Self::Transitioning => write!(f, "transitioning"),
            Self::Fault => write!(f, "fault"),
        }
    }
}

/// Whether the reported content identifier may still change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentIdStatus {
    Partial,
    Final,
}

impl fmt::Display for ContentIdStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Partial => write!(f, "partial"),
            Self::Final => write!(f, "final"),
        }
    }
}

/// Builds the content identifier of a master from its source and DASH data
///
/// The identifier is the source URL, followed by `#` and `&`-joined
/// parameters when any period or MPD ancillary data is known.
pub fn build_content_id(
    src: &str,
    current_period: Option<&PeriodInfo>,
    mpd_ci_ancillary: Option<&str>,
) -> String {
    let mut params = Vec::new();
    if let Some(period) = current_period {
        if !period.id.is_empty() {
            params.push(format!("period={}", period.id));
        }
        if let Some(ref data) = period.ci_ancillary {
            params.push(format!("period_ci_ancillary={}", data));
        }
    }
    if let Some(data) = mpd_ci_ancillary {
        params.push(format!("mpd_ci_ancillary={}", data));
    }

    if params.is_empty() {
        src.to_string()
    } else {
        format!("{}#{}", src, params.join("&"))
    }
}

/// Content status the bridge forwards to companion devices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentStatusReport {
    pub content_id: String,
    pub presentation_status: PresentationStatus,
    pub content_id_status: ContentIdStatus,
    /// Material resolution server URL, empty when unknown
    pub mrs_url: String,
}
