//! Timeline selectors and bound timelines

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker that introduces a period-relative component in a selector
const RELATIVE_PERIOD_MARKER: &str = ":rel:";

/// Opaque identifier of a timeline scheme and instance
///
/// Selectors that contain a relative-period marker (for example
/// `urn:dvb:css:timeline:mpd:period:rel:1000:p1`) are scoped to one DASH
/// period and must be re-issued when the stream moves to another period.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimelineSelector(String);

impl TimelineSelector {
    /// Creates a selector, rejecting empty strings
    pub fn new(selector: impl Into<String>) -> Result<Self> {
        let selector = selector.into();
        if selector.trim().is_empty() {
            return Err(CoreError::EmptySelector);
        }
        Ok(Self(selector))
    }

    /// Returns the selector text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the selector is scoped to a DASH period
    pub fn is_relative_period(&self) -> bool {
        self.0.contains(RELATIVE_PERIOD_MARKER)
    }

    /// Period identifier embedded after the relative-period marker
    ///
    /// The component after the marker is `<ticks>:<period id>[:...]`.
    pub fn relative_period_id(&self) -> Option<&str> {
        let index = self.0.find(RELATIVE_PERIOD_MARKER)?;
        let rest = &self.0[index + RELATIVE_PERIOD_MARKER.len()..];
        rest.split(':').nth(1).filter(|id| !id.is_empty())
    }

    /// Re-issues the selector for another period
    ///
    /// Replaces the first occurrence of `old_period` with `new_period`.
    pub fn with_period(&self, old_period: &str, new_period: &str) -> Self {
        Self(self.0.replacen(old_period, new_period, 1))
    }
}

impl fmt::Display for TimelineSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TimelineSelector {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TimelineSelector {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Properties of a timeline confirmed by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineProperties {
    /// Tick rate of the timeline
    pub units_per_second: f64,
}

impl TimelineProperties {
    /// Creates timeline properties, rejecting non-positive tick rates
    pub fn new(units_per_second: f64) -> Result<Self> {
        if !(units_per_second.is_finite() && units_per_second > 0.0) {
            return Err(CoreError::InvalidTickRate(units_per_second));
        }
        Ok(Self { units_per_second })
    }
}

/// A timeline whose availability has been confirmed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub timeline_selector: TimelineSelector,
    pub timeline_properties: TimelineProperties,
}

impl Timeline {
    /// Creates a timeline for a selector and tick rate
    pub fn new(selector: impl Into<TimelineSelector>, units_per_second: f64) -> Result<Self> {
        Ok(Self {
            timeline_selector: selector.into(),
            timeline_properties: TimelineProperties::new(units_per_second)?,
        })
    }

    /// Returns the selector this timeline was confirmed for
    pub fn selector(&self) -> &TimelineSelector {
        &self.timeline_selector
    }

    /// Returns the tick rate
    pub fn units_per_second(&self) -> f64 {
        self.timeline_properties.units_per_second
    }

    /// Converts seconds to ticks on this timeline
    pub fn to_ticks(&self, seconds: f64) -> f64 {
        seconds * self.units_per_second()
    }

    /// Converts ticks on this timeline to seconds
    pub fn to_seconds(&self, ticks: f64) -> f64 {
        ticks / self.units_per_second()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_selector_rejected() {
        assert_eq!(TimelineSelector::new("  "), Err(CoreError::EmptySelector));
        assert!(TimelineSelector::new("urn:dvb:css:timeline:pts").is_ok());
    }

    #[test]
    fn test_relative_period_id() {
        let selector = TimelineSelector::from("urn:dvb:css:timeline:mpd:period:rel:1000:p1");
        assert!(selector.is_relative_period());
        assert_eq!(selector.relative_period_id(), Some("p1"));
    }

    #[test]
    fn test_relative_period_id_with_trailing_parts() {
        let selector = TimelineSelector::from("urn:dvb:css:timeline:mpd:period:rel:25:p7:extra");
        assert_eq!(selector.relative_period_id(), Some("p7"));
    }

    #[test]
    fn test_non_relative_selector() {
        let selector = TimelineSelector::from("urn:dvb:css:timeline:temi:1:1");
        assert!(!selector.is_relative_period());
        assert_eq!(selector.relative_period_id(), None);
    }

    #[test]
    fn test_relative_selector_without_period() {
        let selector = TimelineSelector::from("urn:dvb:css:timeline:mpd:period:rel:1000");
        assert_eq!(selector.relative_period_id(), None);
    }

    #[test]
    fn test_with_period_reissues_selector() {
        let selector = TimelineSelector::from("urn:dvb:css:timeline:mpd:period:rel:1000:p1");
        let next = selector.with_period("p1", "p2");
        assert_eq!(next.as_str(), "urn:dvb:css:timeline:mpd:period:rel:1000:p2");
        assert_eq!(next.relative_period_id(), Some("p2"));
    }

    #[test]
    fn test_timeline_tick_conversion() {
        let timeline = Timeline::new("urn:dvb:css:timeline:pts", 90_000.0).unwrap();
        assert_eq!(timeline.to_ticks(2.0), 180_000.0);
        assert_eq!(timeline.to_seconds(45_000.0), 0.5);
    }

    #[test]
    fn test_invalid_tick_rate() {
        assert!(Timeline::new("sel", 0.0).is_err());
        assert!(Timeline::new("sel", f64::NAN).is_err());
        assert!(Timeline::new("sel", -1.0).is_err());
    }

    #[test]
    fn test_timeline_serializes_camel_case() {
        let timeline = Timeline::new("sel", 1000.0).unwrap();
        let json = serde_json::to_string(&timeline).unwrap();
        assert!(json.contains("timelineSelector"));
        assert!(json.contains("unitsPerSecond"));
    }
}
