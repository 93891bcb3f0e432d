// crates/sync-engine/src/period.rs
//! DASH period tracking for period-relative timeline selectors
//!
//! A selector such as `urn:dvb:css:timeline:mpd:period:rel:1000:p1` is only
//! valid while the stream plays period `p1`. `PeriodTracker` re-issues the
//! selector for each new period and remembers every selector it issued so
//! that selectors of periods dropped from the manifest can be retired.

use mediasync_core::{PeriodInfo, TimelineSelector};
use std::collections::BTreeMap;

/// Periods that appeared in or disappeared from a manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodDelta {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl PeriodDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compares the periods selectors were issued for with a live period list
pub fn diff_periods<'a>(
    known: impl IntoIterator<Item = &'a str>,
    live: &[PeriodInfo],
) -> PeriodDelta {
    let known: Vec<&str> = known.into_iter().collect();

    let removed = known
        .iter()
        .filter(|id| !live.iter().any(|p| p.id == **id))
        .map(|id| id.to_string())
        .collect();
    let added = live
        .iter()
        .filter(|p| !known.contains(&p.id.as_str()))
        .map(|p| p.id.clone())
        .collect();

    PeriodDelta { added, removed }
}

/// Result of a period change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodTransition {
    /// Selector of the period being left
    pub previous: TimelineSelector,
    /// Selector for the new period
    pub next: TimelineSelector,
    /// False when the selector was issued before and is still monitored
    pub newly_issued: bool,
}

/// Follows period changes for one period-relative selector
#[derive(Debug, Clone)]
pub struct PeriodTracker {
    current: TimelineSelector,
    current_period: Option<String>,
    issued: BTreeMap<String, TimelineSelector>,
}

impl PeriodTracker {
    /// Returns a tracker if `selector` is period-relative
    pub fn new(selector: &TimelineSelector) -> Option<Self> {
        if !selector.is_relative_period() {
            return None;
        }
        Some(Self {
            current: selector.clone(),
            current_period: selector.relative_period_id().map(str::to_string),
            issued: BTreeMap::new(),
        })
    }

    pub fn current_selector(&self) -> &TimelineSelector {
        &self.current
    }

    /// Period named by the current selector
    pub fn current_period(&self) -> Option<&str> {
        self.current_period.as_deref()
    }

    /// Records the current selector as issued for its period
    pub fn track_current(&mut self) {
        if let Some(period) = self.current_period.clone() {
            self.issued.insert(period, self.current.clone());
        }
    }

    /// Selectors issued so far, keyed by period id
    pub fn issued(&self) -> &BTreeMap<String, TimelineSelector> {
        &self.issued
    }

    /// Handles a move to `period_id`
    ///
    /// Returns `None` when nothing changes: the period is the current one or
    /// the selector never named a period.
    pub fn on_period_changed(&mut self, period_id: &str) -> Option<PeriodTransition> {
        let current_period = self.current_period.clone()?;
        if current_period == period_id {
            return None;
        }

        let next = self.current.with_period(&current_period, period_id);
        let next_period = next.relative_period_id()?.to_string();
        let previous = self
            .issued
            .get(&current_period)
            .cloned()
            .unwrap_or_else(|| self.current.clone());

        let newly_issued = self.issued.get(&next_period) != Some(&next);
        if newly_issued {
            self.issued.insert(next_period.clone(), next.clone());
        }
        self.current = next.clone();
        self.current_period = Some(next_period);

        Some(PeriodTransition {
            previous,
            next,
            newly_issued,
        })
    }

    /// Forgets selectors of periods missing from `live`, returning them
    pub fn prune(&mut self, live: &[PeriodInfo]) -> Vec<TimelineSelector> {
        let delta = diff_periods(self.issued.keys().map(String::as_str), live);
        if !delta.added.is_empty() {
            log::info!("Added periods: {:?}", delta.added);
        }
        if !delta.removed.is_empty() {
            log::info!("Removed periods: {:?}", delta.removed);
        }

        delta
            .removed
            .iter()
            .filter_map(|period| self.issued.remove(period))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SELECTOR: &str = "urn:dvb:css:timeline:mpd:period:rel:1000:p1";

    fn periods(ids: &[&str]) -> Vec<PeriodInfo> {
        ids.iter().map(|id| PeriodInfo::new(*id)).collect()
    }

    #[test]
    fn test_only_relative_selectors_are_tracked() {
        assert!(PeriodTracker::new(&TimelineSelector::from("urn:dvb:css:timeline:pts")).is_none());
        let tracker = PeriodTracker::new(&TimelineSelector::from(SELECTOR)).unwrap();
        assert_eq!(tracker.current_period(), Some("p1"));
    }

    #[test]
    fn test_diff_reports_added_and_removed_separately() {
        let delta = diff_periods(["p1", "p2"], &periods(&["p2", "p3"]));
        assert_eq!(delta.removed, vec!["p1".to_string()]);
        assert_eq!(delta.added, vec!["p3".to_string()]);
        assert!(diff_periods(["p1"], &periods(&["p1"])).is_empty());
    }

    #[test]
    fn test_period_change_reissues_selector() {
        let mut tracker = PeriodTracker::new(&TimelineSelector::from(SELECTOR)).unwrap();
        tracker.track_current();

        let transition = tracker.on_period_changed("p2").unwrap();
        assert_eq!(transition.previous.as_str(), SELECTOR);
        assert_eq!(
            transition.next.as_str(),
            "urn:dvb:css:timeline:mpd:period:rel:1000:p2"
        );
        assert!(transition.newly_issued);
        assert_eq!(tracker.current_period(), Some("p2"));
        assert_eq!(tracker.issued().len(), 2);
    }

    #[test]
    fn test_same_period_is_ignored() {
        let mut tracker = PeriodTracker::new(&TimelineSelector::from(SELECTOR)).unwrap();
        assert!(tracker.on_period_changed("p1").is_none());
    }

    #[test]
    fn test_returning_to_known_period_is_not_new() {
        let mut tracker = PeriodTracker::new(&TimelineSelector::from(SELECTOR)).unwrap();
        tracker.track_current();
        tracker.on_period_changed("p2").unwrap();

        let back = tracker.on_period_changed("p1").unwrap();
        assert!(!back.newly_issued);
        assert_eq!(back.next.as_str(), SELECTOR);
    }

    #[test]
    fn test_prune_returns_selectors_of_removed_periods() {
        let mut tracker = PeriodTracker::new(&TimelineSelector::from(SELECTOR)).unwrap();
        tracker.track_current();
        tracker.on_period_changed("p2").unwrap();

        let stopped = tracker.prune(&periods(&["p2", "p3"]));
        assert_eq!(stopped, vec![TimelineSelector::from(SELECTOR)]);
        assert_eq!(tracker.issued().len(), 1);
    }

    #[test]
    fn test_selector_without_period_never_transitions() {
        let selector = TimelineSelector::from("urn:dvb:css:timeline:mpd:period:rel:1000");
        let mut tracker = PeriodTracker::new(&selector).unwrap();
        assert!(tracker.on_period_changed("p9").is_none());
    }
}
