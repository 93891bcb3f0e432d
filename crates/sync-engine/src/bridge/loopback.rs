// crates/sync-engine/src/bridge/loopback.rs
//! In-process timeline bridge
//!
//! Confirms every monitored selector with a `TimelineAvailable` event and
//! acknowledges inter-device toggles. Events are queued and only delivered
//! by `flush`, which stands in for their asynchronous arrival from native
//! code.

use super::{BridgeEvent, BridgeSessionId, TimelineBridge};
use crate::error::{SyncError, SyncResult};
use crate::event::EventBus;
use mediasync_core::{ContentStatusReport, Timeline, TimelineSelector};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

/// A call received by the loopback bridge
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeCall {
    AllocateSession {
        broadcast: bool,
    },
    DestroySession(BridgeSessionId),
    StartMonitoring {
        id: BridgeSessionId,
        selector: TimelineSelector,
        is_master: bool,
    },
    StopMonitoring {
        id: BridgeSessionId,
        selector: TimelineSelector,
        is_master: bool,
    },
    SetAvailability {
        id: BridgeSessionId,
        selector: TimelineSelector,
        available: bool,
        ticks: f64,
        speed: f64,
    },
    ContentTimeAndSpeed {
        id: BridgeSessionId,
        selector: TimelineSelector,
        ticks: f64,
        speed: f64,
    },
    ContentStatus {
        id: BridgeSessionId,
        report: ContentStatusReport,
    },
    EnableInterDeviceSync(BridgeSessionId),
    DisableInterDeviceSync(BridgeSessionId),
    SetContentIdOverride {
        id: BridgeSessionId,
        value: Option<String>,
    },
}

/// Timeline bridge that answers from memory
pub struct LoopbackBridge {
    events: Rc<EventBus<BridgeEvent>>,
    pending: RefCell<VecDeque<BridgeEvent>>,
    calls: RefCell<Vec<BridgeCall>>,
    next_session: Cell<u64>,
    live_sessions: RefCell<HashSet<BridgeSessionId>>,
    refuse_allocation: Cell<bool>,
    refused_selectors: RefCell<HashSet<TimelineSelector>>,
    default_units_per_second: Cell<f64>,
    units_per_second: RefCell<HashMap<TimelineSelector, f64>>,
    broadcast_ticks: RefCell<HashMap<TimelineSelector, f64>>,
    overrides: RefCell<HashMap<BridgeSessionId, String>>,
    fault: RefCell<Option<String>>,
    fault_countdown: RefCell<Option<(usize, String)>>,
}

impl LoopbackBridge {
    /// Creates a bridge confirming timelines at 1000 units per second
    pub fn new() -> Self {
        Self {
            events: Rc::new(EventBus::new()),
            pending: RefCell::new(VecDeque::new()),
            calls: RefCell::new(Vec::new()),
            next_session: Cell::new(1),
            live_sessions: RefCell::new(HashSet::new()),
            refuse_allocation: Cell::new(false),
            refused_selectors: RefCell::new(HashSet::new()),
            default_units_per_second: Cell::new(1000.0),
            units_per_second: RefCell::new(HashMap::new()),
            broadcast_ticks: RefCell::new(HashMap::new()),
            overrides: RefCell::new(HashMap::new()),
            fault: RefCell::new(None),
            fault_countdown: RefCell::new(None),
        }
    }

    /// Tick rate announced for selectors without their own rate
    pub fn set_default_units_per_second(&self, units_per_second: f64) {
        self.default_units_per_second.set(units_per_second);
    }

    /// Tick rate announced for one selector
    pub fn set_units_per_second(&self, selector: impl Into<TimelineSelector>, units: f64) {
        self.units_per_second
            .borrow_mut()
            .insert(selector.into(), units);
    }

    /// Makes `allocate_session` refuse
    pub fn refuse_allocation(&self, refuse: bool) {
        self.refuse_allocation.set(refuse);
    }

    /// Makes `start_timeline_monitoring` refuse a selector
    pub fn refuse_selector(&self, selector: impl Into<TimelineSelector>) {
        self.refused_selectors.borrow_mut().insert(selector.into());
    }

    /// Sets the value `broadcast_current_ticks` reports for a selector
    pub fn set_broadcast_ticks(&self, selector: impl Into<TimelineSelector>, ticks: Option<f64>) {
        let selector = selector.into();
        let mut table = self.broadcast_ticks.borrow_mut();
        match ticks {
            Some(ticks) => {
                table.insert(selector, ticks);
            }
            None => {
                table.remove(&selector);
            }
        }
    }

    /// Makes every later operation fail with `SyncError::Bridge`
    pub fn inject_fault(&self, message: Option<&str>) {
        *self.fault.borrow_mut() = message.map(str::to_string);
    }

    /// Lets `calls` more operations succeed, then behaves as `inject_fault`
    pub fn inject_fault_after(&self, calls: usize, message: &str) {
        *self.fault_countdown.borrow_mut() = Some((calls, message.to_string()));
    }

    /// Queues an event for the next `flush`
    pub fn queue(&self, event: BridgeEvent) {
        self.pending.borrow_mut().push_back(event);
    }

    /// Queues a `TimelineUnavailable` for a selector
    pub fn announce_unavailable(&self, selector: impl Into<TimelineSelector>) {
        self.queue(BridgeEvent::TimelineUnavailable(selector.into()));
    }

    /// Delivers queued events, including ones queued while delivering
    ///
    /// Returns the number of events delivered.
    pub fn flush(&self) -> usize {
        let mut delivered = 0;
        loop {
            let next = self.pending.borrow_mut().pop_front();
            let Some(event) = next else {
                break;
            };
            log::debug!("Loopback bridge delivering {:?}", event);
            self.events.emit(&event);
            delivered += 1;
        }
        delivered
    }

    pub fn pending_events(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Every call received so far
    pub fn calls(&self) -> Vec<BridgeCall> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    /// Number of `destroy_session` calls for `id`
    pub fn destroy_count(&self, id: BridgeSessionId) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| matches!(call, BridgeCall::DestroySession(d) if *d == id))
            .count()
    }

    pub fn is_live(&self, id: BridgeSessionId) -> bool {
        self.live_sessions.borrow().contains(&id)
    }

    fn check_fault(&self) -> SyncResult<()> {
        let armed = {
            let mut countdown = self.fault_countdown.borrow_mut();
            match countdown.as_mut() {
                Some((0, _)) => countdown.take().map(|(_, message)| message),
                Some((remaining, _)) => {
                    *remaining -= 1;
                    None
                }
                None => None,
            }
        };
        if let Some(message) = armed {
            *self.fault.borrow_mut() = Some(message);
        }
        match self.fault.borrow().as_ref() {
            Some(message) => Err(SyncError::Bridge(message.clone())),
            None => Ok(()),
        }
    }

    fn record(&self, call: BridgeCall) -> SyncResult<()> {
        self.check_fault()?;
        self.calls.borrow_mut().push(call);
        Ok(())
    }

    fn units_for(&self, selector: &TimelineSelector) -> f64 {
        self.units_per_second
            .borrow()
            .get(selector)
            .copied()
            .unwrap_or_else(|| self.default_units_per_second.get())
    }
}

impl Default for LoopbackBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl TimelineBridge for LoopbackBridge {
    fn allocate_session(&self, master_is_broadcast: bool) -> SyncResult<Option<BridgeSessionId>> {
        self.record(BridgeCall::AllocateSession {
            broadcast: master_is_broadcast,
        })?;
        if self.refuse_allocation.get() {
            return Ok(None);
        }
        let id = BridgeSessionId::new(self.next_session.get());
        self.next_session.set(id.raw() + 1);
        self.live_sessions.borrow_mut().insert(id);
        Ok(Some(id))
    }

    fn destroy_session(&self, id: BridgeSessionId) -> SyncResult<()> {
        self.record(BridgeCall::DestroySession(id))?;
        self.live_sessions.borrow_mut().remove(&id);
        self.overrides.borrow_mut().remove(&id);
        Ok(())
    }

    fn start_timeline_monitoring(
        &self,
        id: BridgeSessionId,
        selector: &TimelineSelector,
        is_master: bool,
    ) -> SyncResult<bool> {
        self.record(BridgeCall::StartMonitoring {
            id,
            selector: selector.clone(),
            is_master,
        })?;
        if self.refused_selectors.borrow().contains(selector) {
            return Ok(false);
        }
        let timeline = Timeline::new(selector.clone(), self.units_for(selector))?;
        self.queue(BridgeEvent::TimelineAvailable(timeline));
        Ok(true)
    }

    fn stop_timeline_monitoring(
        &self,
        id: BridgeSessionId,
        selector: &TimelineSelector,
        is_master: bool,
    ) -> SyncResult<()> {
        self.record(BridgeCall::StopMonitoring {
            id,
            selector: selector.clone(),
            is_master,
        })
    }

    fn set_timeline_availability(
        &self,
        id: BridgeSessionId,
        selector: &TimelineSelector,
        available: bool,
        ticks: f64,
        speed: f64,
    ) -> SyncResult<bool> {
        self.record(BridgeCall::SetAvailability {
            id,
            selector: selector.clone(),
            available,
            ticks,
            speed,
        })?;
        Ok(true)
    }

    fn set_content_time_and_speed(
        &self,
        id: BridgeSessionId,
        selector: &TimelineSelector,
        ticks: f64,
        speed: f64,
    ) -> SyncResult<()> {
        self.record(BridgeCall::ContentTimeAndSpeed {
            id,
            selector: selector.clone(),
            ticks,
            speed,
        })
    }

    fn report_content_status(
        &self,
        id: BridgeSessionId,
        report: &ContentStatusReport,
    ) -> SyncResult<()> {
        self.record(BridgeCall::ContentStatus {
            id,
            report: report.clone(),
        })
    }

    fn broadcast_current_ticks(&self, selector: &TimelineSelector) -> SyncResult<Option<f64>> {
        self.check_fault()?;
        Ok(self.broadcast_ticks.borrow().get(selector).copied())
    }

    fn enable_inter_device_sync(&self, id: BridgeSessionId) -> SyncResult<()> {
        self.record(BridgeCall::EnableInterDeviceSync(id))?;
        self.queue(BridgeEvent::InterDeviceSyncEnabled(id));
        Ok(())
    }

    fn disable_inter_device_sync(&self, id: BridgeSessionId) -> SyncResult<()> {
        self.record(BridgeCall::DisableInterDeviceSync(id))?;
        self.queue(BridgeEvent::InterDeviceSyncDisabled(id));
        Ok(())
    }

    fn content_id_override(&self, id: BridgeSessionId) -> SyncResult<Option<String>> {
        self.check_fault()?;
        Ok(self.overrides.borrow().get(&id).cloned())
    }

    fn set_content_id_override(
        &self,
        id: BridgeSessionId,
        value: Option<&str>,
    ) -> SyncResult<()> {
        self.record(BridgeCall::SetContentIdOverride {
            id,
            value: value.map(str::to_string),
        })?;
        let mut overrides = self.overrides.borrow_mut();
        match value.filter(|v| !v.is_empty()) {
            Some(value) => {
                overrides.insert(id, value.to_string());
            }
            None => {
                overrides.remove(&id);
            }
        }
        Ok(())
    }

    fn events(&self) -> Rc<EventBus<BridgeEvent>> {
        self.events.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(bridge: &LoopbackBridge) -> Rc<RefCell<Vec<BridgeEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        bridge
            .events()
            .subscribe(move |e: &BridgeEvent| s.borrow_mut().push(e.clone()));
        seen
    }

    #[test]
    fn test_monitoring_confirms_timeline_on_flush() {
        let bridge = LoopbackBridge::new();
        bridge.set_units_per_second("urn:pts", 90_000.0);
        let seen = collect(&bridge);

        let id = bridge.allocate_session(false).unwrap().unwrap();
        let selector = TimelineSelector::from("urn:pts");
        assert!(bridge.start_timeline_monitoring(id, &selector, true).unwrap());
        assert!(seen.borrow().is_empty());

        assert_eq!(bridge.flush(), 1);
        let expected = Timeline::new("urn:pts", 90_000.0).unwrap();
        assert_eq!(*seen.borrow(), vec![BridgeEvent::TimelineAvailable(expected)]);
    }

    #[test]
    fn test_refused_selector() {
        let bridge = LoopbackBridge::new();
        bridge.refuse_selector("urn:bad");
        let id = bridge.allocate_session(false).unwrap().unwrap();

        let accepted = bridge
            .start_timeline_monitoring(id, &TimelineSelector::from("urn:bad"), false)
            .unwrap();
        assert!(!accepted);
        assert_eq!(bridge.pending_events(), 0);
    }

    #[test]
    fn test_refused_allocation() {
        let bridge = LoopbackBridge::new();
        bridge.refuse_allocation(true);
        assert_eq!(bridge.allocate_session(true).unwrap(), None);
    }

    #[test]
    fn test_delayed_fault_arms_after_countdown() {
        let bridge = LoopbackBridge::new();
        bridge.inject_fault_after(1, "late");
        let id = bridge.allocate_session(false).unwrap().unwrap();

        let selector = TimelineSelector::from("urn:pts");
        assert!(bridge.start_timeline_monitoring(id, &selector, true).is_err());
        assert!(bridge.destroy_session(id).is_err());
        assert_eq!(bridge.calls().len(), 1);
    }

    #[test]
    fn test_injected_fault_propagates() {
        let bridge = LoopbackBridge::new();
        bridge.inject_fault(Some("gone"));
        assert!(matches!(
            bridge.allocate_session(false),
            Err(SyncError::Bridge(message)) if message == "gone"
        ));
    }

    #[test]
    fn test_inter_device_acknowledged() {
        let bridge = LoopbackBridge::new();
        let seen = collect(&bridge);
        let id = bridge.allocate_session(false).unwrap().unwrap();

        bridge.enable_inter_device_sync(id).unwrap();
        bridge.disable_inter_device_sync(id).unwrap();
        bridge.flush();

        assert_eq!(
            *seen.borrow(),
            vec![
                BridgeEvent::InterDeviceSyncEnabled(id),
                BridgeEvent::InterDeviceSyncDisabled(id)
            ]
        );
    }

    #[test]
    fn test_content_id_override() {
        let bridge = LoopbackBridge::new();
        let id = bridge.allocate_session(false).unwrap().unwrap();

        bridge.set_content_id_override(id, Some("dvb://1.2.3")).unwrap();
        assert_eq!(
            bridge.content_id_override(id).unwrap(),
            Some("dvb://1.2.3".to_string())
        );

        bridge.set_content_id_override(id, Some("")).unwrap();
        assert_eq!(bridge.content_id_override(id).unwrap(), None);
    }

    #[test]
    fn test_destroy_bookkeeping() {
        let bridge = LoopbackBridge::new();
        let id = bridge.allocate_session(false).unwrap().unwrap();
        assert!(bridge.is_live(id));

        bridge.destroy_session(id).unwrap();
        assert!(!bridge.is_live(id));
        assert_eq!(bridge.destroy_count(id), 1);
    }

    #[test]
    fn test_broadcast_ticks() {
        let bridge = LoopbackBridge::new();
        let selector = TimelineSelector::from("urn:temi");
        assert_eq!(bridge.broadcast_current_ticks(&selector).unwrap(), None);

        bridge.set_broadcast_ticks("urn:temi", Some(900.0));
        assert_eq!(bridge.broadcast_current_ticks(&selector).unwrap(), Some(900.0));
    }
}
