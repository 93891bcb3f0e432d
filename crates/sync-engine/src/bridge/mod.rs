// crates/sync-engine/src/bridge/mod.rs
//! Timeline bridge seam
//!
//! The bridge is the native side of synchronisation: it owns bridge-side
//! session identifiers, decides whether a timeline selector can be monitored,
//! and later confirms or withdraws timelines through its event bus. Every
//! operation is fallible so that transport faults reach the caller unchanged.

mod loopback;

pub use loopback::{BridgeCall, LoopbackBridge};

use crate::error::SyncResult;
use crate::event::EventBus;
use mediasync_core::{ContentStatusReport, Timeline, TimelineSelector};
use std::fmt;
use std::rc::Rc;

/// Bridge-side identifier of a synchronisation session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BridgeSessionId(u64);

impl BridgeSessionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BridgeSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sync-session#{}", self.0)
    }
}

/// Notifications delivered by the bridge
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// A monitored timeline is now available
    TimelineAvailable(Timeline),
    /// A timeline is no longer available
    TimelineUnavailable(TimelineSelector),
    InterDeviceSyncEnabled(BridgeSessionId),
    InterDeviceSyncDisabled(BridgeSessionId),
}

/// Operations the engine consumes from the native bridge
pub trait TimelineBridge {
    /// Allocates a bridge session; `None` when the bridge refuses
    fn allocate_session(&self, master_is_broadcast: bool) -> SyncResult<Option<BridgeSessionId>>;

    fn destroy_session(&self, id: BridgeSessionId) -> SyncResult<()>;

    /// Starts monitoring a timeline; `false` when the selector is unsupported
    fn start_timeline_monitoring(
        &self,
        id: BridgeSessionId,
        selector: &TimelineSelector,
        is_master: bool,
    ) -> SyncResult<bool>;

    fn stop_timeline_monitoring(
        &self,
        id: BridgeSessionId,
        selector: &TimelineSelector,
        is_master: bool,
    ) -> SyncResult<()>;

    fn set_timeline_availability(
        &self,
        id: BridgeSessionId,
        selector: &TimelineSelector,
        available: bool,
        ticks: f64,
        speed: f64,
    ) -> SyncResult<bool>;

    /// Publishes the master timeline position
    fn set_content_time_and_speed(
        &self,
        id: BridgeSessionId,
        selector: &TimelineSelector,
        ticks: f64,
        speed: f64,
    ) -> SyncResult<()>;

    fn report_content_status(
        &self,
        id: BridgeSessionId,
        report: &ContentStatusReport,
    ) -> SyncResult<()>;

    /// Current tick count of a broadcast timeline, if known
    fn broadcast_current_ticks(&self, selector: &TimelineSelector) -> SyncResult<Option<f64>>;

    fn enable_inter_device_sync(&self, id: BridgeSessionId) -> SyncResult<()>;

    fn disable_inter_device_sync(&self, id: BridgeSessionId) -> SyncResult<()>;

    fn content_id_override(&self, id: BridgeSessionId) -> SyncResult<Option<String>>;

    fn set_content_id_override(&self, id: BridgeSessionId, value: Option<&str>)
        -> SyncResult<()>;

    fn events(&self) -> Rc<EventBus<BridgeEvent>>;
}
