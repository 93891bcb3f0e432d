// crates/sync-engine/src/session.rs
//! Synchronisation session
//!
//! `MediaSynchroniser` binds one master renderer, keeps a correction
//! client per attached slave, and reports the master timeline to the
//! bridge. Expected failures never surface as `Err`: they are delivered as
//! `SessionEvent::Error` with a numeric code. Permanent codes latch the
//! session into a terminal state where every resource has been released.

use crate::bridge::{BridgeEvent, BridgeSessionId, TimelineBridge};
use crate::client::{ClientContext, ClientEvent, ClientOptions, CorrectionClient};
use crate::error::SyncResult;
use crate::event::{EventBus, SubscriptionHandle};
use crate::observer::{MasterObserver, ObserverEvent};
use crate::period::PeriodTracker;
use crate::registry::{SessionKey, Supersedable, SynchronizerRegistry};
use crate::renderer::{RendererEvent, RendererHost};
use crate::scheduler::Scheduler;
use mediasync_config::SyncConfig;
use mediasync_core::{
    build_content_id, ContentIdStatus, ContentStatusReport, CorrelationTimestamp, MediaKind,
    PresentationStatus, RendererId, SyncErrorCode, TimelineSelector, Tolerance,
};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

/// Collaborators a session is built from
#[derive(Clone)]
pub struct SyncContext {
    pub registry: Rc<SynchronizerRegistry>,
    pub bridge: Rc<dyn TimelineBridge>,
    pub host: Rc<dyn RendererHost>,
    pub scheduler: Rc<Scheduler>,
    pub config: SyncConfig,
}

/// Events raised by a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    SynchroniserInitialised,
    MediaObjectAdded {
        renderer: RendererId,
    },
    SyncNowAchievable {
        renderer: RendererId,
    },
    Error {
        last_error: SyncErrorCode,
        last_error_source: Option<RendererId>,
    },
}

/// Optional arguments of `add_media_object`
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    /// Defaults to a zero offset
    pub correlation: Option<CorrelationTimestamp>,
    /// Requested tolerance in milliseconds, before widening
    pub tolerance_ms: Option<f64>,
    pub multi_decoder_mode: bool,
}

impl AddOptions {
    pub fn with_correlation(mut self, correlation: CorrelationTimestamp) -> Self {
        self.correlation = Some(correlation);
        self
    }

    pub fn with_tolerance_ms(mut self, tolerance_ms: f64) -> Self {
        self.tolerance_ms = Some(tolerance_ms);
        self
    }

    pub fn with_multi_decoder_mode(mut self, enabled: bool) -> Self {
        self.multi_decoder_mode = enabled;
        self
    }
}

/// Fires once when the bridge acknowledges an inter-device toggle
pub type InterDeviceCallback = Box<dyn FnOnce()>;

struct MasterBinding {
    renderer: RendererId,
    kind: MediaKind,
    selector: TimelineSelector,
    observer: Rc<MasterObserver>,
    observer_sub: Option<SubscriptionHandle>,
    bridge_sub: Option<SubscriptionHandle>,
    renderer_sub: Option<(Rc<EventBus<RendererEvent>>, SubscriptionHandle)>,
    periods: Option<PeriodTracker>,
    content_id: String,
}

struct SlaveEntry {
    client: Rc<CorrectionClient>,
    client_sub: SubscriptionHandle,
    renderer_source: Rc<EventBus<RendererEvent>>,
    renderer_sub: SubscriptionHandle,
}

impl SlaveEntry {
    fn detach(self) -> TimelineSelector {
        self.client.events().unsubscribe(self.client_sub);
        self.renderer_source.unsubscribe(self.renderer_sub);
        let selector = self.client.selector();
        self.client.destroy();
        selector
    }
}

#[derive(Default)]
struct SessionState {
    master: Option<MasterBinding>,
    bridge_session: Option<BridgeSessionId>,
    slaves: BTreeMap<RendererId, SlaveEntry>,
    permanent_error: bool,
    last_error: Option<SyncErrorCode>,
    last_error_source: Option<RendererId>,
    inter_device_sync_enabled: bool,
    on_enabled: Option<InterDeviceCallback>,
    on_disabled: Option<InterDeviceCallback>,
}

/// A synchronisation session
pub struct MediaSynchroniser {
    key: SessionKey,
    ctx: SyncContext,
    self_ref: Weak<MediaSynchroniser>,
    state: RefCell<SessionState>,
    events: EventBus<SessionEvent>,
}

impl MediaSynchroniser {
    pub fn new(ctx: SyncContext) -> Rc<Self> {
        Rc::new_cyclic(|self_ref| Self {
            key: SessionKey::new(),
            ctx,
            self_ref: self_ref.clone(),
            state: RefCell::new(SessionState::default()),
            events: EventBus::new(),
        })
    }

    pub fn key(&self) -> SessionKey {
        self.key
    }

    pub fn events(&self) -> &EventBus<SessionEvent> {
        &self.events
    }

    /// Binds `master` and starts following its timeline
    pub fn init_media_synchroniser(
        &self,
        master: RendererId,
        selector: impl Into<TimelineSelector>,
    ) -> SyncResult<()> {
        let selector = selector.into();

        if self.in_permanent_error() {
            self.raise(SyncErrorCode::InPermanentError, None);
            return Ok(());
        }
        if self.ctx.registry.is_current(self.key) {
            self.raise(SyncErrorCode::AlreadyInitialised, None);
            return Ok(());
        }

        let snapshot = self.ctx.host.snapshot(master)?;
        let kind = snapshot.kind;
        if !kind.is_broadcast() && (!snapshot.ready_state.has_current_data() || snapshot.ended) {
            self.fail_permanently(SyncErrorCode::MasterNotInSuitableState, Some(master));
            return Ok(());
        }

        let Some(bridge_session) = self.ctx.bridge.allocate_session(kind.is_broadcast())? else {
            log::error!("Bridge refused to allocate a sync session");
            self.fail_permanently(SyncErrorCode::InPermanentError, None);
            return Ok(());
        };
        self.state.borrow_mut().bridge_session = Some(bridge_session);

        if !self
            .ctx
            .bridge
            .start_timeline_monitoring(bridge_session, &selector, true)?
        {
            self.fail_permanently(SyncErrorCode::MasterTimelineUnavailable, None);
            return Ok(());
        }

        if let Some(previous) = self.ctx.registry.holder_other_than(self.key) {
            log::info!("Session {} supersedes the current synchroniser", self.key);
            previous.supersede(master);
        }
        let weak: Weak<dyn Supersedable> = self.self_ref.clone();
        self.ctx.registry.acquire(self.key, weak);

        let observer = MasterObserver::new(
            master,
            kind,
            self.ctx.host.clone(),
            self.ctx.bridge.clone(),
            self.ctx.scheduler.clone(),
            self.ctx.config.heartbeat_interval(),
        );
        let content_id = build_content_id(
            &snapshot.source.src,
            snapshot.source.current_period.as_ref(),
            snapshot.source.ci_ancillary.as_deref(),
        );
        self.state.borrow_mut().master = Some(MasterBinding {
            renderer: master,
            kind,
            selector: selector.clone(),
            observer: observer.clone(),
            observer_sub: None,
            bridge_sub: None,
            renderer_sub: None,
            periods: PeriodTracker::new(&selector),
            content_id,
        });

        if !kind.is_broadcast() {
            if let Err(e) = self.report_content_status(None) {
                self.enter_permanent();
                return Err(e);
            }
        }

        log::info!(
            "Session {} initialised on {} with {} ({})",
            self.key,
            master,
            selector,
            bridge_session
        );
        self.events.emit(&SessionEvent::SynchroniserInitialised);

        if !observer.start() {
            log::warn!("Master observer for {} failed to start", master);
            self.on_master_failure();
            return Ok(());
        }

        let weak = self.self_ref.clone();
        let observer_sub = observer.events().subscribe(move |event| {
            if let Some(session) = weak.upgrade() {
                session.on_observer_event(event);
            }
        });
        let weak = self.self_ref.clone();
        let bridge_sub = self.ctx.bridge.events().subscribe(move |event| {
            if let Some(session) = weak.upgrade() {
                session.on_bridge_event(event);
            }
        });
        if let Some(binding) = self.state.borrow_mut().master.as_mut() {
            binding.observer_sub = Some(observer_sub);
            binding.bridge_sub = Some(bridge_sub);
        }

        self.setup_master_periods(&selector, bridge_session)
            .inspect_err(|_| {
                self.enter_permanent();
            })
    }

    fn setup_master_periods(
        &self,
        selector: &TimelineSelector,
        bridge_session: BridgeSessionId,
    ) -> SyncResult<()> {
        let Some((master, observer)) = self.master_observer() else {
            return Ok(());
        };

        if !selector.is_relative_period() {
            self.ctx.bridge.set_timeline_availability(
                bridge_session,
                selector,
                true,
                observer.content_ticks(),
                observer.speed_multiplier(),
            )?;
            return Ok(());
        }

        let source = self.ctx.host.events(master)?;
        let weak = self.self_ref.clone();
        let handle = source.subscribe(move |event| {
            if let Some(session) = weak.upgrade() {
                session.on_master_renderer_event(event);
            }
        });

        let snapshot = self.ctx.host.snapshot(master)?;
        let renderer_period = snapshot.source.current_period.map(|period| period.id);
        let mismatch = match renderer_period.as_deref() {
            Some(period) => selector.relative_period_id() != Some(period),
            None => false,
        };

        if let Some(binding) = self.state.borrow_mut().master.as_mut() {
            binding.renderer_sub = Some((source, handle));
            if !mismatch {
                if let Some(tracker) = binding.periods.as_mut() {
                    tracker.track_current();
                }
            }
        }

        if mismatch {
            log::warn!(
                "{} names a period other than the one {} is presenting",
                selector,
                master
            );
            self.ctx
                .bridge
                .stop_timeline_monitoring(bridge_session, selector, true)?;
        } else {
            self.ctx.bridge.set_timeline_availability(
                bridge_session,
                selector,
                true,
                observer.content_ticks(),
                observer.speed_multiplier(),
            )?;
        }
        Ok(())
    }

    /// Attaches `slave` and starts correcting it against the master
    pub fn add_media_object(
        &self,
        slave: RendererId,
        selector: impl Into<TimelineSelector>,
        options: AddOptions,
    ) -> SyncResult<()> {
        let selector = selector.into();

        if self.in_permanent_error() {
            self.raise(SyncErrorCode::InPermanentError, None);
            return Ok(());
        }
        let Some((master, observer)) = self.initialised_master() else {
            self.raise(SyncErrorCode::NotInitialised, None);
            return Ok(());
        };
        if slave == master || self.state.borrow().slaves.contains_key(&slave) {
            self.raise(SyncErrorCode::AlreadyAdded, Some(slave));
            return Ok(());
        }

        let snapshot = self.ctx.host.snapshot(slave)?;
        if snapshot.kind.is_broadcast() {
            self.raise(SyncErrorCode::UnsupportedStreamCombination, Some(slave));
            return Ok(());
        }
        let correlation = options.correlation.unwrap_or_default();
        if !correlation.is_valid() {
            self.raise(SyncErrorCode::InvalidCorrelationTimestamp, Some(slave));
            return Ok(());
        }
        if snapshot.error.is_some() {
            self.raise(SyncErrorCode::PresentationFailed, Some(slave));
            return Ok(());
        }
        if !snapshot.ready_state.has_current_data() {
            self.raise(SyncErrorCode::NotInSuitableState, Some(slave));
            return Ok(());
        }

        let Some(bridge_session) = self.bridge_session() else {
            self.raise(SyncErrorCode::NotInitialised, None);
            return Ok(());
        };
        if !self
            .ctx
            .bridge
            .start_timeline_monitoring(bridge_session, &selector, false)?
        {
            self.raise(SyncErrorCode::TimelineUnavailable, Some(slave));
            return Ok(());
        }

        let tolerance = Tolerance::from_requested(options.tolerance_ms)
            .widened(self.ctx.config.tolerance_widening_ms as f64);
        let client_options = ClientOptions {
            selector: selector.clone(),
            correlation,
            tolerance,
            multi_decoder_mode: options.multi_decoder_mode,
        };
        let client_ctx = ClientContext {
            host: self.ctx.host.clone(),
            bridge: self.ctx.bridge.clone(),
            bridge_session,
            scheduler: self.ctx.scheduler.clone(),
            observer,
            poll_interval: self.ctx.config.poll_interval(),
        };
        let client = match CorrectionClient::attach(slave, client_options, client_ctx) {
            Ok(client) => client,
            Err(e) => {
                self.ctx
                    .bridge
                    .stop_timeline_monitoring(bridge_session, &selector, false)?;
                return Err(e);
            }
        };

        let renderer_source = self.ctx.host.events(slave)?;
        let weak = self.self_ref.clone();
        let client_sub = client.events().subscribe(move |event| {
            if let Some(session) = weak.upgrade() {
                session.on_client_event(slave, event);
            }
        });
        let weak = self.self_ref.clone();
        let renderer_sub = renderer_source.subscribe(move |event| {
            if let RendererEvent::AudioTracksChanged = event {
                if let Some(session) = weak.upgrade() {
                    session.on_slave_audio_changed(slave);
                }
            }
        });

        self.state.borrow_mut().slaves.insert(
            slave,
            SlaveEntry {
                client: client.clone(),
                client_sub,
                renderer_source,
                renderer_sub,
            },
        );

        log::info!("Added {} on {} to session {}", slave, selector, self.key);
        client.synchronise_now();
        self.events.emit(&SessionEvent::MediaObjectAdded { renderer: slave });
        Ok(())
    }

    /// Detaches `slave`; removing the master ends the session
    pub fn remove_media_object(&self, slave: RendererId) -> SyncResult<()> {
        if self.in_permanent_error() {
            self.raise(SyncErrorCode::InPermanentError, None);
            return Ok(());
        }
        let Some((master, _)) = self.initialised_master() else {
            self.raise(SyncErrorCode::NotInitialised, None);
            return Ok(());
        };
        if slave == master {
            self.fail_permanently(SyncErrorCode::Superseded, Some(slave));
            return Ok(());
        }
        if !self.state.borrow().slaves.contains_key(&slave) {
            self.raise(SyncErrorCode::NotFound, Some(slave));
            return Ok(());
        }

        self.detach_slave(slave)
    }

    fn detach_slave(&self, slave: RendererId) -> SyncResult<()> {
        let (entry, bridge_session, observer) = {
            let mut state = self.state.borrow_mut();
            let Some(entry) = state.slaves.remove(&slave) else {
                return Ok(());
            };
            let observer = state.master.as_ref().map(|m| m.observer.clone());
            (entry, state.bridge_session, observer)
        };

        let selector = entry.detach();
        if let Some(observer) = observer {
            observer.set_muted(false);
        }
        log::info!("Removed {} from session {}", slave, self.key);

        if let Some(id) = bridge_session {
            self.ctx
                .bridge
                .stop_timeline_monitoring(id, &selector, false)?;
        }
        Ok(())
    }

    /// Replaces the correlation of an attached slave
    pub fn update_correlation_timestamp(
        &self,
        slave: RendererId,
        correlation: Option<CorrelationTimestamp>,
    ) -> SyncResult<()> {
        if self.in_permanent_error() {
            self.raise(SyncErrorCode::InPermanentError, None);
            return Ok(());
        }
        if self.initialised_master().is_none() {
            self.raise(SyncErrorCode::NotInitialised, None);
            return Ok(());
        }
        let Some(client) = self.client(slave) else {
            self.raise(SyncErrorCode::NotFound, Some(slave));
            return Ok(());
        };
        let Some(correlation) = correlation.filter(CorrelationTimestamp::is_valid) else {
            self.raise(SyncErrorCode::InvalidCorrelationTimestamp, Some(slave));
            return Ok(());
        };

        client.set_correlation(correlation);
        Ok(())
    }

    /// Asks the bridge to expose the session to companion devices
    pub fn enable_inter_device_sync(
        &self,
        callback: Option<InterDeviceCallback>,
    ) -> SyncResult<()> {
        self.toggle_inter_device_sync(true, callback)
    }

    /// Asks the bridge to stop inter-device synchronisation
    pub fn disable_inter_device_sync(
        &self,
        callback: Option<InterDeviceCallback>,
    ) -> SyncResult<()> {
        self.toggle_inter_device_sync(false, callback)
    }

    fn toggle_inter_device_sync(
        &self,
        enable: bool,
        callback: Option<InterDeviceCallback>,
    ) -> SyncResult<()> {
        if self.in_permanent_error() {
            self.raise(SyncErrorCode::InPermanentError, None);
            return Ok(());
        }
        let (Some(_), Some(id)) = (self.initialised_master(), self.bridge_session()) else {
            self.raise(SyncErrorCode::NotInitialised, None);
            return Ok(());
        };

        {
            let mut state = self.state.borrow_mut();
            if enable {
                state.on_enabled = callback;
            } else {
                state.on_disabled = callback;
            }
        }

        if enable {
            self.ctx.bridge.enable_inter_device_sync(id)
        } else {
            self.ctx.bridge.disable_inter_device_sync(id)
        }
    }

    /// Number of attached slaves, `None` unless initialised
    pub fn nr_of_slaves(&self) -> Option<usize> {
        self.initialised_master()
            .map(|_| self.state.borrow().slaves.len())
    }

    pub fn inter_device_sync_enabled(&self) -> bool {
        self.state.borrow().inter_device_sync_enabled
    }

    /// Master content time in seconds, NaN before initialisation
    pub fn current_time(&self) -> f64 {
        self.master_observer()
            .map(|(_, observer)| observer.content_time())
            .unwrap_or(f64::NAN)
    }

    pub fn last_error(&self) -> Option<SyncErrorCode> {
        self.state.borrow().last_error
    }

    pub fn last_error_source(&self) -> Option<RendererId> {
        self.state.borrow().last_error_source
    }

    pub fn content_id_override(&self) -> SyncResult<Option<String>> {
        match self.bridge_session() {
            Some(id) => self.ctx.bridge.content_id_override(id),
            None => Ok(None),
        }
    }

    /// Overrides the reported content identifier; ignored before init
    pub fn set_content_id_override(&self, value: Option<&str>) -> SyncResult<()> {
        match self.bridge_session() {
            Some(id) => self.ctx.bridge.set_content_id_override(id, value),
            None => Ok(()),
        }
    }

    pub fn max_broadband_streams_with_broadcast(&self) -> u32 {
        self.ctx.config.max_broadband_streams_with_broadcast
    }

    pub fn max_broadband_streams_no_broadcast(&self) -> u32 {
        self.ctx.config.max_broadband_streams_no_broadcast
    }

    pub fn is_initialised(&self) -> bool {
        self.initialised_master().is_some()
    }

    pub fn in_permanent_error(&self) -> bool {
        self.state.borrow().permanent_error
    }

    pub fn master(&self) -> Option<RendererId> {
        self.state.borrow().master.as_ref().map(|m| m.renderer)
    }

    /// Selector currently reported for the master
    pub fn master_selector(&self) -> Option<TimelineSelector> {
        self.state.borrow().master.as_ref().map(|m| m.selector.clone())
    }

    /// Content identifier last reported for the master
    pub fn content_id(&self) -> Option<String> {
        self.state.borrow().master.as_ref().map(|m| m.content_id.clone())
    }

    pub fn slaves(&self) -> Vec<RendererId> {
        self.state.borrow().slaves.keys().copied().collect()
    }

    pub fn client(&self, slave: RendererId) -> Option<Rc<CorrectionClient>> {
        self.state
            .borrow()
            .slaves
            .get(&slave)
            .map(|entry| entry.client.clone())
    }

    pub fn bridge_session(&self) -> Option<BridgeSessionId> {
        self.state.borrow().bridge_session
    }

    fn master_observer(&self) -> Option<(RendererId, Rc<MasterObserver>)> {
        self.state
            .borrow()
            .master
            .as_ref()
            .map(|m| (m.renderer, m.observer.clone()))
    }

    fn initialised_master(&self) -> Option<(RendererId, Rc<MasterObserver>)> {
        if self.in_permanent_error() || !self.ctx.registry.is_current(self.key) {
            return None;
        }
        self.master_observer()
    }

    fn raise(&self, code: SyncErrorCode, source: Option<RendererId>) {
        {
            let mut state = self.state.borrow_mut();
            state.last_error = Some(code);
            state.last_error_source = source;
        }
        let origin = source.map_or_else(|| "session".to_string(), |id| id.to_string());
        if code.is_permanent() {
            log::error!("Session {} error {} from {}: {}", self.key, code, origin, code.description());
        } else {
            log::warn!("Session {} error {} from {}: {}", self.key, code, origin, code.description());
        }
        self.events.emit(&SessionEvent::Error {
            last_error: code,
            last_error_source: source,
        });
    }

    fn fail_permanently(&self, code: SyncErrorCode, source: Option<RendererId>) {
        if self.enter_permanent() {
            self.raise(code, source);
        }
    }

    /// Tears the session down; returns whether this call did the teardown
    fn enter_permanent(&self) -> bool {
        let (master, slaves, bridge_session) = {
            let mut state = self.state.borrow_mut();
            if state.permanent_error {
                return false;
            }
            state.permanent_error = true;
            state.inter_device_sync_enabled = false;
            state.on_enabled = None;
            state.on_disabled = None;
            (
                state.master.take(),
                std::mem::take(&mut state.slaves),
                state.bridge_session.take(),
            )
        };

        if let Some(master) = master {
            master.observer.stop();
            if let Some(handle) = master.observer_sub {
                master.observer.events().unsubscribe(handle);
            }
            if let Some((source, handle)) = master.renderer_sub {
                source.unsubscribe(handle);
            }
            if let Some(handle) = master.bridge_sub {
                self.ctx.bridge.events().unsubscribe(handle);
            }
        }
        for (_, entry) in slaves {
            entry.detach();
        }

        self.ctx.registry.release(self.key);
        if let Some(id) = bridge_session {
            if let Err(e) = self.ctx.bridge.destroy_session(id) {
                log::error!("Failed to destroy {}: {}", id, e);
            }
        }

        log::info!("Session {} entered permanent error", self.key);
        true
    }

    /// Handles a master that can no longer be followed
    fn on_master_failure(&self) {
        let Some((master, kind)) = self
            .state
            .borrow()
            .master
            .as_ref()
            .map(|m| (m.renderer, m.kind))
        else {
            return;
        };

        if !kind.is_broadcast() {
            if let Err(e) = self.report_content_status(Some(PresentationStatus::Fault)) {
                log::error!("Failed to report fault of {}: {}", master, e);
            }
        }

        if self.enter_permanent() {
            let code = if kind.is_broadcast() {
                SyncErrorCode::MasterNotInSuitableState
            } else {
                self.ctx
                    .host
                    .snapshot(master)
                    .ok()
                    .and_then(|snapshot| snapshot.error)
                    .map(|kind| kind.master_failure_code())
                    .unwrap_or(SyncErrorCode::MasterNotInSuitableState)
            };
            self.raise(code, Some(master));
        }
    }

    /// Reports the master's content status, derived from its state unless given
    fn report_content_status(&self, status: Option<PresentationStatus>) -> SyncResult<()> {
        let (master, content_id, bridge_session) = {
            let state = self.state.borrow();
            match (state.master.as_ref(), state.bridge_session) {
                (Some(m), Some(id)) => (m.renderer, m.content_id.clone(), id),
                _ => return Ok(()),
            }
        };

        let snapshot = self.ctx.host.snapshot(master)?;
        let presentation_status = status.unwrap_or(if snapshot.ready_state.has_current_data() {
            PresentationStatus::Okay
        } else {
            PresentationStatus::Transitioning
        });
        let report = ContentStatusReport {
            content_id,
            presentation_status,
            content_id_status: ContentIdStatus::Final,
            mrs_url: snapshot.source.mrs_url.unwrap_or_default(),
        };
        self.ctx.bridge.report_content_status(bridge_session, &report)
    }

    fn on_observer_event(&self, event: &ObserverEvent) {
        match event {
            ObserverEvent::MediaUpdated(signal) => {
                let Some((kind, selector, observer, id)) = ({
                    let state = self.state.borrow();
                    match (state.master.as_ref(), state.bridge_session) {
                        (Some(m), Some(id)) => {
                            Some((m.kind, m.selector.clone(), m.observer.clone(), id))
                        }
                        _ => None,
                    }
                }) else {
                    return;
                };

                if kind.is_broadcast() {
                    return;
                }
                if let Err(e) = self.report_content_status(None) {
                    log::error!("Failed to report content status: {}", e);
                }
                if observer.timeline().is_some() {
                    if let Err(e) = self.ctx.bridge.set_content_time_and_speed(
                        id,
                        &selector,
                        observer.content_ticks(),
                        signal.speed_multiplier,
                    ) {
                        log::error!("Failed to report master time: {}", e);
                    }
                }
            }
            ObserverEvent::Error => self.on_master_failure(),
        }
    }

    fn on_bridge_event(&self, event: &BridgeEvent) {
        let Some((master, selector, observer, id)) = ({
            let state = self.state.borrow();
            match (state.master.as_ref(), state.bridge_session) {
                (Some(m), Some(id)) => Some((m.renderer, m.selector.clone(), m.observer.clone(), id)),
                _ => None,
            }
        }) else {
            return;
        };

        match event {
            BridgeEvent::TimelineAvailable(timeline) if *timeline.selector() == selector => {
                log::info!(
                    "Master timeline {} available at {} units/s",
                    selector,
                    timeline.units_per_second()
                );
                observer.set_timeline(Some(timeline.clone()));
            }
            BridgeEvent::TimelineUnavailable(gone) if *gone == selector => {
                self.fail_permanently(SyncErrorCode::MasterTimelineUnavailable, Some(master));
            }
            BridgeEvent::InterDeviceSyncEnabled(target) if *target == id => {
                let callback = {
                    let mut state = self.state.borrow_mut();
                    state.inter_device_sync_enabled = true;
                    state.on_enabled.take()
                };
                log::info!("Inter-device sync enabled for {}", id);
                if let Some(callback) = callback {
                    callback();
                }
            }
            BridgeEvent::InterDeviceSyncDisabled(target) if *target == id => {
                let callback = {
                    let mut state = self.state.borrow_mut();
                    state.inter_device_sync_enabled = false;
                    state.on_disabled.take()
                };
                log::info!("Inter-device sync disabled for {}", id);
                if let Some(callback) = callback {
                    callback();
                }
            }
            _ => {}
        }
    }

    fn on_master_renderer_event(&self, event: &RendererEvent) {
        match event {
            RendererEvent::PeriodChanged { period_id } => {
                if let Err(e) = self.on_master_period_changed(period_id) {
                    log::error!("Failed to follow master period change: {}", e);
                }
            }
            RendererEvent::StreamUpdated => {
                if let Err(e) = self.on_master_stream_updated() {
                    log::error!("Failed to prune master periods: {}", e);
                }
            }
            _ => {}
        }
    }

    fn on_master_period_changed(&self, period_id: &str) -> SyncResult<()> {
        let Some((master, kind, observer, id, transition)) = ({
            let mut state = self.state.borrow_mut();
            let id = state.bridge_session;
            match (state.master.as_mut(), id) {
                (Some(m), Some(id)) => m
                    .periods
                    .as_mut()
                    .and_then(|tracker| tracker.on_period_changed(period_id))
                    .map(|t| (m.renderer, m.kind, m.observer.clone(), id, t)),
                _ => None,
            }
        }) else {
            return Ok(());
        };

        log::warn!(
            "DASH period of master {} changed, reporting {} instead of {}",
            master,
            transition.next,
            transition.previous
        );

        self.ctx
            .bridge
            .set_timeline_availability(id, &transition.previous, false, f64::NAN, 0.0)?;
        if transition.newly_issued
            && !self
                .ctx
                .bridge
                .start_timeline_monitoring(id, &transition.next, true)?
        {
            log::warn!("Bridge refused to monitor {}", transition.next);
        }

        let snapshot = self.ctx.host.snapshot(master)?;
        if let Some(binding) = self.state.borrow_mut().master.as_mut() {
            binding.selector = transition.next.clone();
            binding.content_id = build_content_id(
                &snapshot.source.src,
                snapshot.source.current_period.as_ref(),
                snapshot.source.ci_ancillary.as_deref(),
            );
        }

        self.ctx.bridge.set_timeline_availability(
            id,
            &transition.next,
            true,
            observer.content_ticks(),
            observer.speed_multiplier(),
        )?;
        if !kind.is_broadcast() {
            if let Err(e) = self.report_content_status(None) {
                self.enter_permanent();
                return Err(e);
            }
        }
        Ok(())
    }

    fn on_master_stream_updated(&self) -> SyncResult<()> {
        let Some((master, id)) = ({
            let state = self.state.borrow();
            match (state.master.as_ref(), state.bridge_session) {
                (Some(m), Some(id)) => Some((m.renderer, id)),
                _ => None,
            }
        }) else {
            return Ok(());
        };

        let snapshot = self.ctx.host.snapshot(master)?;
        let removed = self
            .state
            .borrow_mut()
            .master
            .as_mut()
            .and_then(|m| m.periods.as_mut())
            .map(|tracker| tracker.prune(&snapshot.source.periods))
            .unwrap_or_default();

        for selector in removed {
            log::debug!("Stopping {} of a removed period", selector);
            self.ctx.bridge.stop_timeline_monitoring(id, &selector, true)?;
        }
        Ok(())
    }

    fn on_client_event(&self, slave: RendererId, event: &ClientEvent) {
        match event {
            ClientEvent::SyncNowAchievable => {
                self.events
                    .emit(&SessionEvent::SyncNowAchievable { renderer: slave });
            }
            ClientEvent::Error(code) => {
                self.raise(*code, Some(slave));
                if matches!(
                    code,
                    SyncErrorCode::PresentationFailed | SyncErrorCode::NotInSuitableState
                ) {
                    if let Err(e) = self.detach_slave(slave) {
                        log::error!("Failed to detach {}: {}", slave, e);
                    }
                }
            }
        }
    }

    fn on_slave_audio_changed(&self, slave: RendererId) {
        let Some((_, observer)) = self.master_observer() else {
            return;
        };
        match self.ctx.host.snapshot(slave) {
            Ok(snapshot) => observer.set_muted(snapshot.audio_track_enabled),
            Err(e) => log::error!("Cannot read audio state of {}: {}", slave, e),
        }
    }
}

impl Supersedable for MediaSynchroniser {
    fn supersede(&self, by: RendererId) {
        if self.enter_permanent() {
            self.raise(SyncErrorCode::Superseded, Some(by));
        }
    }
}

impl Drop for MediaSynchroniser {
    fn drop(&mut self) {
        self.enter_permanent();
    }
}
