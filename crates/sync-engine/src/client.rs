// crates/sync-engine/src/client.rs
//! Slave correction client
//!
//! One client per attached slave. It maps each master signal onto the
//! slave's own timeline through the correlation timestamp, and when the
//! slave drifts further than its tolerance it hard-seeks the slave slightly
//! ahead of the target. While attached, the slave's control surface is
//! replaced by a `SyncedControl`, so outside callers still get their action
//! but the client reports that the slave was driven independently.

use crate::bridge::{BridgeEvent, BridgeSessionId, TimelineBridge};
use crate::control::SyncedControl;
use crate::error::SyncResult;
use crate::event::{EventBus, SubscriptionHandle};
use crate::observer::{MasterObserver, ObserverEvent};
use crate::period::PeriodTracker;
use crate::renderer::{PlaybackControl, RendererEvent, RendererHost, RendererSnapshot};
use crate::scheduler::{Scheduler, TimerHandle};
use mediasync_core::{
    ContentTimeSignal, CorrelationTimestamp, RendererId, SyncErrorCode, Timeline,
    TimelineSelector, Tolerance,
};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Notifications from a correction client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    /// The slave is back in sync after an error
    SyncNowAchievable,
    /// A transient error; the same code is never raised twice in a row
    Error(SyncErrorCode),
}

/// Per-slave parameters
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub selector: TimelineSelector,
    pub correlation: CorrelationTimestamp,
    /// Already widened by the caller
    pub tolerance: Tolerance,
    pub multi_decoder_mode: bool,
}

/// Collaborators shared with the owning session
#[derive(Clone)]
pub struct ClientContext {
    pub host: Rc<dyn RendererHost>,
    pub bridge: Rc<dyn TimelineBridge>,
    pub bridge_session: BridgeSessionId,
    pub scheduler: Rc<Scheduler>,
    pub observer: Rc<MasterObserver>,
    pub poll_interval: Duration,
}

struct Subscriptions {
    observer: SubscriptionHandle,
    slave_source: Rc<EventBus<RendererEvent>>,
    slave: SubscriptionHandle,
    bridge_source: Rc<EventBus<BridgeEvent>>,
    bridge: SubscriptionHandle,
}

struct ClientState {
    selector: TimelineSelector,
    correlation: CorrelationTimestamp,
    timeline: Option<Timeline>,
    last_error: Option<SyncErrorCode>,
    poll: Option<TimerHandle>,
    original_control: Option<Rc<dyn PlaybackControl>>,
    subscriptions: Option<Subscriptions>,
    periods: Option<PeriodTracker>,
    destroyed: bool,
}

/// Keeps one slave aligned with the master
pub struct CorrectionClient {
    slave: RendererId,
    ctx: ClientContext,
    tolerance: Tolerance,
    multi_decoder_mode: bool,
    self_ref: Weak<CorrectionClient>,
    state: RefCell<ClientState>,
    events: EventBus<ClientEvent>,
}

impl CorrectionClient {
    /// Captures the slave's control surface and starts listening
    ///
    /// No correction runs until the bridge confirms the slave's timeline or
    /// `synchronise_now` is called.
    pub fn attach(
        slave: RendererId,
        options: ClientOptions,
        ctx: ClientContext,
    ) -> SyncResult<Rc<Self>> {
        let original = ctx.host.control(slave)?;
        let slave_source = ctx.host.events(slave)?;
        let periods = PeriodTracker::new(&options.selector).map(|mut tracker| {
            tracker.track_current();
            tracker
        });

        let client = Rc::new_cyclic(|self_ref| Self {
            slave,
            ctx,
            tolerance: options.tolerance,
            multi_decoder_mode: options.multi_decoder_mode,
            self_ref: self_ref.clone(),
            state: RefCell::new(ClientState {
                selector: options.selector,
                correlation: options.correlation,
                timeline: None,
                last_error: None,
                poll: None,
                original_control: Some(original.clone()),
                subscriptions: None,
                periods,
                destroyed: false,
            }),
            events: EventBus::new(),
        });

        let weak = client.self_ref.clone();
        let decorator = SyncedControl::new(original, move || {
            if let Some(client) = weak.upgrade() {
                client.on_direct_use();
            }
        });
        client.ctx.host.replace_control(slave, Rc::new(decorator))?;
        client.ctx.host.set_sync_attached(slave, true)?;

        let weak = client.self_ref.clone();
        let observer = client.ctx.observer.events().subscribe(move |event| {
            if let Some(client) = weak.upgrade() {
                client.on_observer_event(event);
            }
        });
        let weak = client.self_ref.clone();
        let slave_sub = slave_source.subscribe(move |event| {
            if let Some(client) = weak.upgrade() {
                client.on_slave_event(event);
            }
        });
        let bridge_source = client.ctx.bridge.events();
        let weak = client.self_ref.clone();
        let bridge = bridge_source.subscribe(move |event| {
            if let Some(client) = weak.upgrade() {
                client.on_bridge_event(event);
            }
        });

        client.state.borrow_mut().subscriptions = Some(Subscriptions {
            observer,
            slave_source,
            slave: slave_sub,
            bridge_source,
            bridge,
        });

        log::info!(
            "Attached {} to {} (tolerance {} ms, multi-decoder {})",
            slave,
            client.selector(),
            client.tolerance.as_millis(),
            client.multi_decoder_mode
        );
        Ok(client)
    }

    pub fn slave(&self) -> RendererId {
        self.slave
    }

    pub fn events(&self) -> &EventBus<ClientEvent> {
        &self.events
    }

    /// Selector currently monitored for the slave
    pub fn selector(&self) -> TimelineSelector {
        self.state.borrow().selector.clone()
    }

    pub fn correlation(&self) -> CorrelationTimestamp {
        self.state.borrow().correlation
    }

    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    pub fn multi_decoder_mode(&self) -> bool {
        self.multi_decoder_mode
    }

    /// Slave timeline confirmed by the bridge
    pub fn timeline(&self) -> Option<Timeline> {
        self.state.borrow().timeline.clone()
    }

    pub fn last_error(&self) -> Option<SyncErrorCode> {
        self.state.borrow().last_error
    }

    pub fn is_polling(&self) -> bool {
        self.state.borrow().poll.is_some()
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.borrow().destroyed
    }

    /// Replaces the correlation timestamp and re-evaluates once
    pub fn set_correlation(&self, correlation: CorrelationTimestamp) {
        self.state.borrow_mut().correlation = correlation;
        self.synchronise_now();
    }

    /// Runs the correction against the master's current signal
    pub fn synchronise_now(&self) {
        self.synchronise(self.ctx.observer.signal());
    }

    /// Runs one correction step for `signal`
    pub fn synchronise(&self, signal: ContentTimeSignal) {
        if !signal.has_time() {
            return;
        }

        let (timeline, correlation, control) = {
            let state = self.state.borrow();
            if state.destroyed {
                return;
            }
            match (&state.timeline, &state.original_control) {
                (Some(timeline), Some(control)) => {
                    (timeline.clone(), state.correlation, control.clone())
                }
                _ => return,
            }
        };

        let master_rate = self.ctx.observer.tick_rate();
        if !master_rate.is_finite() {
            return;
        }

        let target = signal.content_time
            + correlation.offset_seconds(master_rate, timeline.units_per_second());

        let snapshot = match self.ctx.host.snapshot(self.slave) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::error!("Cannot read slave {}: {}", self.slave, e);
                return;
            }
        };

        let speed = signal.speed_multiplier;
        let mut paused = snapshot.paused;
        if signal.is_stopped() && !paused {
            control.pause();
            paused = true;
        }

        if !snapshot.buffered.contains(target) {
            self.raise(SyncErrorCode::InsufficientBuffer);
            return;
        }

        if !Self::can_present(&snapshot, target) {
            if !paused {
                control.pause();
            }
            self.raise(SyncErrorCode::FailedToSynchronise);
            return;
        }

        if !signal.is_stopped() {
            if paused {
                control.play();
            }
            if snapshot.playback_rate != speed {
                let applied = control.set_playback_rate(speed);
                if applied != speed {
                    log::debug!("{} applied rate {} instead of {}", self.slave, applied, speed);
                }
            }
        }

        let tolerance = self.tolerance.as_secs();
        let drift = target - snapshot.current_time;
        if drift.abs() > tolerance {
            log::debug!(
                "{} drifted {:.3}s, seeking to {:.3}",
                self.slave,
                drift,
                target + tolerance
            );
            control.seek(target + tolerance);
        }

        self.mark_achievable();
    }

    fn can_present(snapshot: &RendererSnapshot, target: f64) -> bool {
        snapshot.ready_state.has_current_data()
            && !snapshot.ended
            && target >= 0.0
            && (!snapshot.duration.is_finite() || target < snapshot.duration)
    }

    fn raise(&self, code: SyncErrorCode) {
        let fresh = {
            let mut state = self.state.borrow_mut();
            if state.destroyed || state.last_error == Some(code) {
                false
            } else {
                state.last_error = Some(code);
                true
            }
        };
        if fresh {
            log::debug!("{} raised error {}", self.slave, code);
            self.events.emit(&ClientEvent::Error(code));
        }
    }

    fn mark_achievable(&self) {
        let recovered = self.state.borrow_mut().last_error.take().is_some();
        if recovered {
            log::info!("{} is back in sync", self.slave);
            self.events.emit(&ClientEvent::SyncNowAchievable);
        }
    }

    fn on_direct_use(&self) {
        log::debug!("{} was driven directly while synchronised", self.slave);
        self.raise(SyncErrorCode::NotInSuitableState);
    }

    fn on_observer_event(&self, event: &ObserverEvent) {
        match event {
            ObserverEvent::MediaUpdated(signal) => self.synchronise(*signal),
            ObserverEvent::Error => self.raise(SyncErrorCode::PresentationFailed),
        }
    }

    fn on_slave_event(&self, event: &RendererEvent) {
        match event {
            RendererEvent::Ended => self.raise(SyncErrorCode::PresentationFailed),
            RendererEvent::PeriodChanged { period_id } => self.on_period_changed(period_id),
            _ => {}
        }
    }

    fn on_bridge_event(&self, event: &BridgeEvent) {
        let selector = self.selector();
        match event {
            BridgeEvent::TimelineAvailable(timeline) if *timeline.selector() == selector => {
                self.bind(timeline.clone());
            }
            BridgeEvent::TimelineUnavailable(gone) if *gone == selector => {
                log::warn!("Timeline {} of {} became unavailable", gone, self.slave);
                self.unbind();
            }
            _ => {}
        }
    }

    fn bind(&self, timeline: Timeline) {
        let start_poll = {
            let mut state = self.state.borrow_mut();
            if state.destroyed {
                return;
            }
            state.timeline = Some(timeline);
            state.poll.is_none()
        };

        if start_poll {
            let weak = self.self_ref.clone();
            let poll = self
                .ctx
                .scheduler
                .schedule_repeating(self.ctx.poll_interval, move || {
                    if let Some(client) = weak.upgrade() {
                        client.synchronise_now();
                    }
                });
            self.state.borrow_mut().poll = Some(poll);
        }

        log::debug!("{} bound its timeline", self.slave);
        self.synchronise_now();
    }

    fn unbind(&self) {
        let poll = {
            let mut state = self.state.borrow_mut();
            state.timeline = None;
            state.poll.take()
        };
        if let Some(poll) = poll {
            self.ctx.scheduler.cancel(poll);
        }
    }

    fn on_period_changed(&self, period_id: &str) {
        let transition = {
            let mut state = self.state.borrow_mut();
            if state.destroyed {
                return;
            }
            state
                .periods
                .as_mut()
                .and_then(|tracker| tracker.on_period_changed(period_id))
        };
        let Some(transition) = transition else {
            return;
        };

        log::warn!(
            "DASH period of {} changed, monitoring {} instead of {}",
            self.slave,
            transition.next,
            transition.previous
        );

        self.unbind();
        let id = self.ctx.bridge_session;
        if let Err(e) = self
            .ctx
            .bridge
            .stop_timeline_monitoring(id, &transition.previous, false)
        {
            log::error!("Failed to stop monitoring {}: {}", transition.previous, e);
        }

        self.state.borrow_mut().selector = transition.next.clone();
        match self
            .ctx
            .bridge
            .start_timeline_monitoring(id, &transition.next, false)
        {
            Ok(true) => {}
            Ok(false) => self.raise(SyncErrorCode::TimelineUnavailable),
            Err(e) => log::error!("Failed to monitor {}: {}", transition.next, e),
        }
    }

    /// Detaches from the slave; safe to call more than once
    ///
    /// Restores the slave's original control surface, clears its attached
    /// marker, cancels the poll and drops every subscription.
    pub fn destroy(&self) {
        let (subscriptions, poll, original) = {
            let mut state = self.state.borrow_mut();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.timeline = None;
            (
                state.subscriptions.take(),
                state.poll.take(),
                state.original_control.take(),
            )
        };

        if let Some(subs) = subscriptions {
            self.ctx.observer.events().unsubscribe(subs.observer);
            subs.slave_source.unsubscribe(subs.slave);
            subs.bridge_source.unsubscribe(subs.bridge);
        }
        if let Some(poll) = poll {
            self.ctx.scheduler.cancel(poll);
        }
        if let Some(original) = original {
            if let Err(e) = self.ctx.host.replace_control(self.slave, original) {
                log::error!("Failed to restore control of {}: {}", self.slave, e);
            }
        }
        if let Err(e) = self.ctx.host.set_sync_attached(self.slave, false) {
            log::error!("Failed to clear sync marker of {}: {}", self.slave, e);
        }

        log::info!("Detached {}", self.slave);
    }
}

impl Drop for CorrectionClient {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::LoopbackBridge;
    use crate::host::{ControlCall, RendererTable};
    use mediasync_core::{MediaKind, ReadyState};

    const MASTER_SEL: &str = "urn:master";
    const SLAVE_SEL: &str = "urn:slave";

    struct Fixture {
        table: Rc<RendererTable>,
        bridge: Rc<LoopbackBridge>,
        scheduler: Rc<Scheduler>,
        observer: Rc<MasterObserver>,
        master: RendererId,
        session: BridgeSessionId,
    }

    impl Fixture {
        fn new(master: RendererSnapshot) -> Self {
            let table = Rc::new(RendererTable::new());
            let bridge = Rc::new(LoopbackBridge::new());
            bridge.set_default_units_per_second(1.0);
            let scheduler = Rc::new(Scheduler::new());
            let master = table.insert(master);
            let observer = MasterObserver::new(
                master,
                MediaKind::Element,
                table.clone(),
                bridge.clone(),
                scheduler.clone(),
                Duration::from_secs(10),
            );
            observer.set_timeline(Some(Timeline::new(MASTER_SEL, 1.0).unwrap()));
            assert!(observer.start());
            let session = bridge.allocate_session(false).unwrap().unwrap();
            Self {
                table,
                bridge,
                scheduler,
                observer,
                master,
                session,
            }
        }

        fn attach(&self, slave: RendererId, tolerance_ms: f64) -> Rc<CorrectionClient> {
            let options = ClientOptions {
                selector: TimelineSelector::from(SLAVE_SEL),
                correlation: CorrelationTimestamp::default(),
                tolerance: Tolerance::from_requested(Some(tolerance_ms)),
                multi_decoder_mode: false,
            };
            let ctx = ClientContext {
                host: self.table.clone(),
                bridge: self.bridge.clone(),
                bridge_session: self.session,
                scheduler: self.scheduler.clone(),
                observer: self.observer.clone(),
                poll_interval: Duration::from_secs(2),
            };
            CorrectionClient::attach(slave, options, ctx).unwrap()
        }

        fn bind_slave_timeline(&self) {
            self.bridge
                .queue(BridgeEvent::TimelineAvailable(Timeline::new(SLAVE_SEL, 1.0).unwrap()));
            self.bridge.flush();
        }
    }

    fn record(client: &CorrectionClient) -> Rc<RefCell<Vec<ClientEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        client
            .events()
            .subscribe(move |e: &ClientEvent| s.borrow_mut().push(*e));
        seen
    }

    fn playing_master_at(time: f64) -> RendererSnapshot {
        RendererSnapshot::element("master").at(time).playing()
    }

    #[test]
    fn test_nothing_happens_before_timeline_is_bound() {
        let fx = Fixture::new(playing_master_at(10.0));
        let slave = fx.table.insert(RendererSnapshot::element("slave").at(3.0));
        let client = fx.attach(slave, 0.0);

        client.synchronise_now();
        assert!(fx.table.native_calls(slave).unwrap().is_empty());
        assert!(!client.is_polling());
    }

    #[test]
    fn test_seek_ahead_by_tolerance_when_drift_exceeds_it() {
        let fx = Fixture::new(playing_master_at(10.0));
        let slave = fx.table.insert(
            RendererSnapshot::element("slave")
                .at(10.5)
                .playing()
                .with_buffered(vec![(0.0, 60.0)]),
        );
        let client = fx.attach(slave, 290.0);

        fx.bind_slave_timeline();

        let calls = fx.table.native_calls(slave).unwrap();
        assert_eq!(calls.len(), 1);
        match calls[0] {
            ControlCall::Seek(to) => assert!((to - 10.29).abs() < 1e-9),
            other => panic!("unexpected call {:?}", other),
        }
        assert!(client.is_polling());
    }

    #[test]
    fn test_no_seek_within_tolerance() {
        let fx = Fixture::new(playing_master_at(10.0));
        let slave = fx.table.insert(
            RendererSnapshot::element("slave")
                .at(10.2)
                .playing()
                .with_buffered(vec![(0.0, 60.0)]),
        );
        let _client = fx.attach(slave, 290.0);

        fx.bind_slave_timeline();
        assert!(fx.table.native_calls(slave).unwrap().is_empty());
    }

    #[test]
    fn test_paused_slave_is_resumed_at_master_speed() {
        let fx = Fixture::new(playing_master_at(5.0).with_rate(1.5));
        let slave = fx.table.insert(
            RendererSnapshot::element("slave")
                .at(5.0)
                .with_buffered(vec![(0.0, 60.0)]),
        );
        let _client = fx.attach(slave, 100.0);

        fx.bind_slave_timeline();
        assert_eq!(
            fx.table.native_calls(slave).unwrap(),
            vec![ControlCall::Play, ControlCall::SetPlaybackRate(1.5)]
        );
    }

    #[test]
    fn test_correlation_offset_is_applied() {
        let fx = Fixture::new(playing_master_at(10.0));
        let slave = fx.table.insert(
            RendererSnapshot::element("slave")
                .at(0.0)
                .playing()
                .with_buffered(vec![(0.0, 60.0)]),
        );
        let client = fx.attach(slave, 0.0);
        fx.bind_slave_timeline();
        fx.table.clear_native_calls(slave).unwrap();

        // slave content starts 4s into the master timeline
        client.set_correlation(CorrelationTimestamp::new(4.0, 0.0));
        let seek = fx
            .table
            .native_calls(slave)
            .unwrap()
            .into_iter()
            .find_map(|c| match c {
                ControlCall::Seek(t) => Some(t),
                _ => None,
            });
        assert_eq!(seek, Some(6.0));
    }

    #[test]
    fn test_insufficient_buffer_is_raised_once() {
        let fx = Fixture::new(playing_master_at(30.0));
        let slave = fx.table.insert(
            RendererSnapshot::element("slave")
                .at(1.0)
                .playing()
                .with_buffered(vec![(0.0, 5.0)]),
        );
        let client = fx.attach(slave, 0.0);
        let seen = record(&client);

        fx.bind_slave_timeline();
        client.synchronise_now();
        fx.scheduler.advance(Duration::from_secs(6));

        assert_eq!(
            *seen.borrow(),
            vec![ClientEvent::Error(SyncErrorCode::InsufficientBuffer)]
        );
        assert!(fx.table.native_calls(slave).unwrap().is_empty());
    }

    #[test]
    fn test_recovery_emits_sync_now_achievable_once() {
        let fx = Fixture::new(playing_master_at(30.0));
        let slave = fx.table.insert(
            RendererSnapshot::element("slave")
                .at(30.0)
                .playing()
                .with_buffered(vec![(0.0, 5.0)]),
        );
        let client = fx.attach(slave, 0.0);
        let seen = record(&client);
        fx.bind_slave_timeline();

        fx.table
            .update(slave, |s| s.buffered = vec![(0.0, 60.0)].into())
            .unwrap();
        client.synchronise_now();
        client.synchronise_now();

        assert_eq!(
            *seen.borrow(),
            vec![
                ClientEvent::Error(SyncErrorCode::InsufficientBuffer),
                ClientEvent::SyncNowAchievable
            ]
        );
    }

    #[test]
    fn test_alternating_errors_are_each_raised() {
        let fx = Fixture::new(playing_master_at(30.0));
        let slave = fx.table.insert(
            RendererSnapshot::element("slave")
                .at(30.0)
                .playing()
                .with_buffered(vec![(0.0, 5.0)]),
        );
        let client = fx.attach(slave, 0.0);
        let seen = record(&client);
        fx.bind_slave_timeline();

        fx.table
            .update(slave, |s| {
                s.buffered = vec![(0.0, 60.0)].into();
                s.ready_state = ReadyState::HaveMetadata;
            })
            .unwrap();
        client.synchronise_now();

        fx.table
            .update(slave, |s| s.buffered = vec![(0.0, 5.0)].into())
            .unwrap();
        client.synchronise_now();

        assert_eq!(
            *seen.borrow(),
            vec![
                ClientEvent::Error(SyncErrorCode::InsufficientBuffer),
                ClientEvent::Error(SyncErrorCode::FailedToSynchronise),
                ClientEvent::Error(SyncErrorCode::InsufficientBuffer),
            ]
        );
    }

    #[test]
    fn test_stopped_master_and_unpresentable_target_pause_once() {
        let fx = Fixture::new(RendererSnapshot::element("master").at(10.0));
        let slave = fx.table.insert(
            RendererSnapshot::element("slave")
                .at(10.0)
                .playing()
                .with_ready_state(ReadyState::HaveMetadata)
                .with_buffered(vec![(0.0, 60.0)]),
        );
        let client = fx.attach(slave, 0.0);

        fx.bind_slave_timeline();
        assert_eq!(fx.table.native_calls(slave).unwrap(), vec![ControlCall::Pause]);
        assert_eq!(client.last_error(), Some(SyncErrorCode::FailedToSynchronise));
    }

    #[test]
    fn test_not_ready_slave_is_paused_with_error_11() {
        let fx = Fixture::new(playing_master_at(3.0));
        let slave = fx.table.insert(
            RendererSnapshot::element("slave")
                .at(3.0)
                .playing()
                .with_ready_state(ReadyState::HaveMetadata)
                .with_buffered(vec![(0.0, 60.0)]),
        );
        let client = fx.attach(slave, 0.0);
        let seen = record(&client);

        fx.bind_slave_timeline();
        assert_eq!(fx.table.native_calls(slave).unwrap(), vec![ControlCall::Pause]);
        assert_eq!(
            *seen.borrow(),
            vec![ClientEvent::Error(SyncErrorCode::FailedToSynchronise)]
        );
    }

    #[test]
    fn test_target_past_duration_cannot_be_presented() {
        let fx = Fixture::new(playing_master_at(20.0));
        let slave = fx.table.insert(
            RendererSnapshot::element("slave")
                .at(9.0)
                .with_duration(20.0)
                .with_buffered(vec![(0.0, 20.0)]),
        );
        let client = fx.attach(slave, 0.0);
        fx.bind_slave_timeline();
        assert_eq!(client.last_error(), Some(SyncErrorCode::FailedToSynchronise));
    }

    #[test]
    fn test_master_pause_pauses_slave_outside_buffer() {
        let fx = Fixture::new(playing_master_at(10.0));
        let slave = fx.table.insert(
            RendererSnapshot::element("slave")
                .at(10.0)
                .playing()
                .with_buffered(vec![(50.0, 60.0)]),
        );
        let _client = fx.attach(slave, 0.0);
        fx.bind_slave_timeline();
        fx.table.clear_native_calls(slave).unwrap();

        fx.table.native_control(fx.master).unwrap().pause();

        assert_eq!(fx.table.native_calls(slave).unwrap(), vec![ControlCall::Pause]);
        assert!(fx.table.snapshot(slave).unwrap().paused);
    }

    #[test]
    fn test_direct_control_raises_9_but_acts() {
        let fx = Fixture::new(playing_master_at(10.0));
        let slave = fx.table.insert(RendererSnapshot::element("slave").at(10.0));
        let client = fx.attach(slave, 0.0);
        let seen = record(&client);

        fx.table.control(slave).unwrap().seek(42.0);
        fx.table.control(slave).unwrap().play();

        assert_eq!(fx.table.snapshot(slave).unwrap().current_time, 42.0);
        assert!(!fx.table.snapshot(slave).unwrap().paused);
        assert_eq!(
            *seen.borrow(),
            vec![ClientEvent::Error(SyncErrorCode::NotInSuitableState)]
        );
    }

    #[test]
    fn test_slave_end_and_master_error_raise_2() {
        let fx = Fixture::new(playing_master_at(10.0));
        let slave = fx.table.insert(RendererSnapshot::element("slave"));
        let client = fx.attach(slave, 0.0);
        let seen = record(&client);

        fx.table.emit(slave, RendererEvent::Ended).unwrap();
        fx.table.emit(fx.master, RendererEvent::Error).unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![ClientEvent::Error(SyncErrorCode::PresentationFailed)]
        );
    }

    #[test]
    fn test_poll_corrects_between_master_events() {
        let fx = Fixture::new(playing_master_at(10.0));
        let slave = fx.table.insert(
            RendererSnapshot::element("slave")
                .at(10.0)
                .playing()
                .with_buffered(vec![(0.0, 60.0)]),
        );
        let _client = fx.attach(slave, 100.0);
        fx.bind_slave_timeline();
        assert!(fx.table.native_calls(slave).unwrap().is_empty());

        fx.table.update(slave, |s| s.current_time = 12.0).unwrap();
        fx.scheduler.advance(Duration::from_secs(2));

        assert_eq!(fx.table.native_calls(slave).unwrap().len(), 1);
    }

    #[test]
    fn test_timeline_loss_stops_polling() {
        let fx = Fixture::new(playing_master_at(10.0));
        let slave = fx.table.insert(RendererSnapshot::element("slave"));
        let client = fx.attach(slave, 0.0);
        fx.bind_slave_timeline();
        assert!(client.is_polling());

        fx.bridge.announce_unavailable(SLAVE_SEL);
        fx.bridge.flush();
        assert!(!client.is_polling());
        assert!(client.timeline().is_none());
    }

    #[test]
    fn test_destroy_restores_everything() {
        let fx = Fixture::new(playing_master_at(10.0));
        let slave = fx.table.insert(RendererSnapshot::element("slave"));
        let original = fx.table.control(slave).unwrap();
        let client = fx.attach(slave, 0.0);
        fx.bind_slave_timeline();

        assert!(!Rc::ptr_eq(&fx.table.control(slave).unwrap(), &original));
        assert!(fx.table.is_sync_attached(slave).unwrap());

        client.destroy();
        client.destroy();

        assert!(Rc::ptr_eq(&fx.table.control(slave).unwrap(), &original));
        assert!(!fx.table.is_sync_attached(slave).unwrap());
        assert_eq!(fx.table.events(slave).unwrap().listener_count(), 0);
        assert_eq!(fx.bridge.events().listener_count(), 0);
        // only the observer heartbeat remains
        assert_eq!(fx.scheduler.active_timers(), 1);
    }

    #[test]
    fn test_slave_period_change_reissues_selector() {
        let fx = Fixture::new(playing_master_at(10.0));
        let slave = fx.table.insert(RendererSnapshot::element("slave"));
        let options = ClientOptions {
            selector: TimelineSelector::from("urn:dvb:css:timeline:mpd:period:rel:1000:a"),
            correlation: CorrelationTimestamp::default(),
            tolerance: Tolerance::default(),
            multi_decoder_mode: true,
        };
        let ctx = ClientContext {
            host: fx.table.clone(),
            bridge: fx.bridge.clone(),
            bridge_session: fx.session,
            scheduler: fx.scheduler.clone(),
            observer: fx.observer.clone(),
            poll_interval: Duration::from_secs(2),
        };
        let client = CorrectionClient::attach(slave, options, ctx).unwrap();
        fx.bridge.clear_calls();

        fx.table
            .emit(
                slave,
                RendererEvent::PeriodChanged {
                    period_id: "b".to_string(),
                },
            )
            .unwrap();

        assert_eq!(
            client.selector().as_str(),
            "urn:dvb:css:timeline:mpd:period:rel:1000:b"
        );
        let calls = fx.bridge.calls();
        assert!(matches!(&calls[0], crate::bridge::BridgeCall::StopMonitoring { selector, .. }
            if selector.as_str().ends_with(":a")));
        assert!(matches!(&calls[1], crate::bridge::BridgeCall::StartMonitoring { selector, .. }
            if selector.as_str().ends_with(":b")));
    }
}
