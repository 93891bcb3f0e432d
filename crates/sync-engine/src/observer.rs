// crates/sync-engine/src/observer.rs
//! Master observer
//!
//! Turns whatever the master renderer is (a media element or a broadcast)
//! into one timeline signal: `MediaUpdated` on every playback change and on
//! a fixed heartbeat, `Error` when the master can no longer be followed.

use crate::bridge::TimelineBridge;
use crate::event::{EventBus, SubscriptionHandle};
use crate::renderer::{RendererEvent, RendererHost};
use crate::scheduler::{Scheduler, TimerHandle};
use mediasync_core::{ContentTimeSignal, MediaKind, RendererId, Timeline};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Signal emitted by a master observer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObserverEvent {
    MediaUpdated(ContentTimeSignal),
    Error,
}

struct Running {
    source: Rc<EventBus<RendererEvent>>,
    subscription: SubscriptionHandle,
    heartbeat: TimerHandle,
}

/// Observes the master renderer of a session
pub struct MasterObserver {
    renderer: RendererId,
    kind: MediaKind,
    host: Rc<dyn RendererHost>,
    bridge: Rc<dyn TimelineBridge>,
    scheduler: Rc<Scheduler>,
    heartbeat_interval: Duration,
    self_ref: Weak<MasterObserver>,
    timeline: RefCell<Option<Timeline>>,
    running: RefCell<Option<Running>>,
    events: EventBus<ObserverEvent>,
}

impl MasterObserver {
    pub fn new(
        renderer: RendererId,
        kind: MediaKind,
        host: Rc<dyn RendererHost>,
        bridge: Rc<dyn TimelineBridge>,
        scheduler: Rc<Scheduler>,
        heartbeat_interval: Duration,
    ) -> Rc<Self> {
        Rc::new_cyclic(|self_ref| Self {
            renderer,
            kind,
            host,
            bridge,
            scheduler,
            heartbeat_interval,
            self_ref: self_ref.clone(),
            timeline: RefCell::new(None),
            running: RefCell::new(None),
            events: EventBus::new(),
        })
    }

    pub fn renderer(&self) -> RendererId {
        self.renderer
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn events(&self) -> &EventBus<ObserverEvent> {
        &self.events
    }

    pub fn is_running(&self) -> bool {
        self.running.borrow().is_some()
    }

    /// Starts observing; returns false if the master cannot be observed
    ///
    /// A media element must not be in error; a broadcast must be connecting
    /// or presenting. Starting a running observer is a no-op.
    pub fn start(&self) -> bool {
        if self.is_running() {
            return true;
        }

        let snapshot = match self.host.snapshot(self.renderer) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::error!("Cannot observe {}: {}", self.renderer, e);
                return false;
            }
        };
        let observable = match self.kind {
            MediaKind::Element => snapshot.error.is_none(),
            MediaKind::Broadcast => !snapshot.play_state.is_inactive(),
        };
        if !observable {
            log::warn!("Master {} is not in a state that can be observed", self.renderer);
            return false;
        }

        let source = match self.host.events(self.renderer) {
            Ok(source) => source,
            Err(e) => {
                log::error!("Cannot observe {}: {}", self.renderer, e);
                return false;
            }
        };

        let weak = self.self_ref.clone();
        let subscription = source.subscribe(move |event: &RendererEvent| {
            if let Some(observer) = weak.upgrade() {
                observer.on_renderer_event(event);
            }
        });

        let weak = self.self_ref.clone();
        let heartbeat = self
            .scheduler
            .schedule_repeating(self.heartbeat_interval, move || {
                if let Some(observer) = weak.upgrade() {
                    observer.emit_update();
                }
            });

        *self.running.borrow_mut() = Some(Running {
            source,
            subscription,
            heartbeat,
        });
        log::info!("Observing master {} ({:?})", self.renderer, self.kind);
        true
    }

    /// Stops observing; a no-op when not running
    pub fn stop(&self) {
        let running = self.running.borrow_mut().take();
        if let Some(running) = running {
            running.source.unsubscribe(running.subscription);
            self.scheduler.cancel(running.heartbeat);
            log::info!("Stopped observing master {}", self.renderer);
        }
    }

    fn on_renderer_event(&self, event: &RendererEvent) {
        match self.kind {
            MediaKind::Element => match event {
                RendererEvent::Error => self.events.emit(&ObserverEvent::Error),
                e if e.is_playback_lifecycle() => self.emit_update(),
                _ => {}
            },
            MediaKind::Broadcast => {
                if let RendererEvent::PlayStateChanged(state) = event {
                    if state.is_inactive() {
                        self.events.emit(&ObserverEvent::Error);
                    } else {
                        self.emit_update();
                    }
                }
            }
        }
    }

    fn emit_update(&self) {
        self.events.emit(&ObserverEvent::MediaUpdated(self.signal()));
    }

    /// Current signal of the master
    pub fn signal(&self) -> ContentTimeSignal {
        ContentTimeSignal::new(self.content_time(), self.speed_multiplier())
    }

    /// Master position in seconds, NaN when unknown
    pub fn content_time(&self) -> f64 {
        match self.kind {
            MediaKind::Element => self
                .host
                .snapshot(self.renderer)
                .map(|s| s.current_time)
                .unwrap_or(f64::NAN),
            MediaKind::Broadcast => {
                let ticks = self.content_ticks();
                if ticks.is_nan() {
                    f64::NAN
                } else {
                    ticks / self.tick_rate()
                }
            }
        }
    }

    /// 0 when paused or ended, otherwise the playback rate; 1 for broadcasts
    pub fn speed_multiplier(&self) -> f64 {
        match self.kind {
            MediaKind::Element => self
                .host
                .snapshot(self.renderer)
                .map(|s| s.content_signal().speed_multiplier)
                .unwrap_or(0.0),
            MediaKind::Broadcast => 1.0,
        }
    }

    /// Master position in timeline ticks, NaN without a bound timeline
    pub fn content_ticks(&self) -> f64 {
        let timeline = self.timeline.borrow().clone();
        let Some(timeline) = timeline else {
            return f64::NAN;
        };

        match self.kind {
            MediaKind::Element => timeline.to_ticks(self.content_time()),
            MediaKind::Broadcast => {
                match self.bridge.broadcast_current_ticks(timeline.selector()) {
                    Ok(Some(ticks)) if ticks >= 0.0 => ticks,
                    Ok(_) => f64::NAN,
                    Err(e) => {
                        log::error!("Failed to read broadcast ticks: {}", e);
                        f64::NAN
                    }
                }
            }
        }
    }

    /// Tick rate of the bound timeline, NaN without one
    pub fn tick_rate(&self) -> f64 {
        self.timeline
            .borrow()
            .as_ref()
            .map(|t| t.units_per_second())
            .unwrap_or(f64::NAN)
    }

    pub fn timeline(&self) -> Option<Timeline> {
        self.timeline.borrow().clone()
    }

    /// Binds (or clears) the timeline confirmed by the bridge
    pub fn set_timeline(&self, timeline: Option<Timeline>) {
        *self.timeline.borrow_mut() = timeline;
    }

    pub fn muted(&self) -> bool {
        self.host
            .snapshot(self.renderer)
            .map(|s| s.muted)
            .unwrap_or(false)
    }

    pub fn set_muted(&self, muted: bool) {
        if let Err(e) = self.host.set_muted(self.renderer, muted) {
            log::error!("Failed to set mute on master {}: {}", self.renderer, e);
        }
    }
}

impl Drop for MasterObserver {
    fn drop(&mut self) {
        self.stop();
    }
}
