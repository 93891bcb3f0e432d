// crates/sync-engine/src/host.rs
//! In-memory renderer table
//!
//! `RendererTable` is a complete `RendererHost` for embedders that do not
//! keep their own table, for the simulator and for tests. Its native control
//! mutates the stored state and emits the matching lifecycle events.

use crate::error::{SyncError, SyncResult};
use crate::event::EventBus;
use crate::renderer::{PlaybackControl, RendererEvent, RendererHost, RendererSnapshot};
use mediasync_core::{MediaKind, RendererId};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

/// A call received by a renderer's native control
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlCall {
    Play,
    Pause,
    Seek(f64),
    SetPlaybackRate(f64),
}

/// Native control surface of a table entry
struct NativeControl {
    state: Rc<RefCell<RendererSnapshot>>,
    events: Rc<EventBus<RendererEvent>>,
    pinned_rate: Cell<Option<f64>>,
    calls: RefCell<Vec<ControlCall>>,
}

impl NativeControl {
    fn record(&self, call: ControlCall) {
        self.calls.borrow_mut().push(call);
    }
}

impl PlaybackControl for NativeControl {
    fn play(&self) {
        self.record(ControlCall::Play);
        let changed = {
            let mut state = self.state.borrow_mut();
            let was_paused = state.paused;
            state.paused = false;
            state.ended = false;
            was_paused
        };
        if changed {
            self.events.emit(&RendererEvent::Play);
        }
    }

    fn pause(&self) {
        self.record(ControlCall::Pause);
        let changed = {
            let mut state = self.state.borrow_mut();
            !std::mem::replace(&mut state.paused, true)
        };
        if changed {
            self.events.emit(&RendererEvent::Pause);
        }
    }

    fn seek(&self, time: f64) {
        self.record(ControlCall::Seek(time));
        {
            let mut state = self.state.borrow_mut();
            state.current_time = time;
            state.ended = false;
        }
        self.events.emit(&RendererEvent::Seeked);
    }

    fn set_playback_rate(&self, rate: f64) -> f64 {
        self.record(ControlCall::SetPlaybackRate(rate));
        let applied = self.pinned_rate.get().unwrap_or(rate);
        let changed = {
            let mut state = self.state.borrow_mut();
            let changed = state.playback_rate != applied;
            state.playback_rate = applied;
            changed
        };
        if changed {
            self.events.emit(&RendererEvent::RateChange);
        }
        applied
    }
}

struct TableEntry {
    state: Rc<RefCell<RendererSnapshot>>,
    native: Rc<NativeControl>,
    control: Rc<dyn PlaybackControl>,
    events: Rc<EventBus<RendererEvent>>,
    sync_attached: bool,
}

/// Renderer table kept in memory
pub struct RendererTable {
    entries: RefCell<BTreeMap<RendererId, TableEntry>>,
    next_id: Cell<u64>,
}

impl RendererTable {
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(BTreeMap::new()),
            next_id: Cell::new(1),
        }
    }

    /// Adds a renderer and returns its handle
    pub fn insert(&self, snapshot: RendererSnapshot) -> RendererId {
        let id = RendererId::new(self.next_id.get());
        self.next_id.set(id.raw() + 1);

        let state = Rc::new(RefCell::new(snapshot));
        let events = Rc::new(EventBus::new());
        let native = Rc::new(NativeControl {
            state: state.clone(),
            events: events.clone(),
            pinned_rate: Cell::new(None),
            calls: RefCell::new(Vec::new()),
        });

        self.entries.borrow_mut().insert(
            id,
            TableEntry {
                state,
                control: native.clone(),
                native,
                events,
                sync_attached: false,
            },
        );
        id
    }

    /// Removes a renderer from the table
    pub fn remove(&self, id: RendererId) -> bool {
        self.entries.borrow_mut().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn ids(&self) -> Vec<RendererId> {
        self.entries.borrow().keys().copied().collect()
    }

    fn with_entry<T>(&self, id: RendererId, f: impl FnOnce(&TableEntry) -> T) -> SyncResult<T> {
        let entries = self.entries.borrow();
        let entry = entries.get(&id).ok_or(SyncError::UnknownRenderer(id))?;
        Ok(f(entry))
    }

    /// Mutates a renderer's state without emitting any event
    pub fn update<F>(&self, id: RendererId, f: F) -> SyncResult<()>
    where
        F: FnOnce(&mut RendererSnapshot),
    {
        let state = self.with_entry(id, |entry| entry.state.clone())?;
        f(&mut state.borrow_mut());
        Ok(())
    }

    /// Delivers an event to the renderer's listeners
    pub fn emit(&self, id: RendererId, event: RendererEvent) -> SyncResult<()> {
        let events = self.with_entry(id, |entry| entry.events.clone())?;
        events.emit(&event);
        Ok(())
    }

    /// The renderer's own control, bypassing any installed decorator
    pub fn native_control(&self, id: RendererId) -> SyncResult<Rc<dyn PlaybackControl>> {
        self.with_entry(id, |entry| {
            let native: Rc<dyn PlaybackControl> = entry.native.clone();
            native
        })
    }

    /// Makes the renderer ignore requested rates and apply `rate` instead
    pub fn pin_playback_rate(&self, id: RendererId, rate: Option<f64>) -> SyncResult<()> {
        let native = self.with_entry(id, |entry| entry.native.clone())?;
        native.pinned_rate.set(rate);
        if let Some(rate) = rate {
            native.state.borrow_mut().playback_rate = rate;
        }
        Ok(())
    }

    /// Calls received by the native control so far
    pub fn native_calls(&self, id: RendererId) -> SyncResult<Vec<ControlCall>> {
        self.with_entry(id, |entry| entry.native.calls.borrow().clone())
    }

    pub fn clear_native_calls(&self, id: RendererId) -> SyncResult<()> {
        self.with_entry(id, |entry| entry.native.calls.borrow_mut().clear())
    }

    pub fn is_sync_attached(&self, id: RendererId) -> SyncResult<bool> {
        self.with_entry(id, |entry| entry.sync_attached)
    }

    /// Moves every playing media element forward by `by` of wall time
    ///
    /// Elements reaching a finite duration stop there and emit `Ended`.
    pub fn advance_playback(&self, by: Duration) {
        let playing: Vec<(Rc<RefCell<RendererSnapshot>>, Rc<EventBus<RendererEvent>>)> = self
            .entries
            .borrow()
            .values()
            .map(|entry| (entry.state.clone(), entry.events.clone()))
            .collect();

        for (state, events) in playing {
            let ended_now = {
                let mut state = state.borrow_mut();
                if state.kind != MediaKind::Element || state.paused || state.ended {
                    continue;
                }
                state.current_time += by.as_secs_f64() * state.playback_rate;
                if state.duration.is_finite() && state.current_time >= state.duration {
                    state.current_time = state.duration;
                    state.ended = true;
                    true
                } else {
                    false
                }
            };
            if ended_now {
                events.emit(&RendererEvent::Ended);
            }
        }
    }
}

impl Default for RendererTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RendererHost for RendererTable {
    fn snapshot(&self, id: RendererId) -> SyncResult<RendererSnapshot> {
        self.with_entry(id, |entry| entry.state.borrow().clone())
    }

    fn control(&self, id: RendererId) -> SyncResult<Rc<dyn PlaybackControl>> {
        self.with_entry(id, |entry| entry.control.clone())
    }

    fn replace_control(
        &self,
        id: RendererId,
        control: Rc<dyn PlaybackControl>,
    ) -> SyncResult<Rc<dyn PlaybackControl>> {
        let mut entries = self.entries.borrow_mut();
        let entry = entries
            .get_mut(&id)
            .ok_or(SyncError::UnknownRenderer(id))?;
        Ok(std::mem::replace(&mut entry.control, control))
    }

    fn set_muted(&self, id: RendererId, muted: bool) -> SyncResult<()> {
        self.update(id, |state| state.muted = muted)
    }

    fn events(&self, id: RendererId) -> SyncResult<Rc<EventBus<RendererEvent>>> {
        self.with_entry(id, |entry| entry.events.clone())
    }

    fn set_sync_attached(&self, id: RendererId, attached: bool) -> SyncResult<()> {
        let mut entries = self.entries.borrow_mut();
        let entry = entries
            .get_mut(&id)
            .ok_or(SyncError::UnknownRenderer(id))?;
        entry.sync_attached = attached;
        Ok(())
    }
}
