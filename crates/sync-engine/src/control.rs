// crates/sync-engine/src/control.rs
//! Control surface installed on attached slaves

use crate::renderer::PlaybackControl;
use std::rc::Rc;

/// Decorates a slave's control while it is attached to a session
///
/// Every call is forwarded to the wrapped control, after which the
/// direct-use hook runs so the owning client can report that the slave was
/// driven outside synchronisation.
pub struct SyncedControl {
    inner: Rc<dyn PlaybackControl>,
    on_direct_use: Box<dyn Fn()>,
}

impl SyncedControl {
    pub fn new<F>(inner: Rc<dyn PlaybackControl>, on_direct_use: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self {
            inner,
            on_direct_use: Box::new(on_direct_use),
        }
    }

    /// The control calls are forwarded to
    pub fn inner(&self) -> &Rc<dyn PlaybackControl> {
        &self.inner
    }
}

impl PlaybackControl for SyncedControl {
    fn play(&self) {
        self.inner.play();
        (self.on_direct_use)();
    }

    fn pause(&self) {
        self.inner.pause();
        (self.on_direct_use)();
    }

    fn seek(&self, time: f64) {
        self.inner.seek(time);
        (self.on_direct_use)();
    }

    fn set_playback_rate(&self, rate: f64) -> f64 {
        let applied = self.inner.set_playback_rate(rate);
        (self.on_direct_use)();
        applied
    }
}
