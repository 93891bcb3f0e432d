// crates/sync-engine/src/registry.rs
//! The "current synchroniser" slot
//!
//! At most one session may be initialised at a time. Sessions share a
//! `SynchronizerRegistry` and take its slot when they initialise; the
//! previous holder is handed back so that it can be superseded.

use mediasync_core::RendererId;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use uuid::Uuid;

/// Identity of a session within a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey(Uuid);

impl SessionKey {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A slot holder that can be forced out by a newer session
pub trait Supersedable {
    /// Called when a session initialised with master `by` takes the slot
    fn supersede(&self, by: RendererId);
}

struct Holder {
    key: SessionKey,
    session: Weak<dyn Supersedable>,
}

/// Shared registry of the current session
#[derive(Default)]
pub struct SynchronizerRegistry {
    current: RefCell<Option<Holder>>,
}

impl SynchronizerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key of the session holding the slot
    pub fn current(&self) -> Option<SessionKey> {
        self.current.borrow().as_ref().map(|holder| holder.key)
    }

    pub fn is_current(&self, key: SessionKey) -> bool {
        self.current() == Some(key)
    }

    /// Returns the live holder of the slot if it is not `key`
    ///
    /// The slot itself is left untouched; superseding the returned session
    /// releases it.
    pub fn holder_other_than(&self, key: SessionKey) -> Option<Rc<dyn Supersedable>> {
        let current = self.current.borrow();
        let holder = current.as_ref()?;
        if holder.key == key {
            return None;
        }
        holder.session.upgrade()
    }

    /// Puts `key` in the slot, replacing any previous holder
    pub fn acquire(&self, key: SessionKey, session: Weak<dyn Supersedable>) {
        *self.current.borrow_mut() = Some(Holder { key, session });
        log::debug!("Session {} is now current", key);
    }

    /// Empties the slot if `key` holds it
    pub fn release(&self, key: SessionKey) -> bool {
        let mut current = self.current.borrow_mut();
        if current.as_ref().map(|holder| holder.key) == Some(key) {
            *current = None;
            log::debug!("Session {} released the current slot", key);
            true
        } else {
            false
        }
    }
}

impl fmt::Debug for SynchronizerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynchronizerRegistry")
            .field("current", &self.current())
            .finish()
    }
}
