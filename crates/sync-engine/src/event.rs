// crates/sync-engine/src/event.rs
//! Synchronous publish/subscribe
//!
//! Every component of the engine talks to its neighbours through an
//! `EventBus`: listeners are called in subscription order, on the emitting
//! call stack, and stay registered until their handle is unsubscribed.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Handle returned by `EventBus::subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

type Listener<E> = Rc<dyn Fn(&E)>;

/// Ordered, synchronous event dispatcher
pub struct EventBus<E> {
    listeners: RefCell<Vec<(SubscriptionHandle, Listener<E>)>>,
    next_id: Cell<u64>,
}

impl<E> EventBus<E> {
    /// Creates a bus with no listeners
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }

    /// Registers a listener
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionHandle
    where
        F: Fn(&E) + 'static,
    {
        let handle = SubscriptionHandle(self.next_id.get());
        self.next_id.set(handle.0 + 1);
        self.listeners
            .borrow_mut()
            .push((handle, Rc::new(listener)));
        handle
    }

    /// Removes a listener, returning false if it was not registered
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(h, _)| *h != handle);
        listeners.len() != before
    }

    /// Returns true while `handle` is registered
    pub fn is_subscribed(&self, handle: SubscriptionHandle) -> bool {
        self.listeners.borrow().iter().any(|(h, _)| *h == handle)
    }

    /// Delivers `event` to every listener
    ///
    /// Listeners may subscribe, unsubscribe or emit while being called. A
    /// listener removed during this emission is not called afterwards; one
    /// added during it first hears the next emission.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<(SubscriptionHandle, Listener<E>)> = self.listeners.borrow().clone();
        for (handle, listener) in snapshot {
            if self.is_subscribed(handle) {
                listener(event);
            }
        }
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
