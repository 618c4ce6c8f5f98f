//! Synchronous publish/subscribe lists
//!
//! Components that want to tell others about state changes own a
//! [`Listeners`] list. Callbacks run on the emitting thread, after the list's
//! own lock has been released, so a callback may subscribe or unsubscribe
//! without deadlocking.

use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Handle returned by [`Listeners::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Registered callbacks for events of type `E`
pub struct Listeners<E> {
    next_id: AtomicU64,
    callbacks: RwLock<Vec<(SubscriptionId, Callback<E>)>>,
}

impl<E> Listeners<E> {
    /// Empty list
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            callbacks: RwLock::new(Vec::new()),
        }
    }

    /// Register a callback
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.callbacks.write().push((id, Arc::new(callback)));
        id
    }

    /// Remove a callback, returning false if it was not registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut callbacks = self.callbacks.write();
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        callbacks.len() != before
    }

    /// Number of registered callbacks
    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    /// True if nobody is listening
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.read().is_empty()
    }

    /// Deliver `event` to every callback registered at the time of the call
    pub fn emit(&self, event: &E) {
        let callbacks: Vec<Callback<E>> = self
            .callbacks
            .read()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in callbacks {
            callback(event);
        }
    }
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}
