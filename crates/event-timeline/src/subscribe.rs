//! Mutation notifications.
//!
//! Subscribers receive a [`TimelineEvent`] synchronously after each accepted
//! mutation. A [`Subscription`] handle unregisters its callback when dropped.
//! A panicking callback is caught and logged; other subscribers and the
//! mutation itself are unaffected.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::error;

use crate::error::TimelineError;
use crate::types::{Cursor, Entry};

/// A change accepted by the timeline.
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineEvent {
    /// An entry was appended at `index`.
    Appended {
        /// Position in the log.
        index: usize,
        /// The new entry.
        entry: Arc<Entry>,
    },
    /// The pending entry at `index` received its outcome.
    Resolved {
        /// Position in the log.
        index: usize,
        /// The entry after resolution.
        entry: Arc<Entry>,
    },
    /// The log was emptied.
    Cleared,
    /// The log was replaced wholesale.
    Imported {
        /// Number of entries now in the log.
        count: usize,
    },
    /// The cursor was repositioned by a time-travel operation.
    CursorMoved(Cursor),
}

type Callback = Arc<dyn Fn(&TimelineEvent) + Send + Sync>;

/// Registry of subscriber callbacks.
#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: AtomicU64,
    callbacks: RwLock<Vec<(u64, Callback)>>,
    failures: AtomicU64,
}

impl Subscribers {
    pub(crate) fn register(
        self: &Arc<Self>,
        callback: impl Fn(&TimelineEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks.write().push((id, Arc::new(callback)));
        Subscription {
            id,
            registry: Arc::downgrade(self),
        }
    }

    fn unregister(&self, id: u64) -> bool {
        let mut callbacks = self.callbacks.write();
        let before = callbacks.len();
        callbacks.retain(|(cb_id, _)| *cb_id != id);
        callbacks.len() != before
    }

    /// Invokes every callback in registration order.
    ///
    /// The callback list is cloned first so callbacks may subscribe or
    /// unsubscribe without deadlocking.
    pub(crate) fn dispatch(&self, event: &TimelineEvent) {
        let callbacks: Vec<(u64, Callback)> = self.callbacks.read().clone();
        for (id, callback) in callbacks {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(event))) {
                self.failures.fetch_add(1, Ordering::Relaxed);
                let err = TimelineError::Subscriber(panic_message(panic.as_ref()));
                error!(subscriber = id, error = %err, "subscriber callback failed");
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    pub(crate) fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "callback panicked".to_string()
    }
}

/// Handle for a registered callback.
///
/// Dropping the handle unregisters the callback.
#[must_use = "dropping a Subscription unregisters its callback"]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Subscribers>,
}

impl Subscription {
    /// Registry-assigned id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Returns true while the callback is registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.callbacks.read().iter().any(|(id, _)| *id == self.id))
    }

    /// Unregisters the callback now.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Keeps the callback registered for the lifetime of the timeline.
    pub fn detach(mut self) {
        self.registry = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self.id);
        }
    }
}

impl std::fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers")
            .field("count", &self.len())
            .field("failures", &self.failures())
            .finish()
    }
}
