//! Sync status and its observer primitive.
//!
//! [`EventEmitter`] is a small typed pub/sub: listeners are `Arc<dyn Fn>`,
//! emission is synchronous in subscription order, and each emission works on
//! a snapshot of the listener list. A listener removed during an emission is
//! still called in that round; one added during an emission is not.
//!
//! The listener lock is never held while a callback runs, so callbacks may
//! subscribe or drop subscriptions freely.

use fieldlog_types::Timestamp;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Closure type for listeners.
pub type ListenerFn<T> = dyn Fn(&T) + Send + Sync;

type ListenerList<T> = Mutex<Vec<(u64, Arc<ListenerFn<T>>)>>;

/// Typed synchronous event emitter.
pub struct EventEmitter<T> {
    listeners: Arc<ListenerList<T>>,
    next_id: AtomicU64,
}

impl<T: 'static> EventEmitter<T> {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers `callback`. It stays registered until the returned
    /// [`Subscription`] is dropped or unsubscribed.
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, Arc::new(callback)));

        let listeners: Weak<ListenerList<T>> = Arc::downgrade(&self.listeners);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(listeners) = listeners.upgrade() {
                    listeners.lock().retain(|(lid, _)| *lid != id);
                }
            })),
        }
    }

    /// Calls every registered listener with `event`.
    pub fn emit(&self, event: &T) {
        let snapshot: Vec<Arc<ListenerFn<T>>> = {
            let guard = self.listeners.lock();
            guard.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };
        for cb in snapshot {
            cb(event);
        }
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: 'static> Default for EventEmitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by [`EventEmitter::subscribe`].
///
/// Dropping it removes the listener. Outliving the emitter is fine.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Removes the listener now.
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Engine state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    /// Last cycle failed; carries the message shown to the user.
    Error(String),
}

impl SyncStatus {
    pub fn is_syncing(&self) -> bool {
        matches!(self, SyncStatus::Syncing)
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            SyncStatus::Error(msg) => Some(msg),
            _ => None,
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Idle => write!(f, "idle"),
            SyncStatus::Syncing => write!(f, "syncing"),
            SyncStatus::Error(msg) => write!(f, "error: {msg}"),
        }
    }
}

/// A status transition delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEvent {
    pub status: SyncStatus,
    pub at: Timestamp,
}

impl StatusEvent {
    pub fn new(status: SyncStatus) -> Self {
        Self {
            status,
            at: Timestamp::now(),
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        self.status.error_message()
    }
}

/// Emitter specialised for status events.
pub type StatusEmitter = EventEmitter<StatusEvent>;
