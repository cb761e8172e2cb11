use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use dashmap::DashMap;

use super::events::RealtimeNotification;

/// Failure reported by a listener while delivering one event.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// The stream behind the listener is gone. The registry drops the listener.
    #[error("listener channel closed")]
    Closed,

    #[error("failed to serialize notification: {0}")]
    Serialize(#[from] serde_json::Error),
}

type ListenerFn = dyn Fn(&RealtimeNotification) -> Result<(), ListenerError> + Send + Sync;

/// A registered push callback. Clones share identity: registering a clone of
/// an already registered listener is a no-op.
#[derive(Clone)]
pub struct Listener(Arc<ListenerFn>);

impl Listener {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&RealtimeNotification) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn same_as(&self, other: &Listener) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }

    fn deliver(&self, event: &RealtimeNotification) -> Result<(), ListenerError> {
        (self.0)(event)
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Listener")
            .field(&Arc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

/// Per-user listener table feeding the notification streams.
///
/// Delivery is best-effort and live only: emitting to a user with no open
/// stream drops the event. Each user's listener list is guarded by its
/// DashMap shard, so mutations for one user never see a half-updated list
/// and emits for unrelated users do not wait on each other.
#[derive(Debug, Clone, Default)]
pub struct NotificationRegistry {
    /// user_id -> listeners in registration order
    listeners: Arc<DashMap<String, Vec<Listener>>>,
}

impl NotificationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener for a user. Returns false if it was already registered.
    pub fn register(&self, user_id: &str, listener: &Listener) -> bool {
        let mut entry = self.listeners.entry(user_id.to_string()).or_default();
        if entry.iter().any(|l| l.same_as(listener)) {
            return false;
        }
        entry.push(listener.clone());
        let count = entry.len();
        drop(entry);

        tracing::debug!(user_id = %user_id, listeners = count, "Notification listener registered");
        true
    }

    /// Remove a listener. The user's entry goes away with its last listener.
    /// Returns false if the listener was not registered.
    pub fn unregister(&self, user_id: &str, listener: &Listener) -> bool {
        let removed = match self.listeners.get_mut(user_id) {
            Some(mut entry) => {
                let before = entry.len();
                entry.retain(|l| !l.same_as(listener));
                entry.len() < before
            }
            None => false,
        };

        // Re-checked under the shard lock so a concurrent register survives.
        self.listeners.remove_if(user_id, |_, v| v.is_empty());

        if removed {
            tracing::debug!(user_id = %user_id, "Notification listener unregistered");
        }
        removed
    }

    /// Deliver an event to every listener of one user, in registration order.
    ///
    /// Listeners run on the caller's task. A failing or panicking listener is
    /// logged and skipped; listeners reporting [`ListenerError::Closed`] are
    /// unregistered. Returns how many listeners accepted the event.
    pub fn emit(&self, user_id: &str, event: &RealtimeNotification) -> usize {
        // Snapshot so listeners may (un)register without deadlocking the shard.
        let listeners = match self.listeners.get(user_id) {
            Some(entry) => entry.value().clone(),
            None => return 0,
        };

        let mut delivered = 0;
        let mut closed = Vec::new();

        for listener in &listeners {
            match panic::catch_unwind(AssertUnwindSafe(|| listener.deliver(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(ListenerError::Closed)) => {
                    tracing::debug!(
                        user_id = %user_id,
                        kind = event.kind(),
                        "Notification listener closed, dropping it"
                    );
                    closed.push(listener);
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        user_id = %user_id,
                        kind = event.kind(),
                        error = %e,
                        "Failed to deliver notification"
                    );
                }
                Err(_) => {
                    tracing::error!(
                        user_id = %user_id,
                        kind = event.kind(),
                        "Notification listener panicked"
                    );
                }
            }
        }

        for listener in closed {
            self.unregister(user_id, listener);
        }

        delivered
    }

    /// Emit to each distinct user once, in first-seen order.
    pub fn emit_many<I, S>(&self, user_ids: I, event: &RealtimeNotification) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut dispatched = HashSet::new();
        let mut delivered = 0;
        for user_id in user_ids {
            let user_id = user_id.as_ref();
            if !dispatched.insert(user_id.to_string()) {
                continue;
            }
            delivered += self.emit(user_id, event);
        }
        delivered
    }

    pub fn listener_count(&self, user_id: &str) -> usize {
        self.listeners.get(user_id).map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_registered(&self, user_id: &str) -> bool {
        self.listeners.contains_key(user_id)
    }

    /// Number of users with at least one open stream.
    pub fn user_count(&self) -> usize {
        self.listeners.len()
    }
}
