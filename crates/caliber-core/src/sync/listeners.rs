//! Status stream fan-out

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::models::SyncStatus;

type Listener = Arc<dyn Fn(&SyncStatus) + Send + Sync>;

#[derive(Default)]
struct ListenerSet {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

/// Registered status callbacks, in subscription order
#[derive(Clone, Default)]
pub(crate) struct StatusListeners {
    inner: Arc<Mutex<ListenerSet>>,
}

impl StatusListeners {
    pub(crate) fn subscribe(&self, listener: Listener) -> Subscription {
        let mut set = self.inner.lock();
        let id = set.next_id;
        set.next_id += 1;
        set.listeners.push((id, listener));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `status` to every current listener.
    ///
    /// Callbacks run outside the lock so they may subscribe or unsubscribe.
    pub(crate) fn publish(&self, status: SyncStatus) {
        let listeners: Vec<Listener> = self
            .inner
            .lock()
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&status);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().listeners.len()
    }
}

impl std::fmt::Debug for StatusListeners {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("StatusListeners")
            .field("listeners", &self.len())
            .finish()
    }
}

/// Handle returned by `SyncEngine::subscribe`.
///
/// Dropping the handle keeps the callback registered; call `unsubscribe` to
/// stop receiving events.
#[derive(Debug)]
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<ListenerSet>>,
}

impl Subscription {
    /// Remove the callback; later events are not delivered to it
    pub fn unsubscribe(self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners
                .lock()
                .listeners
                .retain(|(id, _)| *id != self.id);
        }
    }
}
