//! Thread-safe multi-listener fan-out.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Cancelable handle for a registered listener. Cancelling twice is a no-op.
pub struct Subscription {
    cancel: Box<dyn Fn() + Send + Sync>,
}

impl Subscription {
    pub fn cancel(&self) {
        (self.cancel)();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish()
    }
}

/// Registry of listeners used by the coordinator socket to fan out
/// connection-state and domain-event notifications.
///
/// Iteration runs over a snapshot, so a listener may subscribe or cancel
/// from inside its own callback without poisoning the iteration.
pub struct SubscriptionManager<L: ?Sized> {
    listeners: Arc<DashMap<u64, Arc<L>>>,
    next_id: AtomicU64,
}

impl<L: ?Sized + Send + Sync + 'static> SubscriptionManager<L> {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Registers a listener and returns its cancellation handle.
    pub fn subscribe(&self, listener: Arc<L>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.insert(id, listener);

        let weak: Weak<DashMap<u64, Arc<L>>> = Arc::downgrade(&self.listeners);
        Subscription {
            cancel: Box::new(move || {
                if let Some(listeners) = weak.upgrade() {
                    listeners.remove(&id);
                }
            }),
        }
    }

    /// Calls `action` for every listener registered at the time of the call.
    pub fn for_each(&self, mut action: impl FnMut(&L)) {
        let snapshot: Vec<Arc<L>> = self
            .listeners
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for listener in snapshot {
            action(&listener);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl<L: ?Sized + Send + Sync + 'static> Default for SubscriptionManager<L> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn subscribe_and_cancel() {
        let manager: SubscriptionManager<String> = SubscriptionManager::new();
        let sub_a = manager.subscribe(Arc::new("a".to_string()));
        let _sub_b = manager.subscribe(Arc::new("b".to_string()));
        assert_eq!(manager.len(), 2);

        sub_a.cancel();
        assert_eq!(manager.len(), 1);

        // A second cancel is a no-op.
        sub_a.cancel();
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn for_each_visits_a_stable_snapshot() {
        let manager: Arc<SubscriptionManager<String>> = Arc::new(SubscriptionManager::new());
        for i in 0..3 {
            manager.subscribe(Arc::new(format!("listener-{i}")));
        }

        // Subscribing from inside the callback must not panic or make the
        // iteration visit the newcomer.
        let calls = AtomicUsize::new(0);
        manager.for_each(|_| {
            calls.fetch_add(1, Ordering::SeqCst);
            manager.subscribe(Arc::new("late".to_string()));
        });
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(manager.len(), 6);
    }

    #[test]
    fn cancel_after_manager_dropped_is_safe() {
        let manager: SubscriptionManager<u32> = SubscriptionManager::new();
        let sub = manager.subscribe(Arc::new(7));
        drop(manager);
        sub.cancel();
    }
}
