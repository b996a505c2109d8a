//! Subscriber registry and disposers.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::models::Record;

type Handler = Arc<dyn Fn(&[Record]) + Send + Sync>;

#[derive(Default)]
struct Handlers {
    next_id: u64,
    entries: Vec<(u64, Handler)>,
}

/// Handlers registered against one store.
#[derive(Clone, Default)]
pub(crate) struct SubscriberRegistry {
    inner: Arc<Mutex<Handlers>>,
}

impl SubscriberRegistry {
    pub(crate) fn register(&self, handler: Handler) -> Subscription {
        let id = {
            let mut handlers = self.lock();
            let id = handlers.next_id;
            handlers.next_id += 1;
            handlers.entries.push((id, handler));
            id
        };

        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
            active: AtomicBool::new(true),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Deliver `records` to every handler.
    ///
    /// Handlers run without the registry lock held, so they may subscribe or
    /// unsubscribe. A panicking handler is logged and skipped.
    pub(crate) fn notify(&self, records: &[Record]) {
        let handlers: Vec<(u64, Handler)> = self.lock().entries.clone();

        for (id, handler) in handlers {
            let outcome = catch_unwind(AssertUnwindSafe(|| handler(records)));
            if outcome.is_err() {
                tracing::error!(
                    subscriber = id,
                    "Subscriber panicked while handling a change; continuing with the rest"
                );
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Handlers> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Disposer returned by [`SharedStateStore::subscribe`](crate::SharedStateStore::subscribe).
///
/// Dropping it unsubscribes. [`Subscription::unsubscribe`] may be called any
/// number of times.
#[must_use = "dropping a Subscription unsubscribes its handler"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Handlers>>,
    active: AtomicBool,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(inner) = self.registry.upgrade() {
            inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entries
                .retain(|(id, _)| *id != self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_handler(counter: &Arc<AtomicUsize>) -> Handler {
        let counter = Arc::clone(counter);
        Arc::new(move |_records: &[Record]| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let registry = SubscriberRegistry::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let subscription = registry.register(counting_handler(&hits));

        subscription.unsubscribe();
        subscription.unsubscribe();
        assert!(!subscription.is_active());
        assert_eq!(registry.len(), 0);

        registry.notify(&[]);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let registry = SubscriberRegistry::default();
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let _subscription = registry.register(counting_handler(&hits));
            assert_eq!(registry.len(), 1);
        }
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_unsubscribe_after_registry_dropped_does_not_panic() {
        let registry = SubscriberRegistry::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let subscription = registry.register(counting_handler(&hits));
        drop(registry);
        subscription.unsubscribe();
    }

    #[test]
    fn test_panicking_handler_does_not_block_others() {
        let registry = SubscriberRegistry::default();
        let hits = Arc::new(AtomicUsize::new(0));

        let _first = registry.register(counting_handler(&hits));
        let _bad = registry.register(Arc::new(|_records: &[Record]| panic!("view exploded")));
        let _last = registry.register(counting_handler(&hits));

        registry.notify(&[]);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_handler_may_unsubscribe_during_notify() {
        let registry = SubscriberRegistry::default();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let slot_in_handler = Arc::clone(&slot);
        let subscription = registry.register(Arc::new(move |_records: &[Record]| {
            if let Some(own) = slot_in_handler.lock().unwrap().take() {
                own.unsubscribe();
            }
        }));
        *slot.lock().unwrap() = Some(subscription);

        registry.notify(&[]);
        assert_eq!(registry.len(), 0);
    }
}
