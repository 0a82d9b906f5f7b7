//! In-process change notification
//!
//! Observers register against a [`Locator`]. A change at `C` reaches every
//! observer registered at `C` itself or at the collection `C` belongs to.
//! Registrations live until their owner unregisters them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::trace;

use crate::router::Locator;

/// Receives change notifications
pub trait ChangeObserver: Send + Sync {
    /// Called after the write affecting `locator` has committed
    fn on_change(&self, locator: &Locator);
}

impl<F> ChangeObserver for F
where
    F: Fn(&Locator) + Send + Sync,
{
    fn on_change(&self, locator: &Locator) {
        self(locator);
    }
}

/// Handle returned by [`ChangeNotifier::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Registration {
    id: SubscriptionId,
    locator: Locator,
    observer: Arc<dyn ChangeObserver>,
}

/// Observer registry
#[derive(Default)]
pub struct ChangeNotifier {
    next_id: AtomicU64,
    registrations: RwLock<Vec<Registration>>,
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("observers", &self.observer_count())
            .finish()
    }
}

impl ChangeNotifier {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `observer` for changes at or below `locator`
    pub fn register(&self, locator: Locator, observer: Arc<dyn ChangeObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Registration { id, locator, observer });
        trace!(subscription = id.0, locator = %locator, "Observer registered");
        id
    }

    /// Remove a registration; false if it was already gone
    pub fn unregister(&self, id: SubscriptionId) -> bool {
        let mut registrations = self.registrations.write().unwrap_or_else(PoisonError::into_inner);
        let before = registrations.len();
        registrations.retain(|registration| registration.id != id);
        before != registrations.len()
    }

    /// Deliver a change at `changed`, returning how many observers ran
    pub fn notify(&self, changed: &Locator) -> usize {
        // Observers run outside the lock so they may query or register.
        let observers: Vec<Arc<dyn ChangeObserver>> = self
            .registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|registration| registration.locator.covers(changed))
            .map(|registration| Arc::clone(&registration.observer))
            .collect();

        for observer in &observers {
            observer.on_change(changed);
        }

        trace!(locator = %changed, delivered = observers.len(), "Change delivered");
        observers.len()
    }

    /// Number of live registrations
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.registrations.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::ResourceKind;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<Locator>>>, Arc<dyn ChangeObserver>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let observer: Arc<dyn ChangeObserver> = Arc::new(move |locator: &Locator| {
            sink.lock().unwrap().push(*locator);
        });
        (seen, observer)
    }

    #[test]
    fn test_collection_observer_sees_items() {
        let notifier = ChangeNotifier::new();
        let (seen, observer) = recorder();
        notifier.register(Locator::collection(ResourceKind::Message), observer);

        assert_eq!(notifier.notify(&Locator::item(ResourceKind::Message, 4)), 1);
        assert_eq!(notifier.notify(&Locator::item(ResourceKind::Monitor, 4)), 0);
        assert_eq!(*seen.lock().unwrap(), vec![Locator::item(ResourceKind::Message, 4)]);
    }

    #[test]
    fn test_item_observer_ignores_siblings() {
        let notifier = ChangeNotifier::new();
        let (seen, observer) = recorder();
        notifier.register(Locator::item(ResourceKind::Monitor, 1), observer);

        notifier.notify(&Locator::item(ResourceKind::Monitor, 2));
        notifier.notify(&Locator::item(ResourceKind::Monitor, 1));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_unregister() {
        let notifier = ChangeNotifier::new();
        let (seen, observer) = recorder();
        let id = notifier.register(Locator::collection(ResourceKind::Form), observer);

        assert!(notifier.unregister(id));
        assert!(!notifier.unregister(id));
        assert_eq!(notifier.notify(&Locator::collection(ResourceKind::Form)), 0);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(notifier.observer_count(), 0);
    }
}
