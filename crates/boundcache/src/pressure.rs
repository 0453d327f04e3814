//! Low-memory signal plumbing
//!
//! The platform hook that actually detects memory pressure lives outside this
//! crate. It only needs to call [`PressureNotifier::notify`] (or implement
//! [`MemoryPressureSource`] itself); subscribed caches drop their contents.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Callback run when memory runs low
pub type PressureHandler = Arc<dyn Fn() + Send + Sync>;

/// Something that can deliver low-memory signals
pub trait MemoryPressureSource {
    /// Register `handler`. It stays registered until the returned
    /// [`Subscription`] is dropped or cancelled.
    fn subscribe(&self, handler: PressureHandler) -> Subscription;
}

/// Registration handle; unregisters on drop
#[must_use = "dropping a Subscription unregisters the handler"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Wrap the action that unregisters the handler
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Unregister now
    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<u64, PressureHandler>>,
}

/// In-process pressure source
///
/// Cheap to clone; clones share one set of subscribers.
#[derive(Clone, Default)]
pub struct PressureNotifier {
    registry: Arc<Registry>,
}

impl PressureNotifier {
    /// Create a notifier with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every registered handler. Returns how many ran.
    pub fn notify(&self) -> usize {
        // Snapshot first so handlers may (un)subscribe without deadlocking
        let handlers: Vec<PressureHandler> = self.registry.handlers.lock().values().cloned().collect();

        tracing::debug!(subscribers = handlers.len(), "memory pressure signal");
        for handler in &handlers {
            handler();
        }
        handlers.len()
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.registry.handlers.lock().len()
    }
}

impl MemoryPressureSource for PressureNotifier {
    fn subscribe(&self, handler: PressureHandler) -> Subscription {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.handlers.lock().insert(id, handler);

        let registry: Weak<Registry> = Arc::downgrade(&self.registry);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.handlers.lock().remove(&id);
            }
        })
    }
}

impl fmt::Debug for PressureNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PressureNotifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, PressureHandler) {
        let fired = Arc::new(AtomicUsize::new(0));
        let handle = Arc::clone(&fired);
        let handler: PressureHandler = Arc::new(move || {
            handle.fetch_add(1, Ordering::SeqCst);
        });
        (fired, handler)
    }

    #[test]
    fn test_notify_runs_handlers() {
        let notifier = PressureNotifier::new();
        let (fired, handler) = counter();
        let _sub = notifier.subscribe(handler);

        assert_eq!(notifier.notify(), 1);
        assert_eq!(notifier.notify(), 1);
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let notifier = PressureNotifier::new();
        let (fired, handler) = counter();

        let sub = notifier.subscribe(handler);
        assert_eq!(notifier.subscriber_count(), 1);
        drop(sub);

        assert_eq!(notifier.subscriber_count(), 0);
        assert_eq!(notifier.notify(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancel_after_notifier_gone() {
        let notifier = PressureNotifier::new();
        let (_, handler) = counter();
        let sub = notifier.subscribe(handler);

        drop(notifier);
        sub.cancel();
    }
}
