//! Change notification for observers of a context.
//!
//! Observers subscribe to a [`CallbackChain`] and receive every committed
//! add/change/remove in subscription order. Invocation happens outside the
//! chain's lock, so an observer may subscribe or unsubscribe from inside a
//! callback; such changes apply to the next notification.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::trace;

use crate::core::object::Object;
use crate::sync;

/// Observer of object lifecycle events. Every method defaults to a no-op.
pub trait ContextCallbacks: Send + Sync {
    fn on_object_added(&self, _object: &dyn Object) {}

    fn on_object_changed(&self, _object: &dyn Object) {}

    fn on_object_removed(&self, _object: &dyn Object) {}
}

/// Identifies a subscription for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverHandle(u64);

type Observers = Vec<(ObserverHandle, Arc<dyn ContextCallbacks>)>;

/// Ordered list of observers.
#[derive(Default)]
pub struct CallbackChain {
    next_handle: AtomicU64,
    observers: RwLock<Observers>,
}

impl CallbackChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn ContextCallbacks>) -> ObserverHandle {
        let handle = ObserverHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        sync::write(&self.observers).push((handle, observer));
        trace!(handle = handle.0, "Observer subscribed");
        handle
    }

    /// Returns false if the handle was not subscribed.
    pub fn unsubscribe(&self, handle: ObserverHandle) -> bool {
        let mut observers = sync::write(&self.observers);
        let before = observers.len();
        observers.retain(|(h, _)| *h != handle);
        before != observers.len()
    }

    pub fn len(&self) -> usize {
        sync::read(&self.observers).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn object_added(&self, object: &dyn Object) {
        for observer in self.snapshot() {
            observer.on_object_added(object);
        }
    }

    pub fn object_changed(&self, object: &dyn Object) {
        for observer in self.snapshot() {
            observer.on_object_changed(object);
        }
    }

    pub fn object_removed(&self, object: &dyn Object) {
        for observer in self.snapshot() {
            observer.on_object_removed(object);
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn ContextCallbacks>> {
        sync::read(&self.observers)
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect()
    }
}

impl fmt::Debug for CallbackChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackChain")
            .field("observers", &self.len())
            .finish()
    }
}
