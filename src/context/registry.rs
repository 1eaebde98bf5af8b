//! Weak identity index over the live objects of one context.
//!
//! The registry never owns objects: it stores weak references keyed by hash
//! id, so an entry disappears when the last owner drops the object. Reads take
//! a shared lock and may run concurrently with each other; registration takes
//! the exclusive lock, which makes the insert-or-return-existing step atomic.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, Weak};
use tracing::trace;

use crate::core::id::HashId;
use crate::core::object::Object;
use crate::error::{Result, SdaError};
use crate::sync;

struct Entry {
    object: Weak<dyn Object>,
    // Same allocation as `object`, kept for typed downcasts.
    any: Weak<dyn Any + Send + Sync>,
    class_name: &'static str,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.object.strong_count() > 0
    }
}

/// Outcome of [`ObjectRegistry::insert`].
#[derive(Debug)]
pub enum Registration<T> {
    /// The object is now the registered owner of its hash id.
    Inserted,
    /// A live object already holds the hash id; callers continue with it.
    Existing(Arc<T>),
}

/// Smallest entry count at which registration sweeps dropped entries.
const MIN_PRUNE_AT: usize = 64;

/// Hash-keyed weak index of live objects.
#[derive(Default)]
pub struct ObjectRegistry {
    entries: RwLock<HashMap<HashId, Entry>>,
    // Entry count that triggers the next sweep; only touched under the write lock.
    prune_at: AtomicUsize,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `object` unless a live object of the same type already holds
    /// its hash id. Exactly one of several racing callers gets `Inserted`.
    pub fn insert<T: Object>(&self, object: &Arc<T>) -> Registration<T> {
        let hash_id = object.hash_id();
        let mut entries = sync::write(&self.entries);
        if let Some(entry) = entries.get(&hash_id) {
            if let Some(existing) = entry.any.upgrade() {
                if let Ok(existing) = existing.downcast::<T>() {
                    trace!(%hash_id, class = entry.class_name, "Registration race lost");
                    return Registration::Existing(existing);
                }
            }
        }
        if entries.len() >= self.prune_at.load(Ordering::Relaxed) {
            let before = entries.len();
            entries.retain(|_, entry| entry.is_live());
            let next = (entries.len() * 2).max(MIN_PRUNE_AT);
            self.prune_at.store(next, Ordering::Relaxed);
            trace!(pruned = before - entries.len(), next, "Swept registry");
        }
        let weak: Weak<T> = Arc::downgrade(object);
        entries.insert(
            hash_id,
            Entry {
                object: weak.clone(),
                any: weak,
                class_name: object.class_name(),
            },
        );
        trace!(%hash_id, class = object.class_name(), "Registered object");
        Registration::Inserted
    }

    /// Look up a live object, temporary or not.
    pub fn get(&self, hash_id: HashId) -> Result<Arc<dyn Object>> {
        let found = sync::read(&self.entries)
            .get(&hash_id)
            .map(|entry| entry.object.upgrade());
        match found {
            Some(Some(object)) => Ok(object),
            Some(None) => {
                self.prune_entry(hash_id);
                Err(SdaError::NotFound { hash_id })
            }
            None => Err(SdaError::NotFound { hash_id }),
        }
    }

    /// Look up a live object of a known type.
    pub fn get_as<T: Object>(&self, hash_id: HashId) -> Result<Arc<T>> {
        let found = sync::read(&self.entries)
            .get(&hash_id)
            .map(|entry| (entry.any.upgrade(), entry.class_name));
        match found {
            Some((Some(any), class_name)) => {
                any.downcast::<T>().map_err(|_| SdaError::WrongClass {
                    hash_id,
                    found: class_name,
                    expected: short_type_name::<T>(),
                })
            }
            Some((None, _)) => {
                self.prune_entry(hash_id);
                Err(SdaError::NotFound { hash_id })
            }
            None => Err(SdaError::NotFound { hash_id }),
        }
    }

    pub fn contains(&self, hash_id: HashId) -> bool {
        sync::read(&self.entries)
            .get(&hash_id)
            .is_some_and(Entry::is_live)
    }

    /// Drop the entry for `hash_id` and return the object if it is still alive.
    pub fn remove(&self, hash_id: HashId) -> Option<Arc<dyn Object>> {
        sync::write(&self.entries)
            .remove(&hash_id)
            .and_then(|entry| entry.object.upgrade())
    }

    /// Live permanent objects, ordered by hash id.
    pub fn objects(&self) -> Vec<Arc<dyn Object>> {
        let mut objects: Vec<Arc<dyn Object>> = sync::read(&self.entries)
            .values()
            .filter_map(|entry| entry.object.upgrade())
            .filter(|object| !object.is_temporary())
            .collect();
        objects.sort_by_key(|object| object.hash_id());
        objects
    }

    /// Number of live objects, temporaries included.
    pub fn len(&self) -> usize {
        sync::read(&self.entries)
            .values()
            .filter(|entry| entry.is_live())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry whose object has been dropped.
    pub fn prune(&self) -> usize {
        let mut entries = sync::write(&self.entries);
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live());
        before - entries.len()
    }

    fn prune_entry(&self, hash_id: HashId) {
        let mut entries = sync::write(&self.entries);
        if entries.get(&hash_id).is_some_and(|entry| !entry.is_live()) {
            entries.remove(&hash_id);
        }
    }
}

impl fmt::Debug for ObjectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRegistry")
            .field("entries", &sync::read(&self.entries).len())
            .finish()
    }
}

fn short_type_name<T>() -> &'static str {
    let full = type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}
