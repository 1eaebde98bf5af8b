//! Analysis session.
//!
//! A [`Context`] owns everything that would otherwise be process-global: the
//! object registry, the observer chain, the analyser table and the
//! configuration. Objects hold an `Arc<Context>`; the registry only holds weak
//! references back, so dropping every object empties it. Separate contexts
//! share nothing and can run side by side.

pub mod callbacks;
pub mod registry;

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::analyser::AnalyserRegistry;
use crate::config::ContextConfig;
use crate::core::id::HashId;
use crate::core::object::{ContextObject, Object, Record};
use crate::error::{Result, SdaError};
use crate::image::Image;
use crate::io::{ByteStore, FileStore, VectorStore};
use crate::symbol_table::SymbolTable;

pub use callbacks::{CallbackChain, ContextCallbacks, ObserverHandle};
pub use registry::{ObjectRegistry, Registration};

#[derive(Debug)]
pub struct Context {
    config: ContextConfig,
    registry: ObjectRegistry,
    callbacks: CallbackChain,
    analysers: AnalyserRegistry,
}

impl Context {
    /// New session with the built-in analysers registered.
    pub fn new(config: ContextConfig) -> Arc<Self> {
        let analysers = AnalyserRegistry::with_defaults(&config.analysis);
        Arc::new(Self {
            config,
            registry: ObjectRegistry::new(),
            callbacks: CallbackChain::new(),
            analysers,
        })
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    pub fn callbacks(&self) -> &CallbackChain {
        &self.callbacks
    }

    pub fn analysers(&self) -> &AnalyserRegistry {
        &self.analysers
    }

    /// Register a freshly built object and notify observers.
    ///
    /// If a live object already holds the same hash id, that object is
    /// returned instead and no notification fires.
    pub fn register<T: Object>(&self, object: Arc<T>) -> Arc<T> {
        match self.registry.insert(&object) {
            registry::Registration::Inserted => {
                self.callbacks.object_added(object.as_ref());
                object
            }
            registry::Registration::Existing(existing) => {
                debug!(hash_id = %existing.hash_id(), "Reusing registered object");
                existing
            }
        }
    }

    /// Look up any live object.
    pub fn get(&self, hash_id: HashId) -> Result<Arc<dyn Object>> {
        self.registry.get(hash_id)
    }

    /// Unregister an object and notify observers. Owners keep their
    /// references; the object just stops being globally reachable.
    pub fn remove(&self, hash_id: HashId) -> Result<Arc<dyn Object>> {
        let object = self
            .registry
            .remove(hash_id)
            .ok_or(SdaError::NotFound { hash_id })?;
        debug!(%hash_id, class = object.class_name(), "Removed object");
        self.callbacks.object_removed(object.as_ref());
        Ok(object)
    }

    /// Remove a temporary object that was never promoted. Returns false and
    /// leaves permanent objects registered.
    pub fn discard(&self, hash_id: HashId) -> Result<bool> {
        let object = self.registry.get(hash_id)?;
        if !object.is_temporary() {
            return Ok(false);
        }
        drop(object);
        self.remove(hash_id)?;
        Ok(true)
    }

    /// Records of every live permanent object, ordered by hash id.
    pub fn persistent_records(&self) -> Vec<Record> {
        self.registry
            .objects()
            .iter()
            .map(|object| object.serialize())
            .collect()
    }

    /// Open `path` as a file-backed image and analyse it with the analyser
    /// registered as `analyser_name`.
    ///
    /// Nothing stays registered when the file cannot be opened or analysis
    /// fails.
    pub fn create_image<P: AsRef<Path>>(
        self: &Arc<Self>,
        name: &str,
        analyser_name: &str,
        path: P,
    ) -> Result<Arc<Image>> {
        let store = FileStore::open(path.as_ref(), &self.config.io)?;
        self.build_image(name, analyser_name, Box::new(store))
    }

    /// Like [`Context::create_image`] over an in-memory copy of `bytes`.
    pub fn create_image_from_bytes(
        self: &Arc<Self>,
        name: &str,
        analyser_name: &str,
        bytes: &[u8],
    ) -> Result<Arc<Image>> {
        let store = VectorStore::from_bytes(bytes, self.config.io.growable_memory)
            .with_max_size(self.config.io.max_memory_size);
        self.build_image(name, analyser_name, Box::new(store))
    }

    fn build_image(
        self: &Arc<Self>,
        name: &str,
        analyser_name: &str,
        store: Box<dyn ByteStore>,
    ) -> Result<Arc<Image>> {
        let analyser = self.analysers.get(analyser_name)?;
        let table = SymbolTable::new(self, &format!("{}.global", name));
        let image = Image::new(self, store, analyser, name, Arc::clone(&table));

        if let Err(e) = image.analyse() {
            warn!(image = %name, analyser = analyser_name, error = %e, "Image creation failed");
            for hash_id in [image.hash_id(), table.hash_id()] {
                if let Err(cleanup) = self.remove(hash_id) {
                    warn!(%hash_id, error = %cleanup, "Could not unregister after failed image creation");
                }
            }
            return Err(e);
        }
        info!(
            image = %image.name(),
            analyser = analyser_name,
            size = image.size(),
            sections = image.sections().len(),
            "Created image"
        );
        Ok(image)
    }
}
