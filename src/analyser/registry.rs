//! Name-keyed analyser selection.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::analyser::{AnalysisResult, FlatImageAnalyser, ImageAnalyser, MalformedImage};
use crate::config::AnalysisConfig;
use crate::error::{Result, SdaError};
use crate::formats::pe::PeImageAnalyser;
use crate::sync;

/// The analysers known to the crate, plus externally supplied ones.
#[derive(Debug, Clone)]
pub enum Analyser {
    Pe(PeImageAnalyser),
    Flat(FlatImageAnalyser),
    Custom(Arc<dyn ImageAnalyser>),
}

impl ImageAnalyser for Analyser {
    fn name(&self) -> &str {
        match self {
            Analyser::Pe(a) => a.name(),
            Analyser::Flat(a) => a.name(),
            Analyser::Custom(a) => a.name(),
        }
    }

    fn analyse(&self, data: &[u8]) -> std::result::Result<AnalysisResult, MalformedImage> {
        match self {
            Analyser::Pe(a) => a.analyse(data),
            Analyser::Flat(a) => a.analyse(data),
            Analyser::Custom(a) => a.analyse(data),
        }
    }
}

/// Analysers selectable by format name.
pub struct AnalyserRegistry {
    analysers: RwLock<BTreeMap<String, Arc<Analyser>>>,
}

impl AnalyserRegistry {
    /// Registry without any analyser.
    pub fn empty() -> Self {
        Self {
            analysers: RwLock::new(BTreeMap::new()),
        }
    }

    /// Registry holding the "PE" and "Flat" analysers.
    pub fn with_defaults(config: &AnalysisConfig) -> Self {
        let registry = Self::empty();
        registry.register(Analyser::Pe(PeImageAnalyser::new(config.clone())));
        registry.register(Analyser::Flat(FlatImageAnalyser::default()));
        registry
    }

    /// Register under the analyser's own name, replacing any previous entry.
    pub fn register(&self, analyser: Analyser) {
        let name = analyser.name().to_string();
        debug!(analyser = %name, "Registering image analyser");
        sync::write(&self.analysers).insert(name, Arc::new(analyser));
    }

    pub fn get(&self, name: &str) -> Result<Arc<Analyser>> {
        sync::read(&self.analysers)
            .get(name)
            .cloned()
            .ok_or_else(|| SdaError::UnknownAnalyser(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        sync::read(&self.analysers).keys().cloned().collect()
    }
}

impl fmt::Debug for AnalyserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyserRegistry")
            .field("names", &self.names())
            .finish()
    }
}
