//! Configuration for byte stores and image analysis.
//!
//! Every section has sensible defaults, so `ContextConfig::default()` is a
//! valid session configuration. Configs round-trip through JSON.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Master configuration for a context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Byte store limits and growth policy.
    pub io: IoConfig,
    /// Analyser limits.
    pub analysis: AnalysisConfig,
}

impl ContextConfig {
    /// Parse a configuration; missing keys take their default value.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Byte store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// Largest file a file-backed store will load.
    pub max_file_size: u64,
    /// In-memory stores grow on writes past their end instead of failing.
    pub growable_memory: bool,
    /// Largest size an in-memory store may grow to.
    pub max_memory_size: u64,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            max_file_size: 512 * 1024 * 1024, // 512MB
            growable_memory: true,
            max_memory_size: 512 * 1024 * 1024,
        }
    }
}

/// Image analysis configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Upper bound on the declared section count.
    pub max_sections: usize,
    /// Clamp section raw data that runs past end-of-file instead of rejecting
    /// the section table.
    pub allow_raw_data_past_eof: bool,
    /// Width in bytes of pointer data types.
    pub pointer_size: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_sections: 96, // PE loader limit
            allow_raw_data_past_eof: false,
            pointer_size: 8,
        }
    }
}
