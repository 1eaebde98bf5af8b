//! Image analysers: format parsers that derive an image's layout.
//!
//! An analyser reads raw bytes and reports the base address, the entry point
//! and the section list. It never mutates the bytes and must be
//! deterministic: analysing the same bytes twice yields identical results.

pub mod flat;
pub mod registry;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::core::offset::Offset;
use crate::core::section::ImageSection;

pub use flat::FlatImageAnalyser;
pub use registry::{Analyser, AnalyserRegistry};

/// Reasons an analyser rejects an image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedImage {
    #[error("bad signature: {0}")]
    BadSignature(String),

    #[error("truncated header: expected {expected} bytes, got {actual}")]
    TruncatedHeader { expected: u64, actual: u64 },

    #[error("inconsistent section table: {0}")]
    InconsistentSectionTable(String),

    #[error("entry point {entry:#x} outside image ending at {end:#x}")]
    EntryPointOutOfRange { entry: u64, end: u64 },
}

/// Layout derived from an image's headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub base_address: u64,
    pub entry_point_offset: Offset,
    /// Size of the mapped image starting at `base_address`.
    pub virtual_size: u64,
    /// Sections in header order.
    pub sections: Vec<ImageSection>,
}

impl AnalysisResult {
    /// One past the last canonical offset of the image.
    pub fn end_offset(&self) -> Offset {
        Offset::new(self.base_address.saturating_add(self.virtual_size))
    }

    /// Check the layout invariants every analyser must uphold: sections do
    /// not overlap, and the entry point and every section lie inside the image.
    pub fn validate(&self) -> Result<(), MalformedImage> {
        let end = self.end_offset();

        let mut ordered: Vec<&ImageSection> =
            self.sections.iter().filter(|s| !s.is_empty()).collect();
        ordered.sort_by_key(|s| s.min_offset());
        for pair in ordered.windows(2) {
            if pair[0].overlaps(pair[1]) {
                return Err(MalformedImage::InconsistentSectionTable(format!(
                    "sections '{}' and '{}' overlap",
                    pair[0].name(),
                    pair[1].name()
                )));
            }
        }
        if let Some(section) = self.sections.iter().find(|s| s.end_offset() > end) {
            return Err(MalformedImage::InconsistentSectionTable(format!(
                "section '{}' ends at {} past image end {}",
                section.name(),
                section.end_offset(),
                end
            )));
        }

        if self.entry_point_offset >= end {
            return Err(MalformedImage::EntryPointOutOfRange {
                entry: self.entry_point_offset.value(),
                end: end.value(),
            });
        }
        Ok(())
    }
}

/// Format-specific image parser.
pub trait ImageAnalyser: Send + Sync + fmt::Debug {
    /// Registry name, e.g. "PE".
    fn name(&self) -> &str;

    /// Derive the layout of `data`. Must not panic on any input.
    fn analyse(&self, data: &[u8]) -> Result<AnalysisResult, MalformedImage>;
}
