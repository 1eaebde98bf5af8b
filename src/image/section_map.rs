//! Ordered section list with containment and translation queries.
//!
//! Sections are consulted in the order the analyser produced them and the
//! first match wins. Analysers reject overlapping tables, so the order only
//! decides ties for layouts built by hand.

use serde::{Deserialize, Serialize};

use crate::core::offset::{FileOffset, Offset, OffsetKind};
use crate::core::section::ImageSection;
use crate::error::{Result, SdaError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionMap {
    sections: Vec<ImageSection>,
}

impl SectionMap {
    pub fn new(sections: Vec<ImageSection>) -> Self {
        Self { sections }
    }

    pub fn sections(&self) -> &[ImageSection] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn by_name(&self, name: &str) -> Option<&ImageSection> {
        self.sections.iter().find(|s| s.name() == name)
    }

    /// The section whose canonical range holds `offset`.
    pub fn section_at(&self, offset: Offset) -> Option<&ImageSection> {
        self.sections.iter().find(|s| s.contains(offset))
    }

    /// The section whose raw data holds `file_offset`.
    pub fn section_at_file_offset(&self, file_offset: FileOffset) -> Option<&ImageSection> {
        self.sections
            .iter()
            .find(|s| s.contains_file_offset(file_offset))
    }

    pub fn contains(&self, offset: Offset) -> bool {
        self.section_at(offset).is_some()
    }

    /// Canonical offset of a raw file byte.
    pub fn to_offset(&self, file_offset: FileOffset) -> Result<Offset> {
        self.section_at_file_offset(file_offset)
            .and_then(|s| s.to_offset(file_offset))
            .ok_or(SdaError::UnmappedOffset {
                value: file_offset.value(),
                kind: OffsetKind::File,
            })
    }

    /// Raw file byte behind a canonical offset.
    pub fn to_image_file_offset(&self, offset: Offset) -> Result<FileOffset> {
        self.section_at(offset)
            .and_then(|s| s.to_image_file_offset(offset))
            .ok_or(SdaError::UnmappedOffset {
                value: offset.value(),
                kind: OffsetKind::Canonical,
            })
    }
}
