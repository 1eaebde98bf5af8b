//! Image sections: named ranges with a virtual and a raw-data mapping.
//!
//! A section maps raw file bytes `[pointer_to_raw_data, +raw_len)` onto the
//! canonical range `[base + rva, base + rva + virtual_size)`. Both directions
//! are the same affine shift, so translation round-trips exactly for every
//! byte that has raw data behind it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

use crate::core::offset::{FileOffset, Offset};

/// Permission flags for sections: read=1, write=2, execute=4
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SectionPerms {
    pub bits: u8,
}

impl SectionPerms {
    pub fn new(read: bool, write: bool, execute: bool) -> Self {
        let mut bits = 0u8;
        if read {
            bits |= 1;
        }
        if write {
            bits |= 2;
        }
        if execute {
            bits |= 4;
        }
        Self { bits }
    }

    pub fn has_read(&self) -> bool {
        (self.bits & 1) != 0
    }

    pub fn has_write(&self) -> bool {
        (self.bits & 2) != 0
    }

    pub fn has_execute(&self) -> bool {
        (self.bits & 4) != 0
    }
}

impl fmt::Display for SectionPerms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut perms = String::new();
        perms.push(if self.has_read() { 'r' } else { '-' });
        perms.push(if self.has_write() { 'w' } else { '-' });
        perms.push(if self.has_execute() { 'x' } else { '-' });
        write!(f, "{}", perms)
    }
}

/// What a section holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageSectionType {
    /// Unclassified content
    None,
    /// Executable code
    Code,
    /// Initialized data
    Data,
    /// Zero-filled data with no raw bytes
    Uninitialized,
}

impl fmt::Display for ImageSectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSectionType::None => write!(f, "none"),
            ImageSectionType::Code => write!(f, "code"),
            ImageSectionType::Data => write!(f, "data"),
            ImageSectionType::Uninitialized => write!(f, "uninitialized"),
        }
    }
}

/// A section produced by analysis. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSection {
    name: String,
    section_type: ImageSectionType,
    perms: SectionPerms,
    rel_virtual_address: u64,
    virtual_size: u64,
    pointer_to_raw_data: u64,
    size_of_raw_data: u64,
    min_offset: Offset,
    end_offset: Offset,
}

impl ImageSection {
    /// Build a section and derive its canonical range.
    ///
    /// A `virtual_size` of zero falls back to `size_of_raw_data`. Returns
    /// `None` when the canonical range would overflow the offset space.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        section_type: ImageSectionType,
        perms: SectionPerms,
        base_address: u64,
        rel_virtual_address: u64,
        virtual_size: u64,
        pointer_to_raw_data: u64,
        size_of_raw_data: u64,
    ) -> Option<Self> {
        let virtual_size = if virtual_size == 0 {
            size_of_raw_data
        } else {
            virtual_size
        };
        let min = base_address.checked_add(rel_virtual_address)?;
        let end = min.checked_add(virtual_size)?;
        pointer_to_raw_data.checked_add(size_of_raw_data)?;
        Some(Self {
            name: name.into(),
            section_type,
            perms,
            rel_virtual_address,
            virtual_size,
            pointer_to_raw_data,
            size_of_raw_data,
            min_offset: Offset::new(min),
            end_offset: Offset::new(end),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn section_type(&self) -> ImageSectionType {
        self.section_type
    }

    pub fn perms(&self) -> SectionPerms {
        self.perms
    }

    pub fn rel_virtual_address(&self) -> u64 {
        self.rel_virtual_address
    }

    /// Effective virtual size (raw size when the header declared zero).
    pub fn virtual_size(&self) -> u64 {
        self.virtual_size
    }

    pub fn pointer_to_raw_data(&self) -> u64 {
        self.pointer_to_raw_data
    }

    pub fn size_of_raw_data(&self) -> u64 {
        self.size_of_raw_data
    }

    /// First canonical offset of the section.
    pub fn min_offset(&self) -> Offset {
        self.min_offset
    }

    /// Last canonical offset of the section (inclusive). Meaningless for an
    /// empty section, which contains nothing.
    pub fn max_offset(&self) -> Offset {
        self.end_offset.checked_sub(1).unwrap_or(self.min_offset)
    }

    /// One past the last canonical offset.
    pub fn end_offset(&self) -> Offset {
        self.end_offset
    }

    pub fn is_empty(&self) -> bool {
        self.min_offset == self.end_offset
    }

    /// Raw-data bytes that have a canonical counterpart.
    pub fn raw_range(&self) -> Range<u64> {
        let len = self.size_of_raw_data.min(self.virtual_size);
        self.pointer_to_raw_data..self.pointer_to_raw_data + len
    }

    pub fn contains(&self, offset: Offset) -> bool {
        offset >= self.min_offset && offset < self.end_offset
    }

    pub fn contains_file_offset(&self, file_offset: FileOffset) -> bool {
        self.raw_range().contains(&file_offset.value())
    }

    /// True if the two sections share at least one canonical offset.
    pub fn overlaps(&self, other: &ImageSection) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min_offset < other.end_offset
            && other.min_offset < self.end_offset
    }

    /// Canonical offset of a raw file byte, if this section maps it.
    pub fn to_offset(&self, file_offset: FileOffset) -> Option<Offset> {
        if !self.contains_file_offset(file_offset) {
            return None;
        }
        let delta = file_offset.value() - self.pointer_to_raw_data;
        self.min_offset.checked_add(delta)
    }

    /// Raw file byte behind a canonical offset. `None` outside the section
    /// and in the zero-filled tail past the raw data.
    pub fn to_image_file_offset(&self, offset: Offset) -> Option<FileOffset> {
        if !self.contains(offset) {
            return None;
        }
        let delta = offset.distance_from(self.min_offset)?;
        let raw = self.raw_range();
        if delta >= raw.end - raw.start {
            return None;
        }
        Some(FileOffset::new(raw.start + delta))
    }
}

impl fmt::Display for ImageSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Section '{}' ({}, {}, {}..{})",
            self.name, self.section_type, self.perms, self.min_offset, self.end_offset
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text() -> ImageSection {
        ImageSection::new(
            ".text",
            ImageSectionType::Code,
            SectionPerms::new(true, false, true),
            0x400000,
            0x1000,
            0x1000,
            0x400,
            0x1000,
        )
        .unwrap()
    }

    #[test]
    fn test_section_perms_creation() {
        let perms = SectionPerms::new(true, false, true);
        assert!(perms.has_read());
        assert!(!perms.has_write());
        assert!(perms.has_execute());
        assert_eq!(format!("{}", perms), "r-x");
    }

    #[test]
    fn test_canonical_range() {
        let s = text();
        assert_eq!(s.min_offset(), Offset::new(0x401000));
        assert_eq!(s.max_offset(), Offset::new(0x401fff));
        assert!(s.contains(Offset::new(0x401000)));
        assert!(s.contains(Offset::new(0x401fff)));
        assert!(!s.contains(Offset::new(0x402000)));
        assert!(!s.contains(Offset::new(0x400fff)));
    }

    #[test]
    fn test_translation_roundtrip() {
        let s = text();
        assert_eq!(
            s.to_offset(FileOffset::new(0x400)),
            Some(Offset::new(0x401000))
        );
        for f in [0x400u64, 0x401, 0x800, 0x13ff] {
            let o = s.to_offset(FileOffset::new(f)).unwrap();
            assert_eq!(s.to_image_file_offset(o), Some(FileOffset::new(f)));
        }
        assert_eq!(s.to_offset(FileOffset::new(0x1400)), None);
        assert_eq!(s.to_offset(FileOffset::new(0x3ff)), None);
    }

    #[test]
    fn test_virtual_tail_has_no_file_offset() {
        // .bss-like: 0x200 raw bytes backing a 0x1000-byte virtual range
        let s = ImageSection::new(
            ".data",
            ImageSectionType::Data,
            SectionPerms::new(true, true, false),
            0,
            0x3000,
            0x1000,
            0x800,
            0x200,
        )
        .unwrap();
        assert!(s.contains(Offset::new(0x3500)));
        assert_eq!(
            s.to_image_file_offset(Offset::new(0x31ff)),
            Some(FileOffset::new(0x9ff))
        );
        assert_eq!(s.to_image_file_offset(Offset::new(0x3200)), None);
    }

    #[test]
    fn test_zero_virtual_size_uses_raw_size() {
        let s = ImageSection::new(
            "raw",
            ImageSectionType::None,
            SectionPerms::default(),
            0,
            0x1000,
            0,
            0x200,
            0x300,
        )
        .unwrap();
        assert_eq!(s.virtual_size(), 0x300);
        assert_eq!(s.end_offset(), Offset::new(0x1300));
    }

    #[test]
    fn test_overflowing_range_is_rejected() {
        assert!(ImageSection::new(
            "bad",
            ImageSectionType::None,
            SectionPerms::default(),
            u64::MAX - 0x10,
            0x1000,
            0x1000,
            0,
            0
        )
        .is_none());
    }

    #[test]
    fn test_overlap() {
        let a = text();
        let b = ImageSection::new(
            ".b",
            ImageSectionType::Data,
            SectionPerms::default(),
            0x400000,
            0x1800,
            0x1000,
            0x1400,
            0x100,
        )
        .unwrap();
        let c = ImageSection::new(
            ".c",
            ImageSectionType::Data,
            SectionPerms::default(),
            0x400000,
            0x2000,
            0x1000,
            0x1500,
            0x100,
        )
        .unwrap();
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}
