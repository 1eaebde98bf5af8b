//! Offset types for the three addressing schemes of an image.
//!
//! [`Offset`] is the canonical address every consumer above the analysis layer
//! uses. [`FileOffset`] indexes the raw bytes of the backing store. Translation
//! between the two belongs to the section map.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The addressing scheme a raw value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub enum OffsetKind {
    /// Canonical offset (image base + relative virtual address)
    Canonical,
    /// Offset within the file on disk
    File,
    /// Relative virtual address (offset from image base)
    Relative,
}

impl fmt::Display for OffsetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OffsetKind::Canonical => write!(f, "canonical"),
            OffsetKind::File => write!(f, "file"),
            OffsetKind::Relative => write!(f, "relative"),
        }
    }
}

/// A canonical offset.
///
/// Totally ordered and dense over the addressable range of an image; two
/// different values never alias the same logical byte.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Offset(u64);

impl Offset {
    pub const fn new(value: u64) -> Self {
        Offset(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    /// Offset `delta` bytes further, or `None` on overflow.
    pub fn checked_add(self, delta: u64) -> Option<Self> {
        self.0.checked_add(delta).map(Offset)
    }

    /// Offset `delta` bytes earlier, or `None` on underflow.
    pub fn checked_sub(self, delta: u64) -> Option<Self> {
        self.0.checked_sub(delta).map(Offset)
    }

    /// Byte distance from `base` up to `self`, or `None` if `self < base`.
    pub fn distance_from(self, base: Offset) -> Option<u64> {
        self.0.checked_sub(base.0)
    }
}

impl From<u64> for Offset {
    fn from(value: u64) -> Self {
        Offset(value)
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::LowerHex for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// An offset into the raw bytes of an image file.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FileOffset(u64);

impl FileOffset {
    pub const fn new(value: u64) -> Self {
        FileOffset(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

impl From<u64> for FileOffset {
    fn from(value: u64) -> Self {
        FileOffset(value)
    }
}

impl fmt::Display for FileOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file:{:#x}", self.0)
    }
}
