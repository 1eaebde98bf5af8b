//! Error types for the address-space and symbol model.
//!
//! Low-level components surface precise error kinds; `Image` and
//! `SymbolTable` may wrap them in [`SdaError::Operation`] to record which
//! operation and offset failed. Nothing here is fatal to the process.

use thiserror::Error;

use crate::analyser::MalformedImage;
use crate::core::id::HashId;
use crate::core::offset::{Offset, OffsetKind};
use crate::io::error::StoreError;

/// Main error type for the crate.
#[derive(Debug, Error)]
pub enum SdaError {
    /// Byte store range violation or store I/O failure
    #[error("Byte store error: {0}")]
    Store(#[from] StoreError),

    /// Translation requested for a location that no section covers
    #[error("No section maps {kind} offset {value:#x}")]
    UnmappedOffset { value: u64, kind: OffsetKind },

    /// Analyser rejected the image header or section table
    #[error("Malformed image: {0}")]
    MalformedImage(#[from] MalformedImage),

    /// Symbol lookup miss
    #[error("No symbol at offset {offset}")]
    NoSymbol { offset: Offset },

    /// Registry lookup miss
    #[error("Object not found: {hash_id}")]
    NotFound { hash_id: HashId },

    /// Registry hit of an unexpected class
    #[error("Object {hash_id} is a {found}, expected {expected}")]
    WrongClass {
        hash_id: HashId,
        found: &'static str,
        expected: &'static str,
    },

    /// No analyser registered under the requested name
    #[error("Unknown image analyser: {0}")]
    UnknownAnalyser(String),

    /// Record could not be produced or consumed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// File I/O errors outside of a byte store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A lower-level failure with the operation and offset it occurred at
    #[error("{operation} at {offset} failed: {source}")]
    Operation {
        operation: &'static str,
        offset: Offset,
        #[source]
        source: Box<SdaError>,
    },
}

impl SdaError {
    /// Wrap this error with the operation and offset that produced it.
    pub fn during(self, operation: &'static str, offset: Offset) -> Self {
        SdaError::Operation {
            operation,
            offset,
            source: Box::new(self),
        }
    }

    /// The innermost error, with every [`SdaError::Operation`] layer removed.
    pub fn root(&self) -> &SdaError {
        let mut current = self;
        while let SdaError::Operation { source, .. } = current {
            current = source;
        }
        current
    }

    /// True when the root error is a byte store range violation.
    pub fn is_out_of_bounds(&self) -> bool {
        matches!(self.root(), SdaError::Store(StoreError::OutOfBounds { .. }))
    }
}

impl From<serde_json::Error> for SdaError {
    fn from(err: serde_json::Error) -> Self {
        SdaError::Serialization(err.to_string())
    }
}

/// Result type alias for crate operations
pub type Result<T> = std::result::Result<T, SdaError>;
