//! Error types for byte stores.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Range {offset:#x}+{len:#x} exceeds store size {size:#x}")]
    OutOfBounds { offset: u64, len: u64, size: u64 },

    #[error("File size of {found} bytes exceeds the maximum allowed size of {limit} bytes.")]
    FileTooLarge { limit: u64, found: u64 },

    #[error("An underlying I/O error occurred: {0}")]
    StdIo(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
