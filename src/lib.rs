//! Address-space and symbol model for binary reverse engineering.
//!
//! An [`image::Image`] binds a byte store, the section map produced by an
//! [`analyser::ImageAnalyser`] and a global [`symbol_table::SymbolTable`].
//! Every long-lived entity is registered in the [`context::Context`] that
//! created it and can be looked up again by its hash id.

/// Analyser capability interface and registry
pub mod analyser;
/// Configuration for stores and analysis
pub mod config;
/// Session object: registry, callbacks, analysers
pub mod context;
/// Core data types: offsets, ids, objects, sections, symbols, data types
pub mod core;
/// Error types
pub mod error;
/// Executable format parsers
pub mod formats;
/// Images, section maps and address spaces
pub mod image;
/// Byte stores
pub mod io;
/// Tracing setup
pub mod logging;
/// Offset-ordered symbol tables
pub mod symbol_table;

mod sync;

pub use crate::error::{Result, SdaError};
