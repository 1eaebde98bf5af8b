//! Core data types for the address-space and symbol model.
//!
//! Offsets and ids are plain values. Everything with an identity of its own
//! (data types, symbols) implements [`object::Object`] and is registered in
//! the context that created it.

pub mod data_type;
pub mod id;
pub mod object;
pub mod offset;
pub mod section;
pub mod symbol;
