//! Identity utilities for registered objects.
//!
//! Every object carries a random UUID and a [`HashId`] derived from its class
//! name and that UUID. The hash id is the sole key for registry lookup, so two
//! objects built from the same identity content always collide on purpose.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// Registry key of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashId(u64);

impl HashId {
    pub const fn from_raw(value: u64) -> Self {
        HashId(value)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HashId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// ID generation strategies.
#[derive(Debug)]
pub struct IdGenerator;

impl IdGenerator {
    /// Fresh random object id.
    pub fn object_id() -> Uuid {
        Uuid::new_v4()
    }

    /// Hash id of an object: first 8 bytes of SHA-256 over `"<class>:<uuid>"`.
    pub fn hash_id(class_name: &str, id: &Uuid) -> HashId {
        let mut hasher = Sha256::new();
        hasher.update(class_name.as_bytes());
        hasher.update(b":");
        hasher.update(id.as_hyphenated().to_string().as_bytes());
        let hash = hasher.finalize();
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&hash[..8]);
        HashId(u64::from_be_bytes(raw))
    }

    /// Content-based id for image bytes, used to check that a reloaded
    /// store still holds the bytes an image was analysed from.
    pub fn content_hash(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        format!("sha256:{}", hex::encode(hasher.finalize()))
    }
}
