//! Object identity and the context-object contract.
//!
//! Every analysis entity implements [`Object`]: it carries an immutable
//! [`ObjectHeader`] (uuid, hash id, class name, temporary flag) and can turn
//! itself into a plain key/value [`Record`]. Entities with a human name and
//! comment additionally implement [`ContextObject`]; renaming fires
//! `on_object_changed` and never touches the hash id.

use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::context::Context;
use crate::core::id::{HashId, IdGenerator};
use crate::error::{Result, SdaError};
use crate::sync;

/// Structured record produced by `serialize()`: strings, numbers, nested
/// records and arrays. No binary blobs.
pub type Record = Value;

/// Identity shared by every object.
#[derive(Debug)]
pub struct ObjectHeader {
    id: Uuid,
    hash_id: HashId,
    class_name: &'static str,
    temporary: AtomicBool,
}

impl ObjectHeader {
    /// Header with a fresh random id.
    pub fn new(class_name: &'static str) -> Self {
        Self::with_id(class_name, IdGenerator::object_id())
    }

    /// Header for an object restored under a known id.
    pub fn with_id(class_name: &'static str, id: Uuid) -> Self {
        Self {
            id,
            hash_id: IdGenerator::hash_id(class_name, &id),
            class_name,
            temporary: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn hash_id(&self) -> HashId {
        self.hash_id
    }

    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary.load(Ordering::Acquire)
    }

    pub fn set_temporary(&self, temporary: bool) {
        self.temporary.store(temporary, Ordering::Release);
    }

    /// Start a record with the identity fields every object writes.
    pub fn record(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("uuid".into(), Value::String(self.id.to_string()));
        map.insert("class".into(), Value::String(self.class_name.into()));
        map
    }

    /// Read the object id stored in a record.
    pub fn id_from_record(record: &Record) -> Result<Uuid> {
        let raw = record_str(record, "uuid")?;
        Uuid::parse_str(raw).map_err(|e| SdaError::Serialization(format!("uuid: {}", e)))
    }
}

/// An analysis entity with a stable identity.
pub trait Object: Any + Send + Sync + fmt::Debug {
    fn header(&self) -> &ObjectHeader;

    /// Plain key/value record describing the object.
    fn serialize(&self) -> Record;

    /// Restore mutable state from a record produced by `serialize()`.
    fn deserialize(&self, record: &Record) -> Result<()>;

    fn hash_id(&self) -> HashId {
        self.header().hash_id()
    }

    fn class_name(&self) -> &'static str {
        self.header().class_name()
    }

    fn id(&self) -> Uuid {
        self.header().id()
    }

    fn is_temporary(&self) -> bool {
        self.header().is_temporary()
    }

    /// Temporary objects are skipped by enumeration and persistence until
    /// promoted back with `set_temporary(false)`.
    fn set_temporary(&self, temporary: bool) {
        self.header().set_temporary(temporary)
    }
}

/// Upcast helper so trait default methods can hand `self` to callbacks.
pub trait AsObject {
    fn as_object(&self) -> &dyn Object;
}

impl<T: Object> AsObject for T {
    fn as_object(&self) -> &dyn Object {
        self
    }
}

/// Mutable human-facing metadata of a context object.
#[derive(Debug, Default)]
pub struct ContextMeta {
    name: RwLock<String>,
    comment: RwLock<String>,
}

impl ContextMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: RwLock::new(name.into()),
            comment: RwLock::new(String::new()),
        }
    }

    pub fn name(&self) -> String {
        sync::read(&self.name).clone()
    }

    pub fn comment(&self) -> String {
        sync::read(&self.comment).clone()
    }

    pub fn set_name(&self, name: &str) {
        *sync::write(&self.name) = name.to_string();
    }

    pub fn set_comment(&self, comment: &str) {
        *sync::write(&self.comment) = comment.to_string();
    }

    /// Write `name` and `comment` into a record under construction.
    pub fn write_record(&self, map: &mut Map<String, Value>) {
        map.insert("name".into(), Value::String(self.name()));
        map.insert("comment".into(), Value::String(self.comment()));
    }

    /// Restore `name` and `comment`; missing keys leave the value unchanged.
    pub fn read_record(&self, record: &Record) {
        if let Some(name) = record.get("name").and_then(Value::as_str) {
            self.set_name(name);
        }
        if let Some(comment) = record.get("comment").and_then(Value::as_str) {
            self.set_comment(comment);
        }
    }
}

/// An object owned by a context, with a mutable name and comment.
pub trait ContextObject: Object + AsObject {
    fn meta(&self) -> &ContextMeta;

    fn context(&self) -> &Arc<Context>;

    fn name(&self) -> String {
        self.meta().name()
    }

    fn comment(&self) -> String {
        self.meta().comment()
    }

    fn set_name(&self, name: &str) {
        self.meta().set_name(name);
        self.context().callbacks().object_changed(self.as_object());
    }

    fn set_comment(&self, comment: &str) {
        self.meta().set_comment(comment);
        self.context().callbacks().object_changed(self.as_object());
    }
}

pub(crate) fn record_str<'a>(record: &'a Record, key: &str) -> Result<&'a str> {
    record
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| SdaError::Serialization(format!("missing string field '{}'", key)))
}

pub(crate) fn record_u64(record: &Record, key: &str) -> Result<u64> {
    record
        .get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| SdaError::Serialization(format!("missing integer field '{}'", key)))
}

pub(crate) fn record_array<'a>(record: &'a Record, key: &str) -> Result<&'a Vec<Value>> {
    record
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| SdaError::Serialization(format!("missing array field '{}'", key)))
}
