//! Data types attached to symbols.
//!
//! A data type's size decides the extent of every symbol that uses it. Types
//! referring to other types (pointers, arrays, typedefs) hold the target's
//! hash id and resolve it through the owning context, so self-referential
//! structures do not form ownership cycles.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::context::Context;
use crate::core::id::HashId;
use crate::core::object::{ContextMeta, ContextObject, Object, ObjectHeader, Record};
use crate::error::Result;
use crate::sync;

/// Typedef chains deeper than this resolve to size 0.
const MAX_TYPE_DEPTH: usize = 32;

/// The shape of a data type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataTypeKind {
    /// No storage
    Void,
    /// Integer or floating point value of `size` bytes
    Scalar { size: u64, signed: bool, floating: bool },
    /// Pointer to another type; sized by the context pointer width
    Pointer { target: HashId },
    /// `count` consecutive elements
    Array { element: HashId, count: u64 },
    /// Alias of another type
    Typedef { target: HashId },
    /// Enumeration stored in `size` bytes
    Enum { size: u64 },
    /// Structure with an explicit total size
    Structure { size: u64 },
    /// Function signature; has no storage of its own
    Signature,
}

#[derive(Debug)]
pub struct DataType {
    header: ObjectHeader,
    meta: ContextMeta,
    context: Arc<Context>,
    kind: RwLock<DataTypeKind>,
}

impl DataType {
    pub const CLASS: &'static str = "DataType";

    /// Create and register a data type.
    pub fn new(context: &Arc<Context>, name: &str, kind: DataTypeKind) -> Arc<Self> {
        Self::build(context, ObjectHeader::new(Self::CLASS), name, kind)
    }

    /// Create and register a data type under a known id.
    pub fn with_id(context: &Arc<Context>, id: Uuid, name: &str, kind: DataTypeKind) -> Arc<Self> {
        Self::build(context, ObjectHeader::with_id(Self::CLASS, id), name, kind)
    }

    fn build(
        context: &Arc<Context>,
        header: ObjectHeader,
        name: &str,
        kind: DataTypeKind,
    ) -> Arc<Self> {
        context.register(Arc::new(Self {
            header,
            meta: ContextMeta::new(name),
            context: Arc::clone(context),
            kind: RwLock::new(kind),
        }))
    }

    pub fn void(context: &Arc<Context>) -> Arc<Self> {
        Self::new(context, "void", DataTypeKind::Void)
    }

    pub fn scalar(context: &Arc<Context>, name: &str, size: u64, signed: bool) -> Arc<Self> {
        Self::new(
            context,
            name,
            DataTypeKind::Scalar {
                size,
                signed,
                floating: false,
            },
        )
    }

    pub fn kind(&self) -> DataTypeKind {
        sync::read(&self.kind).clone()
    }

    /// Replace the shape of this type (e.g. resizing a structure).
    pub fn set_kind(&self, kind: DataTypeKind) {
        *sync::write(&self.kind) = kind;
        self.context.callbacks().object_changed(self);
    }

    /// Size in bytes; 0 for void, signatures and unresolvable targets.
    pub fn size(&self) -> u64 {
        self.size_at_depth(0)
    }

    fn size_at_depth(&self, depth: usize) -> u64 {
        if depth > MAX_TYPE_DEPTH {
            return 0;
        }
        match self.kind() {
            DataTypeKind::Void | DataTypeKind::Signature => 0,
            DataTypeKind::Scalar { size, .. }
            | DataTypeKind::Enum { size }
            | DataTypeKind::Structure { size } => size,
            DataTypeKind::Pointer { .. } => self.context.config().analysis.pointer_size,
            DataTypeKind::Array { element, count } => self
                .resolve(element)
                .map(|t| t.size_at_depth(depth + 1).saturating_mul(count))
                .unwrap_or(0),
            DataTypeKind::Typedef { target } => self
                .resolve(target)
                .map(|t| t.size_at_depth(depth + 1))
                .unwrap_or(0),
        }
    }

    fn resolve(&self, hash_id: HashId) -> Option<Arc<DataType>> {
        self.context.registry().get_as::<DataType>(hash_id).ok()
    }
}

impl Object for DataType {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn serialize(&self) -> Record {
        let mut map = self.header.record();
        self.meta.write_record(&mut map);
        map.insert(
            "kind".into(),
            serde_json::to_value(self.kind()).unwrap_or(Value::Null),
        );
        Value::Object(map)
    }

    fn deserialize(&self, record: &Record) -> Result<()> {
        self.meta.read_record(record);
        if let Some(kind) = record.get("kind") {
            let kind: DataTypeKind = serde_json::from_value(kind.clone())?;
            *sync::write(&self.kind) = kind;
        }
        Ok(())
    }
}

impl ContextObject for DataType {
    fn meta(&self) -> &ContextMeta {
        &self.meta
    }

    fn context(&self) -> &Arc<Context> {
        &self.context
    }
}
