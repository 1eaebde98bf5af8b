//! Symbols: named, typed program objects placed in symbol tables.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::context::Context;
use crate::core::data_type::DataType;
use crate::core::id::HashId;
use crate::core::object::{record_u64, ContextMeta, ContextObject, Object, ObjectHeader, Record};
use crate::error::{Result, SdaError};
use crate::sync;

/// Symbol kinds for different types of program entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    /// Global or local variable
    Variable,
    /// Function entry
    Function,
    /// Function parameter
    FunctionParameter,
    /// Field of a structure
    StructureField,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::Variable => write!(f, "Variable"),
            SymbolKind::Function => write!(f, "Function"),
            SymbolKind::FunctionParameter => write!(f, "FunctionParameter"),
            SymbolKind::StructureField => write!(f, "StructureField"),
        }
    }
}

/// Named program entity
#[derive(Debug)]
pub struct Symbol {
    header: ObjectHeader,
    meta: ContextMeta,
    context: Arc<Context>,
    kind: SymbolKind,
    data_type: RwLock<Arc<DataType>>,
}

impl Symbol {
    pub const CLASS: &'static str = "Symbol";

    /// Create and register a symbol.
    pub fn new(
        context: &Arc<Context>,
        kind: SymbolKind,
        name: &str,
        data_type: Arc<DataType>,
    ) -> Arc<Self> {
        Self::build(context, ObjectHeader::new(Self::CLASS), kind, name, data_type)
    }

    /// Create and register a symbol under a known id.
    pub fn with_id(
        context: &Arc<Context>,
        id: Uuid,
        kind: SymbolKind,
        name: &str,
        data_type: Arc<DataType>,
    ) -> Arc<Self> {
        Self::build(
            context,
            ObjectHeader::with_id(Self::CLASS, id),
            kind,
            name,
            data_type,
        )
    }

    fn build(
        context: &Arc<Context>,
        header: ObjectHeader,
        kind: SymbolKind,
        name: &str,
        data_type: Arc<DataType>,
    ) -> Arc<Self> {
        context.register(Arc::new(Self {
            header,
            meta: ContextMeta::new(name),
            context: Arc::clone(context),
            kind,
            data_type: RwLock::new(data_type),
        }))
    }

    pub fn kind(&self) -> SymbolKind {
        self.kind
    }

    pub fn data_type(&self) -> Arc<DataType> {
        Arc::clone(&sync::read(&self.data_type))
    }

    pub fn set_data_type(&self, data_type: Arc<DataType>) {
        *sync::write(&self.data_type) = data_type;
        self.context.callbacks().object_changed(self);
    }

    /// Number of bytes this symbol covers, or `None` when its type has no
    /// storage (lookups then fall back to nearest-preceding semantics).
    pub fn extent(&self) -> Option<u64> {
        match self.data_type().size() {
            0 => None,
            size => Some(size),
        }
    }

    /// True if this is a function symbol
    pub fn is_function(&self) -> bool {
        self.kind == SymbolKind::Function
    }
}

impl Object for Symbol {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn serialize(&self) -> Record {
        let mut map = self.header.record();
        self.meta.write_record(&mut map);
        map.insert(
            "kind".into(),
            serde_json::to_value(self.kind).unwrap_or(Value::Null),
        );
        map.insert(
            "data_type".into(),
            Value::from(self.data_type().hash_id().raw()),
        );
        Value::Object(map)
    }

    fn deserialize(&self, record: &Record) -> Result<()> {
        self.meta.read_record(record);
        if record.get("data_type").is_some() {
            let hash_id = HashId::from_raw(record_u64(record, "data_type")?);
            let data_type = self
                .context
                .registry()
                .get_as::<DataType>(hash_id)
                .map_err(|e| SdaError::Serialization(format!("symbol data type: {}", e)))?;
            *sync::write(&self.data_type) = data_type;
        }
        Ok(())
    }
}

impl ContextObject for Symbol {
    fn meta(&self) -> &ContextMeta {
        &self.meta
    }

    fn context(&self) -> &Arc<Context> {
        &self.context
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.data_type().name(), self.name())
    }
}
