//! Offset-ordered symbol tables with nesting.
//!
//! A table maps canonical offsets to symbols. Lookups find the greatest entry
//! at or below the queried offset; a sized symbol only matches inside its
//! extent, an unsized one matches any later offset. Tables nest: a child
//! table (e.g. the locals of one function) shadows its parent inside the
//! child's [`SymbolTable::span`], and a miss in a child falls back to its
//! ancestors.
//!
//! Parents own their children; a child only holds a weak link back up.

pub mod printer;

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::sync::{Arc, RwLock, Weak};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::context::Context;
use crate::core::id::HashId;
use crate::core::object::{
    record_array, record_u64, ContextMeta, ContextObject, Object, ObjectHeader, Record,
};
use crate::core::offset::Offset;
use crate::core::symbol::Symbol;
use crate::error::{Result, SdaError};
use crate::sync;

pub use printer::SymbolTablePrinter;

/// Result of a successful [`SymbolTable::get_symbol_at`].
#[derive(Debug, Clone)]
pub struct SymbolInfo {
    pub symbol: Arc<Symbol>,
    /// Offset of the matching entry.
    pub entry_offset: Offset,
    /// Displacement of the queried offset into the symbol.
    pub symbol_offset: u64,
    /// Table holding the entry.
    pub table: Arc<SymbolTable>,
}

impl SymbolInfo {
    /// `name` or `name+0x4`.
    pub fn reference(&self) -> String {
        printer::format_reference(&self.symbol.name(), self.symbol_offset)
    }
}

#[derive(Default)]
struct TableState {
    symbols: BTreeMap<Offset, Arc<Symbol>>,
    parent: Weak<SymbolTable>,
    children: Vec<Arc<SymbolTable>>,
}

pub struct SymbolTable {
    header: ObjectHeader,
    meta: ContextMeta,
    context: Arc<Context>,
    state: RwLock<TableState>,
}

impl SymbolTable {
    pub const CLASS: &'static str = "SymbolTable";

    /// Create and register an empty table.
    pub fn new(context: &Arc<Context>, name: &str) -> Arc<Self> {
        Self::build(context, ObjectHeader::new(Self::CLASS), name)
    }

    /// Create and register an empty table under a known id.
    pub fn with_id(context: &Arc<Context>, id: Uuid, name: &str) -> Arc<Self> {
        Self::build(context, ObjectHeader::with_id(Self::CLASS, id), name)
    }

    fn build(context: &Arc<Context>, header: ObjectHeader, name: &str) -> Arc<Self> {
        context.register(Arc::new(Self {
            header,
            meta: ContextMeta::new(name),
            context: Arc::clone(context),
            state: RwLock::new(TableState::default()),
        }))
    }

    /// Place `symbol` at `offset`, replacing and returning any previous entry.
    ///
    /// Fires one `on_object_changed` for the table either way.
    pub fn add_symbol(&self, offset: Offset, symbol: Arc<Symbol>) -> Option<Arc<Symbol>> {
        let name = symbol.name();
        let replaced = sync::write(&self.state).symbols.insert(offset, symbol);
        match &replaced {
            Some(old) => debug!(
                table = %self.name(),
                %offset,
                old = %old.name(),
                new = %name,
                "Replaced symbol"
            ),
            None => trace!(table = %self.name(), %offset, symbol = %name, "Added symbol"),
        }
        self.context.callbacks().object_changed(self);
        replaced
    }

    /// Remove the entry covering `offset` in this table.
    pub fn remove_symbol(&self, offset: Offset) -> Result<Arc<Symbol>> {
        let removed = {
            let mut state = sync::write(&self.state);
            let entry = local_lookup(&state.symbols, offset).map(|(at, _, _)| at);
            entry.and_then(|at| state.symbols.remove(&at).map(|s| (at, s)))
        };
        let Some((at, symbol)) = removed else {
            return Err(SdaError::NoSymbol { offset }.during("remove_symbol", offset));
        };
        debug!(table = %self.name(), offset = %at, symbol = %symbol.name(), "Removed symbol");
        self.context.callbacks().object_changed(self);
        Ok(symbol)
    }

    /// Symbol placed exactly at `offset`.
    pub fn get(&self, offset: Offset) -> Option<Arc<Symbol>> {
        sync::read(&self.state).symbols.get(&offset).cloned()
    }

    /// Resolve `offset` innermost-first: child tables covering it, then this
    /// table, then each ancestor's own entries.
    pub fn get_symbol_at(self: &Arc<Self>, offset: Offset) -> Result<SymbolInfo> {
        if let Some(info) = self.lookup_down(offset) {
            return Ok(info);
        }
        let mut ancestor = self.parent();
        while let Some(table) = ancestor {
            if let Some(info) = table.lookup_here(offset) {
                return Ok(info);
            }
            ancestor = table.parent();
        }
        Err(SdaError::NoSymbol { offset })
    }

    fn lookup_down(self: &Arc<Self>, offset: Offset) -> Option<SymbolInfo> {
        for child in self.children() {
            if child.span().is_some_and(|span| span.contains(&offset.value())) {
                if let Some(info) = child.lookup_down(offset) {
                    return Some(info);
                }
            }
        }
        self.lookup_here(offset)
    }

    fn lookup_here(self: &Arc<Self>, offset: Offset) -> Option<SymbolInfo> {
        let state = sync::read(&self.state);
        local_lookup(&state.symbols, offset).map(|(entry_offset, symbol, displacement)| {
            SymbolInfo {
                symbol: Arc::clone(symbol),
                entry_offset,
                symbol_offset: displacement,
                table: Arc::clone(self),
            }
        })
    }

    /// Entries in offset order.
    pub fn symbols(&self) -> Vec<(Offset, Arc<Symbol>)> {
        sync::read(&self.state)
            .symbols
            .iter()
            .map(|(offset, symbol)| (*offset, Arc::clone(symbol)))
            .collect()
    }

    /// Replace every entry at once. Fires one `on_object_changed`.
    pub fn set_symbols(&self, symbols: BTreeMap<Offset, Arc<Symbol>>) {
        let count = symbols.len();
        sync::write(&self.state).symbols = symbols;
        debug!(table = %self.name(), count, "Replaced symbol set");
        self.context.callbacks().object_changed(self);
    }

    pub fn len(&self) -> usize {
        sync::read(&self.state).symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        sync::read(&self.state).symbols.is_empty()
    }

    /// Canonical range from the first entry to the end of the last entry's
    /// extent. Unsized entries count as one byte.
    pub fn span(&self) -> Option<Range<u64>> {
        let state = sync::read(&self.state);
        let (first, _) = state.symbols.first_key_value()?;
        let (last, symbol) = state.symbols.last_key_value()?;
        let end = last
            .value()
            .saturating_add(symbol.extent().unwrap_or(1));
        Some(first.value()..end)
    }

    pub fn parent(&self) -> Option<Arc<SymbolTable>> {
        sync::read(&self.state).parent.upgrade()
    }

    pub fn children(&self) -> Vec<Arc<SymbolTable>> {
        sync::read(&self.state).children.clone()
    }

    /// Nest `child` under this table.
    ///
    /// Returns false, leaving both tables untouched, if `child` already has a
    /// parent or if nesting it would form a cycle.
    pub fn add_child(self: &Arc<Self>, child: Arc<SymbolTable>) -> bool {
        if self.has_ancestor_or_self(&child) {
            return false;
        }
        {
            let mut child_state = sync::write(&child.state);
            if child_state.parent.upgrade().is_some() {
                return false;
            }
            child_state.parent = Arc::downgrade(self);
        }
        sync::write(&self.state).children.push(Arc::clone(&child));
        debug!(table = %self.name(), child = %child.name(), "Nested symbol table");
        self.context.callbacks().object_changed(&**self);
        true
    }

    /// Detach the child table with `hash_id` and hand it back to the caller.
    pub fn remove_child(&self, hash_id: HashId) -> Option<Arc<SymbolTable>> {
        let child = {
            let mut state = sync::write(&self.state);
            let index = state.children.iter().position(|c| c.hash_id() == hash_id)?;
            state.children.remove(index)
        };
        sync::write(&child.state).parent = Weak::new();
        self.context.callbacks().object_changed(self);
        Some(child)
    }

    fn has_ancestor_or_self(&self, table: &Arc<SymbolTable>) -> bool {
        if self.hash_id() == table.hash_id() {
            return true;
        }
        let mut ancestor = self.parent();
        while let Some(current) = ancestor {
            if current.hash_id() == table.hash_id() {
                return true;
            }
            ancestor = current.parent();
        }
        false
    }
}

/// Greatest entry at or below `offset` that covers it, with the displacement.
fn local_lookup(
    symbols: &BTreeMap<Offset, Arc<Symbol>>,
    offset: Offset,
) -> Option<(Offset, &Arc<Symbol>, u64)> {
    let (entry, symbol) = symbols.range(..=offset).next_back()?;
    let displacement = offset.distance_from(*entry)?;
    match symbol.extent() {
        Some(extent) if displacement >= extent => None,
        _ => Some((*entry, symbol, displacement)),
    }
}

impl Object for SymbolTable {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn serialize(&self) -> Record {
        let mut map = self.header.record();
        self.meta.write_record(&mut map);
        let state = sync::read(&self.state);
        let symbols: Vec<Value> = state
            .symbols
            .iter()
            .map(|(offset, symbol)| {
                json!({ "offset": offset.value(), "symbol": symbol.hash_id().raw() })
            })
            .collect();
        let children: Vec<Value> = state
            .children
            .iter()
            .map(|child| Value::from(child.hash_id().raw()))
            .collect();
        map.insert("symbols".into(), Value::Array(symbols));
        map.insert("children".into(), Value::Array(children));
        Value::Object(map)
    }

    /// Resolves symbols and child tables through the registry; all of them
    /// must be restored before the table itself.
    fn deserialize(&self, record: &Record) -> Result<()> {
        let registry = self.context.registry();

        let mut symbols = BTreeMap::new();
        for entry in record_array(record, "symbols")? {
            let offset = Offset::new(record_u64(entry, "offset")?);
            let hash_id = HashId::from_raw(record_u64(entry, "symbol")?);
            symbols.insert(offset, registry.get_as::<Symbol>(hash_id)?);
        }

        let mut children = Vec::new();
        for child in record_array(record, "children")? {
            let hash_id = child
                .as_u64()
                .map(HashId::from_raw)
                .ok_or_else(|| SdaError::Serialization("child table id".into()))?;
            children.push(registry.get_as::<SymbolTable>(hash_id)?);
        }

        let this = registry.get_as::<SymbolTable>(self.hash_id())?;
        for child in &children {
            sync::write(&child.state).parent = Arc::downgrade(&this);
        }

        self.meta.read_record(record);
        {
            let mut state = sync::write(&self.state);
            state.symbols = symbols;
            state.children = children;
        }
        self.context.callbacks().object_changed(self);
        Ok(())
    }
}

impl ContextObject for SymbolTable {
    fn meta(&self) -> &ContextMeta {
        &self.meta
    }

    fn context(&self) -> &Arc<Context> {
        &self.context
    }
}

impl fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = sync::read(&self.state);
        f.debug_struct("SymbolTable")
            .field("hash_id", &self.hash_id())
            .field("name", &self.name())
            .field("symbols", &state.symbols.len())
            .field("children", &state.children.len())
            .finish()
    }
}
