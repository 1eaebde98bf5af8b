//! Images: a byte store, its analysed layout and a global symbol table.
//!
//! An image is created unanalysed: canonical offsets equal file offsets and
//! the section list is empty. [`Image::analyse`] runs the bound analyser and
//! installs the new layout in one step, or leaves the previous layout in place
//! when the analyser rejects the bytes.
//!
//! Mutations (analysis, raw writes, flush) are serialized per image. Queries
//! read a snapshot of the layout and run concurrently with each other.

pub mod address_space;
pub mod section_map;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analyser::{AnalysisResult, ImageAnalyser};
use crate::context::Context;
use crate::core::id::IdGenerator;
use crate::core::object::{ContextMeta, ContextObject, Object, ObjectHeader, Record};
use crate::core::offset::{FileOffset, Offset, OffsetKind};
use crate::core::section::ImageSection;
use crate::error::{Result, SdaError};
use crate::io::ByteStore;
use crate::symbol_table::SymbolTable;
use crate::sync;

pub use address_space::AddressSpace;
pub use section_map::SectionMap;

/// Layout installed by a successful analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageLayout {
    pub base_address: u64,
    pub entry_point_offset: Offset,
    /// One past the last canonical offset.
    pub end_offset: Offset,
    pub sections: SectionMap,
    /// Hash of the bytes the layout was derived from.
    pub content_hash: String,
}

impl ImageLayout {
    fn from_analysis(result: AnalysisResult, content: &[u8]) -> Self {
        Self {
            base_address: result.base_address,
            entry_point_offset: result.entry_point_offset,
            end_offset: result.end_offset(),
            sections: SectionMap::new(result.sections),
            content_hash: IdGenerator::content_hash(content),
        }
    }
}

/// Outcome of a section lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionLookup {
    Found(ImageSection),
    /// Inside the image but not covered by any section.
    Unmapped,
    /// At or past the end of the image.
    OutOfBounds,
}

impl SectionLookup {
    pub fn section(&self) -> Option<&ImageSection> {
        match self {
            SectionLookup::Found(section) => Some(section),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, SectionLookup::Found(_))
    }
}

pub struct Image {
    header: ObjectHeader,
    meta: ContextMeta,
    context: Arc<Context>,
    store: RwLock<Box<dyn ByteStore>>,
    analyser: Arc<dyn ImageAnalyser>,
    global_symbol_table: Arc<SymbolTable>,
    layout: RwLock<Option<Arc<ImageLayout>>>,
    mutation: Mutex<()>,
}

impl Image {
    pub const CLASS: &'static str = "Image";

    /// Create and register an unanalysed image.
    pub fn new(
        context: &Arc<Context>,
        store: Box<dyn ByteStore>,
        analyser: Arc<dyn ImageAnalyser>,
        name: &str,
        global_symbol_table: Arc<SymbolTable>,
    ) -> Arc<Self> {
        Self::build(
            context,
            ObjectHeader::new(Self::CLASS),
            store,
            analyser,
            name,
            global_symbol_table,
        )
    }

    /// Create and register an unanalysed image under a known id.
    pub fn with_id(
        context: &Arc<Context>,
        id: Uuid,
        store: Box<dyn ByteStore>,
        analyser: Arc<dyn ImageAnalyser>,
        name: &str,
        global_symbol_table: Arc<SymbolTable>,
    ) -> Arc<Self> {
        Self::build(
            context,
            ObjectHeader::with_id(Self::CLASS, id),
            store,
            analyser,
            name,
            global_symbol_table,
        )
    }

    fn build(
        context: &Arc<Context>,
        header: ObjectHeader,
        store: Box<dyn ByteStore>,
        analyser: Arc<dyn ImageAnalyser>,
        name: &str,
        global_symbol_table: Arc<SymbolTable>,
    ) -> Arc<Self> {
        context.register(Arc::new(Self {
            header,
            meta: ContextMeta::new(name),
            context: Arc::clone(context),
            store: RwLock::new(store),
            analyser,
            global_symbol_table,
            layout: RwLock::new(None),
            mutation: Mutex::new(()),
        }))
    }

    /// Run the bound analyser and install its layout.
    ///
    /// On failure the image keeps its previous layout, which for a fresh
    /// image is the unanalysed state with no sections.
    pub fn analyse(&self) -> Result<()> {
        {
            let _guard = sync::lock(&self.mutation);
            let span = crate::span_trace!("analyse", image = %self.name(), analyser = self.analyser.name());
            let _enter = span.enter();

            let layout = {
                let store = sync::read(&self.store);
                match self
                    .analyser
                    .analyse(store.as_bytes())
                    .and_then(|result| result.validate().map(|()| result))
                {
                    Ok(result) => ImageLayout::from_analysis(result, store.as_bytes()),
                    Err(e) => {
                        warn!(error = %e, "Analysis failed; keeping previous layout");
                        return Err(SdaError::from(e).during("analyse", Offset::new(0)));
                    }
                }
            };

            info!(
                base = %Offset::new(layout.base_address),
                entry = %layout.entry_point_offset,
                end = %layout.end_offset,
                sections = layout.sections.len(),
                "Installed image layout"
            );
            *sync::write(&self.layout) = Some(Arc::new(layout));
        }
        // observers may re-enter the image
        self.context.callbacks().object_changed(self);
        Ok(())
    }

    pub fn is_analysed(&self) -> bool {
        sync::read(&self.layout).is_some()
    }

    /// Current layout, if the image has been analysed.
    pub fn layout(&self) -> Option<Arc<ImageLayout>> {
        sync::read(&self.layout).clone()
    }

    pub fn analyser(&self) -> &Arc<dyn ImageAnalyser> {
        &self.analyser
    }

    pub fn analyser_name(&self) -> &str {
        self.analyser.name()
    }

    pub fn global_symbol_table(&self) -> &Arc<SymbolTable> {
        &self.global_symbol_table
    }

    pub fn base_address(&self) -> Offset {
        Offset::new(self.layout().map_or(0, |l| l.base_address))
    }

    pub fn entry_point_offset(&self) -> Offset {
        self.layout()
            .map_or(Offset::new(0), |l| l.entry_point_offset)
    }

    /// One past the last canonical offset of the image; the store size while
    /// unanalysed.
    pub fn size(&self) -> u64 {
        match self.layout() {
            Some(layout) => layout.end_offset.value(),
            None => sync::read(&self.store).size(),
        }
    }

    /// Snapshot of the section list, in analyser order.
    pub fn sections(&self) -> Vec<ImageSection> {
        self.layout()
            .map(|l| l.sections.sections().to_vec())
            .unwrap_or_default()
    }

    /// True if `offset` lies inside the image, mapped or not.
    pub fn contains(&self, offset: Offset) -> bool {
        offset.value() < self.size()
    }

    pub fn get_image_section_at(&self, offset: Offset) -> SectionLookup {
        if !self.contains(offset) {
            return SectionLookup::OutOfBounds;
        }
        match self.layout() {
            Some(layout) => layout
                .sections
                .section_at(offset)
                .cloned()
                .map_or(SectionLookup::Unmapped, SectionLookup::Found),
            None => SectionLookup::Unmapped,
        }
    }

    /// Canonical offset of a raw file byte.
    pub fn to_offset(&self, file_offset: FileOffset) -> Result<Offset> {
        match self.layout() {
            Some(layout) => layout.sections.to_offset(file_offset),
            None if file_offset.value() < sync::read(&self.store).size() => {
                Ok(Offset::new(file_offset.value()))
            }
            None => Err(SdaError::UnmappedOffset {
                value: file_offset.value(),
                kind: OffsetKind::File,
            }),
        }
    }

    /// Raw file byte behind a canonical offset.
    pub fn to_image_file_offset(&self, offset: Offset) -> Result<FileOffset> {
        match self.layout() {
            Some(layout) => layout.sections.to_image_file_offset(offset),
            None if self.contains(offset) => Ok(FileOffset::new(offset.value())),
            None => Err(SdaError::UnmappedOffset {
                value: offset.value(),
                kind: OffsetKind::Canonical,
            }),
        }
    }

    /// Read `len` bytes at a canonical offset. The range must stay inside the
    /// raw data of one section.
    pub fn read(&self, offset: Offset, len: u64) -> Result<Bytes> {
        self.read_canonical(offset, len)
            .map_err(|e| e.during("read", offset))
    }

    fn read_canonical(&self, offset: Offset, len: u64) -> Result<Bytes> {
        let unmapped = |value: u64| SdaError::UnmappedOffset {
            value,
            kind: OffsetKind::Canonical,
        };
        let start = match self.layout() {
            Some(layout) => {
                let section = layout
                    .sections
                    .section_at(offset)
                    .ok_or_else(|| unmapped(offset.value()))?;
                let start = section
                    .to_image_file_offset(offset)
                    .ok_or_else(|| unmapped(offset.value()))?;
                if len > 0 {
                    let last = offset
                        .checked_add(len - 1)
                        .ok_or_else(|| unmapped(offset.value()))?;
                    section
                        .to_image_file_offset(last)
                        .ok_or_else(|| unmapped(last.value()))?;
                }
                start
            }
            None => FileOffset::new(offset.value()),
        };
        Ok(sync::read(&self.store).read(start.value(), len)?)
    }

    /// Read raw file bytes, bypassing the section map.
    pub fn read_raw(&self, file_offset: FileOffset, len: u64) -> Result<Bytes> {
        Ok(sync::read(&self.store).read(file_offset.value(), len)?)
    }

    /// Write raw file bytes. The layout is not re-derived; call
    /// [`Image::analyse`] after patching headers.
    pub fn write_raw(&self, file_offset: FileOffset, data: &[u8]) -> Result<()> {
        let _guard = sync::lock(&self.mutation);
        sync::write(&self.store)
            .write(file_offset.value(), data)
            .map_err(|e| SdaError::from(e).during("write", Offset::new(file_offset.value())))?;
        debug!(image = %self.name(), offset = %file_offset, len = data.len(), "Wrote raw bytes");
        Ok(())
    }

    /// Persist pending writes to the store's backing.
    pub fn flush(&self) -> Result<()> {
        let _guard = sync::lock(&self.mutation);
        Ok(sync::write(&self.store).flush()?)
    }

    /// Descriptor of the byte store (kind, path, size).
    pub fn store_record(&self) -> Record {
        sync::read(&self.store).serialize()
    }
}

impl Object for Image {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn serialize(&self) -> Record {
        let mut map = self.header.record();
        self.meta.write_record(&mut map);
        map.insert("analyser".into(), Value::String(self.analyser_name().into()));
        map.insert("store".into(), self.store_record());
        map.insert(
            "global_symbol_table".into(),
            Value::from(self.global_symbol_table.hash_id().raw()),
        );
        if let Some(layout) = self.layout() {
            map.insert(
                "layout".into(),
                serde_json::to_value(layout.as_ref()).unwrap_or(Value::Null),
            );
        }
        Value::Object(map)
    }

    /// Restores name, comment and a previously analysed layout. The layout is
    /// dropped with a warning when the store no longer holds the bytes it was
    /// derived from.
    fn deserialize(&self, record: &Record) -> Result<()> {
        let layout = match record.get("layout").filter(|v| !v.is_null()) {
            Some(layout) => Some(serde_json::from_value::<ImageLayout>(layout.clone())?),
            None => None,
        };
        self.meta.read_record(record);
        if let Some(layout) = layout {
            let _guard = sync::lock(&self.mutation);
            let current = IdGenerator::content_hash(sync::read(&self.store).as_bytes());
            if current == layout.content_hash {
                *sync::write(&self.layout) = Some(Arc::new(layout));
            } else {
                warn!(
                    image = %self.name(),
                    expected = %layout.content_hash,
                    found = %current,
                    "Stored layout does not match image bytes; image left unanalysed"
                );
            }
        }
        self.context.callbacks().object_changed(self);
        Ok(())
    }
}

impl ContextObject for Image {
    fn meta(&self) -> &ContextMeta {
        &self.meta
    }

    fn context(&self) -> &Arc<Context> {
        &self.context
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("hash_id", &self.hash_id())
            .field("name", &self.name())
            .field("analyser", &self.analyser_name())
            .field("size", &self.size())
            .field("analysed", &self.is_analysed())
            .finish()
    }
}
