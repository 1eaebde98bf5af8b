//! Address spaces: ordered collections of images sharing one canonical
//! offset domain (e.g. an executable and the libraries mapped beside it).

use serde_json::Value;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::context::Context;
use crate::core::id::HashId;
use crate::core::object::{record_array, ContextMeta, ContextObject, Object, ObjectHeader, Record};
use crate::core::offset::Offset;
use crate::error::{Result, SdaError};
use crate::image::Image;
use crate::sync;

pub struct AddressSpace {
    header: ObjectHeader,
    meta: ContextMeta,
    context: Arc<Context>,
    images: RwLock<Vec<Arc<Image>>>,
}

impl AddressSpace {
    pub const CLASS: &'static str = "AddressSpace";

    pub fn new(context: &Arc<Context>, name: &str) -> Arc<Self> {
        Self::build(context, ObjectHeader::new(Self::CLASS), name)
    }

    pub fn with_id(context: &Arc<Context>, id: Uuid, name: &str) -> Arc<Self> {
        Self::build(context, ObjectHeader::with_id(Self::CLASS, id), name)
    }

    fn build(context: &Arc<Context>, header: ObjectHeader, name: &str) -> Arc<Self> {
        context.register(Arc::new(Self {
            header,
            meta: ContextMeta::new(name),
            context: Arc::clone(context),
            images: RwLock::new(Vec::new()),
        }))
    }

    /// Append `image`; false if it is already part of this space.
    pub fn add_image(&self, image: Arc<Image>) -> bool {
        {
            let mut images = sync::write(&self.images);
            if images.iter().any(|i| i.hash_id() == image.hash_id()) {
                return false;
            }
            debug!(space = %self.name(), image = %image.name(), "Added image to address space");
            images.push(image);
        }
        self.context.callbacks().object_changed(self);
        true
    }

    pub fn remove_image(&self, hash_id: HashId) -> Option<Arc<Image>> {
        let removed = {
            let mut images = sync::write(&self.images);
            let index = images.iter().position(|i| i.hash_id() == hash_id)?;
            images.remove(index)
        };
        self.context.callbacks().object_changed(self);
        Some(removed)
    }

    pub fn images(&self) -> Vec<Arc<Image>> {
        sync::read(&self.images).clone()
    }

    /// First image whose canonical range `[base, size)` holds `offset`.
    pub fn image_at(&self, offset: Offset) -> Option<Arc<Image>> {
        sync::read(&self.images)
            .iter()
            .find(|image| offset >= image.base_address() && image.contains(offset))
            .cloned()
    }
}

impl Object for AddressSpace {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn serialize(&self) -> Record {
        let mut map = self.header.record();
        self.meta.write_record(&mut map);
        let images = sync::read(&self.images)
            .iter()
            .map(|image| Value::from(image.hash_id().raw()))
            .collect();
        map.insert("images".into(), Value::Array(images));
        Value::Object(map)
    }

    fn deserialize(&self, record: &Record) -> Result<()> {
        let registry = self.context.registry();
        let mut images = Vec::new();
        for entry in record_array(record, "images")? {
            let hash_id = entry
                .as_u64()
                .map(HashId::from_raw)
                .ok_or_else(|| SdaError::Serialization("image id".into()))?;
            images.push(registry.get_as::<Image>(hash_id)?);
        }
        self.meta.read_record(record);
        *sync::write(&self.images) = images;
        Ok(())
    }
}

impl ContextObject for AddressSpace {
    fn meta(&self) -> &ContextMeta {
        &self.meta
    }

    fn context(&self) -> &Arc<Context> {
        &self.context
    }
}

impl fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressSpace")
            .field("hash_id", &self.hash_id())
            .field("name", &self.name())
            .field("images", &sync::read(&self.images).len())
            .finish()
    }
}
