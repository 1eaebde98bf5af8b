//! Common test utilities and helpers.
//!
//! Integration tests build their PE inputs in memory so they do not depend on
//! sample binaries being present.

#![allow(dead_code)]

use std::sync::Arc;

use sda_core::config::ContextConfig;
use sda_core::context::Context;

pub const E_LFANEW: usize = 0x80;
const COFF_HEADER_SIZE: usize = 20;
const SECTION_HEADER_SIZE: usize = 40;

pub const IMAGE_SCN_CNT_CODE: u32 = 0x0000_0020;
pub const IMAGE_SCN_CNT_INITIALIZED_DATA: u32 = 0x0000_0040;
pub const IMAGE_SCN_CNT_UNINITIALIZED_DATA: u32 = 0x0000_0080;
pub const IMAGE_SCN_MEM_EXECUTE: u32 = 0x2000_0000;
pub const IMAGE_SCN_MEM_READ: u32 = 0x4000_0000;
pub const IMAGE_SCN_MEM_WRITE: u32 = 0x8000_0000;

pub const TEXT: u32 = IMAGE_SCN_CNT_CODE | IMAGE_SCN_MEM_EXECUTE | IMAGE_SCN_MEM_READ;
pub const DATA: u32 = IMAGE_SCN_CNT_INITIALIZED_DATA | IMAGE_SCN_MEM_READ | IMAGE_SCN_MEM_WRITE;
pub const BSS: u32 = IMAGE_SCN_CNT_UNINITIALIZED_DATA | IMAGE_SCN_MEM_READ | IMAGE_SCN_MEM_WRITE;

/// One entry of the section table.
#[derive(Debug, Clone)]
pub struct SectionSpec {
    pub name: &'static str,
    pub rva: u32,
    pub virtual_size: u32,
    pub pointer_to_raw_data: u32,
    pub size_of_raw_data: u32,
    pub characteristics: u32,
}

/// Builder for minimal PE32 / PE32+ images.
#[derive(Debug, Clone)]
pub struct PeBuilder {
    pe32_plus: bool,
    image_base: u64,
    entry_point: u32,
    size_of_image: u32,
    section_alignment: u32,
    sections: Vec<SectionSpec>,
    file_len: usize,
}

impl Default for PeBuilder {
    fn default() -> Self {
        Self {
            pe32_plus: false,
            image_base: 0x400000,
            entry_point: 0x1000,
            size_of_image: 0x2000,
            section_alignment: 0x1000,
            sections: Vec::new(),
            file_len: 0x1400,
        }
    }
}

impl PeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pe32_plus(mut self, image_base: u64) -> Self {
        self.pe32_plus = true;
        self.image_base = image_base;
        self
    }

    pub fn image_base(mut self, image_base: u64) -> Self {
        self.image_base = image_base;
        self
    }

    pub fn entry_point(mut self, rva: u32) -> Self {
        self.entry_point = rva;
        self
    }

    pub fn size_of_image(mut self, size: u32) -> Self {
        self.size_of_image = size;
        self
    }

    pub fn file_len(mut self, len: usize) -> Self {
        self.file_len = len;
        self
    }

    pub fn section(
        mut self,
        name: &'static str,
        rva: u32,
        virtual_size: u32,
        pointer_to_raw_data: u32,
        size_of_raw_data: u32,
        characteristics: u32,
    ) -> Self {
        self.sections.push(SectionSpec {
            name,
            rva,
            virtual_size,
            pointer_to_raw_data,
            size_of_raw_data,
            characteristics,
        });
        self
    }

    fn optional_header_size(&self) -> usize {
        if self.pe32_plus {
            0xF0
        } else {
            0xE0
        }
    }

    /// Offset of the first section header.
    pub fn section_table_offset(&self) -> usize {
        E_LFANEW + 4 + COFF_HEADER_SIZE + self.optional_header_size()
    }

    pub fn build(&self) -> Vec<u8> {
        let mut data = vec![0u8; self.file_len];
        put(&mut data, 0, b"MZ");
        put(&mut data, 0x3c, &(E_LFANEW as u32).to_le_bytes());
        put(&mut data, E_LFANEW, b"PE\0\0");

        let coff = E_LFANEW + 4;
        let machine: u16 = if self.pe32_plus { 0x8664 } else { 0x014c };
        put(&mut data, coff, &machine.to_le_bytes());
        put(&mut data, coff + 2, &(self.sections.len() as u16).to_le_bytes());
        put(
            &mut data,
            coff + 16,
            &(self.optional_header_size() as u16).to_le_bytes(),
        );

        let opt = coff + COFF_HEADER_SIZE;
        let magic: u16 = if self.pe32_plus { 0x20b } else { 0x10b };
        put(&mut data, opt, &magic.to_le_bytes());
        put(&mut data, opt + 16, &self.entry_point.to_le_bytes());
        if self.pe32_plus {
            put(&mut data, opt + 24, &self.image_base.to_le_bytes());
        } else {
            put(&mut data, opt + 28, &(self.image_base as u32).to_le_bytes());
        }
        put(&mut data, opt + 32, &self.section_alignment.to_le_bytes());
        put(&mut data, opt + 36, &0x200u32.to_le_bytes());
        put(&mut data, opt + 56, &self.size_of_image.to_le_bytes());
        put(&mut data, opt + 60, &0x400u32.to_le_bytes());

        let mut sh = self.section_table_offset();
        for s in &self.sections {
            put(&mut data, sh, s.name.as_bytes());
            put(&mut data, sh + 8, &s.virtual_size.to_le_bytes());
            put(&mut data, sh + 12, &s.rva.to_le_bytes());
            put(&mut data, sh + 16, &s.size_of_raw_data.to_le_bytes());
            put(&mut data, sh + 20, &s.pointer_to_raw_data.to_le_bytes());
            put(&mut data, sh + 36, &s.characteristics.to_le_bytes());
            sh += SECTION_HEADER_SIZE;
        }
        data
    }
}

/// Copy `bytes` into `data` at `offset`, ignoring whatever falls past the end
/// so builders can emit deliberately truncated files.
fn put(data: &mut [u8], offset: usize, bytes: &[u8]) {
    if offset >= data.len() {
        return;
    }
    let end = (offset + bytes.len()).min(data.len());
    data[offset..end].copy_from_slice(&bytes[..end - offset]);
}

/// The single-`.text` image used throughout the scenario tests: size 0x2000,
/// `.text` at RVA 0x1000 with raw data at 0x400, base 0x400000.
pub fn text_image() -> Vec<u8> {
    let mut data = PeBuilder::new()
        .section(".text", 0x1000, 0x1000, 0x400, 0x1000, TEXT)
        .build();
    for (i, byte) in data[0x400..].iter_mut().enumerate() {
        *byte = (i % 251) as u8;
    }
    data
}

/// Two sections with a virtual tail and a `.bss`.
pub fn three_section_image() -> Vec<u8> {
    PeBuilder::new()
        .size_of_image(0x5000)
        .file_len(0x1000)
        .section(".text", 0x1000, 0x800, 0x400, 0x800, TEXT)
        .section(".data", 0x2000, 0x1000, 0xC00, 0x200, DATA)
        .section(".bss", 0x3000, 0x2000, 0, 0, BSS)
        .build()
}

pub fn context() -> Arc<Context> {
    Context::new(ContextConfig::default())
}
