//! PE/COFF image analyser
//!
//! Parses the DOS header, the NT headers (PE32 and PE32+) and the section
//! table, and turns every declared section into an [`ImageSection`] placed at
//! `ImageBase + VirtualAddress`. Every read of header bytes is bounds-checked;
//! malformed input yields [`MalformedImage`], never a panic.

pub mod headers;
pub mod sections;
pub mod types;
pub mod utils;

use tracing::{debug, trace};

use crate::analyser::{AnalysisResult, ImageAnalyser, MalformedImage};
use crate::config::AnalysisConfig;
use crate::core::offset::Offset;
use crate::core::section::ImageSection;

use headers::*;
use sections::*;
pub use types::*;
use utils::align_up;

/// Analyser for Portable Executable images
#[derive(Debug, Clone, Default)]
pub struct PeImageAnalyser {
    config: AnalysisConfig,
}

impl PeImageAnalyser {
    pub const NAME: &'static str = "PE";

    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Parse only the headers, for callers that need format details the
    /// analysis result does not carry.
    pub fn parse_headers(data: &[u8]) -> Result<(DosHeader, NtHeaders)> {
        let dos_header = parse_dos_header(data)?;
        let nt_headers = parse_nt_headers(data, dos_header.e_lfanew as usize)?;
        Ok((dos_header, nt_headers))
    }

    fn build_sections(
        &self,
        data: &[u8],
        dos_header: &DosHeader,
        nt_headers: &NtHeaders,
    ) -> Result<Vec<ImageSection>> {
        let count = nt_headers.file_header.number_of_sections;
        if count as usize > self.config.max_sections {
            return Err(MalformedImage::InconsistentSectionTable(format!(
                "{} sections declared, at most {} allowed",
                count, self.config.max_sections
            )));
        }

        let table_offset = nt_headers.section_table_offset(dos_header.e_lfanew);
        let headers = parse_section_headers(data, table_offset, count)?;
        let base = nt_headers.optional_header.image_base;

        headers
            .iter()
            .map(|header| {
                let section = to_image_section(header, base, data.len(), &self.config)?;
                trace!(section = %section, "Parsed section");
                Ok(section)
            })
            .collect()
    }
}

impl ImageAnalyser for PeImageAnalyser {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn analyse(&self, data: &[u8]) -> std::result::Result<AnalysisResult, MalformedImage> {
        let (dos_header, nt_headers) = Self::parse_headers(data)?;
        let optional = &nt_headers.optional_header;
        let base_address = optional.image_base;

        let sections = self.build_sections(data, &dos_header, &nt_headers)?;

        // SizeOfImage normally covers every section; trust the section table
        // when it does not.
        let sections_end = sections
            .iter()
            .map(|s| s.rel_virtual_address().saturating_add(s.virtual_size()))
            .max()
            .unwrap_or(0);
        let virtual_size = (optional.size_of_image as u64).max(align_up(
            sections_end,
            optional.section_alignment as u64,
        ));
        if base_address.checked_add(virtual_size).is_none() {
            return Err(MalformedImage::InconsistentSectionTable(format!(
                "image of {:#x} bytes at base {:#x} overflows the address space",
                virtual_size, base_address
            )));
        }

        let result = AnalysisResult {
            base_address,
            entry_point_offset: Offset::new(
                base_address.saturating_add(optional.address_of_entry_point as u64),
            ),
            virtual_size,
            sections,
        };
        result.validate()?;

        debug!(
            machine = ?nt_headers.file_header.machine,
            pe32_plus = optional.is_64bit(),
            base = %format!("{:#x}", base_address),
            entry = %result.entry_point_offset,
            sections = result.sections.len(),
            "Analysed PE image"
        );
        Ok(result)
    }
}
