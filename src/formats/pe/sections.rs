//! Section table parsing and conversion to image sections

use tracing::warn;

use crate::analyser::MalformedImage;
use crate::config::AnalysisConfig;
use crate::core::section::{ImageSection, ImageSectionType, SectionPerms};
use crate::formats::pe::types::*;
use crate::formats::pe::utils::ReadExt;

/// Parse `count` section headers starting at `offset`
pub fn parse_section_headers(
    data: &[u8],
    offset: usize,
    count: u16,
) -> Result<Vec<SectionHeader>> {
    let mut sections = Vec::with_capacity(count as usize);

    for i in 0..count as usize {
        let section_offset = offset.saturating_add(i * SECTION_HEADER_SIZE);
        let raw = data.read_slice_at(section_offset, SECTION_HEADER_SIZE)?;

        let mut name = [0u8; 8];
        name.copy_from_slice(&raw[..8]);

        sections.push(SectionHeader {
            name,
            virtual_size: raw.read_u32_le_at(8)?,
            virtual_address: raw.read_u32_le_at(12)?,
            size_of_raw_data: raw.read_u32_le_at(16)?,
            pointer_to_raw_data: raw.read_u32_le_at(20)?,
            characteristics: SectionCharacteristics::from_bits_retain(raw.read_u32_le_at(36)?),
        });
    }

    Ok(sections)
}

/// Classify a section by its characteristics
pub fn section_type(characteristics: SectionCharacteristics) -> ImageSectionType {
    if characteristics
        .intersects(SectionCharacteristics::CNT_CODE | SectionCharacteristics::MEM_EXECUTE)
    {
        ImageSectionType::Code
    } else if characteristics.contains(SectionCharacteristics::CNT_UNINITIALIZED_DATA) {
        ImageSectionType::Uninitialized
    } else if characteristics.contains(SectionCharacteristics::CNT_INITIALIZED_DATA) {
        ImageSectionType::Data
    } else {
        ImageSectionType::None
    }
}

/// Build the image section for a header.
///
/// Raw data running past the end of the file is rejected, or clamped to the
/// bytes actually present when the config allows it.
pub fn to_image_section(
    header: &SectionHeader,
    base_address: u64,
    data_len: usize,
    config: &AnalysisConfig,
) -> Result<ImageSection> {
    let name = header.name();
    let data_len = data_len as u64;
    let pointer = header.pointer_to_raw_data as u64;
    let mut raw_size = header.size_of_raw_data as u64;

    // Uninitialized sections carry no file bytes regardless of the header
    if header
        .characteristics
        .contains(SectionCharacteristics::CNT_UNINITIALIZED_DATA)
        && !header
            .characteristics
            .contains(SectionCharacteristics::CNT_INITIALIZED_DATA)
    {
        raw_size = 0;
    }

    if raw_size > 0 && pointer + raw_size > data_len {
        if !config.allow_raw_data_past_eof {
            return Err(MalformedImage::InconsistentSectionTable(format!(
                "section '{}' raw data {:#x}+{:#x} extends past end of file {:#x}",
                name, pointer, raw_size, data_len
            )));
        }
        let clamped = data_len.saturating_sub(pointer);
        warn!(
            section = %name,
            declared = raw_size,
            clamped = clamped,
            "Section raw data extends past end of file"
        );
        raw_size = clamped;
    }

    let perms = SectionPerms::new(
        header.is_readable(),
        header.is_writable(),
        header.is_executable(),
    );
    ImageSection::new(
        name.clone(),
        section_type(header.characteristics),
        perms,
        base_address,
        header.virtual_address as u64,
        header.virtual_size as u64,
        pointer,
        raw_size,
    )
    .ok_or_else(|| {
        MalformedImage::InconsistentSectionTable(format!(
            "section '{}' range overflows the address space",
            name
        ))
    })
}
