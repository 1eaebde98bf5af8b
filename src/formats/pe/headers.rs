//! PE header parsing

use crate::analyser::MalformedImage;
use crate::formats::pe::types::*;
use crate::formats::pe::utils::{require_len, ReadExt};

/// Parse DOS header from data
pub fn parse_dos_header(data: &[u8]) -> Result<DosHeader> {
    require_len(data, DOS_HEADER_SIZE)?;

    let e_magic = data.read_u16_le_at(0)?;
    if e_magic != DOS_SIGNATURE {
        return Err(MalformedImage::BadSignature(format!(
            "DOS magic {:#06x}",
            e_magic
        )));
    }

    Ok(DosHeader {
        e_magic,
        e_lfanew: data.read_u32_le_at(60)?,
    })
}

/// Parse COFF header from data at offset
pub fn parse_coff_header(data: &[u8], offset: usize) -> Result<CoffHeader> {
    data.read_slice_at(offset, COFF_HEADER_SIZE)?;

    Ok(CoffHeader {
        machine: Machine::from(data.read_u16_le_at(offset)?),
        number_of_sections: data.read_u16_le_at(offset + 2)?,
        time_date_stamp: data.read_u32_le_at(offset + 4)?,
        size_of_optional_header: data.read_u16_le_at(offset + 16)?,
        characteristics: data.read_u16_le_at(offset + 18)?,
    })
}

/// Parse optional header from data at offset
pub fn parse_optional_header(data: &[u8], offset: usize, size: u16) -> Result<OptionalHeader> {
    let size = size as usize;
    if size < 2 {
        return Err(MalformedImage::TruncatedHeader {
            expected: 2,
            actual: size as u64,
        });
    }
    data.read_slice_at(offset, size)?;

    let magic = data.read_u16_le_at(offset)?;
    let minimum = match magic {
        PE32_MAGIC => PE32_OPTIONAL_HEADER_MIN,
        PE32PLUS_MAGIC => PE32PLUS_OPTIONAL_HEADER_MIN,
        _ => {
            return Err(MalformedImage::BadSignature(format!(
                "optional header magic {:#06x}",
                magic
            )))
        }
    };
    if size < minimum {
        return Err(MalformedImage::TruncatedHeader {
            expected: minimum as u64,
            actual: size as u64,
        });
    }

    let image_base = if magic == PE32PLUS_MAGIC {
        data.read_u64_le_at(offset + 24)?
    } else {
        data.read_u32_le_at(offset + 28)? as u64
    };

    Ok(OptionalHeader {
        magic,
        address_of_entry_point: data.read_u32_le_at(offset + 16)?,
        image_base,
        section_alignment: data.read_u32_le_at(offset + 32)?,
        file_alignment: data.read_u32_le_at(offset + 36)?,
        size_of_image: data.read_u32_le_at(offset + 56)?,
        size_of_headers: data.read_u32_le_at(offset + 60)?,
    })
}

/// Parse NT headers (PE signature + COFF + Optional)
pub fn parse_nt_headers(data: &[u8], offset: usize) -> Result<NtHeaders> {
    let signature = data.read_slice_at(offset, PE_SIGNATURE.len())?;
    if signature != PE_SIGNATURE {
        return Err(MalformedImage::BadSignature(format!(
            "PE signature {:02x?} at {:#x}",
            signature, offset
        )));
    }

    let file_header = parse_coff_header(data, offset + PE_SIGNATURE.len())?;
    let opt_offset = offset + PE_SIGNATURE.len() + COFF_HEADER_SIZE;
    let optional_header =
        parse_optional_header(data, opt_offset, file_header.size_of_optional_header)?;

    Ok(NtHeaders {
        file_header,
        optional_header,
    })
}
