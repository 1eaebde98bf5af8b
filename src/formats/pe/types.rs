//! PE type definitions

use bitflags::bitflags;

use crate::analyser::MalformedImage;

// Signatures and magic numbers
pub const DOS_SIGNATURE: u16 = 0x5A4D; // MZ
pub const PE_SIGNATURE: [u8; 4] = *b"PE\0\0";
pub const PE32_MAGIC: u16 = 0x10B;
pub const PE32PLUS_MAGIC: u16 = 0x20B;

// Structure sizes
pub const DOS_HEADER_SIZE: usize = 64;
pub const COFF_HEADER_SIZE: usize = 20;
pub const SECTION_HEADER_SIZE: usize = 40;
pub const PE32_OPTIONAL_HEADER_MIN: usize = 96;
pub const PE32PLUS_OPTIONAL_HEADER_MIN: usize = 112;

pub type Result<T> = std::result::Result<T, MalformedImage>;

bitflags! {
    /// Section characteristics relevant to layout and classification.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SectionCharacteristics: u32 {
        const CNT_CODE = 0x0000_0020;
        const CNT_INITIALIZED_DATA = 0x0000_0040;
        const CNT_UNINITIALIZED_DATA = 0x0000_0080;
        const MEM_EXECUTE = 0x2000_0000;
        const MEM_READ = 0x4000_0000;
        const MEM_WRITE = 0x8000_0000;
        const _ = !0;
    }
}

/// Machine types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Machine {
    Unknown,
    I386,   // 0x014c
    X86_64, // 0x8664
    Arm,    // 0x01c0
    Arm64,  // 0xaa64
    ArmNT,  // 0x01c4
    Other(u16),
}

impl From<u16> for Machine {
    fn from(value: u16) -> Self {
        match value {
            0x014c => Self::I386,
            0x8664 => Self::X86_64,
            0x01c0 => Self::Arm,
            0xaa64 => Self::Arm64,
            0x01c4 => Self::ArmNT,
            0 => Self::Unknown,
            other => Self::Other(other),
        }
    }
}

/// DOS header fields the loader uses
#[derive(Debug, Clone, Copy)]
pub struct DosHeader {
    pub e_magic: u16,  // Magic number (MZ)
    pub e_lfanew: u32, // File address of PE header
}

/// COFF header (20 bytes)
#[derive(Debug, Clone, Copy)]
pub struct CoffHeader {
    pub machine: Machine,
    pub number_of_sections: u16,
    pub time_date_stamp: u32,
    pub size_of_optional_header: u16,
    pub characteristics: u16,
}

/// Optional header fields shared by PE32 and PE32+
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionalHeader {
    pub magic: u16,
    pub address_of_entry_point: u32,
    pub image_base: u64,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub size_of_image: u32,
    pub size_of_headers: u32,
}

impl OptionalHeader {
    pub fn is_64bit(&self) -> bool {
        self.magic == PE32PLUS_MAGIC
    }
}

/// NT headers (COFF + Optional)
#[derive(Debug, Clone, Copy)]
pub struct NtHeaders {
    pub file_header: CoffHeader,
    pub optional_header: OptionalHeader,
}

impl NtHeaders {
    /// File offset of the first section header.
    pub fn section_table_offset(&self, e_lfanew: u32) -> usize {
        (e_lfanew as usize)
            .saturating_add(PE_SIGNATURE.len() + COFF_HEADER_SIZE)
            .saturating_add(self.file_header.size_of_optional_header as usize)
    }
}

/// Section header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader {
    pub name: [u8; 8],
    pub virtual_size: u32,
    pub virtual_address: u32,
    pub size_of_raw_data: u32,
    pub pointer_to_raw_data: u32,
    pub characteristics: SectionCharacteristics,
}

impl SectionHeader {
    pub fn name(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(8);
        String::from_utf8_lossy(&self.name[..end]).to_string()
    }

    pub fn is_executable(&self) -> bool {
        self.characteristics.contains(SectionCharacteristics::MEM_EXECUTE)
    }

    pub fn is_readable(&self) -> bool {
        self.characteristics.contains(SectionCharacteristics::MEM_READ)
    }

    pub fn is_writable(&self) -> bool {
        self.characteristics.contains(SectionCharacteristics::MEM_WRITE)
    }

    pub fn contains_code(&self) -> bool {
        self.characteristics.contains(SectionCharacteristics::CNT_CODE)
    }
}
