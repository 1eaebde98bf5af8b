//! Analyser for headerless blobs (firmware dumps, shellcode).

use crate::analyser::{AnalysisResult, ImageAnalyser, MalformedImage};
use crate::core::offset::Offset;
use crate::core::section::{ImageSection, ImageSectionType, SectionPerms};

/// Maps the whole input as one code section at a fixed base.
#[derive(Debug, Clone, Default)]
pub struct FlatImageAnalyser {
    base_address: u64,
}

impl FlatImageAnalyser {
    pub const NAME: &'static str = "Flat";

    pub fn new(base_address: u64) -> Self {
        Self { base_address }
    }

    pub fn base_address(&self) -> u64 {
        self.base_address
    }
}

impl ImageAnalyser for FlatImageAnalyser {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn analyse(&self, data: &[u8]) -> Result<AnalysisResult, MalformedImage> {
        if data.is_empty() {
            return Err(MalformedImage::TruncatedHeader {
                expected: 1,
                actual: 0,
            });
        }
        let size = data.len() as u64;
        let section = ImageSection::new(
            "flat",
            ImageSectionType::Code,
            SectionPerms::new(true, false, true),
            self.base_address,
            0,
            size,
            0,
            size,
        )
        .ok_or_else(|| {
            MalformedImage::InconsistentSectionTable(format!(
                "{} bytes at base {:#x} overflow the address space",
                size, self.base_address
            ))
        })?;

        Ok(AnalysisResult {
            base_address: self.base_address,
            entry_point_offset: Offset::new(self.base_address),
            virtual_size: size,
            sections: vec![section],
        })
    }
}
