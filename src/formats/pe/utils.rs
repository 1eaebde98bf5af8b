//! Utility functions for PE parsing

use crate::analyser::MalformedImage;
use crate::formats::pe::types::Result;

/// Extension trait for reading primitive types from byte slices.
///
/// Every read is bounds-checked; a read past the end reports the length the
/// structure needed.
pub trait ReadExt {
    fn read_u8_at(&self, offset: usize) -> Result<u8>;
    fn read_u16_le_at(&self, offset: usize) -> Result<u16>;
    fn read_u32_le_at(&self, offset: usize) -> Result<u32>;
    fn read_u64_le_at(&self, offset: usize) -> Result<u64>;
    fn read_slice_at(&self, offset: usize, len: usize) -> Result<&[u8]>;
}

impl ReadExt for [u8] {
    #[inline(always)]
    fn read_u8_at(&self, offset: usize) -> Result<u8> {
        self.read_slice_at(offset, 1).map(|b| b[0])
    }

    #[inline(always)]
    fn read_u16_le_at(&self, offset: usize) -> Result<u16> {
        let mut raw = [0u8; 2];
        raw.copy_from_slice(self.read_slice_at(offset, 2)?);
        Ok(u16::from_le_bytes(raw))
    }

    #[inline(always)]
    fn read_u32_le_at(&self, offset: usize) -> Result<u32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.read_slice_at(offset, 4)?);
        Ok(u32::from_le_bytes(raw))
    }

    #[inline(always)]
    fn read_u64_le_at(&self, offset: usize) -> Result<u64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.read_slice_at(offset, 8)?);
        Ok(u64::from_le_bytes(raw))
    }

    #[inline(always)]
    fn read_slice_at(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let end = offset
            .checked_add(len)
            .ok_or_else(|| truncated(u64::MAX, self.len()))?;
        self.get(offset..end).ok_or_else(|| truncated(end as u64, self.len()))
    }
}

/// Ensure `data` holds at least `needed` bytes.
#[inline(always)]
pub fn require_len(data: &[u8], needed: usize) -> Result<()> {
    if data.len() < needed {
        Err(truncated(needed as u64, data.len()))
    } else {
        Ok(())
    }
}

fn truncated(expected: u64, actual: usize) -> MalformedImage {
    MalformedImage::TruncatedHeader {
        expected,
        actual: actual as u64,
    }
}

/// Align a value up to the specified alignment, saturating on overflow
#[inline(always)]
pub fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment == 0 {
        value
    } else {
        value
            .div_ceil(alignment)
            .saturating_mul(alignment)
    }
}
