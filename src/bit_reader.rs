#![forbid(unsafe_code)]

use crate::error::{DecompressError, Result};

////////////////////////////////////////////////////////////////////////////////

/// Reads a byte slice as a DEFLATE bitstream: bits are taken from the least
/// significant end of each byte first.
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_offset: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            bit_offset: 0,
        }
    }

    pub fn bit_offset(&self) -> usize {
        self.bit_offset
    }

    /// Index of the first byte not fully consumed.
    pub fn byte_offset(&self) -> usize {
        (self.bit_offset + 7) / 8
    }

    pub fn available_bits(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.bit_offset)
    }

    /// Returns the next `len` bits without advancing. `len` is at most 16.
    pub fn peek_bits(&self, len: u8) -> Result<u16> {
        debug_assert!(len <= 16);
        if usize::from(len) > self.available_bits() {
            return Err(DecompressError::TruncatedStream);
        }
        Ok(self.window(len))
    }

    pub fn read_bits(&mut self, len: u8) -> Result<u16> {
        let bits = self.peek_bits(len)?;
        self.bit_offset += usize::from(len);
        Ok(bits)
    }

    /// Sixteen bits of lookahead. Bits past the end of the data read as zero;
    /// callers must consume through `skip_bits`, which checks the bound.
    pub fn peek_window(&self) -> u16 {
        self.window(16)
    }

    pub fn skip_bits(&mut self, len: usize) -> Result<()> {
        if len > self.available_bits() {
            return Err(DecompressError::TruncatedStream);
        }
        self.bit_offset += len;
        Ok(())
    }

    pub fn align_to_byte(&mut self) {
        self.bit_offset = (self.bit_offset + 7) & !7;
    }

    /// Takes `len` whole bytes. The cursor must be byte-aligned.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        debug_assert_eq!(self.bit_offset % 8, 0);
        let start = self.bit_offset / 8;
        let bytes = start
            .checked_add(len)
            .and_then(|end| self.data.get(start..end))
            .ok_or(DecompressError::TruncatedStream)?;
        self.bit_offset += len * 8;
        Ok(bytes)
    }

    fn window(&self, len: u8) -> u16 {
        let byte_index = self.bit_offset / 8;
        let shift = self.bit_offset % 8;

        // Three bytes always cover 16 bits at any in-byte shift.
        let mut window = 0u32;
        for i in 0..3 {
            if let Some(&byte) = self.data.get(byte_index + i) {
                window |= u32::from(byte) << (8 * i);
            }
        }

        let mask = (1u32 << len) - 1;
        ((window >> shift) & mask) as u16
    }
}

////////////////////////////////////////////////////////////////////////////////
