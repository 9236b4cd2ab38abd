//! Bitstream reader
//!
//! Mirrors the writer's MSB-first packing. The reader is not on the critical
//! encode path: the encoder uses it to re-read its own output in tests and
//! round-trip checks.

use jxlenc_core::{Error, Result};

use crate::u32coder::U32Spec;

/// Bit-granular reader over a borrowed byte slice
pub struct BitReader<'a> {
    bytes: &'a [u8],
    byte_pos: usize,
    /// Bits already consumed from the current byte, 0..8
    bit_pos: u32,
}

impl<'a> BitReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    /// Read `count` bits MSB-first
    pub fn read_bits(&mut self, count: u32) -> Result<u64> {
        if count > 64 {
            return Err(Error::InternalInvariant(format!(
                "bit count {count} exceeds 64"
            )));
        }
        let mut value = 0u64;
        for _ in 0..count {
            if self.byte_pos >= self.bytes.len() {
                return Err(Error::UnexpectedEof);
            }
            let byte = self.bytes[self.byte_pos];
            let bit = (byte >> (7 - self.bit_pos)) & 1;
            value = (value << 1) | bit as u64;
            self.bit_pos += 1;
            if self.bit_pos == 8 {
                self.bit_pos = 0;
                self.byte_pos += 1;
            }
        }
        Ok(value)
    }

    pub fn read_bit(&mut self) -> Result<bool> {
        self.read_bits(1).map(|b| b != 0)
    }

    pub fn is_aligned(&self) -> bool {
        self.bit_pos == 0
    }

    /// Skip to the next byte boundary
    pub fn align_to_byte(&mut self) -> Result<()> {
        if self.bit_pos > 0 {
            self.read_bits(8 - self.bit_pos)?;
        }
        Ok(())
    }

    /// Read raw bytes; requires byte alignment
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        if !self.is_aligned() {
            return Err(Error::NotAligned);
        }
        if self.byte_pos + count > self.bytes.len() {
            return Err(Error::UnexpectedEof);
        }
        let slice = &self.bytes[self.byte_pos..self.byte_pos + count];
        self.byte_pos += count;
        Ok(slice)
    }

    /// Read a little-endian base-128 varint
    pub fn read_varint(&mut self) -> Result<u64> {
        if !self.is_aligned() {
            return Err(Error::NotAligned);
        }
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            if self.byte_pos >= self.bytes.len() {
                return Err(Error::UnexpectedEof);
            }
            let byte = self.bytes[self.byte_pos];
            self.byte_pos += 1;
            value |= ((byte & 0x7F) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift >= 64 {
                return Err(Error::UnexpectedEof);
            }
        }
    }

    /// Read a compact U32 with a 2-bit branch selector
    pub fn read_u32(&mut self, spec: &U32Spec) -> Result<u32> {
        let selector = self.read_bits(2)? as u32;
        let bits = spec.payload_bits(selector);
        let payload = if bits > 0 {
            self.read_bits(bits)? as u32
        } else {
            0
        };
        spec.decode(selector, payload)
    }

    /// Bits consumed so far
    pub fn bit_position(&self) -> usize {
        self.byte_pos * 8 + self.bit_pos as usize
    }

    /// Bytes not yet touched
    pub fn remaining_bytes(&self) -> usize {
        self.bytes.len() - self.byte_pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::BitWriter;

    #[test]
    fn test_read_bits() {
        let data = [0b10100110, 0b11001100];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(4).unwrap(), 0b1010);
        assert_eq!(reader.read_bits(4).unwrap(), 0b0110);
        assert_eq!(reader.read_bits(8).unwrap(), 0b11001100);
        assert!(matches!(reader.read_bit(), Err(Error::UnexpectedEof)));
    }

    #[test]
    fn test_mirrors_writer() {
        let mut writer = BitWriter::new();
        writer.write_bits(0x3, 2).unwrap();
        writer.write_bits(0x155, 9).unwrap();
        writer.align_to_byte().unwrap();
        writer.write_varint(12345).unwrap();
        writer.write_bytes(&[0xDE, 0xAD]).unwrap();
        let bytes = writer.finish().unwrap();

        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.read_bits(2).unwrap(), 0x3);
        assert_eq!(reader.read_bits(9).unwrap(), 0x155);
        reader.align_to_byte().unwrap();
        assert_eq!(reader.read_varint().unwrap(), 12345);
        assert_eq!(reader.read_bytes(2).unwrap(), &[0xDE, 0xAD]);
        assert_eq!(reader.remaining_bytes(), 0);
    }

    #[test]
    fn test_unaligned_byte_read_fails() {
        let data = [0xFF, 0x00];
        let mut reader = BitReader::new(&data);
        reader.read_bit().unwrap();
        assert!(matches!(reader.read_bytes(1), Err(Error::NotAligned)));
    }
}
