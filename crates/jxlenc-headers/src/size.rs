//! Size header
//!
//! First section after the signature. Small images (both dimensions at most
//! 512) use a 1-bit flag plus two 9-bit fields; anything larger falls back
//! to a four-branch U32 per dimension.

use jxlenc_bitstream::u32coder::SIZE_DIM;
use jxlenc_bitstream::{BitReader, BitWriter};
use jxlenc_core::{Dimensions, FrameError, Result};

const SMALL_LIMIT: u32 = 512;

/// Image dimensions as serialised at the head of the codestream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeHeader {
    pub width: u32,
    pub height: u32,
}

impl SizeHeader {
    pub fn new(dimensions: Dimensions) -> Self {
        Self {
            width: dimensions.width,
            height: dimensions.height,
        }
    }

    pub fn write(&self, writer: &mut BitWriter) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(FrameError::ZeroDimension.into());
        }
        let small = self.width <= SMALL_LIMIT && self.height <= SMALL_LIMIT;
        writer.write_bit(small)?;
        if small {
            writer.write_bits((self.width - 1) as u64, 9)?;
            writer.write_bits((self.height - 1) as u64, 9)?;
        } else {
            writer.write_u32(self.width, &SIZE_DIM)?;
            writer.write_u32(self.height, &SIZE_DIM)?;
        }
        Ok(())
    }

    pub fn read(reader: &mut BitReader) -> Result<Self> {
        let small = reader.read_bit()?;
        let (width, height) = if small {
            (
                reader.read_bits(9)? as u32 + 1,
                reader.read_bits(9)? as u32 + 1,
            )
        } else {
            (reader.read_u32(&SIZE_DIM)?, reader.read_u32(&SIZE_DIM)?)
        };
        Ok(Self { width, height })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(width: u32, height: u32) {
        let header = SizeHeader { width, height };
        let mut writer = BitWriter::new();
        header.write(&mut writer).unwrap();
        let bytes = writer.finish().unwrap();
        let mut reader = BitReader::new(&bytes);
        assert_eq!(SizeHeader::read(&mut reader).unwrap(), header);
    }

    #[test]
    fn test_small_sizes() {
        roundtrip(1, 1);
        roundtrip(8, 8);
        roundtrip(512, 512);
        roundtrip(511, 1);
    }

    #[test]
    fn test_large_sizes() {
        roundtrip(513, 512);
        roundtrip(1920, 1080);
        roundtrip(1 << 20, 3);
        roundtrip(1 << 30, 1 << 30);
    }

    #[test]
    fn test_small_flag_width() {
        let header = SizeHeader {
            width: 8,
            height: 8,
        };
        let mut writer = BitWriter::new();
        header.write(&mut writer).unwrap();
        // 1 flag bit + 2 x 9 bits = 19 bits
        assert_eq!(writer.bit_position(), 19);
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let header = SizeHeader {
            width: 0,
            height: 4,
        };
        let mut writer = BitWriter::new();
        assert!(header.write(&mut writer).is_err());
    }
}
