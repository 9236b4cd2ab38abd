//! Run-length + varint fallback coder
//!
//! Used when the caller disables the rANS coder. The stream is byte-aligned
//! throughout: a varint element count followed by (value, run length) varint
//! pairs.

use jxlenc_core::{Error, Result};

use crate::reader::BitReader;
use crate::writer::BitWriter;

/// Encode a value sequence as (value, run) pairs
pub fn encode_rle(writer: &mut BitWriter, values: &[u32]) -> Result<()> {
    writer.align_to_byte()?;
    writer.write_varint(values.len() as u64)?;
    let mut i = 0;
    while i < values.len() {
        let value = values[i];
        let mut run = 1usize;
        while i + run < values.len() && values[i + run] == value {
            run += 1;
        }
        writer.write_varint(value as u64)?;
        writer.write_varint(run as u64)?;
        i += run;
    }
    Ok(())
}

/// Mirror of [`encode_rle`]
pub fn decode_rle(reader: &mut BitReader) -> Result<Vec<u32>> {
    reader.align_to_byte()?;
    let count = reader.read_varint()? as usize;
    let mut values = Vec::with_capacity(count);
    while values.len() < count {
        let value = reader.read_varint()?;
        if value > u32::MAX as u64 {
            return Err(Error::UnexpectedEof);
        }
        let run = reader.read_varint()? as usize;
        if run == 0 || values.len() + run > count {
            return Err(Error::UnexpectedEof);
        }
        for _ in 0..run {
            values.push(value as u32);
        }
    }
    Ok(values)
}
