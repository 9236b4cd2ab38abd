//! Codestream parsing for verification
//!
//! A reference decode path that re-reads the encoder's own output. It is
//! not on the critical encode path; the round-trip properties of the test
//! suite are stated against it.

use jxlenc_bitstream::{BitReader, CODESTREAM_SIGNATURE};
use jxlenc_core::{Error, Result};
use jxlenc_headers::{FrameEncoding, FrameHeader, ImageMetadata, SizeHeader, CONTAINER_SIGNATURE};

use crate::modular::{self, ModularChannel};
use crate::vardct::{self, DecodedVarDct, VarDctFrameInfo};
use crate::GROUP_TERMINATOR;

/// One decoded frame
pub enum DecodedFrame {
    Modular {
        header: FrameHeader,
        channels: Vec<ModularChannel>,
    },
    VarDct {
        header: FrameHeader,
        frame: DecodedVarDct,
    },
}

impl DecodedFrame {
    pub fn header(&self) -> &FrameHeader {
        match self {
            DecodedFrame::Modular { header, .. } => header,
            DecodedFrame::VarDct { header, .. } => header,
        }
    }
}

/// A fully parsed codestream
pub struct DecodedImage {
    pub size: SizeHeader,
    pub metadata: ImageMetadata,
    pub frames: Vec<DecodedFrame>,
}

/// Strip a container if present, returning the raw codestream bytes
pub fn extract_codestream(bytes: &[u8]) -> Result<Vec<u8>> {
    if bytes.len() >= 2 && bytes[0..2] == CODESTREAM_SIGNATURE {
        return Ok(bytes.to_vec());
    }
    if bytes.len() < 12 || bytes[0..12] != CONTAINER_SIGNATURE {
        return Err(Error::InternalInvariant(
            "neither a codestream nor a container signature".into(),
        ));
    }
    let mut codestream = Vec::new();
    let mut pos = 12;
    while pos + 8 <= bytes.len() {
        let size = u32::from_be_bytes([
            bytes[pos],
            bytes[pos + 1],
            bytes[pos + 2],
            bytes[pos + 3],
        ]) as u64;
        let box_type = &bytes[pos + 4..pos + 8];
        let (header_len, total) = if size == 1 {
            if pos + 16 > bytes.len() {
                return Err(Error::UnexpectedEof);
            }
            let mut extended = [0u8; 8];
            extended.copy_from_slice(&bytes[pos + 8..pos + 16]);
            (16usize, u64::from_be_bytes(extended) as usize)
        } else if size == 0 {
            (8usize, bytes.len() - pos)
        } else {
            (8usize, size as usize)
        };
        if pos + total > bytes.len() || total < header_len {
            return Err(Error::UnexpectedEof);
        }
        let payload = &bytes[pos + header_len..pos + total];
        match box_type {
            b"jxlc" => codestream.extend_from_slice(payload),
            // Partial pieces carry a 4-byte index before the data
            b"jxlp" => codestream.extend_from_slice(&payload[4.min(payload.len())..]),
            _ => {}
        }
        pos += total;
    }
    if codestream.is_empty() {
        return Err(Error::InternalInvariant(
            "container holds no codestream box".into(),
        ));
    }
    Ok(codestream)
}

/// Parse a raw codestream or container file produced by the encoder
pub fn decode_bytes(bytes: &[u8]) -> Result<DecodedImage> {
    let codestream = extract_codestream(bytes)?;
    let mut reader = BitReader::new(&codestream);

    let signature = reader.read_bytes(2)?;
    if signature != CODESTREAM_SIGNATURE {
        return Err(Error::InternalInvariant("bad codestream signature".into()));
    }

    let size = SizeHeader::read(&mut reader)?;
    reader.align_to_byte()?;
    let metadata = ImageMetadata::read(&mut reader)?;
    let have_animation = metadata.animation.is_some();

    let extra_dims: Vec<(usize, usize)> = metadata
        .extra_channels
        .iter()
        .map(|info| {
            (
                ((size.width >> info.dim_shift).max(1)) as usize,
                ((size.height >> info.dim_shift).max(1)) as usize,
            )
        })
        .collect();

    let mut frames = Vec::new();
    loop {
        if reader.remaining_bytes() == 0 {
            break;
        }
        let header = FrameHeader::read(&mut reader, have_animation)?;
        let frame = match header.encoding {
            FrameEncoding::Modular => {
                let channels = modular::decode_frame(&mut reader)?;
                DecodedFrame::Modular { header, channels }
            }
            FrameEncoding::VarDct => {
                let info = VarDctFrameInfo {
                    width: size.width as usize,
                    height: size.height as usize,
                    extra_dims: extra_dims.clone(),
                    transfer: metadata.color.transfer,
                };
                let decoded = vardct::decode_frame(&mut reader, &header, &info)?;
                DecodedFrame::VarDct {
                    header,
                    frame: decoded,
                }
            }
        };
        reader.align_to_byte()?;
        let terminator = reader.read_bytes(2)?;
        if terminator != GROUP_TERMINATOR {
            return Err(Error::InternalInvariant(format!(
                "bad group terminator {terminator:02x?}"
            )));
        }
        let last = frame.header().is_last;
        frames.push(frame);
        if last {
            break;
        }
    }

    Ok(DecodedImage {
        size,
        metadata,
        frames,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Encoder, GROUP_TERMINATOR};
    use jxlenc_core::{
        ColorDescriptor, Dimensions, EncodingOptions, ImageFrame, PixelType, SampleBuffer,
    };

    fn patterned_frame(width: u32, height: u32) -> ImageFrame {
        let mut frame = ImageFrame::new(
            Dimensions::new(width, height),
            3,
            PixelType::U8,
            ColorDescriptor::default(),
        )
        .unwrap();
        if let SampleBuffer::U8(data) = &mut frame.buffer {
            for (i, v) in data.iter_mut().enumerate() {
                *v = ((i * 13 + 7) % 256) as u8;
            }
        }
        frame
    }

    #[test]
    fn test_extract_raw_codestream_is_identity() {
        let bytes = vec![0xFF, 0x0A, 1, 2, 3];
        assert_eq!(extract_codestream(&bytes).unwrap(), bytes);
    }

    #[test]
    fn test_decode_lossless_codestream() {
        let frame = patterned_frame(20, 14);
        let encoder = Encoder::new(EncodingOptions::lossless().container(false)).unwrap();
        let encoded = encoder.encode(&frame).unwrap();
        let decoded = decode_bytes(&encoded.bytes).unwrap();
        assert_eq!(decoded.size.width, 20);
        assert_eq!(decoded.size.height, 14);
        assert_eq!(decoded.frames.len(), 1);
    }

    #[test]
    fn test_decode_from_container() {
        let frame = patterned_frame(12, 12);
        let encoder = Encoder::new(EncodingOptions::lossless().container(true)).unwrap();
        let encoded = encoder.encode(&frame).unwrap();
        let decoded = decode_bytes(&encoded.bytes).unwrap();
        assert_eq!(decoded.frames.len(), 1);
    }

    #[test]
    fn test_terminator_present_before_end() {
        let frame = patterned_frame(8, 8);
        let encoder = Encoder::new(EncodingOptions::lossless().container(false)).unwrap();
        let encoded = encoder.encode(&frame).unwrap();
        let tail = &encoded.bytes[encoded.bytes.len() - 2..];
        assert_eq!(tail, &GROUP_TERMINATOR);
    }
}
