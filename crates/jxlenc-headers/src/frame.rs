//! Frame header
//!
//! One per frame: frame type, encoding mode, overlay flags, animation
//! fields, reference-slot bookkeeping, optional crop, restoration filters
//! and the pass configuration. The section ends byte-aligned.

use jxlenc_bitstream::u32coder::{COORD, DURATION};
use jxlenc_bitstream::{BitReader, BitWriter};
use jxlenc_core::{Error, Result};

/// Frame type (2 bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Regular = 0,
    LfFrame = 1,
    ReferenceOnly = 2,
    SkipProgressive = 3,
}

impl FrameType {
    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            0 => Ok(FrameType::Regular),
            1 => Ok(FrameType::LfFrame),
            2 => Ok(FrameType::ReferenceOnly),
            3 => Ok(FrameType::SkipProgressive),
            _ => Err(Error::UnexpectedEof),
        }
    }
}

/// Frame body encoding (1 bit)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEncoding {
    VarDct = 0,
    Modular = 1,
}

/// Restoration filter flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RestorationFilter {
    /// Gabor-like sharpening
    pub gab: bool,
    /// Edge-preserving filter
    pub epf: bool,
}

/// Progressive pass configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassConfig {
    /// 1, or 3 for progressive frequency passes
    pub num_passes: u8,
    /// Downsampling shift per pass
    pub downsample: Vec<u8>,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            num_passes: 1,
            downsample: vec![0],
        }
    }
}

impl PassConfig {
    pub fn progressive() -> Self {
        Self {
            num_passes: 3,
            downsample: vec![3, 1, 0],
        }
    }
}

/// Per-channel blending mode for animation frames (2 bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Replace = 0,
    Add = 1,
    Blend = 2,
    AlphaWeighted = 3,
}

impl BlendMode {
    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            0 => Ok(BlendMode::Replace),
            1 => Ok(BlendMode::Add),
            2 => Ok(BlendMode::Blend),
            3 => Ok(BlendMode::AlphaWeighted),
            _ => Err(Error::UnexpectedEof),
        }
    }
}

/// Crop rectangle for frames smaller than the image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Complete frame header
#[derive(Debug, Clone, PartialEq)]
pub struct FrameHeader {
    pub frame_type: FrameType,
    pub encoding: FrameEncoding,
    pub have_noise: bool,
    pub have_patches: bool,
    pub have_splines: bool,
    pub use_lf_frame: bool,
    pub skip_adaptive_lf_smoothing: bool,
    /// Animation fields, present when the image metadata declares animation
    pub duration: Option<u32>,
    pub blend_mode: BlendMode,
    pub is_last: bool,
    /// 0 = do not save; 1..=4 selects a reference slot
    pub save_as_reference: u8,
    pub crop: Option<CropRect>,
    pub restoration: RestorationFilter,
    pub passes: PassConfig,
}

impl Default for FrameHeader {
    fn default() -> Self {
        Self {
            frame_type: FrameType::Regular,
            encoding: FrameEncoding::VarDct,
            have_noise: false,
            have_patches: false,
            have_splines: false,
            use_lf_frame: false,
            skip_adaptive_lf_smoothing: false,
            duration: None,
            blend_mode: BlendMode::Replace,
            is_last: true,
            save_as_reference: 0,
            crop: None,
            restoration: RestorationFilter::default(),
            passes: PassConfig::default(),
        }
    }
}

impl FrameHeader {
    pub fn validate(&self) -> Result<()> {
        if self.save_as_reference > 4 {
            return Err(Error::InternalInvariant(format!(
                "reference slot {} out of range",
                self.save_as_reference
            )));
        }
        if self.passes.num_passes != 1 && self.passes.num_passes != 3 {
            return Err(Error::InternalInvariant(format!(
                "pass count {} must be 1 or 3",
                self.passes.num_passes
            )));
        }
        if self.passes.downsample.len() != self.passes.num_passes as usize {
            return Err(Error::InternalInvariant(
                "downsample list does not match pass count".into(),
            ));
        }
        Ok(())
    }

    /// Serialise; `have_animation` mirrors the image metadata flag
    pub fn write(&self, writer: &mut BitWriter, have_animation: bool) -> Result<()> {
        self.validate()?;
        writer.write_bits(self.frame_type as u64, 2)?;
        writer.write_bits(self.encoding as u64, 1)?;
        writer.write_bit(self.have_noise)?;
        writer.write_bit(self.have_patches)?;
        writer.write_bit(self.have_splines)?;
        writer.write_bit(self.use_lf_frame)?;
        writer.write_bit(self.skip_adaptive_lf_smoothing)?;

        if have_animation {
            writer.write_u32(self.duration.unwrap_or(0), &DURATION)?;
            writer.write_bits(self.blend_mode as u64, 2)?;
            writer.write_bit(self.is_last)?;
        }

        writer.write_bits(self.save_as_reference as u64, 3)?;

        writer.write_bit(self.crop.is_some())?;
        if let Some(crop) = &self.crop {
            writer.write_u32(crop.x, &COORD)?;
            writer.write_u32(crop.y, &COORD)?;
            writer.write_u32(crop.width, &COORD)?;
            writer.write_u32(crop.height, &COORD)?;
        }

        writer.write_bit(self.restoration.gab)?;
        writer.write_bit(self.restoration.epf)?;

        writer.write_bits((self.passes.num_passes == 3) as u64, 1)?;
        for &shift in &self.passes.downsample {
            writer.write_bits(shift as u64, 3)?;
        }

        writer.align_to_byte()?;
        Ok(())
    }

    pub fn read(reader: &mut BitReader, have_animation: bool) -> Result<Self> {
        let frame_type = FrameType::from_code(reader.read_bits(2)? as u32)?;
        let encoding = if reader.read_bits(1)? == 0 {
            FrameEncoding::VarDct
        } else {
            FrameEncoding::Modular
        };
        let have_noise = reader.read_bit()?;
        let have_patches = reader.read_bit()?;
        let have_splines = reader.read_bit()?;
        let use_lf_frame = reader.read_bit()?;
        let skip_adaptive_lf_smoothing = reader.read_bit()?;

        let (duration, blend_mode, is_last) = if have_animation {
            let duration = reader.read_u32(&DURATION)?;
            let blend_mode = BlendMode::from_code(reader.read_bits(2)? as u32)?;
            let is_last = reader.read_bit()?;
            (Some(duration), blend_mode, is_last)
        } else {
            (None, BlendMode::Replace, true)
        };

        let save_as_reference = reader.read_bits(3)? as u8;

        let crop = if reader.read_bit()? {
            Some(CropRect {
                x: reader.read_u32(&COORD)?,
                y: reader.read_u32(&COORD)?,
                width: reader.read_u32(&COORD)?,
                height: reader.read_u32(&COORD)?,
            })
        } else {
            None
        };

        let restoration = RestorationFilter {
            gab: reader.read_bit()?,
            epf: reader.read_bit()?,
        };

        let progressive = reader.read_bits(1)? != 0;
        let num_passes = if progressive { 3 } else { 1 };
        let mut downsample = Vec::with_capacity(num_passes as usize);
        for _ in 0..num_passes {
            downsample.push(reader.read_bits(3)? as u8);
        }

        reader.align_to_byte()?;
        let header = Self {
            frame_type,
            encoding,
            have_noise,
            have_patches,
            have_splines,
            use_lf_frame,
            skip_adaptive_lf_smoothing,
            duration,
            blend_mode,
            is_last,
            save_as_reference,
            crop,
            restoration,
            passes: PassConfig {
                num_passes,
                downsample,
            },
        };
        header.validate()?;
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(header: &FrameHeader, have_animation: bool) -> FrameHeader {
        let mut writer = BitWriter::new();
        header.write(&mut writer, have_animation).unwrap();
        assert!(writer.is_aligned(), "frame header must end byte-aligned");
        let bytes = writer.finish().unwrap();
        let mut reader = BitReader::new(&bytes);
        FrameHeader::read(&mut reader, have_animation).unwrap()
    }

    #[test]
    fn test_default_roundtrip() {
        let header = FrameHeader::default();
        assert_eq!(roundtrip(&header, false), header);
    }

    #[test]
    fn test_modular_flags_roundtrip() {
        let header = FrameHeader {
            encoding: FrameEncoding::Modular,
            have_noise: true,
            have_splines: true,
            restoration: RestorationFilter {
                gab: true,
                epf: false,
            },
            ..FrameHeader::default()
        };
        assert_eq!(roundtrip(&header, false), header);
    }

    #[test]
    fn test_animation_fields_roundtrip() {
        let header = FrameHeader {
            duration: Some(33),
            blend_mode: BlendMode::Blend,
            is_last: false,
            save_as_reference: 2,
            ..FrameHeader::default()
        };
        let decoded = roundtrip(&header, true);
        assert_eq!(decoded.duration, Some(33));
        assert_eq!(decoded.blend_mode, BlendMode::Blend);
        assert!(!decoded.is_last);
        assert_eq!(decoded.save_as_reference, 2);
    }

    #[test]
    fn test_progressive_passes_roundtrip() {
        let header = FrameHeader {
            passes: PassConfig::progressive(),
            ..FrameHeader::default()
        };
        let decoded = roundtrip(&header, false);
        assert_eq!(decoded.passes.num_passes, 3);
        assert_eq!(decoded.passes.downsample, vec![3, 1, 0]);
    }

    #[test]
    fn test_crop_roundtrip() {
        let header = FrameHeader {
            crop: Some(CropRect {
                x: 10,
                y: 20,
                width: 300,
                height: 4000,
            }),
            ..FrameHeader::default()
        };
        assert_eq!(roundtrip(&header, false), header);
    }

    #[test]
    fn test_invalid_pass_count_rejected() {
        let header = FrameHeader {
            passes: PassConfig {
                num_passes: 2,
                downsample: vec![0, 0],
            },
            ..FrameHeader::default()
        };
        let mut writer = BitWriter::new();
        assert!(header.write(&mut writer, false).is_err());
    }

    #[test]
    fn test_invalid_reference_slot_rejected() {
        let header = FrameHeader {
            save_as_reference: 5,
            ..FrameHeader::default()
        };
        assert!(header.validate().is_err());
    }
}
