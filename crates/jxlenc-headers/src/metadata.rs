//! Image metadata header
//!
//! Serialised once per codestream, directly after the size header, in this
//! order: colour encoding, bit depth, orientation, animation, intrinsic
//! size / preview flags, extra channels, alpha mode, tone mapping.

use jxlenc_bitstream::u32coder::{COUNT, SIZE_DIM};
use jxlenc_bitstream::{BitReader, BitWriter, U32Branch, U32Spec};
use jxlenc_core::{
    AlphaMode, ColorDescriptor, ColorModel, Error, ExtraChannelInfo, ExtraChannelType,
    ImageFrame, Orientation, Primaries, RenderingIntent, Result, TransferFunction, WhitePoint,
};

use crate::animation::AnimationHeader;

/// Bits per sample for main channels
const BITS_PER_SAMPLE: U32Spec = U32Spec::new([
    U32Branch::Val(8),
    U32Branch::Val(16),
    U32Branch::BitsOffset { bits: 5, offset: 1 },
    U32Branch::Val(32),
]);

/// Chromaticity coordinates scaled by 10^6
const XY_SCALE: f32 = 1_000_000.0;
const XY_BITS: u32 = 20;

/// Gamma exponents scaled by 10^4
const GAMMA_SCALE: f32 = 10_000.0;
const GAMMA_BITS: u32 = 18;

/// Bit depth descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitDepthHeader {
    pub bits_per_sample: u32,
    /// Exponent bits; non-zero only for floating-point samples
    pub exp_bits: u32,
}

impl Default for BitDepthHeader {
    fn default() -> Self {
        Self {
            bits_per_sample: 8,
            exp_bits: 0,
        }
    }
}

impl BitDepthHeader {
    pub fn write(&self, writer: &mut BitWriter) -> Result<()> {
        let default = *self == Self::default();
        writer.write_bit(!default)?;
        if !default {
            writer.write_u32(self.bits_per_sample, &BITS_PER_SAMPLE)?;
            writer.write_bits(self.exp_bits as u64, 5)?;
        }
        Ok(())
    }

    pub fn read(reader: &mut BitReader) -> Result<Self> {
        if !reader.read_bit()? {
            return Ok(Self::default());
        }
        Ok(Self {
            bits_per_sample: reader.read_u32(&BITS_PER_SAMPLE)?,
            exp_bits: reader.read_bits(5)? as u32,
        })
    }
}

/// HDR tone mapping parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneMapping {
    /// Absolute peak luminance in cd/m^2 (PQ)
    pub intensity_target: f32,
    /// System gamma (HLG)
    pub system_gamma: f32,
}

impl Default for ToneMapping {
    fn default() -> Self {
        Self {
            intensity_target: 255.0,
            system_gamma: 1.2,
        }
    }
}

/// Complete image-level metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ImageMetadata {
    pub color: ColorDescriptor,
    pub bit_depth: BitDepthHeader,
    pub orientation: Orientation,
    pub animation: Option<AnimationHeader>,
    pub intrinsic_size: Option<(u32, u32)>,
    pub have_preview: bool,
    pub extra_channels: Vec<ExtraChannelInfo>,
    pub alpha_mode: AlphaMode,
    /// Present for PQ and HLG transfers
    pub tone_mapping: Option<ToneMapping>,
}

impl ImageMetadata {
    /// Derive the metadata header from the first frame of an encode
    pub fn from_frame(frame: &ImageFrame, animation: Option<AnimationHeader>) -> Self {
        let exp_bits = if frame.pixel_type.is_float() { 8 } else { 0 };
        let tone_mapping = match frame.color.transfer {
            TransferFunction::Pq => Some(ToneMapping {
                intensity_target: 10_000.0,
                system_gamma: 1.2,
            }),
            TransferFunction::Hlg => Some(ToneMapping::default()),
            _ => None,
        };
        Self {
            color: frame.color,
            bit_depth: BitDepthHeader {
                bits_per_sample: frame.bits_per_sample,
                exp_bits,
            },
            orientation: frame.orientation,
            animation,
            intrinsic_size: None,
            have_preview: false,
            extra_channels: frame
                .extra_channels
                .iter()
                .map(|plane| plane.info.clone())
                .collect(),
            alpha_mode: frame.alpha_mode,
            tone_mapping,
        }
    }

    pub fn write(&self, writer: &mut BitWriter) -> Result<()> {
        self.write_color_encoding(writer)?;
        self.bit_depth.write(writer)?;
        writer.write_bits((self.orientation.value() - 1) as u64, 3)?;

        writer.write_bit(self.animation.is_some())?;
        if let Some(animation) = &self.animation {
            animation.write(writer)?;
        }

        writer.write_bit(self.intrinsic_size.is_some())?;
        if let Some((width, height)) = self.intrinsic_size {
            writer.write_u32(width, &SIZE_DIM)?;
            writer.write_u32(height, &SIZE_DIM)?;
        }
        writer.write_bit(self.have_preview)?;

        writer.write_u32(self.extra_channels.len() as u32, &COUNT)?;
        for channel in &self.extra_channels {
            write_extra_channel(writer, channel)?;
        }

        let alpha_code = match self.alpha_mode {
            AlphaMode::None => 0u64,
            AlphaMode::Straight => 1,
            AlphaMode::Premultiplied => 2,
        };
        writer.write_bits(alpha_code, 2)?;

        writer.write_bit(self.tone_mapping.is_some())?;
        if let Some(tm) = &self.tone_mapping {
            writer.write_bits(tm.intensity_target.to_bits() as u64, 32)?;
            writer.write_bits(tm.system_gamma.to_bits() as u64, 32)?;
        }

        // Header sections end byte-aligned
        writer.align_to_byte()?;
        Ok(())
    }

    pub fn read(reader: &mut BitReader) -> Result<Self> {
        let color = Self::read_color_encoding(reader)?;
        let bit_depth = BitDepthHeader::read(reader)?;
        let orientation = Orientation::from_exif(reader.read_bits(3)? as u8 + 1);

        let animation = if reader.read_bit()? {
            Some(AnimationHeader::read(reader)?)
        } else {
            None
        };

        let intrinsic_size = if reader.read_bit()? {
            Some((reader.read_u32(&SIZE_DIM)?, reader.read_u32(&SIZE_DIM)?))
        } else {
            None
        };
        let have_preview = reader.read_bit()?;

        let num_extra = reader.read_u32(&COUNT)? as usize;
        let mut extra_channels = Vec::with_capacity(num_extra);
        for _ in 0..num_extra {
            extra_channels.push(read_extra_channel(reader)?);
        }

        let alpha_mode = match reader.read_bits(2)? {
            0 => AlphaMode::None,
            1 => AlphaMode::Straight,
            2 => AlphaMode::Premultiplied,
            _ => return Err(Error::UnexpectedEof),
        };

        let tone_mapping = if reader.read_bit()? {
            Some(ToneMapping {
                intensity_target: f32::from_bits(reader.read_bits(32)? as u32),
                system_gamma: f32::from_bits(reader.read_bits(32)? as u32),
            })
        } else {
            None
        };

        reader.align_to_byte()?;
        Ok(Self {
            color,
            bit_depth,
            orientation,
            animation,
            intrinsic_size,
            have_preview,
            extra_channels,
            alpha_mode,
            tone_mapping,
        })
    }

    fn write_color_encoding(&self, writer: &mut BitWriter) -> Result<()> {
        match self.color.primaries {
            Primaries::Srgb => writer.write_bits(0, 2)?,
            Primaries::DisplayP3 => writer.write_bits(1, 2)?,
            Primaries::Rec2020 => writer.write_bits(2, 2)?,
            Primaries::Custom { red, green, blue } => {
                writer.write_bits(3, 2)?;
                for (x, y) in [red, green, blue] {
                    write_xy(writer, x)?;
                    write_xy(writer, y)?;
                }
            }
        }

        match self.color.white_point {
            WhitePoint::D65 => writer.write_bit(false)?,
            WhitePoint::Custom { x, y } => {
                writer.write_bit(true)?;
                write_xy(writer, x)?;
                write_xy(writer, y)?;
            }
        }

        match self.color.transfer {
            TransferFunction::Srgb => writer.write_bits(0, 3)?,
            TransferFunction::Linear => writer.write_bits(1, 3)?,
            TransferFunction::Pq => writer.write_bits(2, 3)?,
            TransferFunction::Hlg => writer.write_bits(3, 3)?,
            TransferFunction::Gamma(gamma) => {
                writer.write_bits(4, 3)?;
                let scaled = (gamma * GAMMA_SCALE).round().clamp(1.0, 250_000.0) as u64;
                writer.write_bits(scaled, GAMMA_BITS)?;
            }
        }

        let model = match self.color.model {
            ColorModel::Rgb => 0u64,
            ColorModel::Grayscale => 1,
            ColorModel::Xyb => 2,
        };
        writer.write_bits(model, 2)?;
        writer.write_bits(self.color.rendering_intent as u64, 2)?;
        Ok(())
    }

    fn read_color_encoding(reader: &mut BitReader) -> Result<ColorDescriptor> {
        let primaries = match reader.read_bits(2)? {
            0 => Primaries::Srgb,
            1 => Primaries::DisplayP3,
            2 => Primaries::Rec2020,
            _ => {
                let mut coords = [0.0f32; 6];
                for coord in coords.iter_mut() {
                    *coord = read_xy(reader)?;
                }
                Primaries::Custom {
                    red: (coords[0], coords[1]),
                    green: (coords[2], coords[3]),
                    blue: (coords[4], coords[5]),
                }
            }
        };

        let white_point = if reader.read_bit()? {
            WhitePoint::Custom {
                x: read_xy(reader)?,
                y: read_xy(reader)?,
            }
        } else {
            WhitePoint::D65
        };

        let transfer = match reader.read_bits(3)? {
            0 => TransferFunction::Srgb,
            1 => TransferFunction::Linear,
            2 => TransferFunction::Pq,
            3 => TransferFunction::Hlg,
            4 => {
                let scaled = reader.read_bits(GAMMA_BITS)? as f32;
                TransferFunction::Gamma(scaled / GAMMA_SCALE)
            }
            _ => return Err(Error::UnexpectedEof),
        };

        let model = match reader.read_bits(2)? {
            0 => ColorModel::Rgb,
            1 => ColorModel::Grayscale,
            2 => ColorModel::Xyb,
            _ => return Err(Error::UnexpectedEof),
        };

        let rendering_intent = match reader.read_bits(2)? {
            0 => RenderingIntent::Perceptual,
            1 => RenderingIntent::Relative,
            2 => RenderingIntent::Saturation,
            _ => RenderingIntent::Absolute,
        };

        Ok(ColorDescriptor {
            primaries,
            transfer,
            model,
            white_point,
            rendering_intent,
        })
    }
}

fn write_xy(writer: &mut BitWriter, value: f32) -> Result<()> {
    let scaled = (value * XY_SCALE).round().clamp(0.0, (1 << XY_BITS) as f32 - 1.0) as u64;
    writer.write_bits(scaled, XY_BITS)
}

fn read_xy(reader: &mut BitReader) -> Result<f32> {
    Ok(reader.read_bits(XY_BITS)? as f32 / XY_SCALE)
}

fn write_extra_channel(writer: &mut BitWriter, channel: &ExtraChannelInfo) -> Result<()> {
    writer.write_bits(channel.channel_type as u64, 3)?;
    writer.write_u32(channel.bits_per_sample, &BITS_PER_SAMPLE)?;
    writer.write_bits(channel.dim_shift as u64, 3)?;

    match &channel.name {
        Some(name) => {
            let bytes = name.as_bytes();
            writer.write_bit(true)?;
            writer.write_u32(bytes.len() as u32, &COUNT)?;
            for &byte in bytes {
                writer.write_bits(byte as u64, 8)?;
            }
        }
        None => writer.write_bit(false)?,
    }

    match &channel.spot_color {
        Some(spot) => {
            writer.write_bit(true)?;
            for &component in spot {
                writer.write_bits(component.to_bits() as u64, 32)?;
            }
        }
        None => writer.write_bit(false)?,
    }
    Ok(())
}

fn read_extra_channel(reader: &mut BitReader) -> Result<ExtraChannelInfo> {
    let type_code = reader.read_bits(3)? as u32;
    let channel_type = ExtraChannelType::from_code(type_code).ok_or(Error::UnexpectedEof)?;
    let bits_per_sample = reader.read_u32(&BITS_PER_SAMPLE)?;
    let dim_shift = reader.read_bits(3)? as u32;

    let name = if reader.read_bit()? {
        let len = reader.read_u32(&COUNT)? as usize;
        let mut bytes = Vec::with_capacity(len);
        for _ in 0..len {
            bytes.push(reader.read_bits(8)? as u8);
        }
        Some(String::from_utf8(bytes).map_err(|_| Error::UnexpectedEof)?)
    } else {
        None
    };

    let spot_color = if reader.read_bit()? {
        let mut spot = [0.0f32; 4];
        for component in spot.iter_mut() {
            *component = f32::from_bits(reader.read_bits(32)? as u32);
        }
        Some(spot)
    } else {
        None
    };

    Ok(ExtraChannelInfo {
        channel_type,
        bits_per_sample,
        dim_shift,
        name,
        spot_color,
    })
}
