//! Planar image frame model
//!
//! Frames are stored channel-major: the buffer for channel `c` occupies one
//! contiguous plane of `width * height` samples. Extra channels are stored as
//! separate planes parallel to the main image.

use crate::{
    AlphaMode, ColorDescriptor, Dimensions, Error, ExtraChannelInfo, FrameError, Orientation,
    PixelType, Result,
};
use crate::consts::{MAX_CHANNELS, MAX_IMAGE_DIMENSION};

/// Planar sample storage for one or more channels
#[derive(Debug, Clone)]
pub enum SampleBuffer {
    U8(Vec<u8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    F32(Vec<f32>),
}

impl SampleBuffer {
    pub fn new(pixel_type: PixelType, size: usize) -> Self {
        match pixel_type {
            PixelType::U8 => SampleBuffer::U8(vec![0; size]),
            PixelType::U16 => SampleBuffer::U16(vec![0; size]),
            PixelType::I16 => SampleBuffer::I16(vec![0; size]),
            PixelType::F32 => SampleBuffer::F32(vec![0.0; size]),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SampleBuffer::U8(v) => v.len(),
            SampleBuffer::U16(v) => v.len(),
            SampleBuffer::I16(v) => v.len(),
            SampleBuffer::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pixel_type(&self) -> PixelType {
        match self {
            SampleBuffer::U8(_) => PixelType::U8,
            SampleBuffer::U16(_) => PixelType::U16,
            SampleBuffer::I16(_) => PixelType::I16,
            SampleBuffer::F32(_) => PixelType::F32,
        }
    }
}

/// One extra channel plane with its descriptor
#[derive(Debug, Clone)]
pub struct ExtraChannelPlane {
    pub info: ExtraChannelInfo,
    pub buffer: SampleBuffer,
}

/// A frame to be encoded
///
/// The encoder borrows frames read-only; all per-encode state lives in the
/// encoder itself.
#[derive(Debug, Clone)]
pub struct ImageFrame {
    pub dimensions: Dimensions,
    /// Number of main channels (1..=4); alpha, when present, is channel 3
    pub channels: usize,
    /// Declared bits per sample, independent of the storage type
    pub bits_per_sample: u32,
    pub pixel_type: PixelType,
    pub color: ColorDescriptor,
    pub alpha_mode: AlphaMode,
    pub orientation: Orientation,
    /// Planar channel-major storage for the main channels
    pub buffer: SampleBuffer,
    pub extra_channels: Vec<ExtraChannelPlane>,
}

impl ImageFrame {
    pub fn new(
        dimensions: Dimensions,
        channels: usize,
        pixel_type: PixelType,
        color: ColorDescriptor,
    ) -> Result<Self> {
        if dimensions.width == 0 || dimensions.height == 0 {
            return Err(FrameError::ZeroDimension.into());
        }
        if dimensions.width > MAX_IMAGE_DIMENSION || dimensions.height > MAX_IMAGE_DIMENSION {
            return Err(FrameError::DimensionOverflow {
                width: dimensions.width as u64,
                height: dimensions.height as u64,
            }
            .into());
        }
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(FrameError::ChannelCount(channels).into());
        }

        let size = dimensions.pixel_count() * channels;
        let bits = match pixel_type {
            PixelType::U8 => 8,
            PixelType::U16 | PixelType::I16 => 16,
            PixelType::F32 => 32,
        };
        let alpha_mode = if channels == 4 {
            AlphaMode::Straight
        } else {
            AlphaMode::None
        };

        Ok(Self {
            dimensions,
            channels,
            bits_per_sample: bits,
            pixel_type,
            color,
            alpha_mode,
            orientation: Orientation::IDENTITY,
            buffer: SampleBuffer::new(pixel_type, size),
            extra_channels: Vec::new(),
        })
    }

    /// Set the EXIF orientation, clamping out-of-range values
    pub fn set_orientation(&mut self, exif_value: u8) {
        self.orientation = Orientation::from_exif(exif_value);
    }

    pub fn width(&self) -> u32 {
        self.dimensions.width
    }

    pub fn height(&self) -> u32 {
        self.dimensions.height
    }

    pub fn pixel_count(&self) -> usize {
        self.dimensions.pixel_count()
    }

    pub fn has_alpha(&self) -> bool {
        self.alpha_mode != AlphaMode::None
    }

    /// Maximum value representable at the declared bit depth
    pub fn max_sample_value(&self) -> u32 {
        if self.bits_per_sample >= 32 {
            u32::MAX
        } else {
            (1u32 << self.bits_per_sample) - 1
        }
    }

    fn plane_index(&self, x: u32, y: u32, channel: usize) -> Result<usize> {
        if x >= self.dimensions.width || y >= self.dimensions.height || channel >= self.channels {
            return Err(Error::OutOfBounds { x, y, channel });
        }
        let plane = self.pixel_count() * channel;
        Ok(plane + y as usize * self.dimensions.width as usize + x as usize)
    }

    /// Read a sample as u16, saturating for f32 storage
    ///
    /// Float samples are scaled to the declared bit depth and clamped.
    pub fn get(&self, x: u32, y: u32, channel: usize) -> Result<u16> {
        let idx = self.plane_index(x, y, channel)?;
        Ok(match &self.buffer {
            SampleBuffer::U8(v) => v[idx] as u16,
            SampleBuffer::U16(v) => v[idx],
            SampleBuffer::I16(v) => v[idx].max(0) as u16,
            SampleBuffer::F32(v) => {
                let max = self.max_sample_value().min(u16::MAX as u32) as f32;
                (v[idx] * max).round().clamp(0.0, max) as u16
            }
        })
    }

    /// Read a sample as i16 (for signed channels)
    pub fn get_signed(&self, x: u32, y: u32, channel: usize) -> Result<i16> {
        let idx = self.plane_index(x, y, channel)?;
        Ok(match &self.buffer {
            SampleBuffer::U8(v) => v[idx] as i16,
            SampleBuffer::U16(v) => v[idx].min(i16::MAX as u16) as i16,
            SampleBuffer::I16(v) => v[idx],
            SampleBuffer::F32(v) => (v[idx] * 32767.0).round().clamp(-32768.0, 32767.0) as i16,
        })
    }

    /// Read a sample as f32, normalized to [0, 1] for integer storage
    pub fn get_float(&self, x: u32, y: u32, channel: usize) -> Result<f32> {
        let idx = self.plane_index(x, y, channel)?;
        Ok(match &self.buffer {
            SampleBuffer::U8(v) => v[idx] as f32 / 255.0,
            SampleBuffer::U16(v) => v[idx] as f32 / 65535.0,
            SampleBuffer::I16(v) => v[idx] as f32 / 32767.0,
            SampleBuffer::F32(v) => v[idx],
        })
    }

    pub fn set(&mut self, x: u32, y: u32, channel: usize, value: u16) -> Result<()> {
        let idx = self.plane_index(x, y, channel)?;
        match &mut self.buffer {
            SampleBuffer::U8(v) => v[idx] = value.min(255) as u8,
            SampleBuffer::U16(v) => v[idx] = value,
            SampleBuffer::I16(v) => v[idx] = value.min(i16::MAX as u16) as i16,
            SampleBuffer::F32(v) => {
                let max = if self.bits_per_sample >= 16 {
                    65535.0
                } else {
                    ((1u32 << self.bits_per_sample) - 1) as f32
                };
                v[idx] = value as f32 / max;
            }
        }
        Ok(())
    }

    pub fn set_signed(&mut self, x: u32, y: u32, channel: usize, value: i16) -> Result<()> {
        let idx = self.plane_index(x, y, channel)?;
        match &mut self.buffer {
            SampleBuffer::U8(v) => v[idx] = value.clamp(0, 255) as u8,
            SampleBuffer::U16(v) => v[idx] = value.max(0) as u16,
            SampleBuffer::I16(v) => v[idx] = value,
            SampleBuffer::F32(v) => v[idx] = value as f32 / 32767.0,
        }
        Ok(())
    }

    pub fn set_float(&mut self, x: u32, y: u32, channel: usize, value: f32) -> Result<()> {
        let idx = self.plane_index(x, y, channel)?;
        match &mut self.buffer {
            SampleBuffer::U8(v) => v[idx] = (value * 255.0).round().clamp(0.0, 255.0) as u8,
            SampleBuffer::U16(v) => v[idx] = (value * 65535.0).round().clamp(0.0, 65535.0) as u16,
            SampleBuffer::I16(v) => {
                v[idx] = (value * 32767.0).round().clamp(-32768.0, 32767.0) as i16
            }
            SampleBuffer::F32(v) => v[idx] = value,
        }
        Ok(())
    }

    /// Check the structural invariants of the frame
    pub fn validate(&self) -> Result<()> {
        let expected = self.pixel_count() * self.channels;
        if self.buffer.len() != expected {
            return Err(FrameError::BufferSizeMismatch {
                expected,
                actual: self.buffer.len(),
            }
            .into());
        }
        if self.bits_per_sample == 0 || self.bits_per_sample > 32 {
            return Err(FrameError::UnsupportedBitDepth(self.bits_per_sample).into());
        }
        let alpha_present = self.alpha_mode != AlphaMode::None;
        if alpha_present != (self.channels == 4) {
            return Err(FrameError::AlphaInconsistent.into());
        }
        for plane in &self.extra_channels {
            let shift = plane.info.dim_shift;
            let w = (self.dimensions.width >> shift).max(1) as usize;
            let h = (self.dimensions.height >> shift).max(1) as usize;
            if plane.buffer.len() != w * h {
                return Err(FrameError::BufferSizeMismatch {
                    expected: w * h,
                    actual: plane.buffer.len(),
                }
                .into());
            }
        }
        Ok(())
    }
}
