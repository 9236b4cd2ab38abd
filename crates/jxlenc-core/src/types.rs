//! Core descriptor types for the image model

use num_traits::NumCast;

/// Sample storage type of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelType {
    /// 8-bit unsigned integer
    U8,
    /// 16-bit unsigned integer
    U16,
    /// 16-bit signed integer (e.g. CT Hounsfield units)
    I16,
    /// 32-bit floating point
    F32,
}

impl PixelType {
    /// Returns the storage size in bytes for this sample type
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            PixelType::U8 => 1,
            PixelType::U16 | PixelType::I16 => 2,
            PixelType::F32 => 4,
        }
    }

    /// Whether samples of this type carry a sign
    pub fn is_signed(&self) -> bool {
        matches!(self, PixelType::I16)
    }

    /// Whether samples of this type are floating point
    pub fn is_float(&self) -> bool {
        matches!(self, PixelType::F32)
    }
}

/// Color primaries
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primaries {
    Srgb,
    DisplayP3,
    Rec2020,
    /// Explicit CIE xy chromaticities for red, green, blue
    Custom {
        red: (f32, f32),
        green: (f32, f32),
        blue: (f32, f32),
    },
}

/// Transfer function
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransferFunction {
    Srgb,
    Linear,
    Pq,
    Hlg,
    Gamma(f32),
}

/// Color model of the main channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorModel {
    Rgb,
    Grayscale,
    Xyb,
}

/// White point
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WhitePoint {
    D65,
    Custom { x: f32, y: f32 },
}

/// Rendering intent carried in the color encoding header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderingIntent {
    Perceptual = 0,
    Relative = 1,
    Saturation = 2,
    Absolute = 3,
}

/// Complete color descriptor for an image frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorDescriptor {
    pub primaries: Primaries,
    pub transfer: TransferFunction,
    pub model: ColorModel,
    pub white_point: WhitePoint,
    pub rendering_intent: RenderingIntent,
}

impl Default for ColorDescriptor {
    fn default() -> Self {
        Self {
            primaries: Primaries::Srgb,
            transfer: TransferFunction::Srgb,
            model: ColorModel::Rgb,
            white_point: WhitePoint::D65,
            rendering_intent: RenderingIntent::Perceptual,
        }
    }
}

/// Alpha interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaMode {
    /// No alpha channel
    None,
    /// Straight (unassociated) alpha
    Straight,
    /// Premultiplied alpha
    Premultiplied,
}

/// EXIF-style orientation, 1..=8
///
/// Out-of-range values are clamped on ingest rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Orientation(u8);

impl Orientation {
    pub const IDENTITY: Orientation = Orientation(1);

    /// Clamp an EXIF orientation value into 1..=8
    pub fn from_exif(value: u8) -> Self {
        Orientation(value.clamp(1, 8))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Orientation::IDENTITY
    }
}

/// Extra channel semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraChannelType {
    Alpha = 0,
    Depth = 1,
    SpotColor = 2,
    SelectionMask = 3,
    Black = 4,
    Cfa = 5,
    Thermal = 6,
    Optional = 7,
}

impl ExtraChannelType {
    pub fn from_code(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Alpha),
            1 => Some(Self::Depth),
            2 => Some(Self::SpotColor),
            3 => Some(Self::SelectionMask),
            4 => Some(Self::Black),
            5 => Some(Self::Cfa),
            6 => Some(Self::Thermal),
            7 => Some(Self::Optional),
            _ => None,
        }
    }
}

/// Description of one extra channel
#[derive(Debug, Clone, PartialEq)]
pub struct ExtraChannelInfo {
    pub channel_type: ExtraChannelType,
    pub bits_per_sample: u32,
    /// Downsampling shift relative to the main image
    pub dim_shift: u32,
    pub name: Option<String>,
    /// Spot color (r, g, b, solidity) for `SpotColor` channels
    pub spot_color: Option<[f32; 4]>,
}

impl ExtraChannelInfo {
    pub fn new(channel_type: ExtraChannelType, bits_per_sample: u32) -> Self {
        Self {
            channel_type,
            bits_per_sample,
            dim_shift: 0,
            name: None,
            spot_color: None,
        }
    }
}

/// Image dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }
}

/// Image sample type usable in generic pixel conversions
pub trait Sample: Copy + NumCast + PartialOrd {
    const PIXEL_TYPE: PixelType;

    fn to_f32(self) -> f32;
    fn from_f32(value: f32) -> Self;
}

impl Sample for u8 {
    const PIXEL_TYPE: PixelType = PixelType::U8;

    fn to_f32(self) -> f32 {
        self as f32 / 255.0
    }

    fn from_f32(value: f32) -> Self {
        (value * 255.0).round().clamp(0.0, 255.0) as u8
    }
}

impl Sample for u16 {
    const PIXEL_TYPE: PixelType = PixelType::U16;

    fn to_f32(self) -> f32 {
        self as f32 / 65535.0
    }

    fn from_f32(value: f32) -> Self {
        (value * 65535.0).round().clamp(0.0, 65535.0) as u16
    }
}

impl Sample for i16 {
    const PIXEL_TYPE: PixelType = PixelType::I16;

    fn to_f32(self) -> f32 {
        self as f32 / 32767.0
    }

    fn from_f32(value: f32) -> Self {
        (value * 32767.0).round().clamp(-32768.0, 32767.0) as i16
    }
}

impl Sample for f32 {
    const PIXEL_TYPE: PixelType = PixelType::F32;

    fn to_f32(self) -> f32 {
        self
    }

    fn from_f32(value: f32) -> Self {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_clamping() {
        assert_eq!(Orientation::from_exif(0).value(), 1);
        assert_eq!(Orientation::from_exif(1).value(), 1);
        assert_eq!(Orientation::from_exif(8).value(), 8);
        assert_eq!(Orientation::from_exif(9).value(), 8);
        assert_eq!(Orientation::from_exif(255).value(), 8);
    }

    #[test]
    fn test_pixel_type_sizes() {
        assert_eq!(PixelType::U8.bytes_per_sample(), 1);
        assert_eq!(PixelType::U16.bytes_per_sample(), 2);
        assert_eq!(PixelType::I16.bytes_per_sample(), 2);
        assert_eq!(PixelType::F32.bytes_per_sample(), 4);
        assert!(PixelType::I16.is_signed());
        assert!(!PixelType::U16.is_signed());
    }

    #[test]
    fn test_extra_channel_type_codes() {
        for code in 0..8 {
            let ty = ExtraChannelType::from_code(code).unwrap();
            assert_eq!(ty as u32, code);
        }
        assert!(ExtraChannelType::from_code(8).is_none());
    }
}
