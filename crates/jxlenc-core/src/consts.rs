//! Constants used throughout the encoder

/// Maximum supported image dimension (2^30)
pub const MAX_IMAGE_DIMENSION: u32 = 1 << 30;

/// DCT block size in pixels
pub const BLOCK_SIZE: usize = 8;

/// Number of coefficients in a block
pub const BLOCK_AREA: usize = BLOCK_SIZE * BLOCK_SIZE;

/// Maximum number of main color channels
pub const MAX_CHANNELS: usize = 4;

/// Number of reference frame slots
pub const REFERENCE_SLOTS: usize = 4;

/// Default encoding effort (1-9)
pub const DEFAULT_EFFORT: u8 = 7;

/// Minimum and maximum effort values
pub const MIN_EFFORT: u8 = 1;
pub const MAX_EFFORT: u8 = 9;

/// Minimum and maximum quality values
pub const MIN_QUALITY: f32 = 0.0;
pub const MAX_QUALITY: f32 = 100.0;

/// Maximum ROI quality boost
pub const MAX_QUALITY_BOOST: f32 = 50.0;

/// Quality layer count bounds for responsive encoding
pub const MIN_LAYERS: u8 = 2;
pub const MAX_LAYERS: u8 = 8;
