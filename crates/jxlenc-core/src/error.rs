//! Error types for encoder operations

use thiserror::Error;

/// Result type for encoder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while encoding
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid options: {0}")]
    InvalidOptions(#[from] OptionsError),

    #[error("invalid frame: {0}")]
    InvalidFrame(#[from] FrameError),

    #[error("bitstream capacity exceeded")]
    BitstreamFull,

    #[error("operation requires a byte-aligned bitstream cursor")]
    NotAligned,

    #[error("bitstream writer already finished")]
    AlreadyFinished,

    #[error("unexpected end of bitstream")]
    UnexpectedEof,

    #[error("symbol {symbol} outside alphabet of size {alphabet_size}")]
    AlphabetViolation { symbol: u32, alphabet_size: u32 },

    #[error("coordinates ({x}, {y}) out of bounds for channel {channel}")]
    OutOfBounds { x: u32, y: u32, channel: usize },

    #[error("sample value {value} exceeds declared depth of {bits} bits")]
    SampleOutOfRange { value: i64, bits: u32 },

    #[error("channel {0} has no samples")]
    EmptyChannel(usize),

    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    #[error("encode cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sub-kinds of `Error::InvalidOptions`
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum OptionsError {
    #[error("quality {0} outside 0..=100")]
    QualityOutOfRange(f32),

    #[error("effort {0} outside 1..=9")]
    EffortOutOfRange(u8),

    #[error("distance must be non-negative, got {0}")]
    NegativeDistance(f32),

    #[error("responsive layer count {0} outside 2..=8")]
    LayerCountOutOfRange(u8),

    #[error("animation requires fps > 0 and tps denominator >= 1")]
    InconsistentAnimation,

    #[error("per-frame duration list does not match the frame count")]
    DurationCountMismatch,

    #[error("region of interest extends outside the image")]
    RoiOutsideImage,

    #[error("reference frame config allows at most 4 slots, got {0}")]
    ReferenceSlotCount(u8),

    #[error("no frames supplied")]
    EmptyFrameList,
}

/// Sub-kinds of `Error::InvalidFrame`
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("zero width or height")]
    ZeroDimension,

    #[error("dimensions {width}x{height} exceed the supported maximum")]
    DimensionOverflow { width: u64, height: u64 },

    #[error("unsupported channel count {0}")]
    ChannelCount(usize),

    #[error("frame {index} dimensions differ from frame 0")]
    MismatchedDimensions { index: usize },

    #[error("unsupported bit depth {0}")]
    UnsupportedBitDepth(u32),

    #[error("buffer holds {actual} samples, expected {expected}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("alpha mode inconsistent with channel count")]
    AlphaInconsistent,
}
