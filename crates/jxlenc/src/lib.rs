//! # JPEG XL encoder core
//!
//! High-level API over the encoder workspace: build an [`ImageFrame`],
//! pick [`EncodingOptions`], and run the [`Encoder`].
//!
//! ```no_run
//! use jxlenc::{ColorDescriptor, Dimensions, Encoder, EncodingOptions, ImageFrame, PixelType};
//!
//! let frame = ImageFrame::new(
//!     Dimensions::new(800, 600),
//!     3,
//!     PixelType::U8,
//!     ColorDescriptor::default(),
//! ).unwrap();
//!
//! let encoder = Encoder::new(EncodingOptions::lossy(90.0)).unwrap();
//! let encoded = encoder.encode(&frame).unwrap();
//! std::fs::write("out.jxl", &encoded.bytes).unwrap();
//! ```
//!
//! Lossless encoding uses the Modular pipeline (reversible colour
//! transform, squeeze, MED prediction); lossy encoding uses VarDCT (XYB
//! opsin space, 8x8 DCT, adaptive quantisation, chroma-from-luma). Both
//! share the rANS entropy coder. Output is a raw codestream or an ISOBMFF
//! container, selected by [`EncodingOptions::container`].

pub use jxlenc_core::{
    AlphaMode, AnimationConfig, BufferPool, CancelToken, ColorDescriptor, ColorModel, Dimensions,
    EncodingMode, EncodingOptions, Error, ExtraChannelInfo, ExtraChannelPlane, ExtraChannelType,
    FrameDurations, FrameError, ImageFrame, NoiseConfig, OptionsError, Orientation, PatchConfig,
    PixelType, Primaries, ReferenceConfig, RenderingIntent, ResponsiveConfig, Result, RoiConfig,
    SampleBuffer, SplineConfig, TransferFunction, WhitePoint,
};

pub use jxlenc_encoder::modular::{extract_channels, ModularChannel};
pub use jxlenc_encoder::{decode, EncodeStats, EncodedImage, Encoder, GROUP_TERMINATOR};

pub use jxlenc_headers::{Container, ContainerMetadata, CONTAINER_SIGNATURE};

pub use jxlenc_core::options::quality_to_distance;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
