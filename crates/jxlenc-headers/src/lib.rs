//! Codestream and frame header serialisation, plus the container writer
//!
//! Every header section is independently serialisable and leaves the
//! bitstream byte-aligned at its boundary.

pub mod animation;
pub mod container;
pub mod frame;
pub mod metadata;
pub mod size;

pub use animation::AnimationHeader;
pub use container::{
    BoxType, Container, ContainerBox, ContainerMetadata, CONTAINER_SIGNATURE,
};
pub use frame::{
    BlendMode, CropRect, FrameEncoding, FrameHeader, FrameType, PassConfig, RestorationFilter,
};
pub use metadata::{BitDepthHeader, ImageMetadata, ToneMapping};
pub use size::SizeHeader;
