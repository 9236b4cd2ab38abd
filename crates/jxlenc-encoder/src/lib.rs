//! JPEG XL encoder core
//!
//! The orchestrator validates options and frames, emits the codestream
//! headers, routes each frame to the Modular or VarDCT pipeline, maintains
//! the reference-frame arena across an animation, and optionally wraps the
//! codestream in the ISOBMFF container.

pub mod decode;
pub mod ma;
pub mod modular;
pub mod overlays;
pub mod reference;
pub mod vardct;

use std::time::{Duration, Instant};

use jxlenc_bitstream::BitWriter;
use jxlenc_core::{
    BufferPool, CancelToken, EncodingMode, EncodingOptions, Error, FrameDurations, FrameError,
    ImageFrame, OptionsError, Result,
};
use jxlenc_headers::{
    AnimationHeader, Container, ContainerMetadata, FrameEncoding, FrameHeader, FrameType,
    ImageMetadata, PassConfig, SizeHeader,
};
use log::{debug, trace};

use crate::reference::{ReferenceFrame, ReferenceSlots};

/// Marker closing every frame's group data
pub const GROUP_TERMINATOR: [u8; 2] = [0xA5, 0x5A];

/// Statistics returned alongside the encoded bytes
#[derive(Debug, Clone)]
pub struct EncodeStats {
    /// Total bytes of input sample data
    pub original_size: usize,
    pub compressed_size: usize,
    pub encode_time: Duration,
    /// High-water mark of pooled scratch memory, in bytes
    pub peak_memory: usize,
}

/// A finished encode
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub stats: EncodeStats,
}

/// The encoder entry point
pub struct Encoder {
    options: EncodingOptions,
}

impl Encoder {
    /// Validate the options and build an encoder
    pub fn new(options: EncodingOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &EncodingOptions {
        &self.options
    }

    /// Encode a single frame
    pub fn encode(&self, frame: &ImageFrame) -> Result<EncodedImage> {
        self.encode_frames(std::slice::from_ref(frame))
    }

    /// Encode a frame sequence
    pub fn encode_frames(&self, frames: &[ImageFrame]) -> Result<EncodedImage> {
        self.encode_frames_cancellable(frames, &CancelToken::new())
    }

    /// Encode with a cancellation token checked at frame boundaries
    pub fn encode_frames_cancellable(
        &self,
        frames: &[ImageFrame],
        cancel: &CancelToken,
    ) -> Result<EncodedImage> {
        let start = Instant::now();
        self.validate_frames(frames)?;

        let animation = match &self.options.animation {
            Some(config) => Some(AnimationHeader::from_config(config)?),
            None => None,
        };
        let have_animation = animation.is_some();

        let pool = BufferPool::new();
        let mut writer = BitWriter::new();
        writer.write_signature()?;
        SizeHeader::new(frames[0].dimensions).write(&mut writer)?;
        writer.align_to_byte()?;
        let metadata = ImageMetadata::from_frame(&frames[0], animation);
        metadata.write(&mut writer)?;

        let mut refs = ReferenceSlots::new();
        for (index, frame) in frames.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let header = self.frame_header(index, frames.len(), have_animation);
            trace!(
                "frame {index}: encoding={:?} save_as_reference={}",
                header.encoding,
                header.save_as_reference
            );
            header.write(&mut writer, have_animation)?;
            match header.encoding {
                FrameEncoding::Modular => {
                    modular::encode_frame(&mut writer, frame, &self.options, &pool)?
                }
                FrameEncoding::VarDct => vardct::encode_frame(
                    &mut writer,
                    frame,
                    &self.options,
                    &header,
                    &refs,
                    &pool,
                )?,
            }
            writer.align_to_byte()?;
            writer.write_bytes(&GROUP_TERMINATOR)?;

            if header.save_as_reference > 0 {
                refs.save(header.save_as_reference, ReferenceFrame::snapshot(frame)?);
            }
        }

        let codestream = writer.finish()?;
        debug!(
            "codestream: {} bytes for {} frame(s)",
            codestream.len(),
            frames.len()
        );
        let bytes = if self.options.container {
            Container::with_codestream(codestream, &ContainerMetadata::default()).to_bytes()?
        } else {
            codestream
        };

        let original_size: usize = frames
            .iter()
            .map(|f| {
                f.buffer.len() * f.pixel_type.bytes_per_sample()
                    + f.extra_channels
                        .iter()
                        .map(|e| e.buffer.len() * e.buffer.pixel_type().bytes_per_sample())
                        .sum::<usize>()
            })
            .sum();
        let stats = EncodeStats {
            original_size,
            compressed_size: bytes.len(),
            encode_time: start.elapsed(),
            peak_memory: pool.peak_bytes(),
        };
        Ok(EncodedImage { bytes, stats })
    }

    fn validate_frames(&self, frames: &[ImageFrame]) -> Result<()> {
        if frames.is_empty() {
            return Err(OptionsError::EmptyFrameList.into());
        }
        for (index, frame) in frames.iter().enumerate() {
            frame.validate()?;
            if frame.dimensions != frames[0].dimensions {
                return Err(FrameError::MismatchedDimensions { index }.into());
            }
        }
        if let Some(roi) = &self.options.roi {
            let frame = &frames[0];
            if roi.x.saturating_add(roi.width) > frame.width()
                || roi.y.saturating_add(roi.height) > frame.height()
            {
                return Err(OptionsError::RoiOutsideImage.into());
            }
        }
        if let Some(animation) = &self.options.animation {
            if let FrameDurations::PerFrame(durations) = &animation.durations {
                if durations.len() != frames.len() {
                    return Err(OptionsError::DurationCountMismatch.into());
                }
            }
        }
        Ok(())
    }

    fn frame_duration(&self, index: usize) -> u32 {
        match &self.options.animation {
            Some(config) => match &config.durations {
                FrameDurations::Uniform(ticks) => *ticks,
                FrameDurations::PerFrame(durations) => durations.get(index).copied().unwrap_or(1),
            },
            None => 0,
        }
    }

    fn frame_header(&self, index: usize, total: usize, have_animation: bool) -> FrameHeader {
        let encoding = match self.options.mode {
            EncodingMode::Lossless => FrameEncoding::Modular,
            EncodingMode::Lossy { .. } => FrameEncoding::VarDct,
        };
        let is_vardct = encoding == FrameEncoding::VarDct;
        let save_as_reference = match &self.options.reference_frames {
            Some(config) if total > 1 => {
                let interval = config.keyframe_interval.max(1) as usize;
                if index % interval == 0 {
                    1
                } else {
                    0
                }
            }
            _ => 0,
        };
        FrameHeader {
            frame_type: FrameType::Regular,
            encoding,
            have_noise: is_vardct && self.options.noise.is_some(),
            have_patches: is_vardct && self.options.patches.is_some(),
            have_splines: is_vardct && self.options.splines.is_some(),
            use_lf_frame: false,
            skip_adaptive_lf_smoothing: false,
            duration: if have_animation {
                Some(self.frame_duration(index))
            } else {
                None
            },
            blend_mode: Default::default(),
            is_last: index + 1 == total,
            save_as_reference,
            crop: None,
            restoration: Default::default(),
            passes: if is_vardct && self.options.progressive {
                PassConfig::progressive()
            } else {
                PassConfig::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jxlenc_core::{ColorDescriptor, Dimensions, PixelType, ResponsiveConfig, RoiConfig};

    fn small_frame() -> ImageFrame {
        ImageFrame::new(
            Dimensions::new(16, 16),
            3,
            PixelType::U8,
            ColorDescriptor::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_quality_rejected_at_construction() {
        assert!(matches!(
            Encoder::new(EncodingOptions::lossy(150.0)),
            Err(Error::InvalidOptions(OptionsError::QualityOutOfRange(_)))
        ));
    }

    #[test]
    fn test_empty_frame_list_rejected() {
        let encoder = Encoder::new(EncodingOptions::lossless()).unwrap();
        assert!(matches!(
            encoder.encode_frames(&[]),
            Err(Error::InvalidOptions(OptionsError::EmptyFrameList))
        ));
    }

    #[test]
    fn test_mismatched_dimensions_rejected() {
        let encoder = Encoder::new(EncodingOptions::lossless()).unwrap();
        let a = small_frame();
        let b = ImageFrame::new(
            Dimensions::new(8, 8),
            3,
            PixelType::U8,
            ColorDescriptor::default(),
        )
        .unwrap();
        assert!(matches!(
            encoder.encode_frames(&[a, b]),
            Err(Error::InvalidFrame(FrameError::MismatchedDimensions {
                index: 1
            }))
        ));
    }

    #[test]
    fn test_roi_outside_image_rejected() {
        let mut options = EncodingOptions::lossy(80.0);
        options.roi = Some(RoiConfig {
            x: 10,
            y: 10,
            width: 10,
            height: 10,
            quality_boost: 20.0,
            feather_width: 4,
        });
        let encoder = Encoder::new(options).unwrap();
        assert!(matches!(
            encoder.encode(&small_frame()),
            Err(Error::InvalidOptions(OptionsError::RoiOutsideImage))
        ));
    }

    #[test]
    fn test_raw_codestream_signature() {
        let options = EncodingOptions::lossless().container(false);
        let encoder = Encoder::new(options).unwrap();
        let encoded = encoder.encode(&small_frame()).unwrap();
        assert_eq!(&encoded.bytes[0..2], &[0xFF, 0x0A]);
    }

    #[test]
    fn test_container_signature() {
        let options = EncodingOptions::lossless().container(true);
        let encoder = Encoder::new(options).unwrap();
        let encoded = encoder.encode(&small_frame()).unwrap();
        assert_eq!(&encoded.bytes[0..12], &jxlenc_headers::CONTAINER_SIGNATURE);
    }

    #[test]
    fn test_stats_are_populated() {
        let encoder = Encoder::new(EncodingOptions::lossless()).unwrap();
        let encoded = encoder.encode(&small_frame()).unwrap();
        assert_eq!(encoded.stats.original_size, 16 * 16 * 3);
        assert_eq!(encoded.stats.compressed_size, encoded.bytes.len());
        assert!(encoded.stats.peak_memory > 0 || encoded.stats.compressed_size > 0);
    }

    #[test]
    fn test_cancellation() {
        let encoder = Encoder::new(EncodingOptions::lossless()).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(
            encoder.encode_frames_cancellable(&[small_frame()], &cancel),
            Err(Error::Cancelled)
        ));
    }

    #[test]
    fn test_responsive_layer_validation() {
        let mut options = EncodingOptions::lossy(80.0);
        options.responsive = Some(ResponsiveConfig { layer_count: 1 });
        assert!(Encoder::new(options).is_err());
    }

    #[test]
    fn test_frame_header_routing() {
        let encoder = Encoder::new(EncodingOptions::lossless()).unwrap();
        let header = encoder.frame_header(0, 1, false);
        assert_eq!(header.encoding, FrameEncoding::Modular);
        assert!(header.is_last);

        let encoder = Encoder::new(EncodingOptions::lossy(80.0)).unwrap();
        let header = encoder.frame_header(0, 3, false);
        assert_eq!(header.encoding, FrameEncoding::VarDct);
        assert!(!header.is_last);
    }
}
