//! Encoding options and the quality/distance model

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_EFFORT, MAX_EFFORT, MAX_LAYERS, MAX_QUALITY, MIN_EFFORT, MIN_LAYERS, MIN_QUALITY,
};
use crate::{OptionsError, Result};

/// Compression mode
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EncodingMode {
    /// Bit-exact lossless compression (Modular mode)
    Lossless,
    /// Perceptually driven lossy compression (VarDCT mode)
    Lossy { quality: f32 },
}

/// Per-frame animation durations
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FrameDurations {
    /// Every frame lasts the same number of ticks
    Uniform(u32),
    /// One duration per frame, in ticks
    PerFrame(Vec<u32>),
}

/// Animation configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnimationConfig {
    pub fps: f32,
    pub tps_denominator: u32,
    /// 0 means loop forever
    pub loop_count: u32,
    pub durations: FrameDurations,
}

/// Responsive (quality-layer) configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResponsiveConfig {
    pub layer_count: u8,
}

/// Region of interest with a quality boost and a feathered border
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoiConfig {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Clamped to 0..=50 on ingest
    pub quality_boost: f32,
    pub feather_width: u32,
}

/// Reference-frame behaviour for multi-frame encodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReferenceConfig {
    pub keyframe_interval: u32,
    pub max_delta_frames: u32,
    /// 1..=4
    pub max_reference_frames: u8,
}

/// Patch detection configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PatchConfig {
    pub min_patch_size: u32,
    pub max_patch_size: u32,
    /// 0..=1, where 1 requires exact matches
    pub similarity_threshold: f32,
    pub max_patches_per_frame: u32,
    pub search_radius: u32,
}

/// Synthetic noise parameters
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NoiseConfig {
    /// 0..=1
    pub amplitude: f32,
    pub luma_strength: f32,
    pub chroma_strength: f32,
    /// 0 draws a seed from the wall clock
    pub seed: u32,
}

/// Spline overlay configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SplineConfig {
    pub quantization_adjustment: i8,
    pub edge_threshold: f32,
    pub max_splines_per_frame: u32,
}

/// Complete encoder configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EncodingOptions {
    pub mode: EncodingMode,
    /// 1 (lightning) .. 9 (tortoise)
    pub effort: u8,
    /// Emit three frequency passes instead of one
    pub progressive: bool,
    pub responsive: Option<ResponsiveConfig>,
    pub animation: Option<AnimationConfig>,
    /// Prefer the XYB opsin space over YCbCr for VarDCT
    pub use_xyb: bool,
    /// Use the rANS coder; fall back to RLE + varint otherwise
    pub use_ans: bool,
    /// Wrap the codestream in an ISOBMFF container
    pub container: bool,
    pub roi: Option<RoiConfig>,
    pub reference_frames: Option<ReferenceConfig>,
    pub patches: Option<PatchConfig>,
    pub noise: Option<NoiseConfig>,
    pub splines: Option<SplineConfig>,
}

impl Default for EncodingOptions {
    fn default() -> Self {
        Self {
            mode: EncodingMode::Lossy { quality: 90.0 },
            effort: DEFAULT_EFFORT,
            progressive: false,
            responsive: None,
            animation: None,
            use_xyb: true,
            use_ans: true,
            container: true,
            roi: None,
            reference_frames: None,
            patches: None,
            noise: None,
            splines: None,
        }
    }
}

impl EncodingOptions {
    pub fn lossless() -> Self {
        Self {
            mode: EncodingMode::Lossless,
            ..Self::default()
        }
    }

    pub fn lossy(quality: f32) -> Self {
        Self {
            mode: EncodingMode::Lossy { quality },
            ..Self::default()
        }
    }

    pub fn effort(mut self, effort: u8) -> Self {
        self.effort = effort;
        self
    }

    pub fn progressive(mut self, progressive: bool) -> Self {
        self.progressive = progressive;
        self
    }

    pub fn container(mut self, container: bool) -> Self {
        self.container = container;
        self
    }

    /// Validate ranges that do not depend on the frame being encoded
    pub fn validate(&self) -> Result<()> {
        if let EncodingMode::Lossy { quality } = self.mode {
            if !(MIN_QUALITY..=MAX_QUALITY).contains(&quality) || quality.is_nan() {
                return Err(OptionsError::QualityOutOfRange(quality).into());
            }
        }
        if !(MIN_EFFORT..=MAX_EFFORT).contains(&self.effort) {
            return Err(OptionsError::EffortOutOfRange(self.effort).into());
        }
        if let Some(responsive) = &self.responsive {
            if !(MIN_LAYERS..=MAX_LAYERS).contains(&responsive.layer_count) {
                return Err(OptionsError::LayerCountOutOfRange(responsive.layer_count).into());
            }
        }
        if let Some(animation) = &self.animation {
            if animation.fps <= 0.0 || animation.tps_denominator == 0 {
                return Err(OptionsError::InconsistentAnimation.into());
            }
        }
        if let Some(refs) = &self.reference_frames {
            if refs.max_reference_frames == 0 || refs.max_reference_frames > 4 {
                return Err(OptionsError::ReferenceSlotCount(refs.max_reference_frames).into());
            }
        }
        Ok(())
    }

    /// Base perceptual distance implied by the mode
    pub fn base_distance(&self) -> f32 {
        match self.mode {
            EncodingMode::Lossless => 0.0,
            EncodingMode::Lossy { quality } => quality_to_distance(quality),
        }
    }
}

/// Anchor points of the quality -> distance mapping, quality ascending
const DISTANCE_ANCHORS: [(f32, f32); 6] = [
    (0.0, 25.0),
    (25.0, 10.0),
    (50.0, 5.0),
    (75.0, 2.5),
    (90.0, 1.0),
    (100.0, 0.0),
];

/// Map a quality value in 0..=100 to a perceptual distance
///
/// Piecewise linear between anchor points; monotonically decreasing with
/// quality, and 0 at quality 100.
pub fn quality_to_distance(quality: f32) -> f32 {
    let q = quality.clamp(0.0, 100.0);
    for pair in DISTANCE_ANCHORS.windows(2) {
        let (q0, d0) = pair[0];
        let (q1, d1) = pair[1];
        if q <= q1 {
            let t = (q - q0) / (q1 - q0);
            return d0 + t * (d1 - d0);
        }
    }
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_anchor_points() {
        assert_eq!(quality_to_distance(100.0), 0.0);
        assert!((quality_to_distance(90.0) - 1.0).abs() < 1e-6);
        assert!((quality_to_distance(75.0) - 2.5).abs() < 1e-6);
        assert!((quality_to_distance(50.0) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_quality_mapping_monotonic() {
        let mut prev = quality_to_distance(0.0);
        let mut q = 1.0;
        while q <= 100.0 {
            let d = quality_to_distance(q);
            assert!(d <= prev, "distance must not increase with quality");
            assert!(d >= 0.0);
            prev = d;
            q += 1.0;
        }
    }

    #[test]
    fn test_validate_quality_range() {
        let options = EncodingOptions::lossy(101.0);
        assert!(matches!(
            options.validate(),
            Err(crate::Error::InvalidOptions(
                OptionsError::QualityOutOfRange(_)
            ))
        ));
        assert!(EncodingOptions::lossy(0.0).validate().is_ok());
        assert!(EncodingOptions::lossy(100.0).validate().is_ok());
    }

    #[test]
    fn test_validate_effort_range() {
        let options = EncodingOptions::lossless().effort(10);
        assert!(matches!(
            options.validate(),
            Err(crate::Error::InvalidOptions(
                OptionsError::EffortOutOfRange(10)
            ))
        ));
    }

    #[test]
    fn test_validate_layer_count() {
        let mut options = EncodingOptions::lossy(80.0);
        options.responsive = Some(ResponsiveConfig { layer_count: 9 });
        assert!(options.validate().is_err());
        options.responsive = Some(ResponsiveConfig { layer_count: 4 });
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_validate_animation() {
        let mut options = EncodingOptions::lossy(80.0);
        options.animation = Some(AnimationConfig {
            fps: 0.0,
            tps_denominator: 1,
            loop_count: 0,
            durations: FrameDurations::Uniform(1),
        });
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_lossless_distance_is_zero() {
        assert_eq!(EncodingOptions::lossless().base_distance(), 0.0);
    }

    #[test]
    fn test_quality_boost_bound() {
        assert_eq!(crate::consts::MAX_QUALITY_BOOST, 50.0);
    }
}
