//! Adaptive quantisation
//!
//! Each block gets a distance multiplier derived from its spatial activity:
//! busy blocks mask quantisation noise, so activity raises the multiplier
//! within [0.5, 2.0]. A region of interest lowers the effective distance
//! inside the region, with a cosine ramp across the feather zone.
//! Responsive encoding derives a descending distance per quality layer.

use jxlenc_core::consts::{BLOCK_AREA, BLOCK_SIZE};
use jxlenc_core::RoiConfig;

/// Activity level at which the multiplier reaches its midpoint
const ACTIVITY_KNEE: f32 = 0.002;

/// Multiplier for one block from the variance of its spatial samples
pub fn block_activity_multiplier(block: &[f32; BLOCK_AREA]) -> f32 {
    let mean: f32 = block.iter().sum::<f32>() / BLOCK_AREA as f32;
    let variance: f32 = block
        .iter()
        .map(|&v| {
            let d = v - mean;
            d * d
        })
        .sum::<f32>()
        / BLOCK_AREA as f32;
    let multiplier = 0.5 + 1.5 * (variance / (variance + ACTIVITY_KNEE));
    multiplier.clamp(0.5, 2.0)
}

/// Per-block distance multipliers for one channel plane
pub struct AdaptiveQuantMap {
    multipliers: Vec<f32>,
    blocks_x: usize,
    blocks_y: usize,
}

impl AdaptiveQuantMap {
    /// Build the map from pre-extracted blocks in raster order
    pub fn new(blocks_x: usize, blocks_y: usize, blocks: &[[f32; BLOCK_AREA]]) -> Self {
        debug_assert_eq!(blocks.len(), blocks_x * blocks_y);
        let multipliers = blocks.iter().map(block_activity_multiplier).collect();
        Self {
            multipliers,
            blocks_x,
            blocks_y,
        }
    }

    pub fn blocks_x(&self) -> usize {
        self.blocks_x
    }

    pub fn blocks_y(&self) -> usize {
        self.blocks_y
    }

    pub fn multiplier(&self, block_x: usize, block_y: usize) -> f32 {
        if block_x >= self.blocks_x || block_y >= self.blocks_y {
            return 1.0;
        }
        self.multipliers[block_y * self.blocks_x + block_x]
    }

    /// Effective multiplier including the ROI boost, if any
    ///
    /// Inside the region the distance is scaled by 1 - boost/150; across
    /// the feather band the scale ramps back to 1 along a half-cosine.
    pub fn roi_multiplier(&self, block_x: usize, block_y: usize, roi: Option<&RoiConfig>) -> f32 {
        let base = self.multiplier(block_x, block_y);
        let Some(roi) = roi else {
            return base;
        };
        let boost = roi.quality_boost.clamp(0.0, 50.0);
        let inside_scale = 1.0 - boost / 150.0;

        // Block centre in pixels
        let cx = (block_x * BLOCK_SIZE + BLOCK_SIZE / 2) as f32;
        let cy = (block_y * BLOCK_SIZE + BLOCK_SIZE / 2) as f32;
        let x0 = roi.x as f32;
        let y0 = roi.y as f32;
        let x1 = (roi.x + roi.width) as f32;
        let y1 = (roi.y + roi.height) as f32;

        let dx = if cx < x0 {
            x0 - cx
        } else if cx > x1 {
            cx - x1
        } else {
            0.0
        };
        let dy = if cy < y0 {
            y0 - cy
        } else if cy > y1 {
            cy - y1
        } else {
            0.0
        };
        let outside = (dx * dx + dy * dy).sqrt();

        if outside == 0.0 {
            return base * inside_scale;
        }
        let feather = roi.feather_width as f32;
        if feather <= 0.0 || outside >= feather {
            return base;
        }
        // Half-cosine ramp: weight 1 at the region edge, 0 at the feather rim
        let weight = 0.5 * (1.0 + (std::f32::consts::PI * outside / feather).cos());
        base * (1.0 - weight * (1.0 - inside_scale))
    }
}

/// Descending per-layer distances for responsive encoding
///
/// Layers run from `distance * 6` down to `distance`, linearly spaced; the
/// final layer always carries the target distance.
pub fn layer_distances(base_distance: f32, layer_count: u8) -> Vec<f32> {
    let n = layer_count.max(1) as usize;
    if n == 1 {
        return vec![base_distance];
    }
    (0..n)
        .map(|i| {
            let t = i as f32 / (n - 1) as f32;
            let factor = 6.0 - 5.0 * t;
            base_distance * factor
        })
        .collect()
}
