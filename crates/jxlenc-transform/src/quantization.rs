//! Distance-driven quantisation
//!
//! Per-coefficient step = base weight x distance x block multiplier. Base
//! weights follow a radial model with a dedicated DC entry per channel; the
//! luma channel is quantised most finely. Distance 0 short-circuits to
//! identity steps so integer coefficients survive a quantise/dequantise
//! round trip exactly.

use jxlenc_core::consts::{BLOCK_AREA, BLOCK_SIZE};
use lazy_static::lazy_static;

/// Radial weight model parameters per channel
struct ChannelWeights {
    dc: f32,
    ac_base: f32,
    ac_growth: f32,
}

/// Channel order matches the XYB planes: X (red-green), Y (luminance), B
///
/// The X opponent channel has a small numeric range but a large gain back
/// into RGB, so its steps are by far the finest.
const CHANNEL_WEIGHTS: [ChannelWeights; 3] = [
    ChannelWeights {
        dc: 0.0002,
        ac_base: 0.0003,
        ac_growth: 0.25,
    },
    ChannelWeights {
        dc: 0.002,
        ac_base: 0.004,
        ac_growth: 0.20,
    },
    ChannelWeights {
        dc: 0.0022,
        ac_base: 0.0045,
        ac_growth: 0.30,
    },
];

lazy_static! {
    /// Base weight tables per channel, raster order
    static ref BASE_WEIGHTS: [[f32; BLOCK_AREA]; 3] = {
        let mut tables = [[0.0f32; BLOCK_AREA]; 3];
        for (c, weights) in CHANNEL_WEIGHTS.iter().enumerate() {
            for v in 0..BLOCK_SIZE {
                for u in 0..BLOCK_SIZE {
                    let idx = v * BLOCK_SIZE + u;
                    if idx == 0 {
                        tables[c][idx] = weights.dc;
                    } else {
                        let radius = ((u * u + v * v) as f32).sqrt();
                        tables[c][idx] = weights.ac_base * (1.0 + weights.ac_growth * radius);
                    }
                }
            }
        }
        tables
    };
}

/// Per-coefficient quantisation steps for a channel
///
/// `multiplier` is the adaptive per-block factor in [0.5, 2.0]. A distance
/// of zero produces identity steps.
pub fn quantization_steps(channel: usize, distance: f32, multiplier: f32) -> [f32; BLOCK_AREA] {
    let mut steps = [1.0f32; BLOCK_AREA];
    if distance <= 0.0 {
        return steps;
    }
    let table = &BASE_WEIGHTS[channel.min(2)];
    for (step, &weight) in steps.iter_mut().zip(table.iter()) {
        *step = (weight * distance * multiplier).max(1.0 / 65536.0);
    }
    steps
}

/// Quantise a coefficient block
pub fn quantize_block(coeffs: &[f32; BLOCK_AREA], steps: &[f32; BLOCK_AREA]) -> [i32; BLOCK_AREA] {
    let mut out = [0i32; BLOCK_AREA];
    for i in 0..BLOCK_AREA {
        out[i] = (coeffs[i] / steps[i]).round() as i32;
    }
    out
}

/// Reconstruct coefficients from quantised values
pub fn dequantize_block(
    quantized: &[i32; BLOCK_AREA],
    steps: &[f32; BLOCK_AREA],
) -> [f32; BLOCK_AREA] {
    let mut out = [0.0f32; BLOCK_AREA];
    for i in 0..BLOCK_AREA {
        out[i] = quantized[i] as f32 * steps[i];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_zero_is_identity() {
        let steps = quantization_steps(1, 0.0, 1.0);
        assert!(steps.iter().all(|&s| s == 1.0));

        let mut coeffs = [0.0f32; BLOCK_AREA];
        for (i, c) in coeffs.iter_mut().enumerate() {
            *c = (i as i32 * 17 - 500) as f32;
        }
        let quantized = quantize_block(&coeffs, &steps);
        let restored = dequantize_block(&quantized, &steps);
        for i in 0..BLOCK_AREA {
            assert_eq!(restored[i], coeffs[i]);
        }
    }

    #[test]
    fn test_channel_tables_are_distinct() {
        let x = quantization_steps(0, 1.0, 1.0);
        let y = quantization_steps(1, 1.0, 1.0);
        let b = quantization_steps(2, 1.0, 1.0);
        for i in 0..BLOCK_AREA {
            // X carries the highest gain back into RGB, so it is finest
            assert!(x[i] < y[i]);
            assert!(y[i] <= b[i]);
            assert!(x[i] > 0.0);
        }
    }

    #[test]
    fn test_steps_grow_with_frequency() {
        let steps = quantization_steps(1, 1.0, 1.0);
        // Highest-frequency coefficient has the coarsest step
        let max = steps.iter().cloned().fold(0.0f32, f32::max);
        assert_eq!(steps[BLOCK_AREA - 1], max);
        // DC is finer than the highest AC
        assert!(steps[0] < steps[BLOCK_AREA - 1]);
    }

    #[test]
    fn test_steps_scale_with_distance_and_multiplier() {
        let base = quantization_steps(1, 1.0, 1.0);
        let far = quantization_steps(1, 2.0, 1.0);
        let boosted = quantization_steps(1, 1.0, 2.0);
        for i in 0..BLOCK_AREA {
            assert!((far[i] - base[i] * 2.0).abs() < 1e-6);
            assert!((boosted[i] - base[i] * 2.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_quantize_dequantize_error_bounded() {
        let steps = quantization_steps(1, 1.0, 1.0);
        let mut coeffs = [0.0f32; BLOCK_AREA];
        for (i, c) in coeffs.iter_mut().enumerate() {
            *c = ((i * 31) % 64) as f32 / 10.0 - 3.0;
        }
        let quantized = quantize_block(&coeffs, &steps);
        let restored = dequantize_block(&quantized, &steps);
        for i in 0..BLOCK_AREA {
            assert!((restored[i] - coeffs[i]).abs() <= steps[i] * 0.5 + 1e-6);
        }
    }
}
