//! Chroma-from-luma prediction
//!
//! For each chroma block a scalar slope is fitted by least squares through
//! the origin over the AC coefficients and quantised to 1/64 steps in an
//! i8. The scaled luma block is subtracted from the chroma coefficients
//! before quantisation, so the quantiser sees the fine-grained prediction
//! residual rather than two independently rounded channels. The luma
//! operand is the dequantised reconstruction, which both coder directions
//! can compute identically. DC is excluded; it is predicted across blocks
//! instead.

use jxlenc_core::consts::BLOCK_AREA;

/// Quantised CfL slope in 1/64 steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CflSlope(pub i8);

impl CflSlope {
    pub fn as_f32(&self) -> f32 {
        self.0 as f32 / 64.0
    }
}

/// Fit the least-squares slope of chroma against luma over AC coefficients
pub fn fit_cfl_slope(luma: &[f32; BLOCK_AREA], chroma: &[f32; BLOCK_AREA]) -> CflSlope {
    let mut dot = 0f64;
    let mut energy = 0f64;
    for i in 1..BLOCK_AREA {
        dot += luma[i] as f64 * chroma[i] as f64;
        energy += luma[i] as f64 * luma[i] as f64;
    }
    if energy < 1e-12 {
        return CflSlope(0);
    }
    let slope = dot / energy;
    CflSlope((slope * 64.0).round().clamp(-128.0, 127.0) as i8)
}

/// Replace AC chroma coefficients with the residual against the scaled luma
pub fn apply_cfl(luma: &[f32; BLOCK_AREA], chroma: &mut [f32; BLOCK_AREA], slope: CflSlope) {
    let m = slope.as_f32();
    for i in 1..BLOCK_AREA {
        chroma[i] -= m * luma[i];
    }
}

/// Reconstruct AC chroma coefficients from the residual
pub fn unapply_cfl(luma: &[f32; BLOCK_AREA], chroma: &mut [f32; BLOCK_AREA], slope: CflSlope) {
    let m = slope.as_f32();
    for i in 1..BLOCK_AREA {
        chroma[i] += m * luma[i];
    }
}
