//! 8x8 DCT-II / DCT-III
//!
//! Separable implementation over a precomputed orthonormal basis matrix.
//! Row and column passes share the same 1-D kernel; the full transform is
//! C = D * B * D^T with D[0][x] scaled by 1/sqrt(2).

use std::f32::consts::PI;

use jxlenc_core::consts::{BLOCK_AREA, BLOCK_SIZE};
use lazy_static::lazy_static;

lazy_static! {
    /// Orthonormal DCT-II basis: D[u][x] = c(u) * sqrt(2/N) * cos((2x+1)u pi / 2N)
    pub static ref DCT_BASIS: [[f32; BLOCK_SIZE]; BLOCK_SIZE] = {
        let mut basis = [[0.0f32; BLOCK_SIZE]; BLOCK_SIZE];
        let n = BLOCK_SIZE as f32;
        for (u, row) in basis.iter_mut().enumerate() {
            let scale = if u == 0 {
                (1.0 / n).sqrt()
            } else {
                (2.0 / n).sqrt()
            };
            for (x, value) in row.iter_mut().enumerate() {
                *value =
                    scale * (((2 * x + 1) as f32 * u as f32 * PI) / (2.0 * n)).cos();
            }
        }
        basis
    };
}

/// Scalar forward 2-D DCT of an 8x8 block
pub fn forward_dct8_scalar(input: &[f32; BLOCK_AREA], output: &mut [f32; BLOCK_AREA]) {
    let basis = &*DCT_BASIS;
    let mut rows = [0.0f32; BLOCK_AREA];

    // Row pass: each output row u is the 1-D DCT of the input row
    for y in 0..BLOCK_SIZE {
        for u in 0..BLOCK_SIZE {
            let mut sum = 0.0;
            for x in 0..BLOCK_SIZE {
                sum += basis[u][x] * input[y * BLOCK_SIZE + x];
            }
            rows[y * BLOCK_SIZE + u] = sum;
        }
    }
    // Column pass
    for u in 0..BLOCK_SIZE {
        for v in 0..BLOCK_SIZE {
            let mut sum = 0.0;
            for y in 0..BLOCK_SIZE {
                sum += basis[v][y] * rows[y * BLOCK_SIZE + u];
            }
            output[v * BLOCK_SIZE + u] = sum;
        }
    }
}

/// Scalar inverse 2-D DCT of an 8x8 block
pub fn inverse_dct8_scalar(input: &[f32; BLOCK_AREA], output: &mut [f32; BLOCK_AREA]) {
    let basis = &*DCT_BASIS;
    let mut rows = [0.0f32; BLOCK_AREA];

    // Inverse column pass (transpose of the forward basis)
    for u in 0..BLOCK_SIZE {
        for y in 0..BLOCK_SIZE {
            let mut sum = 0.0;
            for v in 0..BLOCK_SIZE {
                sum += basis[v][y] * input[v * BLOCK_SIZE + u];
            }
            rows[y * BLOCK_SIZE + u] = sum;
        }
    }
    // Inverse row pass
    for y in 0..BLOCK_SIZE {
        for x in 0..BLOCK_SIZE {
            let mut sum = 0.0;
            for u in 0..BLOCK_SIZE {
                sum += basis[u][x] * rows[y * BLOCK_SIZE + u];
            }
            output[y * BLOCK_SIZE + x] = sum;
        }
    }
}

/// Forward DCT through the active kernel set
pub fn forward_dct8(input: &[f32; BLOCK_AREA], output: &mut [f32; BLOCK_AREA]) {
    (crate::dispatch::kernels().forward_dct8)(input, output)
}

/// Inverse DCT through the active kernel set
pub fn inverse_dct8(input: &[f32; BLOCK_AREA], output: &mut [f32; BLOCK_AREA]) {
    (crate::dispatch::kernels().inverse_dct8)(input, output)
}
