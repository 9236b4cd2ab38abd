//! XYB opsin color space
//!
//! XYB is the perceptual space used by the lossy path. Linear RGB is mixed
//! through the opsin absorbance matrix, passed through a biased cube-root
//! response, and recombined into an opponent layout: X carries L-M
//! (red-green), Y carries L+M (luminance), B carries S (blue).

/// Opsin absorbance matrix, rows L/M/S
const OPSIN_ABSORBANCE_MATRIX: [[f32; 3]; 3] = [
    [0.300, 0.622, 0.078],
    [0.230, 0.692, 0.078],
    [0.243_422_69, 0.204_767_44, 0.551_809_86],
];

/// Inverse of the opsin absorbance matrix
const OPSIN_ABSORBANCE_INV_MATRIX: [[f32; 3]; 3] = [
    [11.031_567, -9.866_944, -0.164_623],
    [-3.254_147_3, 4.418_770_3, -0.164_623],
    [-3.658_851_3, 2.712_923_0, 1.945_928_2],
];

/// Bias added before the cube root
const OPSIN_BIAS: f32 = 0.003_793_073_2;

/// cbrt(OPSIN_BIAS), subtracted so black maps to zero
const CBRT_OPSIN_BIAS: f32 = 0.155_954_20;

#[inline]
fn mix(matrix: &[[f32; 3]; 3], a: f32, b: f32, c: f32) -> (f32, f32, f32) {
    (
        matrix[0][0] * a + matrix[0][1] * b + matrix[0][2] * c,
        matrix[1][0] * a + matrix[1][1] * b + matrix[1][2] * c,
        matrix[2][0] * a + matrix[2][1] * b + matrix[2][2] * c,
    )
}

#[inline]
fn opsin_transfer(v: f32) -> f32 {
    (v + OPSIN_BIAS).cbrt() - CBRT_OPSIN_BIAS
}

#[inline]
fn opsin_transfer_inverse(v: f32) -> f32 {
    let t = v + CBRT_OPSIN_BIAS;
    t * t * t - OPSIN_BIAS
}

/// Convert linear RGB to XYB
pub fn linear_rgb_to_xyb(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let (l, m, s) = mix(&OPSIN_ABSORBANCE_MATRIX, r, g, b);
    let l = opsin_transfer(l);
    let m = opsin_transfer(m);
    let s = opsin_transfer(s);
    ((l - m) * 0.5, (l + m) * 0.5, s)
}

/// Convert XYB back to linear RGB
pub fn xyb_to_linear_rgb(x: f32, y: f32, b: f32) -> (f32, f32, f32) {
    let l = opsin_transfer_inverse(y + x);
    let m = opsin_transfer_inverse(y - x);
    let s = opsin_transfer_inverse(b);
    mix(&OPSIN_ABSORBANCE_INV_MATRIX, l, m, s)
}

/// Batch convert planar linear RGB to planar XYB, in place
pub fn planes_to_xyb(r: &mut [f32], g: &mut [f32], b: &mut [f32]) {
    debug_assert!(r.len() == g.len() && g.len() == b.len());
    for i in 0..r.len() {
        let (x, y, bb) = linear_rgb_to_xyb(r[i], g[i], b[i]);
        r[i] = x;
        g[i] = y;
        b[i] = bb;
    }
}

/// Batch convert planar XYB back to planar linear RGB, in place
pub fn planes_to_linear_rgb(x: &mut [f32], y: &mut [f32], b: &mut [f32]) {
    debug_assert!(x.len() == y.len() && y.len() == b.len());
    for i in 0..x.len() {
        let (r, g, bb) = xyb_to_linear_rgb(x[i], y[i], b[i]);
        x[i] = r;
        y[i] = g;
        b[i] = bb;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xyb_roundtrip() {
        let samples = [
            (0.0, 0.0, 0.0),
            (1.0, 1.0, 1.0),
            (0.5, 0.7, 0.3),
            (0.01, 0.02, 0.9),
            (0.25, 0.25, 0.25),
        ];
        for (r, g, b) in samples {
            let (x, y, bb) = linear_rgb_to_xyb(r, g, b);
            let (r2, g2, b2) = xyb_to_linear_rgb(x, y, bb);
            assert!((r - r2).abs() < 1e-3, "R {r} vs {r2}");
            assert!((g - g2).abs() < 1e-3, "G {g} vs {g2}");
            assert!((b - b2).abs() < 1e-3, "B {b} vs {b2}");
        }
    }

    #[test]
    fn test_black_maps_near_zero() {
        let (x, y, b) = linear_rgb_to_xyb(0.0, 0.0, 0.0);
        assert!(x.abs() < 1e-6);
        assert!(y.abs() < 1e-6);
        assert!(b.abs() < 1e-6);
    }

    #[test]
    fn test_gray_has_no_chroma() {
        let (x, _, _) = linear_rgb_to_xyb(0.5, 0.5, 0.5);
        assert!(x.abs() < 1e-6, "gray must carry no X (L-M) energy");
    }

    #[test]
    fn test_y_increases_with_luminance() {
        let (_, y_dark, _) = linear_rgb_to_xyb(0.1, 0.1, 0.1);
        let (_, y_bright, _) = linear_rgb_to_xyb(0.9, 0.9, 0.9);
        assert!(y_bright > y_dark);
    }

    #[test]
    fn test_plane_roundtrip() {
        let mut r: Vec<f32> = (0..64).map(|i| i as f32 / 63.0).collect();
        let mut g: Vec<f32> = (0..64).map(|i| (63 - i) as f32 / 63.0).collect();
        let mut b: Vec<f32> = vec![0.5; 64];
        let (orig_r, orig_g, orig_b) = (r.clone(), g.clone(), b.clone());
        planes_to_xyb(&mut r, &mut g, &mut b);
        planes_to_linear_rgb(&mut r, &mut g, &mut b);
        for i in 0..64 {
            assert!((r[i] - orig_r[i]).abs() < 1e-3);
            assert!((g[i] - orig_g[i]).abs() < 1e-3);
            assert!((b[i] - orig_b[i]).abs() < 1e-3);
        }
    }
}
