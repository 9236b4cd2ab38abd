//! BT.601 YCbCr conversion
//!
//! Full-range variant used when the XYB opsin space is disabled. Chroma
//! channels are centred on zero rather than the usual 0.5 offset so they
//! feed the DCT directly.

/// Convert RGB to YCbCr (BT.601 full range, zero-centred chroma)
pub fn rgb_to_ycbcr(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cb = 0.564 * (b - y);
    let cr = 0.713 * (r - y);
    (y, cb, cr)
}

/// Convert YCbCr back to RGB
pub fn ycbcr_to_rgb(y: f32, cb: f32, cr: f32) -> (f32, f32, f32) {
    let r = y + 1.402525 * cr;
    let b = y + 1.773050 * cb;
    let g = (y - 0.299 * r - 0.114 * b) / 0.587;
    (r, g, b)
}

/// Batch convert planar RGB to planar YCbCr, in place
pub fn planes_to_ycbcr(r: &mut [f32], g: &mut [f32], b: &mut [f32]) {
    debug_assert!(r.len() == g.len() && g.len() == b.len());
    for i in 0..r.len() {
        let (y, cb, cr) = rgb_to_ycbcr(r[i], g[i], b[i]);
        r[i] = y;
        g[i] = cb;
        b[i] = cr;
    }
}

/// Batch convert planar YCbCr back to planar RGB, in place
pub fn planes_to_rgb(y: &mut [f32], cb: &mut [f32], cr: &mut [f32]) {
    debug_assert!(y.len() == cb.len() && cb.len() == cr.len());
    for i in 0..y.len() {
        let (r, g, b) = ycbcr_to_rgb(y[i], cb[i], cr[i]);
        y[i] = r;
        cb[i] = g;
        cr[i] = b;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ycbcr_roundtrip() {
        let samples = [
            (0.0, 0.0, 0.0),
            (1.0, 1.0, 1.0),
            (1.0, 0.0, 0.0),
            (0.0, 1.0, 0.0),
            (0.0, 0.0, 1.0),
            (0.3, 0.6, 0.9),
        ];
        for (r, g, b) in samples {
            let (y, cb, cr) = rgb_to_ycbcr(r, g, b);
            let (r2, g2, b2) = ycbcr_to_rgb(y, cb, cr);
            assert!((r - r2).abs() < 2e-3, "R {r} vs {r2}");
            assert!((g - g2).abs() < 2e-3, "G {g} vs {g2}");
            assert!((b - b2).abs() < 2e-3, "B {b} vs {b2}");
        }
    }

    #[test]
    fn test_gray_has_zero_chroma() {
        let (y, cb, cr) = rgb_to_ycbcr(0.5, 0.5, 0.5);
        assert!((y - 0.5).abs() < 1e-6);
        assert!(cb.abs() < 1e-6);
        assert!(cr.abs() < 1e-6);
    }

    #[test]
    fn test_luma_weights_sum_to_one() {
        let (y, _, _) = rgb_to_ycbcr(1.0, 1.0, 1.0);
        assert!((y - 1.0).abs() < 1e-6);
    }
}
