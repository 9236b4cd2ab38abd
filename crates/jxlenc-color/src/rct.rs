//! Reversible color transform (YCoCg-R)
//!
//! Integer lifting transform used by the lossless path. The inverse
//! recovers R, G, B exactly for any i32 inputs that do not overflow the
//! intermediate sums.

/// Forward YCoCg-R on one pixel
pub fn forward_rct(r: i32, g: i32, b: i32) -> (i32, i32, i32) {
    let co = r - b;
    let t = b + (co >> 1);
    let cg = g - t;
    let y = t + (cg >> 1);
    (y, co, cg)
}

/// Inverse YCoCg-R on one pixel
pub fn inverse_rct(y: i32, co: i32, cg: i32) -> (i32, i32, i32) {
    let t = y - (cg >> 1);
    let g = cg + t;
    let b = t - (co >> 1);
    let r = b + co;
    (r, g, b)
}

/// Forward transform over three planar channels, in place
pub fn forward_rct_planes(r: &mut [i32], g: &mut [i32], b: &mut [i32]) {
    debug_assert!(r.len() == g.len() && g.len() == b.len());
    for i in 0..r.len() {
        let (y, co, cg) = forward_rct(r[i], g[i], b[i]);
        r[i] = y;
        g[i] = co;
        b[i] = cg;
    }
}

/// Inverse transform over three planar channels, in place
pub fn inverse_rct_planes(y: &mut [i32], co: &mut [i32], cg: &mut [i32]) {
    debug_assert!(y.len() == co.len() && co.len() == cg.len());
    for i in 0..y.len() {
        let (r, g, b) = inverse_rct(y[i], co[i], cg[i]);
        y[i] = r;
        co[i] = g;
        cg[i] = b;
    }
}
