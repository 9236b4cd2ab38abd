//! Natural coefficient order
//!
//! Coefficients are scanned in a block-size-specific permutation: diagonal
//! bands of increasing u+v, ordered within each band by distance from the
//! axis. This is not the serpentine JPEG zigzag; it keeps the ordering rule
//! uniform across block sizes so larger transforms can reuse it.

use jxlenc_core::consts::{BLOCK_AREA, BLOCK_SIZE};
use lazy_static::lazy_static;

fn build_order(n: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n * n).collect();
    indices.sort_by_key(|&i| {
        let x = i % n;
        let y = i / n;
        (x + y, x.max(y), y)
    });
    indices
}

lazy_static! {
    /// Scan order: `NATURAL_ORDER_8X8[k]` is the raster index of the k-th
    /// scanned coefficient
    pub static ref NATURAL_ORDER_8X8: [usize; BLOCK_AREA] = {
        let order = build_order(BLOCK_SIZE);
        let mut table = [0usize; BLOCK_AREA];
        table.copy_from_slice(&order);
        table
    };

    /// Inverse table: raster index -> scan position
    pub static ref NATURAL_ORDER_INV_8X8: [usize; BLOCK_AREA] = {
        let mut inv = [0usize; BLOCK_AREA];
        for (k, &raster) in NATURAL_ORDER_8X8.iter().enumerate() {
            inv[raster] = k;
        }
        inv
    };
}

/// The scan order for 8x8 blocks
pub fn natural_order_8x8() -> &'static [usize; BLOCK_AREA] {
    &NATURAL_ORDER_8X8
}

/// The inverse scan order for 8x8 blocks
pub fn natural_order_inverse_8x8() -> &'static [usize; BLOCK_AREA] {
    &NATURAL_ORDER_INV_8X8
}

/// Reorder a raster block into scan order
pub fn scan_block(block: &[i32; BLOCK_AREA], out: &mut [i32; BLOCK_AREA]) {
    for (k, &raster) in NATURAL_ORDER_8X8.iter().enumerate() {
        out[k] = block[raster];
    }
}

/// Reorder a scanned block back to raster order
pub fn unscan_block(scanned: &[i32; BLOCK_AREA], out: &mut [i32; BLOCK_AREA]) {
    for (k, &raster) in NATURAL_ORDER_8X8.iter().enumerate() {
        out[raster] = scanned[k];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_covers_all_indices_once() {
        let mut seen = [false; BLOCK_AREA];
        for &raster in NATURAL_ORDER_8X8.iter() {
            assert!(!seen[raster], "index {raster} visited twice");
            seen[raster] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_dc_is_first() {
        assert_eq!(NATURAL_ORDER_8X8[0], 0);
    }

    #[test]
    fn test_bands_are_nondecreasing() {
        let mut prev_band = 0;
        for &raster in NATURAL_ORDER_8X8.iter() {
            let band = raster % BLOCK_SIZE + raster / BLOCK_SIZE;
            assert!(band >= prev_band);
            prev_band = band;
        }
    }

    #[test]
    fn test_differs_from_jpeg_zigzag() {
        // The serpentine zigzag alternates direction per diagonal; the
        // natural order does not
        const JPEG_ZIGZAG_PREFIX: [usize; 6] = [0, 1, 8, 16, 9, 2];
        let prefix: Vec<usize> = NATURAL_ORDER_8X8.iter().take(6).copied().collect();
        assert_ne!(prefix.as_slice(), &JPEG_ZIGZAG_PREFIX);
    }

    #[test]
    fn test_scan_unscan_roundtrip() {
        let block: [i32; BLOCK_AREA] = core::array::from_fn(|i| i as i32 * 3 - 60);
        let mut scanned = [0i32; BLOCK_AREA];
        let mut restored = [0i32; BLOCK_AREA];
        scan_block(&block, &mut scanned);
        unscan_block(&scanned, &mut restored);
        assert_eq!(block, restored);
    }

    #[test]
    fn test_inverse_table() {
        for k in 0..BLOCK_AREA {
            assert_eq!(NATURAL_ORDER_INV_8X8[NATURAL_ORDER_8X8[k]], k);
        }
    }
}
