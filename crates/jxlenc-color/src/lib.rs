//! Color transforms for the encoder
//!
//! Transfer curves (sRGB, PQ, HLG, gamma), the XYB opsin space used by the
//! lossy path, BT.601 YCbCr, and the reversible YCoCg-R transform used by
//! the lossless path.

pub mod rct;
pub mod transfer;
pub mod xyb;
pub mod ycbcr;

pub use rct::{forward_rct, forward_rct_planes, inverse_rct, inverse_rct_planes};
pub use transfer::{from_linear, srgb_to_linear, to_linear};
pub use xyb::{linear_rgb_to_xyb, planes_to_linear_rgb, planes_to_xyb, xyb_to_linear_rgb};
pub use ycbcr::{planes_to_rgb, planes_to_ycbcr, rgb_to_ycbcr, ycbcr_to_rgb};
