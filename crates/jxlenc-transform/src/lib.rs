//! Transform kernels shared by the Modular and VarDCT pipelines
//!
//! Scalar reference implementations of the DCT, coefficient ordering,
//! quantisation, adaptive quantisation, the squeeze lifting transform,
//! spatial predictors and chroma-from-luma. The DCT entry points route
//! through a capability-driven dispatch seam so an accelerated backend can
//! be installed without changing callers.

pub mod adaptive_quant;
pub mod cfl;
pub mod dct;
pub mod dispatch;
pub mod natural_order;
pub mod predict;
pub mod quantization;
pub mod squeeze;

pub use adaptive_quant::{block_activity_multiplier, layer_distances, AdaptiveQuantMap};
pub use cfl::{apply_cfl, fit_cfl_slope, unapply_cfl, CflSlope};
pub use dct::{forward_dct8, inverse_dct8};
pub use natural_order::{natural_order_8x8, natural_order_inverse_8x8};
pub use predict::{med_predict, unzigzag, zigzag, Predictor};
pub use quantization::{dequantize_block, quantization_steps, quantize_block};
pub use squeeze::{forward_squeeze, inverse_squeeze, squeeze_plan, SqueezeStep};
