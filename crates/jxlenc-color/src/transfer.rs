//! Transfer functions
//!
//! Forward direction decodes an encoded sample to linear light; the inverse
//! re-applies the curve. PQ values are normalised so 1.0 corresponds to the
//! 10000 cd/m^2 reference peak.

use jxlenc_core::TransferFunction;
use num_traits::clamp;

/// Convert sRGB to linear (gamma expansion)
pub fn srgb_to_linear(srgb: f32) -> f32 {
    if srgb <= 0.04045 {
        srgb / 12.92
    } else {
        ((srgb + 0.055) / 1.055).powf(2.4)
    }
}

/// Convert linear to sRGB (gamma compression)
pub fn linear_to_srgb(linear: f32) -> f32 {
    if linear <= 0.0031308 {
        linear * 12.92
    } else {
        1.055 * linear.powf(1.0 / 2.4) - 0.055
    }
}

// SMPTE ST 2084 constants
const PQ_M1: f32 = 2610.0 / 16384.0;
const PQ_M2: f32 = 2523.0 / 4096.0 * 128.0;
const PQ_C1: f32 = 3424.0 / 4096.0;
const PQ_C2: f32 = 2413.0 / 4096.0 * 32.0;
const PQ_C3: f32 = 2392.0 / 4096.0 * 32.0;

/// PQ (ST 2084) to linear, both normalised to [0, 1]
pub fn pq_to_linear(pq: f32) -> f32 {
    let p = pq.max(0.0).powf(1.0 / PQ_M2);
    let num = (p - PQ_C1).max(0.0);
    let den = PQ_C2 - PQ_C3 * p;
    (num / den).powf(1.0 / PQ_M1)
}

/// Linear to PQ (ST 2084), both normalised to [0, 1]
pub fn linear_to_pq(linear: f32) -> f32 {
    let y = linear.max(0.0).powf(PQ_M1);
    ((PQ_C1 + PQ_C2 * y) / (1.0 + PQ_C3 * y)).powf(PQ_M2)
}

// HLG (ARIB STD-B67) constants
const HLG_A: f32 = 0.17883277;
const HLG_B: f32 = 0.28466892;
const HLG_C: f32 = 0.55991073;

/// HLG to linear scene light
pub fn hlg_to_linear(hlg: f32) -> f32 {
    if hlg <= 0.5 {
        hlg * hlg / 3.0
    } else {
        (((hlg - HLG_C) / HLG_A).exp() + HLG_B) / 12.0
    }
}

/// Linear scene light to HLG
pub fn linear_to_hlg(linear: f32) -> f32 {
    if linear <= 1.0 / 12.0 {
        (3.0 * linear).sqrt()
    } else {
        HLG_A * (12.0 * linear - HLG_B).ln() + HLG_C
    }
}

/// Decode an encoded sample to linear light via the named curve
pub fn to_linear(transfer: TransferFunction, value: f32) -> f32 {
    match transfer {
        TransferFunction::Srgb => srgb_to_linear(value),
        TransferFunction::Linear => value,
        TransferFunction::Pq => pq_to_linear(value),
        TransferFunction::Hlg => hlg_to_linear(value),
        TransferFunction::Gamma(gamma) => value.max(0.0).powf(gamma),
    }
}

/// Re-encode a linear sample via the named curve
pub fn from_linear(transfer: TransferFunction, value: f32) -> f32 {
    match transfer {
        TransferFunction::Srgb => linear_to_srgb(value),
        TransferFunction::Linear => value,
        TransferFunction::Pq => linear_to_pq(value),
        TransferFunction::Hlg => linear_to_hlg(value),
        TransferFunction::Gamma(gamma) => value.max(0.0).powf(1.0 / gamma),
    }
}

/// Convert 8-bit sRGB to linear f32
pub fn srgb_u8_to_linear_f32(srgb: u8) -> f32 {
    srgb_to_linear(srgb as f32 / 255.0)
}

/// Convert linear f32 to 8-bit sRGB
pub fn linear_f32_to_srgb_u8(linear: f32) -> u8 {
    clamp((linear_to_srgb(linear) * 255.0).round(), 0.0, 255.0) as u8
}
