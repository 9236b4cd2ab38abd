//! Kernel dispatch seam
//!
//! Hardware capabilities are probed once per process and cached in an
//! immutable global. The reference build always installs the scalar
//! kernels; an accelerated backend must produce results within 1e-4 of the
//! scalar path to be eligible.

use jxlenc_core::consts::BLOCK_AREA;
use lazy_static::lazy_static;

/// Immutable record of the CPU features relevant to the codec
#[derive(Debug, Clone, Copy)]
pub struct CpuFeatures {
    pub sse2: bool,
    pub avx2: bool,
    pub neon: bool,
}

impl CpuFeatures {
    fn detect() -> Self {
        #[cfg(target_arch = "x86_64")]
        return Self {
            sse2: true,
            avx2: std::arch::is_x86_feature_detected!("avx2"),
            neon: false,
        };
        #[cfg(target_arch = "aarch64")]
        return Self {
            sse2: false,
            avx2: false,
            neon: true,
        };
        #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
        Self {
            sse2: false,
            avx2: false,
            neon: false,
        }
    }
}

/// The kernel set the transform entry points route through
pub struct Kernels {
    pub forward_dct8: fn(&[f32; BLOCK_AREA], &mut [f32; BLOCK_AREA]),
    pub inverse_dct8: fn(&[f32; BLOCK_AREA], &mut [f32; BLOCK_AREA]),
}

lazy_static! {
    static ref CPU_FEATURES: CpuFeatures = CpuFeatures::detect();
    static ref KERNELS: Kernels = Kernels {
        // Scalar reference kernels; acceleration slots in here
        forward_dct8: crate::dct::forward_dct8_scalar,
        inverse_dct8: crate::dct::inverse_dct8_scalar,
    };
}

/// Process-global CPU capability record, computed on first query
pub fn cpu_features() -> &'static CpuFeatures {
    &CPU_FEATURES
}

/// The active kernel set
pub fn kernels() -> &'static Kernels {
    &KERNELS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_features_are_stable() {
        let first = *cpu_features();
        let second = *cpu_features();
        assert_eq!(first.sse2, second.sse2);
        assert_eq!(first.avx2, second.avx2);
        assert_eq!(first.neon, second.neon);
    }
}
