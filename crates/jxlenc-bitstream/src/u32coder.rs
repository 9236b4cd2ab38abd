//! Compact U32 coding
//!
//! A U32 field is a 2-bit branch selector followed by a payload whose width
//! depends on the selected branch. Each distribution offers four branches;
//! the encoder picks the first branch that can represent the value, so the
//! layout is deterministic for a given distribution.

use jxlenc_core::{Error, Result};

/// One branch of a U32 distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum U32Branch {
    /// A constant value, no payload bits
    Val(u32),
    /// `bits` payload bits, values 0..2^bits
    Bits(u8),
    /// `bits` payload bits biased by `offset`
    BitsOffset { bits: u8, offset: u32 },
}

impl U32Branch {
    fn range(&self) -> (u32, u64) {
        match *self {
            U32Branch::Val(v) => (v, v as u64),
            U32Branch::Bits(bits) => (0, (1u64 << bits) - 1),
            U32Branch::BitsOffset { bits, offset } => {
                (offset, offset as u64 + (1u64 << bits) - 1)
            }
        }
    }

    fn payload_bits(&self) -> u32 {
        match *self {
            U32Branch::Val(_) => 0,
            U32Branch::Bits(bits) | U32Branch::BitsOffset { bits, .. } => bits as u32,
        }
    }
}

/// A four-branch U32 distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct U32Spec {
    branches: [U32Branch; 4],
}

impl U32Spec {
    pub const fn new(branches: [U32Branch; 4]) -> Self {
        Self { branches }
    }

    /// Pick the first branch able to represent `value`
    ///
    /// Returns (selector, payload bit count, payload).
    pub fn encode(&self, value: u32) -> Result<(u32, u32, u32)> {
        for (selector, branch) in self.branches.iter().enumerate() {
            let (lo, hi) = branch.range();
            if (value as u64) >= (lo as u64) && (value as u64) <= hi {
                let payload = value - lo;
                return Ok((selector as u32, branch.payload_bits(), payload));
            }
        }
        Err(Error::InternalInvariant(format!(
            "value {value} not representable by U32 distribution"
        )))
    }

    /// Reconstruct a value from a selector and payload
    pub fn decode(&self, selector: u32, payload: u32) -> Result<u32> {
        let branch = self
            .branches
            .get(selector as usize)
            .ok_or(Error::UnexpectedEof)?;
        Ok(match *branch {
            U32Branch::Val(v) => v,
            U32Branch::Bits(_) => payload,
            U32Branch::BitsOffset { offset, .. } => offset + payload,
        })
    }

    pub fn payload_bits(&self, selector: u32) -> u32 {
        self.branches[selector as usize].payload_bits()
    }
}

/// Image dimensions, 1..=2^30
pub const SIZE_DIM: U32Spec = U32Spec::new([
    U32Branch::BitsOffset { bits: 9, offset: 1 },
    U32Branch::BitsOffset { bits: 13, offset: 1 },
    U32Branch::BitsOffset { bits: 18, offset: 1 },
    U32Branch::BitsOffset { bits: 30, offset: 1 },
]);

/// Pixel coordinates and extents, 0-based
pub const COORD: U32Spec = U32Spec::new([
    U32Branch::Bits(8),
    U32Branch::Bits(11),
    U32Branch::Bits(14),
    U32Branch::Bits(30),
]);

/// Small counts biased towards zero (extra channels, patches, splines)
pub const COUNT: U32Spec = U32Spec::new([
    U32Branch::Val(0),
    U32Branch::Bits(4),
    U32Branch::BitsOffset { bits: 8, offset: 16 },
    U32Branch::BitsOffset {
        bits: 12,
        offset: 272,
    },
]);

/// Frame durations and loop counts
pub const DURATION: U32Spec = U32Spec::new([
    U32Branch::Val(0),
    U32Branch::Val(1),
    U32Branch::Bits(8),
    U32Branch::Bits(32),
]);

/// General 32-bit quantities without a small-value bias
pub const GENERAL: U32Spec = U32Spec::new([
    U32Branch::Bits(8),
    U32Branch::Bits(16),
    U32Branch::Bits(24),
    U32Branch::Bits(32),
]);

/// Alphabet sizes, stored minus one (1..=69903)
pub const ALPHABET_SIZE: U32Spec = U32Spec::new([
    U32Branch::Bits(4),
    U32Branch::BitsOffset { bits: 8, offset: 16 },
    U32Branch::BitsOffset {
        bits: 12,
        offset: 272,
    },
    U32Branch::BitsOffset {
        bits: 16,
        offset: 4368,
    },
]);

/// Zero-run lengths in frequency tables, stored minus one
pub const ZERO_RUN: U32Spec = U32Spec::new([
    U32Branch::Val(0),
    U32Branch::BitsOffset { bits: 3, offset: 1 },
    U32Branch::BitsOffset { bits: 8, offset: 9 },
    U32Branch::BitsOffset {
        bits: 16,
        offset: 265,
    },
]);
