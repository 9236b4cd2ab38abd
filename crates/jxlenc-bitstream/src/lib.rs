//! Bitstream writing and entropy coding
//!
//! This crate provides the bit-granular writer/reader primitives, the
//! compact U32 coder used by the headers, and the shared rANS entropy back
//! end (histogram building, context clustering, interleaved rANS streams,
//! the LZ77 hybrid prefilter and the RLE fallback coder).

pub mod entropy;
pub mod histogram;
pub mod rans;
pub mod reader;
pub mod rle;
pub mod u32coder;
pub mod writer;

pub use entropy::{encode_tokens, EntropyConfig, Token, TokenDecoder, TokenSink};
pub use histogram::{cluster_histograms, Distribution, Histogram};
pub use rans::{RansDecoder, RansEncoder};
pub use reader::BitReader;
pub use rle::{decode_rle, encode_rle};
pub use u32coder::{U32Branch, U32Spec};
pub use writer::{BitWriter, CODESTREAM_SIGNATURE};
