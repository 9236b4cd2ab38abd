//! Range-variant ANS coder
//!
//! 12-bit precision, 16-bit renormalisation words, 32-bit final state.
//! Symbols are encoded in reverse order so the decoder can read forward.
//! Up to four states can be interleaved round-robin for decoder
//! parallelism; symbol `i` always belongs to state `i % n`.

use jxlenc_core::{Error, Result};

use crate::histogram::{Distribution, ANS_PRECISION_BITS, ANS_TOTAL};

/// Initial (and final-after-decode) state of every rANS stream
pub const RANS_INIT_STATE: u32 = 1 << 16;

const STATE_MASK: u32 = ANS_TOTAL - 1;

/// Maximum number of interleaved states
pub const MAX_STREAMS: usize = 4;

/// Encoder half of the rANS pair
///
/// Feed symbols in **reverse** stream order via [`RansEncoder::put`].
pub struct RansEncoder {
    states: Vec<u32>,
    /// Renormalisation words per stream, in emission order
    words: Vec<Vec<u16>>,
}

/// Finalised rANS payload
pub struct RansBody {
    /// Per-stream renormalisation words in decode order
    pub words: Vec<Vec<u16>>,
    /// Per-stream final states
    pub final_states: Vec<u32>,
}

impl RansEncoder {
    pub fn new(num_streams: usize) -> Self {
        debug_assert!((1..=MAX_STREAMS).contains(&num_streams));
        Self {
            states: vec![RANS_INIT_STATE; num_streams],
            words: vec![Vec::new(); num_streams],
        }
    }

    /// Encode one symbol into stream `stream`
    pub fn put(&mut self, stream: usize, dist: &Distribution, symbol: u32) -> Result<()> {
        let freq = dist.freq(symbol);
        if symbol as usize >= dist.alphabet_size() || freq == 0 {
            return Err(Error::AlphabetViolation {
                symbol,
                alphabet_size: dist.alphabet_size() as u32,
            });
        }
        let cumulative = dist.cumulative(symbol);
        let state = &mut self.states[stream];
        while *state >= freq << 16 {
            self.words[stream].push((*state & 0xFFFF) as u16);
            *state >>= 16;
        }
        *state = ((*state / freq) << ANS_PRECISION_BITS) + (*state % freq) + cumulative;
        Ok(())
    }

    /// Close the streams, reversing the word runs into decode order
    pub fn finish(self) -> RansBody {
        let words = self
            .words
            .into_iter()
            .map(|mut run| {
                run.reverse();
                run
            })
            .collect();
        RansBody {
            words,
            final_states: self.states,
        }
    }
}

/// Decoder half of the rANS pair; reads symbols in forward stream order
pub struct RansDecoder {
    states: Vec<u32>,
    words: Vec<Vec<u16>>,
    cursors: Vec<usize>,
}

impl RansDecoder {
    pub fn new(body: RansBody) -> Self {
        let cursors = vec![0; body.words.len()];
        Self {
            states: body.final_states,
            words: body.words,
            cursors,
        }
    }

    pub fn num_streams(&self) -> usize {
        self.states.len()
    }

    /// Decode one symbol from stream `stream`
    pub fn get(&mut self, stream: usize, dist: &Distribution) -> Result<u32> {
        let state = &mut self.states[stream];
        let offset = *state & STATE_MASK;
        let symbol = dist.symbol_at(offset);
        let freq = dist.freq(symbol);
        let cumulative = dist.cumulative(symbol);
        *state = freq * (*state >> ANS_PRECISION_BITS) + offset - cumulative;
        while *state < ANS_TOTAL {
            let cursor = &mut self.cursors[stream];
            let word = *self.words[stream]
                .get(*cursor)
                .ok_or(Error::UnexpectedEof)?;
            *cursor += 1;
            *state = (*state << 16) | word as u32;
        }
        Ok(symbol)
    }

    /// Verify every stream drained back to the initial state
    pub fn check_final(&self) -> Result<()> {
        for (i, &state) in self.states.iter().enumerate() {
            if state != RANS_INIT_STATE {
                return Err(Error::InternalInvariant(format!(
                    "rANS stream {i} ended in state {state:#x}"
                )));
            }
            if self.cursors[i] != self.words[i].len() {
                return Err(Error::InternalInvariant(format!(
                    "rANS stream {i} left {} words unread",
                    self.words[i].len() - self.cursors[i]
                )));
            }
        }
        Ok(())
    }
}
