//! Context-adaptive entropy streams
//!
//! A stream is a sequence of (context, value) tokens. Values are split into
//! a bounded-alphabet symbol plus optional raw bits, histogrammed per
//! context, clustered, and rANS-coded. Streams with heavy repetition can be
//! prefiltered with an LZ77 pass whose match lengths live in the literal
//! alphabet and whose distances use a dedicated context.
//!
//! Layout (all section boundaries byte-aligned):
//!   empty bit | lz77 bit | stream count - 1 (2 bits)
//!   cluster map | cluster distributions
//!   symbol count (U32)
//!   per stream: word count (U32), aligned LE words, 32-bit final state
//!   raw-bits section, in token order

use std::collections::HashMap;

use byteorder::{ByteOrder, LittleEndian};
use jxlenc_core::{Error, Result};
use log::debug;

use crate::histogram::{cluster_histograms, Distribution, Histogram};
use crate::rans::{RansBody, RansDecoder, RansEncoder};
use crate::reader::BitReader;
use crate::u32coder::GENERAL;
use crate::writer::BitWriter;

/// Values 0..=255 are coded directly as symbols
pub const MAX_DIRECT_VALUE: u32 = 255;
/// Symbols 256.. carry `msb - 8` raw bits
pub const SPLIT_TOKEN_BASE: u32 = 256;
/// With LZ77 enabled, symbols 280.. are match lengths
pub const LZ_LENGTH_BASE: u32 = 280;
pub const LZ_NUM_LENGTHS: u32 = 16;
pub const LZ_MIN_MATCH: usize = 4;
pub const LZ_MAX_MATCH: usize = LZ_MIN_MATCH + LZ_NUM_LENGTHS as usize - 1;
pub const LZ_WINDOW: usize = 256;

/// One (context, value) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub context: u8,
    pub value: u32,
}

/// Accumulates tokens for one entropy stream
#[derive(Debug, Default)]
pub struct TokenSink {
    tokens: Vec<Token>,
}

impl TokenSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, context: u8, value: u32) {
        self.tokens.push(Token { context, value });
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }
}

/// Tuning for one encoded stream
#[derive(Debug, Clone, Copy)]
pub struct EntropyConfig {
    /// 1..=4 interleaved rANS states
    pub num_streams: usize,
    /// Attempt the LZ77 prefilter
    pub allow_lz77: bool,
    /// KL divergence bound for context clustering
    pub cluster_threshold: f64,
}

impl Default for EntropyConfig {
    fn default() -> Self {
        Self {
            num_streams: 1,
            allow_lz77: true,
            cluster_threshold: 0.15,
        }
    }
}

/// Split a value into (symbol, raw bit count, raw bits)
fn split_value(value: u32) -> (u32, u32, u32) {
    if value <= MAX_DIRECT_VALUE {
        (value, 0, 0)
    } else {
        let n = 31 - value.leading_zeros();
        let symbol = SPLIT_TOKEN_BASE + (n - 8);
        (symbol, n, value & ((1 << n) - 1))
    }
}

/// Inverse of [`split_value`] for split symbols
fn merge_value(symbol: u32, raw: u32) -> u32 {
    let n = symbol - SPLIT_TOKEN_BASE + 8;
    (1 << n) | raw
}

enum Piece {
    Literal(Token),
    Match { context: u8, length: usize, distance: usize },
}

/// Greedy hash-chained LZ77 over token values
///
/// Matches compare values only; contexts of covered positions are
/// reconstructed by the decoder's own model, which sees the copied values.
fn lz77_transform(tokens: &[Token]) -> (Vec<Piece>, usize) {
    let values: Vec<u32> = tokens.iter().map(|t| t.value).collect();
    let mut pieces = Vec::new();
    let mut covered = 0usize;
    let mut table: HashMap<[u32; LZ_MIN_MATCH], usize> = HashMap::new();
    let mut i = 0;
    while i < values.len() {
        let mut emitted = false;
        if i + LZ_MIN_MATCH <= values.len() {
            let key = [values[i], values[i + 1], values[i + 2], values[i + 3]];
            if let Some(&candidate) = table.get(&key) {
                let distance = i - candidate;
                if distance >= 1 && distance <= LZ_WINDOW {
                    let mut length = 0;
                    while length < LZ_MAX_MATCH
                        && i + length < values.len()
                        && values[i + length - distance] == values[i + length]
                    {
                        length += 1;
                    }
                    if length >= LZ_MIN_MATCH {
                        pieces.push(Piece::Match {
                            context: tokens[i].context,
                            length,
                            distance,
                        });
                        for j in i..i + length {
                            if j + LZ_MIN_MATCH <= values.len() {
                                let k = [values[j], values[j + 1], values[j + 2], values[j + 3]];
                                table.insert(k, j);
                            }
                        }
                        covered += length;
                        i += length;
                        emitted = true;
                    }
                }
            }
            if !emitted {
                table.insert(key, i);
            }
        }
        if !emitted {
            pieces.push(Piece::Literal(tokens[i]));
            i += 1;
        }
    }
    (pieces, covered)
}

struct SymbolRecord {
    context: usize,
    symbol: u32,
    raw_count: u32,
    raw_bits: u32,
}

/// Encode a token stream
///
/// `num_contexts` must cover every context id used by `tokens`; with LZ77
/// one extra distance context is appended internally.
pub fn encode_tokens(
    writer: &mut BitWriter,
    tokens: &[Token],
    num_contexts: usize,
    config: &EntropyConfig,
) -> Result<()> {
    if num_contexts == 0 || num_contexts > 255 {
        return Err(Error::InternalInvariant(format!(
            "context count {num_contexts} outside 1..=255"
        )));
    }
    writer.align_to_byte()?;
    if tokens.is_empty() {
        writer.write_bit(true)?;
        writer.align_to_byte()?;
        return Ok(());
    }
    writer.write_bit(false)?;

    // LZ77 pays off only on streams with real repetition
    let (pieces, lz77) = if config.allow_lz77 {
        let (pieces, covered) = lz77_transform(tokens);
        if covered * 8 >= tokens.len() {
            (pieces, true)
        } else {
            (tokens.iter().map(|&t| Piece::Literal(t)).collect(), false)
        }
    } else {
        (tokens.iter().map(|&t| Piece::Literal(t)).collect(), false)
    };
    writer.write_bit(lz77)?;

    let num_streams = config.num_streams.clamp(1, 4);
    writer.write_bits((num_streams - 1) as u64, 2)?;

    let distance_context = num_contexts;
    let total_contexts = num_contexts + usize::from(lz77);

    let mut records = Vec::with_capacity(pieces.len());
    for piece in &pieces {
        match piece {
            Piece::Literal(token) => {
                let (symbol, raw_count, raw_bits) = split_value(token.value);
                records.push(SymbolRecord {
                    context: token.context as usize,
                    symbol,
                    raw_count,
                    raw_bits,
                });
            }
            Piece::Match {
                context,
                length,
                distance,
            } => {
                records.push(SymbolRecord {
                    context: *context as usize,
                    symbol: LZ_LENGTH_BASE + (*length - LZ_MIN_MATCH) as u32,
                    raw_count: 0,
                    raw_bits: 0,
                });
                records.push(SymbolRecord {
                    context: distance_context,
                    symbol: (*distance - 1) as u32,
                    raw_count: 0,
                    raw_bits: 0,
                });
            }
        }
    }

    let mut histograms = vec![Histogram::new(); total_contexts];
    for record in &records {
        histograms[record.context].add(record.symbol);
    }
    let (cluster_map, clusters) = cluster_histograms(&histograms, config.cluster_threshold);
    debug!(
        "entropy stream: {} tokens, {} contexts -> {} clusters, lz77={}",
        tokens.len(),
        total_contexts,
        clusters.len(),
        lz77
    );

    let distributions: Vec<Distribution> = clusters
        .iter()
        .map(|h| Distribution::from_counts(h.counts()))
        .collect::<Result<_>>()?;

    writer.write_bits((clusters.len() - 1) as u64, 8)?;
    let map_bits = bits_for(clusters.len());
    for &cluster in &cluster_map {
        writer.write_bits(cluster as u64, map_bits)?;
    }
    for dist in &distributions {
        dist.write(writer)?;
    }

    writer.write_u32(records.len() as u32, &GENERAL)?;

    let mut encoder = RansEncoder::new(num_streams);
    for (i, record) in records.iter().enumerate().rev() {
        let dist = &distributions[cluster_map[record.context] as usize];
        encoder.put(i % num_streams, dist, record.symbol)?;
    }
    let body = encoder.finish();

    writer.align_to_byte()?;
    for stream in 0..num_streams {
        writer.write_u32(body.words[stream].len() as u32, &GENERAL)?;
        writer.align_to_byte()?;
        let mut word_bytes = vec![0u8; body.words[stream].len() * 2];
        LittleEndian::write_u16_into(&body.words[stream], &mut word_bytes);
        writer.write_bytes(&word_bytes)?;
        writer.write_bits(body.final_states[stream] as u64, 32)?;
    }

    for record in &records {
        if record.raw_count > 0 {
            writer.write_bits(record.raw_bits as u64, record.raw_count)?;
        }
    }
    writer.align_to_byte()?;
    Ok(())
}

fn bits_for(count: usize) -> u32 {
    if count <= 1 {
        0
    } else {
        usize::BITS - (count - 1).leading_zeros()
    }
}

/// Decoder for one entropy stream
///
/// The caller drives decoding: it derives the context for each position
/// from already-decoded data (exactly as the encoder did) and calls
/// [`TokenDecoder::next`]. Raw bits are pulled from the reader lazily, so
/// the same `BitReader` must be passed to every call.
pub struct TokenDecoder {
    empty: bool,
    lz77: bool,
    num_streams: usize,
    cluster_map: Vec<u8>,
    distributions: Vec<Distribution>,
    rans: Option<RansDecoder>,
    symbols_total: usize,
    symbols_read: usize,
    distance_context: usize,
    history: Vec<u32>,
    pending: Option<(usize, usize)>,
}

impl TokenDecoder {
    pub fn parse(reader: &mut BitReader, num_contexts: usize) -> Result<Self> {
        reader.align_to_byte()?;
        let empty = reader.read_bit()?;
        if empty {
            reader.align_to_byte()?;
            return Ok(Self {
                empty: true,
                lz77: false,
                num_streams: 1,
                cluster_map: Vec::new(),
                distributions: Vec::new(),
                rans: None,
                symbols_total: 0,
                symbols_read: 0,
                distance_context: num_contexts,
                history: Vec::new(),
                pending: None,
            });
        }
        let lz77 = reader.read_bit()?;
        let num_streams = reader.read_bits(2)? as usize + 1;
        let total_contexts = num_contexts + usize::from(lz77);

        let num_clusters = reader.read_bits(8)? as usize + 1;
        let map_bits = bits_for(num_clusters);
        let mut cluster_map = Vec::with_capacity(total_contexts);
        for _ in 0..total_contexts {
            cluster_map.push(reader.read_bits(map_bits)? as u8);
        }
        let mut distributions = Vec::with_capacity(num_clusters);
        for _ in 0..num_clusters {
            distributions.push(Distribution::read(reader)?);
        }

        let symbols_total = reader.read_u32(&GENERAL)? as usize;

        reader.align_to_byte()?;
        let mut words = Vec::with_capacity(num_streams);
        let mut final_states = Vec::with_capacity(num_streams);
        for _ in 0..num_streams {
            let count = reader.read_u32(&GENERAL)? as usize;
            reader.align_to_byte()?;
            let bytes = reader.read_bytes(count * 2)?;
            let mut run = vec![0u16; count];
            LittleEndian::read_u16_into(bytes, &mut run);
            words.push(run);
            final_states.push(reader.read_bits(32)? as u32);
        }

        Ok(Self {
            empty: false,
            lz77,
            num_streams,
            cluster_map,
            distributions,
            rans: Some(RansDecoder::new(RansBody {
                words,
                final_states,
            })),
            symbols_total,
            symbols_read: 0,
            distance_context: num_contexts,
            history: Vec::new(),
            pending: None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    fn decode_symbol(&mut self, context: usize) -> Result<u32> {
        if self.symbols_read >= self.symbols_total {
            return Err(Error::UnexpectedEof);
        }
        let cluster = *self
            .cluster_map
            .get(context)
            .ok_or(Error::UnexpectedEof)? as usize;
        let dist = &self.distributions[cluster];
        let stream = self.symbols_read % self.num_streams;
        let symbol = self
            .rans
            .as_mut()
            .ok_or(Error::UnexpectedEof)?
            .get(stream, dist)?;
        self.symbols_read += 1;
        Ok(symbol)
    }

    /// Decode the next value in the context the caller derived
    pub fn next(&mut self, reader: &mut BitReader, context: u8) -> Result<u32> {
        if self.empty {
            return Err(Error::UnexpectedEof);
        }
        if let Some((distance, remaining)) = self.pending {
            let value = self.history[self.history.len() - distance];
            self.history.push(value);
            self.pending = if remaining > 1 {
                Some((distance, remaining - 1))
            } else {
                None
            };
            return Ok(value);
        }

        let symbol = self.decode_symbol(context as usize)?;
        let value = if self.lz77 && symbol >= LZ_LENGTH_BASE {
            let length = LZ_MIN_MATCH + (symbol - LZ_LENGTH_BASE) as usize;
            let distance_symbol = self.decode_symbol(self.distance_context)?;
            let distance = distance_symbol as usize + 1;
            if distance > self.history.len() {
                return Err(Error::UnexpectedEof);
            }
            let value = self.history[self.history.len() - distance];
            self.pending = if length > 1 {
                Some((distance, length - 1))
            } else {
                None
            };
            value
        } else if symbol >= SPLIT_TOKEN_BASE {
            let raw_count = symbol - SPLIT_TOKEN_BASE + 8;
            let raw = reader.read_bits(raw_count)? as u32;
            merge_value(symbol, raw)
        } else {
            symbol
        };
        self.history.push(value);
        Ok(value)
    }

    /// Verify the stream drained cleanly and realign the reader
    pub fn finish(&self, reader: &mut BitReader) -> Result<()> {
        if !self.empty {
            if self.symbols_read != self.symbols_total {
                return Err(Error::InternalInvariant(format!(
                    "entropy stream decoded {} of {} symbols",
                    self.symbols_read, self.symbols_total
                )));
            }
            if let Some(rans) = &self.rans {
                rans.check_final()?;
            }
        }
        reader.align_to_byte()?;
        Ok(())
    }
}
