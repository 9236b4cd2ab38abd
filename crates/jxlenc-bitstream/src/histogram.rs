//! Histogram building, normalisation, clustering and emission
//!
//! Symbol statistics are collected per context, normalised to the ANS
//! precision, optionally merged across contexts by KL divergence, and
//! serialised ahead of the rANS body.

use jxlenc_core::{Error, Result};

use crate::reader::BitReader;
use crate::u32coder::{ALPHABET_SIZE, ZERO_RUN};
use crate::writer::BitWriter;

/// ANS precision: all distributions sum to 2^12
pub const ANS_PRECISION_BITS: u32 = 12;
pub const ANS_TOTAL: u32 = 1 << ANS_PRECISION_BITS;

/// Largest supported alphabet
pub const MAX_ALPHABET: usize = 1 << 16;

/// Maximum number of contexts per entropy stream
pub const MAX_CONTEXTS: usize = 256;

/// Raw symbol counts for one context
#[derive(Debug, Clone, Default)]
pub struct Histogram {
    counts: Vec<u32>,
    total: u64,
}

impl Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, symbol: u32) {
        let idx = symbol as usize;
        if idx >= self.counts.len() {
            self.counts.resize(idx + 1, 0);
        }
        self.counts[idx] += 1;
        self.total += 1;
    }

    pub fn merge(&mut self, other: &Histogram) {
        if other.counts.len() > self.counts.len() {
            self.counts.resize(other.counts.len(), 0);
        }
        for (dst, &src) in self.counts.iter_mut().zip(other.counts.iter()) {
            *dst += src;
        }
        self.total += other.total;
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Symmetric KL divergence between two histograms, with add-half smoothing
    pub fn divergence(&self, other: &Histogram) -> f64 {
        let n = self.counts.len().max(other.counts.len()).max(1);
        let p_total = self.total as f64 + 0.5 * n as f64;
        let q_total = other.total as f64 + 0.5 * n as f64;
        let mut kl = 0.0;
        for i in 0..n {
            let pc = *self.counts.get(i).unwrap_or(&0) as f64 + 0.5;
            let qc = *other.counts.get(i).unwrap_or(&0) as f64 + 0.5;
            let p = pc / p_total;
            let q = qc / q_total;
            kl += (p - q) * (p / q).ln();
        }
        kl
    }
}

/// A normalised ANS distribution: frequencies summing to `ANS_TOTAL` plus
/// the cumulative table used by both coder directions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    freq: Vec<u16>,
    cumulative: Vec<u32>,
}

impl Distribution {
    /// Normalise raw counts to `ANS_TOTAL`
    ///
    /// Every symbol with a non-zero count keeps a frequency of at least 1;
    /// the surplus or deficit is settled against the largest buckets.
    pub fn from_counts(counts: &[u32]) -> Result<Self> {
        let n = counts.len().max(1);
        if n > MAX_ALPHABET {
            return Err(Error::InternalInvariant(format!(
                "alphabet size {n} exceeds {MAX_ALPHABET}"
            )));
        }
        let total: u64 = counts.iter().map(|&c| c as u64).sum();
        if total == 0 {
            // Statistically empty context; it is never used to code a symbol
            return Ok(Self::uniform(1));
        }

        let mut freq = vec![0u16; n];
        let mut sum: u32 = 0;
        for (i, &count) in counts.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let scaled = ((count as u128 * ANS_TOTAL as u128) / total as u128) as u32;
            let f = scaled.clamp(1, ANS_TOTAL) as u16;
            freq[i] = f;
            sum += f as u32;
        }

        // Settle rounding error against the largest buckets
        while sum != ANS_TOTAL {
            let (largest, &f) = freq
                .iter()
                .enumerate()
                .max_by_key(|(_, &f)| f)
                .ok_or_else(|| Error::InternalInvariant("empty histogram".into()))?;
            if sum > ANS_TOTAL {
                let excess = sum - ANS_TOTAL;
                if f <= 1 {
                    return Err(Error::InternalInvariant(
                        "too many distinct symbols to normalise".into(),
                    ));
                }
                let cut = excess.min(f as u32 - 1);
                freq[largest] = (f as u32 - cut) as u16;
                sum -= cut;
            } else {
                let deficit = ANS_TOTAL - sum;
                freq[largest] = (f as u32 + deficit).min(ANS_TOTAL) as u16;
                sum += deficit;
            }
        }

        Ok(Self::from_freqs(freq))
    }

    /// The canonical uniform distribution over `n` symbols
    pub fn uniform(n: usize) -> Self {
        debug_assert!(n >= 1 && n <= ANS_TOTAL as usize);
        let base = ANS_TOTAL / n as u32;
        let rem = (ANS_TOTAL % n as u32) as usize;
        let freq: Vec<u16> = (0..n)
            .map(|i| (base + if i < rem { 1 } else { 0 }) as u16)
            .collect();
        Self::from_freqs(freq)
    }

    fn from_freqs(freq: Vec<u16>) -> Self {
        let mut cumulative = Vec::with_capacity(freq.len() + 1);
        let mut acc = 0u32;
        cumulative.push(0);
        for &f in &freq {
            acc += f as u32;
            cumulative.push(acc);
        }
        Self { freq, cumulative }
    }

    pub fn alphabet_size(&self) -> usize {
        self.freq.len()
    }

    pub fn freq(&self, symbol: u32) -> u32 {
        *self.freq.get(symbol as usize).unwrap_or(&0) as u32
    }

    pub fn cumulative(&self, symbol: u32) -> u32 {
        self.cumulative[symbol as usize]
    }

    /// Find the symbol whose cumulative range contains `offset`
    pub fn symbol_at(&self, offset: u32) -> u32 {
        debug_assert!(offset < ANS_TOTAL);
        let idx = self.cumulative.partition_point(|&c| c <= offset);
        (idx - 1) as u32
    }

    fn is_uniform(&self) -> bool {
        *self == Self::uniform(self.freq.len())
    }

    /// Serialise the distribution
    ///
    /// A single `uniform` bit short-circuits to just the alphabet size.
    /// Otherwise each frequency is a 4-bit length token plus a residue
    /// field, with zero-run compression for consecutive empty buckets.
    pub fn write(&self, writer: &mut BitWriter) -> Result<()> {
        let n = self.freq.len();
        let uniform = self.is_uniform();
        writer.write_bit(uniform)?;
        writer.write_u32((n - 1) as u32, &ALPHABET_SIZE)?;
        if uniform {
            return Ok(());
        }
        let mut i = 0;
        while i < n {
            let f = self.freq[i] as u32;
            if f == 0 {
                let mut run = 1;
                while i + run < n && self.freq[i + run] == 0 {
                    run += 1;
                }
                writer.write_bits(0, 4)?;
                writer.write_u32((run - 1) as u32, &ZERO_RUN)?;
                i += run;
            } else {
                let token = 32 - f.leading_zeros();
                writer.write_bits(token as u64, 4)?;
                if token > 1 {
                    let residue = f - (1 << (token - 1));
                    writer.write_bits(residue as u64, token - 1)?;
                }
                i += 1;
            }
        }
        Ok(())
    }

    /// Mirror of [`Distribution::write`]
    pub fn read(reader: &mut BitReader) -> Result<Self> {
        let uniform = reader.read_bit()?;
        let n = reader.read_u32(&ALPHABET_SIZE)? as usize + 1;
        if n > MAX_ALPHABET {
            return Err(Error::UnexpectedEof);
        }
        if uniform {
            return Ok(Self::uniform(n));
        }
        let mut freq = vec![0u16; n];
        let mut sum = 0u32;
        let mut i = 0;
        while i < n {
            let token = reader.read_bits(4)? as u32;
            if token == 0 {
                let run = reader.read_u32(&ZERO_RUN)? as usize + 1;
                i += run;
            } else {
                let residue = if token > 1 {
                    reader.read_bits(token - 1)? as u32
                } else {
                    0
                };
                let f = (1 << (token - 1)) + residue;
                if i >= n || f > ANS_TOTAL {
                    return Err(Error::UnexpectedEof);
                }
                freq[i] = f as u16;
                sum += f;
                i += 1;
            }
        }
        if sum != ANS_TOTAL {
            return Err(Error::InternalInvariant(format!(
                "frequency table sums to {sum}, expected {ANS_TOTAL}"
            )));
        }
        Ok(Self::from_freqs(freq))
    }
}

/// Greedily merge contexts whose distributions are close in KL divergence
///
/// Returns the context -> cluster map and the merged histograms. Contexts
/// with no observations are folded into the first cluster.
pub fn cluster_histograms(
    histograms: &[Histogram],
    threshold: f64,
) -> (Vec<u8>, Vec<Histogram>) {
    let mut map = vec![0u8; histograms.len()];
    let mut clusters: Vec<Histogram> = Vec::new();

    for (ctx, histogram) in histograms.iter().enumerate() {
        if histogram.total() == 0 && !clusters.is_empty() {
            map[ctx] = 0;
            continue;
        }
        let mut best: Option<(usize, f64)> = None;
        for (ci, cluster) in clusters.iter().enumerate() {
            let d = histogram.divergence(cluster);
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((ci, d));
            }
        }
        match best {
            Some((ci, d)) if d <= threshold || clusters.len() >= MAX_CONTEXTS => {
                clusters[ci].merge(histogram);
                map[ctx] = ci as u8;
            }
            _ => {
                map[ctx] = clusters.len() as u8;
                clusters.push(histogram.clone());
            }
        }
    }

    if clusters.is_empty() {
        clusters.push(Histogram::new());
    }
    (map, clusters)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalisation_sums_to_total() {
        let counts = vec![5, 0, 13, 1, 1000, 7];
        let dist = Distribution::from_counts(&counts).unwrap();
        let sum: u32 = (0..counts.len() as u32).map(|s| dist.freq(s)).sum();
        assert_eq!(sum, ANS_TOTAL);
        // Present symbols keep a non-zero frequency
        for (i, &c) in counts.iter().enumerate() {
            if c > 0 {
                assert!(dist.freq(i as u32) >= 1, "symbol {i} lost its frequency");
            } else {
                assert_eq!(dist.freq(i as u32), 0);
            }
        }
    }

    #[test]
    fn test_single_symbol_distribution() {
        let dist = Distribution::from_counts(&[0, 42, 0]).unwrap();
        assert_eq!(dist.freq(1), ANS_TOTAL);
        assert_eq!(dist.symbol_at(0), 1);
        assert_eq!(dist.symbol_at(ANS_TOTAL - 1), 1);
    }

    #[test]
    fn test_symbol_at_matches_cumulative() {
        let dist = Distribution::from_counts(&[10, 20, 30, 40]).unwrap();
        for s in 0..4 {
            let lo = dist.cumulative(s);
            assert_eq!(dist.symbol_at(lo), s);
            assert_eq!(dist.symbol_at(lo + dist.freq(s) - 1), s);
        }
    }

    #[test]
    fn test_uniform_roundtrip() {
        let dist = Distribution::uniform(100);
        let mut writer = BitWriter::new();
        dist.write(&mut writer).unwrap();
        let bytes = writer.finish().unwrap();
        let mut reader = BitReader::new(&bytes);
        let decoded = Distribution::read(&mut reader).unwrap();
        assert_eq!(dist, decoded);
    }

    #[test]
    fn test_skewed_roundtrip() {
        let counts = vec![1000, 0, 0, 0, 0, 0, 0, 3, 500, 0, 12];
        let dist = Distribution::from_counts(&counts).unwrap();
        let mut writer = BitWriter::new();
        dist.write(&mut writer).unwrap();
        let bytes = writer.finish().unwrap();
        let mut reader = BitReader::new(&bytes);
        let decoded = Distribution::read(&mut reader).unwrap();
        assert_eq!(dist, decoded);
    }

    #[test]
    fn test_empty_counts_degrade_to_unit_alphabet() {
        let dist = Distribution::from_counts(&[]).unwrap();
        assert_eq!(dist.alphabet_size(), 1);
        assert_eq!(dist.freq(0), ANS_TOTAL);
    }

    #[test]
    fn test_clustering_merges_similar() {
        let mut a = Histogram::new();
        let mut b = Histogram::new();
        let mut c = Histogram::new();
        for _ in 0..100 {
            a.add(0);
            b.add(0);
            c.add(7);
        }
        a.add(1);
        b.add(1);
        let (map, clusters) = cluster_histograms(&[a, b, c], 0.1);
        assert_eq!(map[0], map[1], "similar contexts should share a cluster");
        assert_ne!(map[0], map[2], "distinct contexts should stay separate");
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn test_clustering_empty_context_folds_into_first() {
        let mut a = Histogram::new();
        a.add(3);
        let empty = Histogram::new();
        let (map, clusters) = cluster_histograms(&[a, empty], 0.01);
        assert_eq!(map[1], 0);
        assert_eq!(clusters.len(), 1);
    }

    #[test]
    fn test_divergence_symmetry() {
        let mut a = Histogram::new();
        let mut b = Histogram::new();
        for s in [0u32, 0, 1, 2, 2, 2] {
            a.add(s);
        }
        for s in [0u32, 1, 1, 1, 2] {
            b.add(s);
        }
        let d_ab = a.divergence(&b);
        let d_ba = b.divergence(&a);
        assert!((d_ab - d_ba).abs() < 1e-9);
        assert!(d_ab > 0.0);
        assert!(a.divergence(&a).abs() < 1e-12);
    }
}
