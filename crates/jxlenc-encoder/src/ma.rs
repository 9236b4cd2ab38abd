//! Meta-adaptive context tree
//!
//! A per-channel decision tree over the causal neighbourhood. Internal
//! nodes split on one of seven properties against a threshold; leaves name
//! a predictor and an entropy context. The encoder grows the tree greedily
//! on sampled pixels, bounded by effort, and serialises it in the channel
//! preamble so the decoder can replay the exact context selection.

use jxlenc_bitstream::u32coder::GENERAL;
use jxlenc_bitstream::{BitReader, BitWriter};
use jxlenc_core::{Error, Result};
use jxlenc_transform::predict::{predict, unzigzag, zigzag, Neighbors, Predictor};

/// Properties, in order: W, N, NW, NE, gradient, max(N, W), activity
pub const NUM_PROPERTIES: usize = 7;

/// Maximum serialised tree depth accepted by the reader
const MAX_TREE_DEPTH: u32 = 8;

/// Minimum samples a node needs before a split is considered
const MIN_SPLIT_SAMPLES: usize = 64;

/// Compute the property vector for one pixel
pub fn properties(neighbors: &Neighbors) -> [i32; NUM_PROPERTIES] {
    let w = neighbors.w;
    let n = neighbors.n;
    let nw = neighbors.nw;
    let gradient = (n as i64 + w as i64 - nw as i64)
        .clamp(i32::MIN as i64, i32::MAX as i64) as i32;
    let activity = (w as i64 - nw as i64).abs() + (n as i64 - nw as i64).abs();
    [
        w,
        n,
        nw,
        neighbors.ne,
        gradient,
        n.max(w),
        activity.min(i32::MAX as i64) as i32,
    ]
}

/// One leaf of the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaLeaf {
    pub predictor: Predictor,
    pub context: u8,
}

/// The decision tree
#[derive(Debug, Clone, PartialEq)]
pub enum MaTree {
    Leaf(MaLeaf),
    Split {
        property: u8,
        threshold: i32,
        /// Taken when property > threshold
        above: Box<MaTree>,
        below: Box<MaTree>,
    },
}

impl MaTree {
    /// A single-leaf tree with the MED predictor
    pub fn med_only() -> Self {
        MaTree::Leaf(MaLeaf {
            predictor: Predictor::Med,
            context: 0,
        })
    }

    /// Number of leaves, which is also the number of contexts
    pub fn num_contexts(&self) -> usize {
        match self {
            MaTree::Leaf(_) => 1,
            MaTree::Split { above, below, .. } => above.num_contexts() + below.num_contexts(),
        }
    }

    /// Select the predictor and context for a property vector
    pub fn lookup(&self, props: &[i32; NUM_PROPERTIES]) -> MaLeaf {
        match self {
            MaTree::Leaf(leaf) => *leaf,
            MaTree::Split {
                property,
                threshold,
                above,
                below,
            } => {
                if props[*property as usize] > *threshold {
                    above.lookup(props)
                } else {
                    below.lookup(props)
                }
            }
        }
    }

    fn assign_contexts(&mut self, next: &mut u8) {
        match self {
            MaTree::Leaf(leaf) => {
                leaf.context = *next;
                *next += 1;
            }
            MaTree::Split { above, below, .. } => {
                above.assign_contexts(next);
                below.assign_contexts(next);
            }
        }
    }

    /// Grow a tree for a channel, sampling pixels for speed
    pub fn build(
        data: &[i32],
        width: usize,
        height: usize,
        min: i32,
        max: i32,
        max_depth: u32,
    ) -> Self {
        let mut samples = Vec::new();
        let total = width * height;
        let step = (total / 4096).max(1);
        let mut i = 0;
        while i < total {
            let x = i % width;
            let y = i / width;
            let neighbors = Neighbors::at(data, width, x, y);
            samples.push(Sample {
                props: properties(&neighbors),
                neighbors,
                actual: data[i],
            });
            i += step;
        }
        let mut tree = Self::build_node(&samples, min, max, max_depth);
        let mut next = 0u8;
        tree.assign_contexts(&mut next);
        tree
    }

    fn build_node(samples: &[Sample], min: i32, max: i32, depth_left: u32) -> Self {
        let (leaf_predictor, leaf_cost) = best_predictor(samples, min, max);
        if depth_left == 0 || samples.len() < MIN_SPLIT_SAMPLES {
            return MaTree::Leaf(MaLeaf {
                predictor: leaf_predictor,
                context: 0,
            });
        }

        let mut best_split: Option<(u8, i32, i64)> = None;
        for property in 0..NUM_PROPERTIES {
            let mut values: Vec<i32> = samples.iter().map(|s| s.props[property]).collect();
            values.sort_unstable();
            let threshold = values[values.len() / 2];
            if threshold == *values.last().unwrap() {
                // Everything would land on the same side
                continue;
            }
            let (above, below): (Vec<&Sample>, Vec<&Sample>) = samples
                .iter()
                .partition(|s| s.props[property] > threshold);
            if above.is_empty() || below.is_empty() {
                continue;
            }
            let cost = best_predictor_ref(&above, min, max).1
                + best_predictor_ref(&below, min, max).1;
            if best_split.map_or(true, |(_, _, c)| cost < c) {
                best_split = Some((property as u8, threshold, cost));
            }
        }

        match best_split {
            // Require a tangible gain before paying for a split
            Some((property, threshold, cost)) if cost * 100 < leaf_cost * 98 => {
                let (above, below): (Vec<Sample>, Vec<Sample>) = samples
                    .iter()
                    .cloned()
                    .partition(|s| s.props[property as usize] > threshold);
                MaTree::Split {
                    property,
                    threshold,
                    above: Box::new(Self::build_node(&above, min, max, depth_left - 1)),
                    below: Box::new(Self::build_node(&below, min, max, depth_left - 1)),
                }
            }
            _ => MaTree::Leaf(MaLeaf {
                predictor: leaf_predictor,
                context: 0,
            }),
        }
    }

    /// Serialise pre-order: split bit, then property/threshold or predictor
    pub fn write(&self, writer: &mut BitWriter) -> Result<()> {
        match self {
            MaTree::Leaf(leaf) => {
                writer.write_bit(false)?;
                writer.write_bits(leaf.predictor as u64, 3)?;
            }
            MaTree::Split {
                property,
                threshold,
                above,
                below,
            } => {
                writer.write_bit(true)?;
                writer.write_bits(*property as u64, 3)?;
                writer.write_u32(zigzag(*threshold), &GENERAL)?;
                above.write(writer)?;
                below.write(writer)?;
            }
        }
        Ok(())
    }

    /// Mirror of [`MaTree::write`], assigning contexts in the same order
    pub fn read(reader: &mut BitReader) -> Result<Self> {
        let mut tree = Self::read_node(reader, 0)?;
        let mut next = 0u8;
        tree.assign_contexts(&mut next);
        Ok(tree)
    }

    fn read_node(reader: &mut BitReader, depth: u32) -> Result<Self> {
        if depth > MAX_TREE_DEPTH {
            return Err(Error::UnexpectedEof);
        }
        if reader.read_bit()? {
            let property = reader.read_bits(3)? as u8;
            if property as usize >= NUM_PROPERTIES {
                return Err(Error::UnexpectedEof);
            }
            let threshold = unzigzag(reader.read_u32(&GENERAL)?);
            let above = Box::new(Self::read_node(reader, depth + 1)?);
            let below = Box::new(Self::read_node(reader, depth + 1)?);
            Ok(MaTree::Split {
                property,
                threshold,
                above,
                below,
            })
        } else {
            let code = reader.read_bits(3)? as u32;
            let predictor = Predictor::from_code(code).ok_or(Error::UnexpectedEof)?;
            Ok(MaTree::Leaf(MaLeaf {
                predictor,
                context: 0,
            }))
        }
    }
}

#[derive(Clone)]
struct Sample {
    props: [i32; NUM_PROPERTIES],
    neighbors: Neighbors,
    actual: i32,
}

fn best_predictor(samples: &[Sample], min: i32, max: i32) -> (Predictor, i64) {
    let refs: Vec<&Sample> = samples.iter().collect();
    best_predictor_ref(&refs, min, max)
}

fn best_predictor_ref(samples: &[&Sample], min: i32, max: i32) -> (Predictor, i64) {
    let mut best = (Predictor::Med, i64::MAX);
    for &predictor in Predictor::all() {
        let mut cost = 0i64;
        for sample in samples {
            let predicted = predict(predictor, &sample.neighbors, min, max);
            cost += (sample.actual as i64 - predicted as i64).abs();
            if cost >= best.1 {
                break;
            }
        }
        if cost < best.1 {
            best = (predictor, cost);
        }
    }
    best
}
