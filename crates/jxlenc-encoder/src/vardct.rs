//! VarDCT mode: perceptually driven lossy compression
//!
//! The pipeline: colour transform (XYB opsin or BT.601 YCbCr), edge-padded
//! 8x8 block extraction, DCT, chroma-from-luma, adaptive quantisation with
//! ROI and responsive quality layers, natural-order scanning, MED
//! prediction of DC across blocks, and context-adaptive entropy coding.
//! Alpha and extra channels ride along losslessly in a side section.
//!
//! Body layout (byte-aligned sections):
//!   use_xyb bit, colour channel count - 1 (2 bits)
//!   noise | patches | splines overlays (per frame header flags)
//!   per-block quantisation multipliers (one byte per block)
//!   base distance (32 bits), layer count - 1 (3 bits)
//!   per layer: passes, each a marker byte plus one entropy stream
//!   side section: lossless planes (alpha, extra channels)

use jxlenc_bitstream::entropy::{encode_tokens, EntropyConfig, TokenDecoder, TokenSink};
use jxlenc_bitstream::u32coder::COUNT;
use jxlenc_bitstream::{BitReader, BitWriter};
use jxlenc_color::transfer::{from_linear, to_linear};
use jxlenc_color::xyb::{planes_to_linear_rgb, planes_to_xyb};
use jxlenc_color::ycbcr::{planes_to_rgb, planes_to_ycbcr};
use jxlenc_core::consts::{BLOCK_AREA, BLOCK_SIZE};
use jxlenc_core::{
    BufferPool, EncodingOptions, Error, ImageFrame, Result, TransferFunction,
};
use jxlenc_headers::FrameHeader;
use jxlenc_transform::adaptive_quant::{layer_distances, AdaptiveQuantMap};
use jxlenc_transform::cfl::{apply_cfl, fit_cfl_slope, unapply_cfl, CflSlope};
use jxlenc_transform::dct::{forward_dct8, inverse_dct8};
use jxlenc_transform::natural_order::{scan_block, unscan_block};
use jxlenc_transform::predict::{med_predict, unzigzag, zigzag, Neighbors};
use jxlenc_transform::quantization::{dequantize_block, quantization_steps, quantize_block};
use log::debug;
use rayon::prelude::*;

use crate::modular::extract_channels;
use crate::overlays::{
    find_patches, read_patches, write_patches, NoiseParams, Patch, SplineOverlay,
};
use crate::reference::ReferenceSlots;

/// Entropy context layout for coefficient streams
const CTX_DC_BASE: usize = 0;
const CTX_CFL: usize = 3;
const CTX_AC_BASE: usize = 4;
const AC_BANDS: usize = 5;
const NZ_BUCKETS: usize = 3;
const NUM_COEFF_CONTEXTS: usize = CTX_AC_BASE + 3 * AC_BANDS * NZ_BUCKETS;

/// Marker byte prefixed to each pass
const PASS_MARKER_BASE: u8 = 0x50;

/// Frequency band of a scan position (1..64)
fn ac_band(position: usize) -> usize {
    match position {
        1..=3 => 0,
        4..=7 => 1,
        8..=15 => 2,
        16..=31 => 3,
        _ => 4,
    }
}

fn nz_bucket(count: usize) -> usize {
    match count {
        0 => 0,
        1..=8 => 1,
        _ => 2,
    }
}

fn ac_context(channel: usize, position: usize, prev_nonzero: usize) -> u8 {
    let c = channel.min(2);
    (CTX_AC_BASE + (c * AC_BANDS + ac_band(position)) * NZ_BUCKETS + nz_bucket(prev_nonzero))
        as u8
}

/// Base quantisation weight table for a transformed channel
fn weight_channel(channel: usize, color_channels: usize, use_xyb: bool) -> usize {
    if color_channels == 1 {
        1
    } else if use_xyb {
        channel
    } else {
        // YCbCr: luma uses the Y table, both chroma channels the B table
        if channel == 0 {
            1
        } else {
            2
        }
    }
}

fn luma_index(use_xyb: bool, color_channels: usize) -> usize {
    if color_channels == 3 && use_xyb {
        1
    } else {
        0
    }
}

fn chroma_channels(color_channels: usize, luma: usize) -> Vec<usize> {
    (0..color_channels).filter(|&c| c != luma).collect()
}

/// Per-block multiplier quantised to one byte covering [0.25, 2.24]
fn quantize_multiplier(multiplier: f32) -> u8 {
    ((multiplier - 0.25) * 128.0).round().clamp(0.0, 255.0) as u8
}

fn dequantize_multiplier(byte: u8) -> f32 {
    0.25 + byte as f32 / 128.0
}

fn pad_plane(plane: &[f32], width: usize, height: usize, pw: usize, ph: usize) -> Vec<f32> {
    let mut padded = vec![0.0f32; pw * ph];
    for y in 0..ph {
        let sy = y.min(height - 1);
        for x in 0..pw {
            let sx = x.min(width - 1);
            padded[y * pw + x] = plane[sy * width + sx];
        }
    }
    padded
}

fn extract_blocks(padded: &[f32], pw: usize, bx_count: usize, by_count: usize) -> Vec<[f32; 64]> {
    let mut blocks = Vec::with_capacity(bx_count * by_count);
    for by in 0..by_count {
        for bx in 0..bx_count {
            let mut block = [0.0f32; BLOCK_AREA];
            for y in 0..BLOCK_SIZE {
                let row = (by * BLOCK_SIZE + y) * pw + bx * BLOCK_SIZE;
                block[y * BLOCK_SIZE..(y + 1) * BLOCK_SIZE]
                    .copy_from_slice(&padded[row..row + BLOCK_SIZE]);
            }
            blocks.push(block);
        }
    }
    blocks
}

fn entropy_config(options: &EncodingOptions) -> EntropyConfig {
    EntropyConfig {
        num_streams: match options.effort {
            1..=4 => 1,
            5..=7 => 2,
            _ => 4,
        },
        allow_lz77: true,
        cluster_threshold: match options.effort {
            1..=3 => 0.5,
            4..=6 => 0.15,
            _ => 0.05,
        },
    }
}

/// Pass coefficient ranges in scan positions; pass 0 also carries DC + CfL
fn pass_ranges(progressive: bool) -> Vec<(usize, usize)> {
    if progressive {
        vec![(0, 0), (1, 16), (16, 64)]
    } else {
        vec![(0, 64)]
    }
}

/// The per-layer distance schedule shared by encoder and decoder
fn distance_schedule(base_distance: f32, num_layers: usize) -> Vec<f32> {
    if num_layers <= 1 {
        vec![base_distance]
    } else {
        layer_distances(base_distance, num_layers as u8)
    }
}

/// Distance actually fed to the quantiser
///
/// Distance 0 means lossless-equivalent quantisation: the steps must stay
/// far below the 8-bit pixel grid rather than collapse to the identity the
/// integer quantiser uses, so a small floor is applied on both sides.
fn effective_distance(distance: f32) -> f32 {
    if distance <= 0.0 {
        0.01
    } else {
        distance
    }
}

struct LayerData {
    /// Quantised AC blocks per channel in scan order, DC zeroed
    scanned: Vec<Vec<[i32; BLOCK_AREA]>>,
    /// Quantised DC plane per channel
    dc: Vec<Vec<i32>>,
    /// CfL slopes per chroma channel
    slopes: Vec<Vec<CflSlope>>,
}

/// Encode one frame in VarDCT mode
pub fn encode_frame(
    writer: &mut BitWriter,
    frame: &ImageFrame,
    options: &EncodingOptions,
    header: &FrameHeader,
    refs: &ReferenceSlots,
    pool: &BufferPool,
) -> Result<()> {
    let width = frame.width() as usize;
    let height = frame.height() as usize;
    let color_channels = if frame.channels >= 3 { 3 } else { 1 };
    let use_xyb = options.use_xyb && color_channels == 3;
    let luma = luma_index(use_xyb, color_channels);
    let chroma = chroma_channels(color_channels, luma);

    // Normalised sample planes
    let mut planes: Vec<Vec<f32>> = Vec::with_capacity(color_channels);
    for c in 0..color_channels {
        let mut plane = pool.plane_f32(width * height);
        for y in 0..height {
            for x in 0..width {
                plane[y * width + x] = frame.get_float(x as u32, y as u32, c)?;
            }
        }
        planes.push(plane);
    }

    // Colour transform
    if color_channels == 3 {
        let (r, rest) = planes.split_at_mut(1);
        let (g, b) = rest.split_at_mut(1);
        if use_xyb {
            for plane in [&mut r[0], &mut g[0], &mut b[0]] {
                for v in plane.iter_mut() {
                    *v = to_linear(frame.color.transfer, *v);
                }
            }
            planes_to_xyb(&mut r[0], &mut g[0], &mut b[0]);
        } else {
            planes_to_ycbcr(&mut r[0], &mut g[0], &mut b[0]);
        }
    }

    // Pad with edge replication and cut into blocks
    let pw = width.div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
    let ph = height.div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
    let bx_count = pw / BLOCK_SIZE;
    let by_count = ph / BLOCK_SIZE;
    let num_blocks = bx_count * by_count;

    let spatial: Vec<Vec<[f32; 64]>> = planes
        .iter()
        .map(|plane| {
            let padded = pad_plane(plane, width, height, pw, ph);
            extract_blocks(&padded, pw, bx_count, by_count)
        })
        .collect();
    for plane in planes {
        pool.return_plane_f32(plane);
    }

    // Adaptive quantisation field with the ROI folded in, quantised to one
    // byte per block so the decoder sees identical multipliers
    let aq = AdaptiveQuantMap::new(bx_count, by_count, &spatial[luma]);
    let mut aq_bytes = Vec::with_capacity(num_blocks);
    let mut multipliers = Vec::with_capacity(num_blocks);
    for by in 0..by_count {
        for bx in 0..bx_count {
            let byte = quantize_multiplier(aq.roi_multiplier(bx, by, options.roi.as_ref()));
            aq_bytes.push(byte);
            multipliers.push(dequantize_multiplier(byte));
        }
    }

    // Patch search against the most recent reference slot
    let patches: Vec<Patch> = if header.have_patches {
        match (options.patches.as_ref(), refs.most_recent()) {
            (Some(config), Some((slot, reference))) => {
                let current = extract_channels(frame)?;
                let current_planes: Vec<Vec<i32>> = current
                    .into_iter()
                    .take(frame.channels.min(3))
                    .map(|c| c.data)
                    .collect();
                find_patches(&current_planes, width, height, slot, reference, config)
            }
            _ => Vec::new(),
        }
    } else {
        Vec::new()
    };
    let mut patched_blocks = vec![false; num_blocks];
    for patch in &patches {
        // Whole blocks inside a patch skip their residuals
        for by in 0..by_count {
            for bx in 0..bx_count {
                let px = bx * BLOCK_SIZE;
                let py = by * BLOCK_SIZE;
                if px >= patch.x as usize
                    && py >= patch.y as usize
                    && px + BLOCK_SIZE <= (patch.x + patch.width) as usize
                    && py + BLOCK_SIZE <= (patch.y + patch.height) as usize
                {
                    patched_blocks[by * bx_count + bx] = true;
                }
            }
        }
    }

    // DCT: parallel over blocks, joined in block order before any write
    let coeffs: Vec<Vec<[f32; 64]>> = spatial
        .iter()
        .map(|blocks| {
            blocks
                .par_iter()
                .map(|block| {
                    let mut out = [0.0f32; BLOCK_AREA];
                    forward_dct8(block, &mut out);
                    out
                })
                .collect()
        })
        .collect();

    debug!(
        "vardct frame: {}x{} ({} blocks), xyb={}, {} patches",
        width,
        height,
        num_blocks,
        use_xyb,
        patches.len()
    );

    // Body preamble
    let side_count = (frame.channels - color_channels) + frame.extra_channels.len();
    writer.align_to_byte()?;
    writer.write_bit(use_xyb)?;
    writer.write_bits((color_channels - 1) as u64, 2)?;
    writer.write_u32(side_count as u32, &COUNT)?;
    writer.align_to_byte()?;

    // Overlays
    if header.have_noise {
        let config = options.noise.as_ref().ok_or_else(|| {
            Error::InternalInvariant("noise flagged without a noise config".into())
        })?;
        NoiseParams::from_config(config).write(writer)?;
    }
    if header.have_patches {
        write_patches(writer, &patches)?;
    }
    if header.have_splines {
        let config = options.splines.as_ref().ok_or_else(|| {
            Error::InternalInvariant("splines flagged without a spline config".into())
        })?;
        // Detection runs over the luma DC field
        let luma_dc: Vec<f32> = spatial[luma].iter().map(|b| b[0]).collect();
        SplineOverlay::detect(&luma_dc, bx_count, by_count, config).write(writer)?;
    }

    // Quantisation field
    writer.align_to_byte()?;
    writer.write_bytes(&aq_bytes)?;

    // Distance schedule
    let base_distance = options.base_distance();
    let num_layers = options
        .responsive
        .as_ref()
        .map_or(1, |r| r.layer_count as usize);
    let distances = distance_schedule(base_distance, num_layers);
    writer.write_bits(base_distance.to_bits() as u64, 32)?;
    writer.write_bits((num_layers - 1) as u64, 3)?;

    let progressive = header.passes.num_passes == 3;
    let config = entropy_config(options);

    for &distance in &distances {
        let layer = build_layer(
            &coeffs,
            color_channels,
            use_xyb,
            luma,
            &chroma,
            distance,
            &multipliers,
            &patched_blocks,
        );
        for (pass_index, &(lo, hi)) in pass_ranges(progressive).iter().enumerate() {
            writer.align_to_byte()?;
            writer.write_bytes(&[PASS_MARKER_BASE + pass_index as u8])?;
            let tokens = pass_tokens(
                &layer,
                color_channels,
                pass_index == 0,
                lo,
                hi,
                bx_count,
                by_count,
            );
            encode_tokens(writer, tokens.tokens(), NUM_COEFF_CONTEXTS, &config)?;
        }
    }

    // Side section: alpha and extra channels, lossless
    encode_side_planes(writer, frame, color_channels, &config)?;
    writer.align_to_byte()?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn build_layer(
    coeffs: &[Vec<[f32; 64]>],
    color_channels: usize,
    use_xyb: bool,
    luma: usize,
    chroma: &[usize],
    distance: f32,
    multipliers: &[f32],
    patched_blocks: &[bool],
) -> LayerData {
    let num_blocks = multipliers.len();
    let distance = effective_distance(distance);

    // Luma goes first: its dequantised reconstruction is the CfL predictor
    // on both sides of the codec
    let luma_wc = weight_channel(luma, color_channels, use_xyb);
    let mut luma_q = Vec::with_capacity(num_blocks);
    let mut luma_recon = Vec::with_capacity(num_blocks);
    for bi in 0..num_blocks {
        let steps = quantization_steps(luma_wc, distance, multipliers[bi]);
        let q = if patched_blocks[bi] {
            [0i32; BLOCK_AREA]
        } else {
            quantize_block(&coeffs[luma][bi], &steps)
        };
        luma_recon.push(dequantize_block(&q, &steps));
        luma_q.push(q);
    }

    // Chroma: subtract the scaled luma from the raw float coefficients,
    // then quantise the residual
    let mut quantized: Vec<Vec<[i32; BLOCK_AREA]>> = vec![Vec::new(); color_channels];
    quantized[luma] = luma_q;
    let mut slopes = Vec::with_capacity(chroma.len());
    for &c in chroma {
        let wc = weight_channel(c, color_channels, use_xyb);
        let mut channel_q = Vec::with_capacity(num_blocks);
        let mut channel_slopes = Vec::with_capacity(num_blocks);
        for bi in 0..num_blocks {
            if patched_blocks[bi] {
                channel_q.push([0i32; BLOCK_AREA]);
                channel_slopes.push(CflSlope(0));
                continue;
            }
            let slope = fit_cfl_slope(&luma_recon[bi], &coeffs[c][bi]);
            let mut residual = coeffs[c][bi];
            apply_cfl(&luma_recon[bi], &mut residual, slope);
            let steps = quantization_steps(wc, distance, multipliers[bi]);
            channel_q.push(quantize_block(&residual, &steps));
            channel_slopes.push(slope);
        }
        quantized[c] = channel_q;
        slopes.push(channel_slopes);
    }

    // Split off the DC plane and scan the rest
    let mut dc = Vec::with_capacity(color_channels);
    let mut scanned = Vec::with_capacity(color_channels);
    for channel_blocks in quantized.iter() {
        let mut dc_plane = Vec::with_capacity(num_blocks);
        let mut scanned_blocks = Vec::with_capacity(num_blocks);
        for block in channel_blocks.iter() {
            dc_plane.push(block[0]);
            let mut out = [0i32; BLOCK_AREA];
            scan_block(block, &mut out);
            out[0] = 0;
            scanned_blocks.push(out);
        }
        dc.push(dc_plane);
        scanned.push(scanned_blocks);
    }

    LayerData {
        scanned,
        dc,
        slopes,
    }
}

fn pass_tokens(
    layer: &LayerData,
    color_channels: usize,
    include_dc: bool,
    lo: usize,
    hi: usize,
    bx_count: usize,
    by_count: usize,
) -> TokenSink {
    let mut sink = TokenSink::new();

    if include_dc {
        // DC residuals, MED-predicted across the block grid
        for (c, plane) in layer.dc.iter().enumerate() {
            for by in 0..by_count {
                for bx in 0..bx_count {
                    let neighbors = Neighbors::at(plane, bx_count, bx, by);
                    let predicted = med_predict(&neighbors, i32::MIN, i32::MAX);
                    let residual = plane[by * bx_count + bx].wrapping_sub(predicted);
                    sink.push((CTX_DC_BASE + c.min(2)) as u8, zigzag(residual));
                }
            }
        }
        // CfL slopes
        for channel_slopes in &layer.slopes {
            for slope in channel_slopes {
                sink.push(CTX_CFL as u8, zigzag(slope.0 as i32));
            }
        }
    }

    // AC coefficients in scan order, contextualised on the previous
    // block's non-zero count within the same range
    if hi > lo.max(1) {
        let lo = lo.max(1);
        for (c, channel_blocks) in layer.scanned.iter().enumerate().take(color_channels) {
            let mut prev_nonzero = 0usize;
            for block in channel_blocks {
                for k in lo..hi {
                    sink.push(ac_context(c, k, prev_nonzero), zigzag(block[k]));
                }
                prev_nonzero = block[lo..hi].iter().filter(|&&v| v != 0).count();
            }
        }
    }
    sink
}

fn encode_side_planes(
    writer: &mut BitWriter,
    frame: &ImageFrame,
    color_channels: usize,
    config: &EntropyConfig,
) -> Result<()> {
    let channels = extract_channels(frame)?;
    let side: Vec<_> = channels.into_iter().skip(color_channels).collect();
    if side.is_empty() {
        return Ok(());
    }
    let mut sink = TokenSink::new();
    for (p, channel) in side.iter().enumerate() {
        for y in 0..channel.height {
            for x in 0..channel.width {
                let neighbors = Neighbors::at(&channel.data, channel.width, x, y);
                let predicted = med_predict(&neighbors, i32::MIN, i32::MAX);
                let residual = channel.data[y * channel.width + x].wrapping_sub(predicted);
                sink.push(p as u8, zigzag(residual));
            }
        }
    }
    encode_tokens(writer, sink.tokens(), side.len(), config)
}

/// Everything a VarDCT frame body decodes to
pub struct DecodedVarDct {
    pub width: usize,
    pub height: usize,
    /// Normalised samples in the frame's original colour space
    pub planes: Vec<Vec<f32>>,
    /// Lossless side planes (alpha, extra channels), with their dimensions
    pub side_planes: Vec<(usize, usize, Vec<i32>)>,
    pub noise: Option<NoiseParams>,
    pub patches: Vec<Patch>,
    pub splines: Option<SplineOverlay>,
}

/// Geometry and colour facts the decoder takes from the image headers
pub struct VarDctFrameInfo {
    pub width: usize,
    pub height: usize,
    /// Dimensions of the extra channel planes
    pub extra_dims: Vec<(usize, usize)>,
    pub transfer: TransferFunction,
}

/// Decode a VarDCT frame body; the mirror of [`encode_frame`]
pub fn decode_frame(
    reader: &mut BitReader,
    header: &FrameHeader,
    info: &VarDctFrameInfo,
) -> Result<DecodedVarDct> {
    reader.align_to_byte()?;
    let use_xyb = reader.read_bit()?;
    let color_channels = reader.read_bits(2)? as usize + 1;
    let side_count = reader.read_u32(&COUNT)? as usize;
    reader.align_to_byte()?;
    let luma = luma_index(use_xyb, color_channels);
    let chroma = chroma_channels(color_channels, luma);

    let noise = if header.have_noise {
        Some(NoiseParams::read(reader)?)
    } else {
        None
    };
    let patches = if header.have_patches {
        read_patches(reader)?
    } else {
        Vec::new()
    };
    let splines = if header.have_splines {
        Some(SplineOverlay::read(reader)?)
    } else {
        None
    };

    let pw = info.width.div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
    let bx_count = pw / BLOCK_SIZE;
    let by_count = info.height.div_ceil(BLOCK_SIZE);
    let num_blocks = bx_count * by_count;

    reader.align_to_byte()?;
    let multipliers: Vec<f32> = reader
        .read_bytes(num_blocks)?
        .iter()
        .map(|&b| dequantize_multiplier(b))
        .collect();

    let base_distance = f32::from_bits(reader.read_bits(32)? as u32);
    let num_layers = reader.read_bits(3)? as usize + 1;
    let distances = distance_schedule(base_distance, num_layers);
    let progressive = header.passes.num_passes == 3;

    let mut last_layer: Option<(Vec<Vec<[i32; BLOCK_AREA]>>, Vec<Vec<i32>>, Vec<Vec<CflSlope>>)> =
        None;

    for _ in 0..num_layers {
        let mut scanned: Vec<Vec<[i32; BLOCK_AREA]>> =
            vec![vec![[0i32; BLOCK_AREA]; num_blocks]; color_channels];
        let mut dc: Vec<Vec<i32>> = vec![vec![0i32; num_blocks]; color_channels];
        let mut slopes: Vec<Vec<CflSlope>> = vec![Vec::with_capacity(num_blocks); chroma.len()];

        for (pass_index, &(lo, hi)) in pass_ranges(progressive).iter().enumerate() {
            reader.align_to_byte()?;
            let marker = reader.read_bytes(1)?[0];
            if marker != PASS_MARKER_BASE + pass_index as u8 {
                return Err(Error::InternalInvariant(format!(
                    "bad pass marker {marker:#x} for pass {pass_index}"
                )));
            }
            let mut decoder = TokenDecoder::parse(reader, NUM_COEFF_CONTEXTS)?;

            if pass_index == 0 {
                for (c, dc_plane) in dc.iter_mut().enumerate() {
                    for by in 0..by_count {
                        for bx in 0..bx_count {
                            let neighbors = Neighbors::at(dc_plane, bx_count, bx, by);
                            let predicted = med_predict(&neighbors, i32::MIN, i32::MAX);
                            let token = decoder.next(reader, (CTX_DC_BASE + c.min(2)) as u8)?;
                            dc_plane[by * bx_count + bx] = predicted.wrapping_add(unzigzag(token));
                        }
                    }
                }
                for channel_slopes in slopes.iter_mut() {
                    for _ in 0..num_blocks {
                        let token = decoder.next(reader, CTX_CFL as u8)?;
                        channel_slopes.push(CflSlope(unzigzag(token).clamp(-128, 127) as i8));
                    }
                }
            }

            if hi > lo.max(1) {
                let lo = lo.max(1);
                for (c, channel_blocks) in scanned.iter_mut().enumerate() {
                    let mut prev_nonzero = 0usize;
                    for block in channel_blocks.iter_mut() {
                        for k in lo..hi {
                            let token = decoder.next(reader, ac_context(c, k, prev_nonzero))?;
                            block[k] = unzigzag(token);
                        }
                        prev_nonzero = block[lo..hi].iter().filter(|&&v| v != 0).count();
                    }
                }
            }
            decoder.finish(reader)?;
        }
        last_layer = Some((scanned, dc, slopes));
    }

    let (scanned, dc, slopes) = last_layer.ok_or(Error::UnexpectedEof)?;
    // The final layer always carries the target distance
    let final_distance = *distances.last().unwrap_or(&base_distance);

    let planes = reconstruct(
        scanned,
        dc,
        slopes,
        use_xyb,
        color_channels,
        luma,
        &chroma,
        &multipliers,
        final_distance,
        info,
        bx_count,
        by_count,
    );

    let side_planes = decode_side_planes(reader, info, side_count)?;
    reader.align_to_byte()?;

    Ok(DecodedVarDct {
        width: info.width,
        height: info.height,
        planes,
        side_planes,
        noise,
        patches,
        splines,
    })
}

#[allow(clippy::too_many_arguments)]
fn reconstruct(
    scanned: Vec<Vec<[i32; BLOCK_AREA]>>,
    dc: Vec<Vec<i32>>,
    slopes: Vec<Vec<CflSlope>>,
    use_xyb: bool,
    color_channels: usize,
    luma: usize,
    chroma: &[usize],
    multipliers: &[f32],
    distance: f32,
    info: &VarDctFrameInfo,
    bx_count: usize,
    by_count: usize,
) -> Vec<Vec<f32>> {
    let pw = bx_count * BLOCK_SIZE;
    let distance = effective_distance(distance);

    // Back to raster quantised blocks with DC in place
    let quantized: Vec<Vec<[i32; BLOCK_AREA]>> = scanned
        .into_iter()
        .enumerate()
        .map(|(c, blocks)| {
            blocks
                .into_iter()
                .enumerate()
                .map(|(bi, scanned_block)| {
                    let mut raster = [0i32; BLOCK_AREA];
                    unscan_block(&scanned_block, &mut raster);
                    raster[0] = dc[c][bi];
                    raster
                })
                .collect()
        })
        .collect();

    // Luma reconstruction first: it is the CfL predictor for the chroma
    // residuals, exactly as on the encoder side
    let luma_wc = weight_channel(luma, color_channels, use_xyb);
    let luma_recon: Vec<[f32; BLOCK_AREA]> = quantized[luma]
        .iter()
        .enumerate()
        .map(|(bi, block)| {
            let steps = quantization_steps(luma_wc, distance, multipliers[bi]);
            dequantize_block(block, &steps)
        })
        .collect();

    // Dequantise, re-add the scaled luma for chroma, and inverse-transform
    let mut planes: Vec<Vec<f32>> = Vec::with_capacity(color_channels);
    for c in 0..color_channels {
        let wc = weight_channel(c, color_channels, use_xyb);
        let chroma_index = chroma.iter().position(|&ch| ch == c);
        let mut plane = vec![0.0f32; pw * by_count * BLOCK_SIZE];
        for (bi, block) in quantized[c].iter().enumerate() {
            let mut coeffs = if c == luma {
                luma_recon[bi]
            } else {
                let steps = quantization_steps(wc, distance, multipliers[bi]);
                dequantize_block(block, &steps)
            };
            if let Some(ci) = chroma_index {
                unapply_cfl(&luma_recon[bi], &mut coeffs, slopes[ci][bi]);
            }
            let mut spatial = [0.0f32; BLOCK_AREA];
            inverse_dct8(&coeffs, &mut spatial);
            let bx = bi % bx_count;
            let by = bi / bx_count;
            for y in 0..BLOCK_SIZE {
                let row = (by * BLOCK_SIZE + y) * pw + bx * BLOCK_SIZE;
                plane[row..row + BLOCK_SIZE]
                    .copy_from_slice(&spatial[y * BLOCK_SIZE..(y + 1) * BLOCK_SIZE]);
            }
        }
        planes.push(plane);
    }

    // Inverse colour transform
    if color_channels == 3 {
        let (a, rest) = planes.split_at_mut(1);
        let (b, c) = rest.split_at_mut(1);
        if use_xyb {
            planes_to_linear_rgb(&mut a[0], &mut b[0], &mut c[0]);
            for plane in [&mut a[0], &mut b[0], &mut c[0]] {
                for v in plane.iter_mut() {
                    *v = from_linear(info.transfer, *v);
                }
            }
        } else {
            planes_to_rgb(&mut a[0], &mut b[0], &mut c[0]);
        }
    }

    // Crop the padding away
    planes
        .into_iter()
        .map(|plane| {
            let mut out = vec![0.0f32; info.width * info.height];
            for y in 0..info.height {
                out[y * info.width..(y + 1) * info.width]
                    .copy_from_slice(&plane[y * pw..y * pw + info.width]);
            }
            out
        })
        .collect()
}

fn decode_side_planes(
    reader: &mut BitReader,
    info: &VarDctFrameInfo,
    num_side: usize,
) -> Result<Vec<(usize, usize, Vec<i32>)>> {
    if num_side == 0 {
        return Ok(Vec::new());
    }
    // Main channels beyond the colour channels use the full frame size;
    // extra channels use their own (possibly downsampled) dimensions
    let num_side_main = num_side.saturating_sub(info.extra_dims.len());
    let mut dims = Vec::with_capacity(num_side);
    for _ in 0..num_side_main {
        dims.push((info.width, info.height));
    }
    dims.extend(info.extra_dims.iter().copied());

    let mut decoder = TokenDecoder::parse(reader, num_side)?;
    let mut planes = Vec::with_capacity(num_side);
    for (p, &(w, h)) in dims.iter().enumerate() {
        let mut plane = vec![0i32; w * h];
        for y in 0..h {
            for x in 0..w {
                let neighbors = Neighbors::at(&plane, w, x, y);
                let predicted = med_predict(&neighbors, i32::MIN, i32::MAX);
                let token = decoder.next(reader, p as u8)?;
                plane[y * w + x] = predicted.wrapping_add(unzigzag(token));
            }
        }
        planes.push((w, h, plane));
    }
    decoder.finish(reader)?;
    Ok(planes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jxlenc_core::{ColorDescriptor, Dimensions, PixelType, SampleBuffer};

    fn gradient_frame(width: u32, height: u32) -> ImageFrame {
        let mut frame = ImageFrame::new(
            Dimensions::new(width, height),
            3,
            PixelType::U8,
            ColorDescriptor::default(),
        )
        .unwrap();
        let w = width as usize;
        let h = height as usize;
        if let SampleBuffer::U8(data) = &mut frame.buffer {
            for y in 0..h {
                for x in 0..w {
                    data[y * w + x] = (x * 255 / w.max(1)) as u8;
                    data[w * h + y * w + x] = (y * 255 / h.max(1)) as u8;
                    data[2 * w * h + y * w + x] = 64;
                }
            }
        }
        frame
    }

    fn encode_decode(
        frame: &ImageFrame,
        options: &EncodingOptions,
        header: &FrameHeader,
    ) -> DecodedVarDct {
        let pool = BufferPool::new();
        let refs = ReferenceSlots::new();
        let mut writer = BitWriter::new();
        encode_frame(&mut writer, frame, options, header, &refs, &pool).unwrap();
        let bytes = writer.finish().unwrap();

        let info = VarDctFrameInfo {
            width: frame.width() as usize,
            height: frame.height() as usize,
            extra_dims: Vec::new(),
            transfer: frame.color.transfer,
        };
        let mut reader = BitReader::new(&bytes);
        let decoded = decode_frame(&mut reader, header, &info).unwrap();
        assert_eq!(reader.remaining_bytes(), 0);
        decoded
    }

    fn psnr(frame: &ImageFrame, decoded: &DecodedVarDct) -> f64 {
        let mut sum_sq = 0.0f64;
        let mut count = 0usize;
        for c in 0..3 {
            for y in 0..decoded.height {
                for x in 0..decoded.width {
                    let original = frame.get_float(x as u32, y as u32, c).unwrap() as f64;
                    let restored = decoded.planes[c][y * decoded.width + x] as f64;
                    let diff = original - restored;
                    sum_sq += diff * diff;
                    count += 1;
                }
            }
        }
        let mse = sum_sq / count as f64;
        if mse <= 0.0 {
            return f64::INFINITY;
        }
        10.0 * (1.0 / mse).log10()
    }

    #[test]
    fn test_gradient_high_quality_roundtrip() {
        let frame = gradient_frame(64, 64);
        let options = EncodingOptions::lossy(90.0);
        let header = FrameHeader::default();
        let decoded = encode_decode(&frame, &options, &header);
        let quality = psnr(&frame, &decoded);
        assert!(quality > 40.0, "PSNR too low: {quality:.2} dB");
    }

    #[test]
    fn test_ycbcr_path_roundtrip() {
        let frame = gradient_frame(32, 24);
        let mut options = EncodingOptions::lossy(90.0);
        options.use_xyb = false;
        let header = FrameHeader::default();
        let decoded = encode_decode(&frame, &options, &header);
        let quality = psnr(&frame, &decoded);
        assert!(quality > 38.0, "PSNR too low: {quality:.2} dB");
    }

    #[test]
    fn test_progressive_passes_roundtrip() {
        let frame = gradient_frame(40, 40);
        let mut options = EncodingOptions::lossy(85.0);
        options.progressive = true;
        let header = FrameHeader {
            passes: jxlenc_headers::PassConfig::progressive(),
            ..FrameHeader::default()
        };
        let decoded = encode_decode(&frame, &options, &header);
        assert!(psnr(&frame, &decoded) > 35.0);
    }

    #[test]
    fn test_responsive_layers_roundtrip() {
        let frame = gradient_frame(32, 32);
        let mut options = EncodingOptions::lossy(80.0);
        options.responsive = Some(jxlenc_core::ResponsiveConfig { layer_count: 3 });
        let header = FrameHeader::default();
        let decoded = encode_decode(&frame, &options, &header);
        assert!(psnr(&frame, &decoded) > 30.0);
    }

    #[test]
    fn test_grayscale_roundtrip() {
        let mut frame = ImageFrame::new(
            Dimensions::new(24, 24),
            1,
            PixelType::U8,
            ColorDescriptor::default(),
        )
        .unwrap();
        if let SampleBuffer::U8(data) = &mut frame.buffer {
            for (i, v) in data.iter_mut().enumerate() {
                *v = ((i / 24) * 10) as u8;
            }
        }
        let options = EncodingOptions::lossy(90.0);
        let header = FrameHeader::default();
        let decoded = encode_decode(&frame, &options, &header);
        assert_eq!(decoded.planes.len(), 1);
    }

    #[test]
    fn test_alpha_side_plane_is_lossless() {
        let mut frame = ImageFrame::new(
            Dimensions::new(16, 16),
            4,
            PixelType::U8,
            ColorDescriptor::default(),
        )
        .unwrap();
        if let SampleBuffer::U8(data) = &mut frame.buffer {
            for (i, v) in data.iter_mut().enumerate() {
                *v = (i % 256) as u8;
            }
            // Alpha plane: opaque
            for v in data[3 * 256..].iter_mut() {
                *v = 255;
            }
        }
        let options = EncodingOptions::lossy(90.0);
        let header = FrameHeader::default();
        let decoded = encode_decode(&frame, &options, &header);
        assert_eq!(decoded.side_planes.len(), 1);
        let (w, h, alpha) = &decoded.side_planes[0];
        assert_eq!((*w, *h), (16, 16));
        assert!(alpha.iter().all(|&v| v == 255));
    }

    #[test]
    fn test_ac_context_range() {
        for c in 0..3 {
            for k in 1..64 {
                for nz in [0, 1, 5, 20, 63] {
                    let ctx = ac_context(c, k, nz) as usize;
                    assert!(ctx >= CTX_AC_BASE);
                    assert!(ctx < NUM_COEFF_CONTEXTS);
                }
            }
        }
    }

    #[test]
    fn test_multiplier_quantisation_roundtrip() {
        for m in [0.5f32, 0.75, 1.0, 1.5, 2.0] {
            let restored = dequantize_multiplier(quantize_multiplier(m));
            assert!((restored - m).abs() < 0.01, "{m} -> {restored}");
        }
    }

    #[test]
    fn test_distance_zero_roundtrip_is_near_exact() {
        let frame = gradient_frame(16, 16);
        let options = EncodingOptions::lossy(100.0);
        let header = FrameHeader::default();
        let decoded = encode_decode(&frame, &options, &header);
        // Distance 0 quantises losslessly; residual error is float only
        let quality = psnr(&frame, &decoded);
        assert!(quality > 50.0, "distance 0 PSNR {quality:.2} dB");
    }
}
