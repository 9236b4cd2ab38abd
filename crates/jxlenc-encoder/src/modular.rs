//! Modular mode: bit-exact lossless compression
//!
//! Channels are materialised as signed 32-bit planes, decorrelated with the
//! reversible YCoCg-R transform, optionally squeezed into multi-resolution
//! bands, predicted per pixel through a meta-adaptive tree, and the zigzag
//! residuals are entropy coded. Float channels are carried as their raw bit
//! patterns so the round trip is exact; they skip the integer transforms.
//!
//! The subbitstream is: preamble (channel layout and transform flags),
//! per-channel MA trees, then one entropy body. Every section boundary is
//! byte-aligned. A mirroring reader lives here as well; the round-trip
//! tests lean on it.

use jxlenc_bitstream::entropy::{encode_tokens, EntropyConfig, TokenDecoder, TokenSink};
use jxlenc_bitstream::rle::{decode_rle, encode_rle};
use jxlenc_bitstream::u32coder::{COUNT, SIZE_DIM};
use jxlenc_bitstream::{BitReader, BitWriter};
use jxlenc_color::rct::{forward_rct, inverse_rct};
use jxlenc_core::{
    BufferPool, EncodingOptions, Error, ImageFrame, Result, SampleBuffer,
};
use jxlenc_transform::predict::{predict, unzigzag, zigzag, Neighbors};
use jxlenc_transform::squeeze::{forward_squeeze, inverse_squeeze, squeeze_plan};
use log::debug;

use crate::ma::{properties, MaTree};

/// One materialised channel plane
#[derive(Debug, Clone, PartialEq)]
pub struct ModularChannel {
    pub width: usize,
    pub height: usize,
    pub bits: u32,
    pub signed: bool,
    /// Raw float bit patterns (skips RCT and squeeze)
    pub raw_bits: bool,
    pub data: Vec<i32>,
}

/// Predictor clamp range from the serialised channel description
fn channel_range(
    bits: u32,
    signed: bool,
    raw_bits: bool,
    widened: bool,
    squeeze_steps: usize,
) -> (i32, i32) {
    if raw_bits || bits >= 31 {
        return (i32::MIN, i32::MAX);
    }
    if widened {
        let b = (bits + squeeze_steps as u32 + 2).min(30);
        return (-(1i32 << b), 1i32 << b);
    }
    if signed {
        (-(1i32 << (bits - 1)), (1i32 << (bits - 1)) - 1)
    } else {
        (0, (1i32 << bits) - 1)
    }
}

/// Materialise the main and extra channels of a frame
pub fn extract_channels(frame: &ImageFrame) -> Result<Vec<ModularChannel>> {
    let width = frame.width() as usize;
    let height = frame.height() as usize;
    let plane = width * height;
    let mut channels = Vec::with_capacity(frame.channels + frame.extra_channels.len());

    for c in 0..frame.channels {
        let data = extract_plane(&frame.buffer, c * plane, plane, frame.bits_per_sample, c)?;
        channels.push(ModularChannel {
            width,
            height,
            bits: frame.bits_per_sample,
            signed: frame.pixel_type.is_signed(),
            raw_bits: frame.pixel_type.is_float(),
            data,
        });
    }

    for (i, extra) in frame.extra_channels.iter().enumerate() {
        let shift = extra.info.dim_shift;
        let w = (frame.width() >> shift).max(1) as usize;
        let h = (frame.height() >> shift).max(1) as usize;
        let data = extract_plane(
            &extra.buffer,
            0,
            w * h,
            extra.info.bits_per_sample,
            frame.channels + i,
        )?;
        channels.push(ModularChannel {
            width: w,
            height: h,
            bits: extra.info.bits_per_sample,
            signed: false,
            raw_bits: matches!(extra.buffer, SampleBuffer::F32(_)),
            data,
        });
    }

    Ok(channels)
}

fn extract_plane(
    buffer: &SampleBuffer,
    offset: usize,
    len: usize,
    bits: u32,
    channel: usize,
) -> Result<Vec<i32>> {
    if len == 0 {
        return Err(Error::EmptyChannel(channel));
    }
    let max = if bits >= 31 { i64::MAX } else { (1i64 << bits) - 1 };
    let mut data = Vec::with_capacity(len);
    match buffer {
        SampleBuffer::U8(v) => {
            for &s in &v[offset..offset + len] {
                if (s as i64) > max {
                    return Err(Error::SampleOutOfRange {
                        value: s as i64,
                        bits,
                    });
                }
                data.push(s as i32);
            }
        }
        SampleBuffer::U16(v) => {
            for &s in &v[offset..offset + len] {
                if (s as i64) > max {
                    return Err(Error::SampleOutOfRange {
                        value: s as i64,
                        bits,
                    });
                }
                data.push(s as i32);
            }
        }
        SampleBuffer::I16(v) => {
            for &s in &v[offset..offset + len] {
                data.push(s as i32);
            }
        }
        SampleBuffer::F32(v) => {
            // Bit patterns keep the float round trip exact
            for &s in &v[offset..offset + len] {
                data.push(s.to_bits() as i32);
            }
        }
    }
    Ok(data)
}

/// Squeeze step budget from the effort level
fn squeeze_steps_for_effort(effort: u8) -> usize {
    match effort {
        1..=2 => 0,
        3..=5 => 2,
        6..=7 => 4,
        _ => 6,
    }
}

fn ma_depth_for_effort(effort: u8) -> u32 {
    match effort {
        1..=2 => 0,
        3..=5 => 1,
        6..=7 => 2,
        _ => 3,
    }
}

fn entropy_config_for_effort(effort: u8) -> EntropyConfig {
    EntropyConfig {
        num_streams: match effort {
            1..=4 => 1,
            5..=7 => 2,
            _ => 4,
        },
        allow_lz77: true,
        cluster_threshold: match effort {
            1..=3 => 0.5,
            4..=6 => 0.15,
            _ => 0.05,
        },
    }
}

/// Whether the reversible colour transform applies to these channels
fn rct_applicable(channels: &[ModularChannel]) -> bool {
    channels.len() >= 3
        && channels[..3].iter().all(|c| {
            !c.raw_bits
                && !c.signed
                && c.bits <= 16
                && c.width == channels[0].width
                && c.height == channels[0].height
        })
}

/// Encode one frame in modular mode
pub fn encode_frame(
    writer: &mut BitWriter,
    frame: &ImageFrame,
    options: &EncodingOptions,
    _pool: &BufferPool,
) -> Result<()> {
    let mut channels = extract_channels(frame)?;
    let num_main = frame.channels;

    // Reversible colour transform on the first three channels; alpha and
    // extra channels pass through
    let rct = rct_applicable(&channels[..num_main.min(channels.len())]);
    if rct {
        let (first, rest) = channels.split_at_mut(1);
        let (second, third) = rest.split_at_mut(1);
        let r = &mut first[0].data;
        let g = &mut second[0].data;
        let b = &mut third[0].data;
        for i in 0..r.len() {
            let (y, co, cg) = forward_rct(r[i], g[i], b[i]);
            r[i] = y;
            g[i] = co;
            b[i] = cg;
        }
    }

    // Multi-resolution squeeze, bounded by effort
    let max_steps = squeeze_steps_for_effort(options.effort);
    let mut squeezed = vec![false; channels.len()];
    for (c, channel) in channels.iter_mut().enumerate() {
        if channel.raw_bits || channel.bits > 16 || max_steps == 0 {
            continue;
        }
        let plan = squeeze_plan(channel.width, channel.height, max_steps);
        if plan.is_empty() {
            continue;
        }
        forward_squeeze(&mut channel.data, channel.width, &plan);
        squeezed[c] = true;
    }

    debug!(
        "modular frame: {} channels, rct={}, squeeze_steps={}, use_ans={}",
        channels.len(),
        rct,
        max_steps,
        options.use_ans
    );

    // Preamble
    writer.align_to_byte()?;
    writer.write_u32(channels.len() as u32, &COUNT)?;
    writer.write_bits(max_steps as u64, 4)?;
    writer.write_bit(rct)?;
    writer.write_bit(options.use_ans)?;
    for (c, channel) in channels.iter().enumerate() {
        writer.write_u32(channel.width as u32, &SIZE_DIM)?;
        writer.write_u32(channel.height as u32, &SIZE_DIM)?;
        writer.write_bits(channel.bits as u64, 6)?;
        writer.write_bit(channel.signed)?;
        writer.write_bit(channel.raw_bits)?;
        writer.write_bit(squeezed[c])?;
    }
    writer.align_to_byte()?;

    if options.use_ans {
        encode_body_ans(writer, &channels, &squeezed, rct, options, max_steps)
    } else {
        encode_body_rle(writer, &channels, &squeezed, rct, max_steps)
    }
}

fn clamp_range_for(
    channel: &ModularChannel,
    index: usize,
    rct: bool,
    squeezed: bool,
    max_steps: usize,
) -> (i32, i32) {
    let widened = (rct && index < 3) || squeezed;
    let steps = if squeezed {
        squeeze_plan(channel.width, channel.height, max_steps).len()
    } else {
        0
    };
    channel_range(channel.bits, channel.signed, channel.raw_bits, widened, steps)
}

fn encode_body_ans(
    writer: &mut BitWriter,
    channels: &[ModularChannel],
    squeezed: &[bool],
    rct: bool,
    options: &EncodingOptions,
    max_steps: usize,
) -> Result<()> {
    let depth = ma_depth_for_effort(options.effort);

    // Grow and serialise one tree per channel
    let mut trees = Vec::with_capacity(channels.len());
    let mut context_bases = Vec::with_capacity(channels.len());
    let mut total_contexts = 0usize;
    for (c, channel) in channels.iter().enumerate() {
        let (min, max) = clamp_range_for(channel, c, rct, squeezed[c], max_steps);
        let tree = if depth == 0 || total_contexts + 8 > 200 {
            MaTree::med_only()
        } else {
            MaTree::build(&channel.data, channel.width, channel.height, min, max, depth)
        };
        context_bases.push(total_contexts);
        total_contexts += tree.num_contexts();
        trees.push(tree);
    }
    for tree in &trees {
        tree.write(writer)?;
    }
    writer.align_to_byte()?;

    // Residual pass
    let mut sink = TokenSink::new();
    for (c, channel) in channels.iter().enumerate() {
        let (min, max) = clamp_range_for(channel, c, rct, squeezed[c], max_steps);
        let tree = &trees[c];
        let base = context_bases[c];
        for y in 0..channel.height {
            for x in 0..channel.width {
                let neighbors = Neighbors::at(&channel.data, channel.width, x, y);
                let leaf = tree.lookup(&properties(&neighbors));
                let predicted = predict(leaf.predictor, &neighbors, min, max);
                let residual = channel.data[y * channel.width + x].wrapping_sub(predicted);
                sink.push((base + leaf.context as usize) as u8, zigzag(residual));
            }
        }
    }

    let config = entropy_config_for_effort(options.effort);
    encode_tokens(writer, sink.tokens(), total_contexts.max(1), &config)
}

fn encode_body_rle(
    writer: &mut BitWriter,
    channels: &[ModularChannel],
    squeezed: &[bool],
    rct: bool,
    max_steps: usize,
) -> Result<()> {
    let mut values = Vec::new();
    for (c, channel) in channels.iter().enumerate() {
        let (min, max) = clamp_range_for(channel, c, rct, squeezed[c], max_steps);
        for y in 0..channel.height {
            for x in 0..channel.width {
                let neighbors = Neighbors::at(&channel.data, channel.width, x, y);
                let predicted = predict(
                    jxlenc_transform::predict::Predictor::Med,
                    &neighbors,
                    min,
                    max,
                );
                let residual = channel.data[y * channel.width + x].wrapping_sub(predicted);
                values.push(zigzag(residual));
            }
        }
    }
    encode_rle(writer, &values)
}

/// Decode a modular frame body; the exact mirror of [`encode_frame`]
pub fn decode_frame(reader: &mut BitReader) -> Result<Vec<ModularChannel>> {
    reader.align_to_byte()?;
    let num_channels = reader.read_u32(&COUNT)? as usize;
    if num_channels == 0 {
        return Err(Error::UnexpectedEof);
    }
    let max_steps = reader.read_bits(4)? as usize;
    let rct = reader.read_bit()?;
    let use_ans = reader.read_bit()?;

    let mut channels = Vec::with_capacity(num_channels);
    let mut squeezed = Vec::with_capacity(num_channels);
    for _ in 0..num_channels {
        let width = reader.read_u32(&SIZE_DIM)? as usize;
        let height = reader.read_u32(&SIZE_DIM)? as usize;
        let bits = reader.read_bits(6)? as u32;
        let signed = reader.read_bit()?;
        let raw_bits = reader.read_bit()?;
        squeezed.push(reader.read_bit()?);
        channels.push(ModularChannel {
            width,
            height,
            bits,
            signed,
            raw_bits,
            data: vec![0; width * height],
        });
    }
    reader.align_to_byte()?;

    if use_ans {
        decode_body_ans(reader, &mut channels, &squeezed, rct, max_steps)?;
    } else {
        decode_body_rle(reader, &mut channels, &squeezed, rct, max_steps)?;
    }

    // Undo the squeeze, then the colour transform
    for (c, channel) in channels.iter_mut().enumerate() {
        if squeezed[c] {
            let plan = squeeze_plan(channel.width, channel.height, max_steps);
            inverse_squeeze(&mut channel.data, channel.width, &plan);
        }
    }
    if rct {
        let (first, rest) = channels.split_at_mut(1);
        let (second, third) = rest.split_at_mut(1);
        let y = &mut first[0].data;
        let co = &mut second[0].data;
        let cg = &mut third[0].data;
        for i in 0..y.len() {
            let (r, g, b) = inverse_rct(y[i], co[i], cg[i]);
            y[i] = r;
            co[i] = g;
            cg[i] = b;
        }
    }
    Ok(channels)
}

fn decode_body_ans(
    reader: &mut BitReader,
    channels: &mut [ModularChannel],
    squeezed: &[bool],
    rct: bool,
    max_steps: usize,
) -> Result<()> {
    let mut trees = Vec::with_capacity(channels.len());
    let mut context_bases = Vec::with_capacity(channels.len());
    let mut total_contexts = 0usize;
    for _ in 0..channels.len() {
        let tree = MaTree::read(reader)?;
        context_bases.push(total_contexts);
        total_contexts += tree.num_contexts();
        trees.push(tree);
    }
    reader.align_to_byte()?;

    let mut decoder = TokenDecoder::parse(reader, total_contexts.max(1))?;
    for (c, channel) in channels.iter_mut().enumerate() {
        let (min, max) = clamp_range_for(channel, c, rct, squeezed[c], max_steps);
        let tree = &trees[c];
        let base = context_bases[c];
        for y in 0..channel.height {
            for x in 0..channel.width {
                let neighbors = Neighbors::at(&channel.data, channel.width, x, y);
                let leaf = tree.lookup(&properties(&neighbors));
                let predicted = predict(leaf.predictor, &neighbors, min, max);
                let token = decoder.next(reader, (base + leaf.context as usize) as u8)?;
                let residual = unzigzag(token);
                channel.data[y * channel.width + x] = predicted.wrapping_add(residual);
            }
        }
    }
    decoder.finish(reader)
}

fn decode_body_rle(
    reader: &mut BitReader,
    channels: &mut [ModularChannel],
    squeezed: &[bool],
    rct: bool,
    max_steps: usize,
) -> Result<()> {
    let values = decode_rle(reader)?;
    let expected: usize = channels.iter().map(|c| c.data.len()).sum();
    if values.len() != expected {
        return Err(Error::UnexpectedEof);
    }
    let mut cursor = 0;
    for (c, channel) in channels.iter_mut().enumerate() {
        let (min, max) = clamp_range_for(channel, c, rct, squeezed[c], max_steps);
        for y in 0..channel.height {
            for x in 0..channel.width {
                let neighbors = Neighbors::at(&channel.data, channel.width, x, y);
                let predicted = predict(
                    jxlenc_transform::predict::Predictor::Med,
                    &neighbors,
                    min,
                    max,
                );
                let residual = unzigzag(values[cursor]);
                cursor += 1;
                channel.data[y * channel.width + x] = predicted.wrapping_add(residual);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jxlenc_core::{ColorDescriptor, Dimensions, PixelType};

    fn test_frame(width: u32, height: u32, channels: usize) -> ImageFrame {
        let mut frame = ImageFrame::new(
            Dimensions::new(width, height),
            channels,
            PixelType::U8,
            ColorDescriptor::default(),
        )
        .unwrap();
        if let SampleBuffer::U8(data) = &mut frame.buffer {
            for (i, v) in data.iter_mut().enumerate() {
                *v = ((i * 31 + i / 7) % 256) as u8;
            }
        }
        frame
    }

    fn roundtrip(frame: &ImageFrame, options: &EncodingOptions) {
        let original = extract_channels(frame).unwrap();
        let pool = BufferPool::new();
        let mut writer = BitWriter::new();
        encode_frame(&mut writer, frame, options, &pool).unwrap();
        let bytes = writer.finish().unwrap();

        let mut reader = BitReader::new(&bytes);
        let decoded = decode_frame(&mut reader).unwrap();
        assert_eq!(reader.remaining_bytes(), 0);
        assert_eq!(decoded.len(), original.len());
        for (d, o) in decoded.iter().zip(original.iter()) {
            assert_eq!(d.data, o.data, "channel data must round-trip exactly");
        }
    }

    #[test]
    fn test_lossless_roundtrip_rgb() {
        let frame = test_frame(29, 17, 3);
        roundtrip(&frame, &EncodingOptions::lossless());
    }

    #[test]
    fn test_lossless_roundtrip_rgba() {
        let frame = test_frame(16, 16, 4);
        roundtrip(&frame, &EncodingOptions::lossless());
    }

    #[test]
    fn test_lossless_roundtrip_grayscale() {
        let frame = test_frame(64, 48, 1);
        roundtrip(&frame, &EncodingOptions::lossless());
    }

    #[test]
    fn test_lossless_all_efforts() {
        let frame = test_frame(33, 15, 3);
        for effort in 1..=9 {
            roundtrip(&frame, &EncodingOptions::lossless().effort(effort));
        }
    }

    #[test]
    fn test_rle_fallback_roundtrip() {
        let frame = test_frame(24, 24, 3);
        let mut options = EncodingOptions::lossless();
        options.use_ans = false;
        roundtrip(&frame, &options);
    }

    #[test]
    fn test_float_bit_patterns_roundtrip() {
        let mut frame = ImageFrame::new(
            Dimensions::new(8, 8),
            3,
            PixelType::F32,
            ColorDescriptor::default(),
        )
        .unwrap();
        if let SampleBuffer::F32(data) = &mut frame.buffer {
            for (i, v) in data.iter_mut().enumerate() {
                *v = (i as f32 * 0.173).sin() * 1e4;
            }
        }
        roundtrip(&frame, &EncodingOptions::lossless());
    }

    #[test]
    fn test_signed_samples_roundtrip() {
        let mut frame = ImageFrame::new(
            Dimensions::new(12, 10),
            1,
            PixelType::I16,
            ColorDescriptor::default(),
        )
        .unwrap();
        if let SampleBuffer::I16(data) = &mut frame.buffer {
            for (i, v) in data.iter_mut().enumerate() {
                *v = (i as i32 * 977 % 4001 - 2000) as i16;
            }
        }
        roundtrip(&frame, &EncodingOptions::lossless());
    }

    #[test]
    fn test_solid_color_compresses() {
        let mut frame = ImageFrame::new(
            Dimensions::new(64, 64),
            3,
            PixelType::U8,
            ColorDescriptor::default(),
        )
        .unwrap();
        if let SampleBuffer::U8(data) = &mut frame.buffer {
            data.fill(128);
        }
        let pool = BufferPool::new();
        let mut writer = BitWriter::new();
        encode_frame(&mut writer, &frame, &EncodingOptions::lossless(), &pool).unwrap();
        let bytes = writer.finish().unwrap();
        assert!(
            bytes.len() < 64 * 64 * 3 / 10,
            "solid colour should compress well, got {} bytes",
            bytes.len()
        );
        roundtrip(&frame, &EncodingOptions::lossless());
    }

    #[test]
    fn test_sample_out_of_range() {
        let mut frame = test_frame(4, 4, 1);
        frame.bits_per_sample = 4;
        let result = extract_channels(&frame);
        assert!(matches!(result, Err(Error::SampleOutOfRange { .. })));
    }

    #[test]
    fn test_extraction_preserves_planes() {
        let frame = test_frame(5, 3, 3);
        let channels = extract_channels(&frame).unwrap();
        assert_eq!(channels.len(), 3);
        assert_eq!(channels[0].data.len(), 15);
        assert_eq!(channels[0].data[0], frame.get(0, 0, 0).unwrap() as i32);
        assert_eq!(channels[2].data[14], frame.get(4, 2, 2).unwrap() as i32);
    }
}
