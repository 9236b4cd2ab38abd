//! Lossless end-to-end tests
//!
//! Every lossless encode must decode back to the exact input samples.

use jxlenc::decode::{decode_bytes, DecodedFrame};
use jxlenc::{
    extract_channels, AlphaMode, ColorDescriptor, Dimensions, Encoder, EncodingOptions,
    ImageFrame, PixelType, Primaries, SampleBuffer, TransferFunction,
};

fn assert_lossless_roundtrip(frame: &ImageFrame, options: EncodingOptions) {
    let original = extract_channels(frame).unwrap();
    let encoder = Encoder::new(options).unwrap();
    let encoded = encoder.encode(frame).unwrap();
    let decoded = decode_bytes(&encoded.bytes).unwrap();
    assert_eq!(decoded.frames.len(), 1);
    match &decoded.frames[0] {
        DecodedFrame::Modular { channels, .. } => {
            assert_eq!(channels.len(), original.len());
            for (restored, expected) in channels.iter().zip(original.iter()) {
                assert_eq!(restored.data, expected.data, "pixel data must be bit-exact");
            }
        }
        DecodedFrame::VarDct { .. } => panic!("lossless encode must use modular mode"),
    }
}

#[test]
fn test_lossless_checkerboard() {
    // 8x8 RGB, 16 on one diagonal parity, 240 on the other
    let mut frame = ImageFrame::new(
        Dimensions::new(8, 8),
        3,
        PixelType::U8,
        ColorDescriptor::default(),
    )
    .unwrap();
    for y in 0..8 {
        for x in 0..8 {
            let value = if (x + y) % 2 == 0 { 16 } else { 240 };
            for c in 0..3 {
                frame.set(x, y, c, value).unwrap();
            }
        }
    }

    let encoder = Encoder::new(EncodingOptions::lossless().container(false)).unwrap();
    let encoded = encoder.encode(&frame).unwrap();
    assert_eq!(&encoded.bytes[0..2], &[0xFF, 0x0A]);

    assert_lossless_roundtrip(&frame, EncodingOptions::lossless().container(false));
}

#[test]
fn test_lossless_rgba_premultiplied_opaque() {
    let mut frame = ImageFrame::new(
        Dimensions::new(64, 64),
        4,
        PixelType::U8,
        ColorDescriptor::default(),
    )
    .unwrap();
    frame.alpha_mode = AlphaMode::Premultiplied;
    if let SampleBuffer::U8(data) = &mut frame.buffer {
        let plane = 64 * 64;
        for i in 0..plane {
            data[i] = (i % 256) as u8;
            data[plane + i] = ((i * 3) % 256) as u8;
            data[2 * plane + i] = ((i * 7) % 256) as u8;
            data[3 * plane + i] = 255;
        }
    }

    let encoder = Encoder::new(EncodingOptions::lossless().container(false)).unwrap();
    let encoded = encoder.encode(&frame).unwrap();
    let decoded = decode_bytes(&encoded.bytes).unwrap();
    assert_eq!(decoded.metadata.alpha_mode, AlphaMode::Premultiplied);

    match &decoded.frames[0] {
        DecodedFrame::Modular { channels, .. } => {
            assert_eq!(channels.len(), 4);
            assert!(
                channels[3].data.iter().all(|&v| v == 255),
                "alpha must stay fully opaque"
            );
        }
        _ => panic!("expected modular frame"),
    }
    assert_lossless_roundtrip(&frame, EncodingOptions::lossless().container(false));
}

#[test]
fn test_lossless_hdr_float() {
    // 16x16 RGB f32, Rec.2020 primaries with the PQ transfer
    let color = ColorDescriptor {
        primaries: Primaries::Rec2020,
        transfer: TransferFunction::Pq,
        ..ColorDescriptor::default()
    };
    let mut frame =
        ImageFrame::new(Dimensions::new(16, 16), 3, PixelType::F32, color).unwrap();
    if let SampleBuffer::F32(data) = &mut frame.buffer {
        for (i, v) in data.iter_mut().enumerate() {
            *v = ((i as f32) * 0.731).sin().abs() * 0.9 + 0.05;
        }
    }

    let encoder = Encoder::new(EncodingOptions::lossless().container(false)).unwrap();
    let encoded = encoder.encode(&frame).unwrap();
    let decoded = decode_bytes(&encoded.bytes).unwrap();

    assert_eq!(decoded.metadata.color.primaries, Primaries::Rec2020);
    assert_eq!(decoded.metadata.color.transfer, TransferFunction::Pq);
    assert_eq!(decoded.metadata.bit_depth.bits_per_sample, 32);
    assert!(decoded.metadata.bit_depth.exp_bits > 0);
    assert!(decoded.metadata.tone_mapping.is_some());

    // Float samples must come back bit-exact
    assert_lossless_roundtrip(&frame, EncodingOptions::lossless().container(false));
}

#[test]
fn test_lossless_signed_samples() {
    let mut frame = ImageFrame::new(
        Dimensions::new(16, 16),
        1,
        PixelType::I16,
        ColorDescriptor::default(),
    )
    .unwrap();
    if let SampleBuffer::I16(data) = &mut frame.buffer {
        for (i, v) in data.iter_mut().enumerate() {
            // Hounsfield-style values around zero
            *v = ((i as i32 * 53) % 3000 - 1000) as i16;
        }
    }
    assert_lossless_roundtrip(&frame, EncodingOptions::lossless().container(false));
}

#[test]
fn test_lossless_rle_fallback() {
    let mut frame = ImageFrame::new(
        Dimensions::new(32, 32),
        3,
        PixelType::U8,
        ColorDescriptor::default(),
    )
    .unwrap();
    if let SampleBuffer::U8(data) = &mut frame.buffer {
        for (i, v) in data.iter_mut().enumerate() {
            *v = ((i / 64) % 256) as u8;
        }
    }
    let mut options = EncodingOptions::lossless().container(false);
    options.use_ans = false;
    assert_lossless_roundtrip(&frame, options);
}

#[test]
fn test_lossless_across_efforts() {
    let mut frame = ImageFrame::new(
        Dimensions::new(21, 13),
        3,
        PixelType::U8,
        ColorDescriptor::default(),
    )
    .unwrap();
    if let SampleBuffer::U8(data) = &mut frame.buffer {
        for (i, v) in data.iter_mut().enumerate() {
            *v = ((i * 89) % 256) as u8;
        }
    }
    for effort in [1, 3, 5, 7, 9] {
        assert_lossless_roundtrip(
            &frame,
            EncodingOptions::lossless().container(false).effort(effort),
        );
    }
}

#[test]
fn test_orientation_clamped_on_ingest() {
    let mut frame = ImageFrame::new(
        Dimensions::new(4, 4),
        3,
        PixelType::U8,
        ColorDescriptor::default(),
    )
    .unwrap();
    frame.set_orientation(9);
    assert_eq!(frame.orientation.value(), 8);
    frame.set_orientation(0);
    assert_eq!(frame.orientation.value(), 1);

    frame.set_orientation(6);
    let encoder = Encoder::new(EncodingOptions::lossless().container(false)).unwrap();
    let encoded = encoder.encode(&frame).unwrap();
    let decoded = decode_bytes(&encoded.bytes).unwrap();
    assert_eq!(decoded.metadata.orientation.value(), 6);
}
