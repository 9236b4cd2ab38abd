//! Codestream and container layout tests

use jxlenc::decode::decode_bytes;
use jxlenc::{
    ColorDescriptor, Dimensions, Encoder, EncodingOptions, ImageFrame, PixelType, SampleBuffer,
    CONTAINER_SIGNATURE, GROUP_TERMINATOR,
};

fn simple_frame(width: u32, height: u32) -> ImageFrame {
    let mut frame = ImageFrame::new(
        Dimensions::new(width, height),
        3,
        PixelType::U8,
        ColorDescriptor::default(),
    )
    .unwrap();
    if let SampleBuffer::U8(data) = &mut frame.buffer {
        for (i, v) in data.iter_mut().enumerate() {
            *v = ((i * 11) % 256) as u8;
        }
    }
    frame
}

#[test]
fn test_raw_codestream_signature() {
    let encoder = Encoder::new(EncodingOptions::lossless().container(false)).unwrap();
    let encoded = encoder.encode(&simple_frame(16, 16)).unwrap();
    assert_eq!(&encoded.bytes[0..2], &[0xFF, 0x0A]);
}

#[test]
fn test_container_layout() {
    let encoder = Encoder::new(EncodingOptions::lossless().container(true)).unwrap();
    let encoded = encoder.encode(&simple_frame(16, 16)).unwrap();
    let bytes = &encoded.bytes;

    // 12-byte signature box, then ftyp with the jxl brand
    assert_eq!(&bytes[0..12], &CONTAINER_SIGNATURE);
    assert_eq!(&bytes[16..20], b"ftyp");
    assert_eq!(&bytes[20..24], b"jxl ");

    // The embedded codestream starts with the codestream magic
    let decoded = decode_bytes(bytes).unwrap();
    assert_eq!(decoded.size.width, 16);
    assert_eq!(decoded.size.height, 16);
}

#[test]
fn test_container_and_raw_hold_same_codestream() {
    let frame = simple_frame(24, 8);
    let raw = Encoder::new(EncodingOptions::lossless().container(false))
        .unwrap()
        .encode(&frame)
        .unwrap();
    let contained = Encoder::new(EncodingOptions::lossless().container(true))
        .unwrap()
        .encode(&frame)
        .unwrap();
    let extracted = jxlenc::decode::extract_codestream(&contained.bytes).unwrap();
    assert_eq!(extracted, raw.bytes);
}

#[test]
fn test_frame_ends_with_terminator() {
    let encoder = Encoder::new(EncodingOptions::lossless().container(false)).unwrap();
    let encoded = encoder.encode(&simple_frame(8, 8)).unwrap();
    let tail = &encoded.bytes[encoded.bytes.len() - 2..];
    assert_eq!(tail, &GROUP_TERMINATOR);
}

#[test]
fn test_deterministic_output() {
    let frame = simple_frame(32, 32);
    let a = Encoder::new(EncodingOptions::lossy(85.0).container(false))
        .unwrap()
        .encode(&frame)
        .unwrap();
    let b = Encoder::new(EncodingOptions::lossy(85.0).container(false))
        .unwrap()
        .encode(&frame)
        .unwrap();
    assert_eq!(a.bytes, b.bytes, "same input and options must be byte-identical");
}

#[test]
fn test_size_header_variants() {
    for (w, h) in [(1, 1), (8, 8), (512, 4), (513, 4)] {
        let encoder = Encoder::new(EncodingOptions::lossless().container(false)).unwrap();
        let encoded = encoder.encode(&simple_frame(w, h)).unwrap();
        let decoded = decode_bytes(&encoded.bytes).unwrap();
        assert_eq!(decoded.size.width, w);
        assert_eq!(decoded.size.height, h);
    }
}

#[test]
fn test_odd_dimensions_roundtrip() {
    // Exercises edge padding in VarDCT and odd squeeze bands in modular
    for options in [
        EncodingOptions::lossless().container(false),
        EncodingOptions::lossy(88.0).container(false),
    ] {
        let encoder = Encoder::new(options).unwrap();
        let encoded = encoder.encode(&simple_frame(37, 23)).unwrap();
        let decoded = decode_bytes(&encoded.bytes).unwrap();
        assert_eq!(decoded.size.width, 37);
        assert_eq!(decoded.size.height, 23);
        assert_eq!(decoded.frames.len(), 1);
    }
}
