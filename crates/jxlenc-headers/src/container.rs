//! ISOBMFF-style container
//!
//! A file is the 12-byte signature box followed by `ftyp` and the
//! codestream and metadata boxes. Each box is a 4-byte big-endian length, a
//! 4-byte type, and the payload; length 0 extends to end of file and
//! length 1 switches to an 8-byte extended length. The raw-codestream path
//! bypasses the container entirely.

use byteorder::{BigEndian, WriteBytesExt};
use jxlenc_core::{Error, Result};

/// The 12-byte JXL signature box at the start of every container file
pub const CONTAINER_SIGNATURE: [u8; 12] = [
    0x00, 0x00, 0x00, 0x0C, // box size = 12
    0x4A, 0x58, 0x4C, 0x20, // "JXL "
    0x0D, 0x0A, 0x87, 0x0A, // CR LF 0x87 LF
];

/// File type brand
pub const BRAND_JXL: [u8; 4] = *b"jxl ";

/// Box types the writer knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxType {
    /// `ftyp`
    FileType,
    /// `jxlc` - complete codestream
    Codestream,
    /// `jxlp` - partial codestream piece
    PartialCodestream,
    /// `Exif` metadata
    Exif,
    /// `xml ` (XMP) metadata
    Xml,
    /// `jumb` (JUMBF) metadata
    Jumbf,
    /// `colr` ICC or enumerated colour
    ColorProfile,
    Unknown([u8; 4]),
}

impl BoxType {
    pub fn fourcc(&self) -> [u8; 4] {
        match self {
            BoxType::FileType => *b"ftyp",
            BoxType::Codestream => *b"jxlc",
            BoxType::PartialCodestream => *b"jxlp",
            BoxType::Exif => *b"Exif",
            BoxType::Xml => *b"xml ",
            BoxType::Jumbf => *b"jumb",
            BoxType::ColorProfile => *b"colr",
            BoxType::Unknown(fourcc) => *fourcc,
        }
    }

    pub fn from_fourcc(fourcc: &[u8; 4]) -> Self {
        match fourcc {
            b"ftyp" => BoxType::FileType,
            b"jxlc" => BoxType::Codestream,
            b"jxlp" => BoxType::PartialCodestream,
            b"Exif" => BoxType::Exif,
            b"xml " => BoxType::Xml,
            b"jumb" => BoxType::Jumbf,
            b"colr" => BoxType::ColorProfile,
            _ => BoxType::Unknown(*fourcc),
        }
    }
}

/// One container box
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerBox {
    pub box_type: BoxType,
    pub payload: Vec<u8>,
    /// Omit the length and extend to end of file; only valid for the last box
    pub extends_to_eof: bool,
}

impl ContainerBox {
    pub fn new(box_type: BoxType, payload: Vec<u8>) -> Self {
        Self {
            box_type,
            payload,
            extends_to_eof: false,
        }
    }

    /// `ftyp` with the jxl brand
    pub fn file_type() -> Self {
        let mut payload = Vec::with_capacity(12);
        payload.extend_from_slice(&BRAND_JXL);
        payload.extend_from_slice(&0u32.to_be_bytes()); // minor version
        payload.extend_from_slice(&BRAND_JXL); // compatible brands
        Self::new(BoxType::FileType, payload)
    }

    /// `jxlc` holding a complete codestream
    pub fn codestream(codestream: Vec<u8>) -> Self {
        Self::new(BoxType::Codestream, codestream)
    }

    /// `jxlp` holding one piece of a split codestream
    ///
    /// The high bit of the index marks the final piece.
    pub fn partial_codestream(index: u32, last: bool, piece: Vec<u8>) -> Self {
        let mut payload = Vec::with_capacity(4 + piece.len());
        let tagged = if last { index | 0x8000_0000 } else { index };
        payload.extend_from_slice(&tagged.to_be_bytes());
        payload.extend_from_slice(&piece);
        Self::new(BoxType::PartialCodestream, payload)
    }

    /// `Exif` box: 4-byte TIFF-header offset then the raw EXIF payload
    pub fn exif(data: &[u8]) -> Self {
        let mut payload = Vec::with_capacity(4 + data.len());
        payload.extend_from_slice(&0u32.to_be_bytes());
        payload.extend_from_slice(data);
        Self::new(BoxType::Exif, payload)
    }

    /// `xml ` box holding XMP
    pub fn xmp(data: &[u8]) -> Self {
        Self::new(BoxType::Xml, data.to_vec())
    }

    /// `jumb` box holding JUMBF metadata
    pub fn jumbf(data: &[u8]) -> Self {
        Self::new(BoxType::Jumbf, data.to_vec())
    }

    /// `colr` box holding an ICC profile
    pub fn icc_profile(data: &[u8]) -> Self {
        let mut payload = Vec::with_capacity(4 + data.len());
        payload.extend_from_slice(b"prof");
        payload.extend_from_slice(data);
        Self::new(BoxType::ColorProfile, payload)
    }

    /// Serialise the box; the length field is computed from the payload
    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let fourcc = self.box_type.fourcc();
        if self.extends_to_eof {
            out.write_u32::<BigEndian>(0)?;
            out.extend_from_slice(&fourcc);
            out.extend_from_slice(&self.payload);
            return Ok(());
        }
        let total = 8u64 + self.payload.len() as u64;
        if total <= u32::MAX as u64 {
            out.write_u32::<BigEndian>(total as u32)?;
            out.extend_from_slice(&fourcc);
        } else {
            out.write_u32::<BigEndian>(1)?;
            out.extend_from_slice(&fourcc);
            out.write_u64::<BigEndian>(total + 8)?;
        }
        out.extend_from_slice(&self.payload);
        Ok(())
    }
}

/// Optional metadata attached to a container
#[derive(Debug, Clone, Default)]
pub struct ContainerMetadata {
    pub exif: Option<Vec<u8>>,
    pub xmp: Option<Vec<u8>>,
    pub jumbf: Option<Vec<u8>>,
    pub icc_profile: Option<Vec<u8>>,
}

/// A complete container file
#[derive(Debug, Clone)]
pub struct Container {
    pub boxes: Vec<ContainerBox>,
}

impl Container {
    /// Standard layout: signature, ftyp, metadata boxes, codestream
    pub fn with_codestream(codestream: Vec<u8>, metadata: &ContainerMetadata) -> Self {
        let mut boxes = vec![ContainerBox::file_type()];
        if let Some(exif) = &metadata.exif {
            boxes.push(ContainerBox::exif(exif));
        }
        if let Some(xmp) = &metadata.xmp {
            boxes.push(ContainerBox::xmp(xmp));
        }
        if let Some(jumbf) = &metadata.jumbf {
            boxes.push(ContainerBox::jumbf(jumbf));
        }
        if let Some(icc) = &metadata.icc_profile {
            boxes.push(ContainerBox::icc_profile(icc));
        }
        boxes.push(ContainerBox::codestream(codestream));
        Self { boxes }
    }

    /// Serialise the whole file
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        for (i, container_box) in self.boxes.iter().enumerate() {
            if container_box.extends_to_eof && i + 1 != self.boxes.len() {
                return Err(Error::InternalInvariant(
                    "only the final box may extend to end of file".into(),
                ));
            }
        }
        let mut out = Vec::new();
        out.extend_from_slice(&CONTAINER_SIGNATURE);
        for container_box in &self.boxes {
            container_box.write(&mut out)?;
        }
        Ok(out)
    }
}
