//! Frame overlays: noise, patches, splines
//!
//! Each overlay family is a dedicated byte-aligned subsection of the frame
//! body, emitted before the coefficient data. Patches reference one of the
//! four reference slots by index; spline detection is a simple strong-edge
//! scan, with the full serialisation surface implemented.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use jxlenc_bitstream::u32coder::{COORD, COUNT};
use jxlenc_bitstream::{BitReader, BitWriter};
use jxlenc_core::{NoiseConfig, PatchConfig, Result, SplineConfig};
use jxlenc_transform::predict::{unzigzag, zigzag};
use log::debug;

use crate::reference::ReferenceFrame;

/// Noise parameters as serialised in the frame body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoiseParams {
    /// Amplitude quantised to 1/255 steps
    pub amplitude: u8,
    /// Strengths quantised to 1/32 steps
    pub luma_strength: u8,
    pub chroma_strength: u8,
    pub seed: u32,
}

impl NoiseParams {
    /// Resolve the caller's config; a zero seed draws from the wall clock
    pub fn from_config(config: &NoiseConfig) -> Self {
        let seed = if config.seed == 0 {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default();
            now.subsec_nanos().max(1)
        } else {
            config.seed
        };
        Self {
            amplitude: (config.amplitude.clamp(0.0, 1.0) * 255.0).round() as u8,
            luma_strength: (config.luma_strength.clamp(0.0, 8.0) * 32.0).round() as u8,
            chroma_strength: (config.chroma_strength.clamp(0.0, 8.0) * 32.0).round() as u8,
            seed,
        }
    }

    pub fn write(&self, writer: &mut BitWriter) -> Result<()> {
        writer.align_to_byte()?;
        writer.write_bytes(&[self.amplitude, self.luma_strength, self.chroma_strength])?;
        writer.write_bytes(&self.seed.to_le_bytes())?;
        Ok(())
    }

    pub fn read(reader: &mut BitReader) -> Result<Self> {
        reader.align_to_byte()?;
        let head = reader.read_bytes(3)?;
        let (amplitude, luma_strength, chroma_strength) = (head[0], head[1], head[2]);
        let seed_bytes = reader.read_bytes(4)?;
        Ok(Self {
            amplitude,
            luma_strength,
            chroma_strength,
            seed: u32::from_le_bytes([seed_bytes[0], seed_bytes[1], seed_bytes[2], seed_bytes[3]]),
        })
    }
}

/// One rectangular region copied from a reference slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Patch {
    /// Destination in the current frame
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Reference slot 1..=4
    pub slot: u8,
    /// Source position inside the reference
    pub src_x: u32,
    pub src_y: u32,
}

/// Search one reference frame for tiles that reappear in the current frame
///
/// Tiles are hashed over the reference; hits are verified sample-exact
/// against the similarity threshold before a patch is recorded.
pub fn find_patches(
    planes: &[Vec<i32>],
    width: usize,
    height: usize,
    slot: u8,
    reference: &ReferenceFrame,
    config: &PatchConfig,
) -> Vec<Patch> {
    let tile = config.min_patch_size.clamp(8, 64) as usize;
    if planes.is_empty()
        || reference.planes.len() < planes.len()
        || width < tile
        || height < tile
    {
        return Vec::new();
    }

    // Hash every aligned tile of the reference
    let mut index: HashMap<u64, (usize, usize)> = HashMap::new();
    let ref_w = reference.width;
    let ref_h = reference.height;
    let mut sy = 0;
    while sy + tile <= ref_h {
        let mut sx = 0;
        while sx + tile <= ref_w {
            let hash = tile_hash(&reference.planes, ref_w, sx, sy, tile);
            index.entry(hash).or_insert((sx, sy));
            sx += tile;
        }
        sy += tile;
    }

    let max_error =
        ((1.0 - config.similarity_threshold.clamp(0.0, 1.0)) * 255.0) as i64;
    let mut patches = Vec::new();
    let mut dy = 0;
    while dy + tile <= height && (patches.len() as u32) < config.max_patches_per_frame {
        let mut dx = 0;
        while dx + tile <= width && (patches.len() as u32) < config.max_patches_per_frame {
            let hash = tile_hash(planes, width, dx, dy, tile);
            if let Some(&(sx, sy)) = index.get(&hash) {
                if tile_error(planes, width, dx, dy, &reference.planes, ref_w, sx, sy, tile)
                    <= max_error
                {
                    patches.push(Patch {
                        x: dx as u32,
                        y: dy as u32,
                        width: tile as u32,
                        height: tile as u32,
                        slot,
                        src_x: sx as u32,
                        src_y: sy as u32,
                    });
                }
            }
            dx += tile;
        }
        dy += tile;
    }
    debug!("patch search found {} patches", patches.len());
    patches
}

fn tile_hash(planes: &[Vec<i32>], stride: usize, x: usize, y: usize, tile: usize) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for plane in planes {
        for row in 0..tile {
            for col in 0..tile {
                let v = plane[(y + row) * stride + (x + col)] as u64;
                hash ^= v.wrapping_add(0x9e37_79b9_7f4a_7c15);
                hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
            }
        }
    }
    hash
}

#[allow(clippy::too_many_arguments)]
fn tile_error(
    planes: &[Vec<i32>],
    stride: usize,
    x: usize,
    y: usize,
    ref_planes: &[Vec<i32>],
    ref_stride: usize,
    sx: usize,
    sy: usize,
    tile: usize,
) -> i64 {
    let mut worst = 0i64;
    for (plane, ref_plane) in planes.iter().zip(ref_planes.iter()) {
        for row in 0..tile {
            for col in 0..tile {
                let a = plane[(y + row) * stride + (x + col)] as i64;
                let b = ref_plane[(sy + row) * ref_stride + (sx + col)] as i64;
                worst = worst.max((a - b).abs());
            }
        }
    }
    worst
}

/// Serialise a patch list
pub fn write_patches(writer: &mut BitWriter, patches: &[Patch]) -> Result<()> {
    writer.align_to_byte()?;
    writer.write_u32(patches.len() as u32, &COUNT)?;
    for patch in patches {
        writer.write_bits((patch.slot - 1) as u64, 2)?;
        writer.write_u32(patch.x, &COORD)?;
        writer.write_u32(patch.y, &COORD)?;
        writer.write_u32(patch.width, &COORD)?;
        writer.write_u32(patch.height, &COORD)?;
        writer.write_u32(patch.src_x, &COORD)?;
        writer.write_u32(patch.src_y, &COORD)?;
    }
    writer.align_to_byte()?;
    Ok(())
}

/// Mirror of [`write_patches`]
pub fn read_patches(reader: &mut BitReader) -> Result<Vec<Patch>> {
    reader.align_to_byte()?;
    let count = reader.read_u32(&COUNT)? as usize;
    let mut patches = Vec::with_capacity(count);
    for _ in 0..count {
        let slot = reader.read_bits(2)? as u8 + 1;
        patches.push(Patch {
            slot,
            x: reader.read_u32(&COORD)?,
            y: reader.read_u32(&COORD)?,
            width: reader.read_u32(&COORD)?,
            height: reader.read_u32(&COORD)?,
            src_x: reader.read_u32(&COORD)?,
            src_y: reader.read_u32(&COORD)?,
        });
    }
    reader.align_to_byte()?;
    Ok(patches)
}

/// One spline: control points plus DCT-coded colour and width variation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spline {
    pub points: Vec<(i32, i32)>,
    /// Quantised colour DCT coefficients per channel
    pub color_dct: [[i32; 4]; 3],
    /// Quantised width (sigma) DCT coefficients
    pub sigma_dct: [i32; 4],
}

/// The spline overlay section
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SplineOverlay {
    pub quantization_adjustment: i8,
    pub splines: Vec<Spline>,
}

impl SplineOverlay {
    /// Seed splines from columns with strong mean horizontal gradients
    ///
    /// Detection is deliberately minimal; the serialisation surface is the
    /// contract here.
    pub fn detect(
        luma: &[f32],
        width: usize,
        height: usize,
        config: &SplineConfig,
    ) -> Self {
        let mut splines = Vec::new();
        if width >= 2 && config.edge_threshold > 0.0 {
            for x in 1..width - 1 {
                if splines.len() as u32 >= config.max_splines_per_frame {
                    break;
                }
                let mut total = 0.0f32;
                for y in 0..height {
                    total += (luma[y * width + x + 1] - luma[y * width + x - 1]).abs();
                }
                if total / height as f32 > config.edge_threshold {
                    splines.push(Spline {
                        points: vec![(x as i32, 0), (x as i32, height as i32 - 1)],
                        color_dct: [[0; 4]; 3],
                        sigma_dct: [32, 0, 0, 0],
                    });
                }
            }
        }
        Self {
            quantization_adjustment: config.quantization_adjustment,
            splines,
        }
    }

    pub fn write(&self, writer: &mut BitWriter) -> Result<()> {
        writer.align_to_byte()?;
        writer.write_bits(self.quantization_adjustment as u8 as u64, 8)?;
        writer.write_u32(self.splines.len() as u32, &COUNT)?;
        for spline in &self.splines {
            writer.write_u32(spline.points.len() as u32, &COUNT)?;
            let (mut px, mut py) = (0i32, 0i32);
            for &(x, y) in &spline.points {
                writer.write_u32(zigzag(x.wrapping_sub(px)), &COORD)?;
                writer.write_u32(zigzag(y.wrapping_sub(py)), &COORD)?;
                px = x;
                py = y;
            }
            for channel in &spline.color_dct {
                for &coeff in channel {
                    writer.write_u32(zigzag(coeff), &COORD)?;
                }
            }
            for &coeff in &spline.sigma_dct {
                writer.write_u32(zigzag(coeff), &COORD)?;
            }
        }
        writer.align_to_byte()?;
        Ok(())
    }

    pub fn read(reader: &mut BitReader) -> Result<Self> {
        reader.align_to_byte()?;
        let quantization_adjustment = reader.read_bits(8)? as u8 as i8;
        let count = reader.read_u32(&COUNT)? as usize;
        let mut splines = Vec::with_capacity(count);
        for _ in 0..count {
            let num_points = reader.read_u32(&COUNT)? as usize;
            let mut points = Vec::with_capacity(num_points);
            let (mut px, mut py) = (0i32, 0i32);
            for _ in 0..num_points {
                px = px.wrapping_add(unzigzag(reader.read_u32(&COORD)?));
                py = py.wrapping_add(unzigzag(reader.read_u32(&COORD)?));
                points.push((px, py));
            }
            let mut color_dct = [[0i32; 4]; 3];
            for channel in color_dct.iter_mut() {
                for coeff in channel.iter_mut() {
                    *coeff = unzigzag(reader.read_u32(&COORD)?);
                }
            }
            let mut sigma_dct = [0i32; 4];
            for coeff in sigma_dct.iter_mut() {
                *coeff = unzigzag(reader.read_u32(&COORD)?);
            }
            splines.push(Spline {
                points,
                color_dct,
                sigma_dct,
            });
        }
        reader.align_to_byte()?;
        Ok(Self {
            quantization_adjustment,
            splines,
        })
    }
}
