//! Animation header

use jxlenc_bitstream::u32coder::{DURATION, GENERAL};
use jxlenc_bitstream::{BitReader, BitWriter};
use jxlenc_core::{AnimationConfig, OptionsError, Result};

/// Global animation parameters carried in the image metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationHeader {
    /// Ticks per second as a rational tps_numerator / tps_denominator
    pub tps_numerator: u32,
    pub tps_denominator: u32,
    /// 0 loops forever
    pub num_loops: u32,
    pub have_timecodes: bool,
}

impl Default for AnimationHeader {
    fn default() -> Self {
        Self {
            tps_numerator: 1000,
            tps_denominator: 1,
            num_loops: 0,
            have_timecodes: false,
        }
    }
}

impl AnimationHeader {
    /// Derive the header from the caller's animation config
    ///
    /// One tick per frame: the tick rate equals the frame rate.
    pub fn from_config(config: &AnimationConfig) -> Result<Self> {
        if config.fps <= 0.0 || config.tps_denominator == 0 {
            return Err(OptionsError::InconsistentAnimation.into());
        }
        let tps_numerator = (config.fps * config.tps_denominator as f32).round() as u32;
        if tps_numerator == 0 {
            return Err(OptionsError::InconsistentAnimation.into());
        }
        Ok(Self {
            tps_numerator,
            tps_denominator: config.tps_denominator,
            num_loops: config.loop_count,
            have_timecodes: false,
        })
    }

    /// Ticks per second as a float
    pub fn ticks_per_second(&self) -> f64 {
        self.tps_numerator as f64 / self.tps_denominator as f64
    }

    pub fn write(&self, writer: &mut BitWriter) -> Result<()> {
        writer.write_u32(self.tps_numerator, &GENERAL)?;
        writer.write_u32(self.tps_denominator, &GENERAL)?;
        writer.write_u32(self.num_loops, &DURATION)?;
        writer.write_bit(self.have_timecodes)?;
        Ok(())
    }

    pub fn read(reader: &mut BitReader) -> Result<Self> {
        Ok(Self {
            tps_numerator: reader.read_u32(&GENERAL)?,
            tps_denominator: reader.read_u32(&GENERAL)?,
            num_loops: reader.read_u32(&DURATION)?,
            have_timecodes: reader.read_bit()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jxlenc_core::FrameDurations;

    #[test]
    fn test_from_config() {
        let config = AnimationConfig {
            fps: 10.0,
            tps_denominator: 1,
            loop_count: 0,
            durations: FrameDurations::Uniform(1),
        };
        let header = AnimationHeader::from_config(&config).unwrap();
        assert_eq!(header.tps_numerator, 10);
        assert_eq!(header.tps_denominator, 1);
        assert!((header.ticks_per_second() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_fractional_fps() {
        let config = AnimationConfig {
            fps: 29.97,
            tps_denominator: 1001,
            loop_count: 3,
            durations: FrameDurations::Uniform(1),
        };
        let header = AnimationHeader::from_config(&config).unwrap();
        assert_eq!(header.tps_numerator, 30000);
        assert_eq!(header.num_loops, 3);
    }

    #[test]
    fn test_invalid_config() {
        let config = AnimationConfig {
            fps: -1.0,
            tps_denominator: 1,
            loop_count: 0,
            durations: FrameDurations::Uniform(1),
        };
        assert!(AnimationHeader::from_config(&config).is_err());
    }

    #[test]
    fn test_roundtrip() {
        let header = AnimationHeader {
            tps_numerator: 30000,
            tps_denominator: 1001,
            num_loops: 7,
            have_timecodes: true,
        };
        let mut writer = BitWriter::new();
        header.write(&mut writer).unwrap();
        let bytes = writer.finish().unwrap();
        let mut reader = BitReader::new(&bytes);
        assert_eq!(AnimationHeader::read(&mut reader).unwrap(), header);
    }
}
