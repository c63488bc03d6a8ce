//! PCM layout of a decoded audio asset.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Signed integer sample encoding, selected from the sample width.
///
/// Samples are little-endian. Every format widens losslessly into `i32`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    I8,
    I16,
    I24,
    I32,
}

impl SampleFormat {
    /// Select the format for a sample width in bytes.
    pub fn from_width(width: usize) -> Result<Self> {
        match width {
            1 => Ok(Self::I8),
            2 => Ok(Self::I16),
            3 => Ok(Self::I24),
            4 => Ok(Self::I32),
            other => Err(Error::UnsupportedSampleWidth(other)),
        }
    }

    /// Width of one sample in bytes.
    pub const fn width(self) -> usize {
        match self {
            Self::I8 => 1,
            Self::I16 => 2,
            Self::I24 => 3,
            Self::I32 => 4,
        }
    }

    /// Width of one sample in bits.
    pub const fn bits(self) -> u32 {
        self.width() as u32 * 8
    }

    /// Decode one sample. `bytes` must hold exactly [`Self::width`] bytes.
    pub fn decode(self, bytes: &[u8]) -> i32 {
        match self {
            Self::I8 => i32::from(bytes[0] as i8),
            Self::I16 => i32::from(i16::from_le_bytes([bytes[0], bytes[1]])),
            // Place the 3 bytes in the high end, then shift back to sign-extend.
            Self::I24 => i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]) >> 8,
            Self::I32 => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        }
    }

    /// Encode one sample into `out`, truncating to the format width.
    pub fn encode(self, sample: i32, out: &mut [u8]) {
        let bytes = sample.to_le_bytes();
        out[..self.width()].copy_from_slice(&bytes[..self.width()]);
    }
}

/// Immutable geometry of a PCM source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioGeometry {
    channels: u16,
    format: SampleFormat,
    frame_rate: u32,
    frame_count: u64,
}

impl AudioGeometry {
    /// Create a geometry, rejecting widths outside the supported set.
    pub fn new(
        channels: u16,
        sample_width: usize,
        frame_rate: u32,
        frame_count: u64,
    ) -> Result<Self> {
        let format = SampleFormat::from_width(sample_width)?;
        if channels == 0 {
            return Err(Error::InvalidGeometry(
                "channel count must be at least 1".to_string(),
            ));
        }
        if frame_rate == 0 {
            return Err(Error::InvalidGeometry(
                "frame rate must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            channels,
            format,
            frame_rate,
            frame_count,
        })
    }

    /// Create a geometry for `byte_len` bytes of interleaved PCM.
    pub fn from_byte_len(
        channels: u16,
        sample_width: usize,
        frame_rate: u32,
        byte_len: usize,
    ) -> Result<Self> {
        let mut geometry = Self::new(channels, sample_width, frame_rate, 0)?;
        let frame_size = geometry.frame_size();
        if byte_len % frame_size != 0 {
            return Err(Error::CorruptData {
                len: byte_len,
                frame_size,
            });
        }
        geometry.frame_count = (byte_len / frame_size) as u64;
        Ok(geometry)
    }

    pub const fn channels(&self) -> u16 {
        self.channels
    }

    pub const fn sample_format(&self) -> SampleFormat {
        self.format
    }

    /// Size of one sample in bytes (not one frame).
    pub const fn sample_width(&self) -> usize {
        self.format.width()
    }

    /// Size of one sample in bits.
    pub const fn bit_depth(&self) -> u32 {
        self.format.bits()
    }

    /// Frames per second.
    pub const fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Size of one frame in bytes.
    pub const fn frame_size(&self) -> usize {
        self.format.width() * self.channels as usize
    }

    /// Total length of the PCM data in bytes.
    pub const fn byte_len(&self) -> u64 {
        self.frame_count * self.frame_size() as u64
    }

    /// Playing time at the native frame rate.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frame_count as f64 / f64::from(self.frame_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_derived_sizes() {
        let geometry = AudioGeometry::new(2, 3, 44100, 88200).unwrap();
        assert_eq!(geometry.sample_format(), SampleFormat::I24);
        assert_eq!(geometry.frame_size(), 6);
        assert_eq!(geometry.bit_depth(), 24);
        assert_eq!(geometry.byte_len(), 88200 * 6);
        assert_eq!(geometry.duration(), Duration::from_secs(2));
    }

    #[test]
    fn test_rejects_unsupported_width() {
        assert!(matches!(
            AudioGeometry::new(2, 5, 44100, 10),
            Err(Error::UnsupportedSampleWidth(5))
        ));
        assert!(matches!(
            AudioGeometry::new(2, 0, 44100, 10),
            Err(Error::UnsupportedSampleWidth(0))
        ));
    }

    #[test]
    fn test_rejects_empty_frames() {
        assert!(matches!(
            AudioGeometry::new(0, 2, 44100, 10),
            Err(Error::InvalidGeometry(_))
        ));
        assert!(matches!(
            AudioGeometry::new(1, 2, 0, 10),
            Err(Error::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_from_byte_len() {
        let geometry = AudioGeometry::from_byte_len(2, 2, 8000, 40).unwrap();
        assert_eq!(geometry.frame_count(), 10);

        assert!(matches!(
            AudioGeometry::from_byte_len(2, 2, 8000, 42),
            Err(Error::CorruptData {
                len: 42,
                frame_size: 4
            })
        ));
    }

    #[test]
    fn test_sample_codec_sign_extension() {
        let mut buf = [0u8; 4];
        for (format, sample) in [
            (SampleFormat::I8, -100),
            (SampleFormat::I16, -30_000),
            (SampleFormat::I24, -8_000_000),
            (SampleFormat::I24, 8_000_000),
            (SampleFormat::I32, i32::MIN),
        ] {
            format.encode(sample, &mut buf);
            assert_eq!(format.decode(&buf[..format.width()]), sample, "{format:?}");
        }
    }

    proptest! {
        #[test]
        fn prop_sample_codec_round_trips(width in 1usize..=4, raw in any::<i32>()) {
            let format = SampleFormat::from_width(width).unwrap();
            // Keep only the bits the format can carry, sign-extended.
            let shift = 32 - format.bits();
            let sample = (raw << shift) >> shift;

            let mut buf = [0u8; 4];
            format.encode(sample, &mut buf);
            prop_assert_eq!(format.decode(&buf[..width]), sample);
        }
    }
}
