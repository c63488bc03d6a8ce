//! Materialized sample arrays.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use super::geometry::{AudioGeometry, SampleFormat};
use crate::{Error, Result};
use std::slice::ChunksExact;

/// Samples shaped as `(frames, channels)`, interleaved and widened to `i32`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameArray {
    samples: Vec<i32>,
    channels: usize,
    format: SampleFormat,
}

impl FrameArray {
    /// Materialize raw little-endian PCM bytes.
    ///
    /// Fails with [`Error::CorruptData`] if `bytes` is not a whole number of
    /// frames, rather than producing a misshapen array.
    pub fn from_bytes(bytes: &[u8], geometry: &AudioGeometry) -> Result<Self> {
        let frame_size = geometry.frame_size();
        if bytes.len() % frame_size != 0 {
            return Err(Error::CorruptData {
                len: bytes.len(),
                frame_size,
            });
        }

        let format = geometry.sample_format();
        let samples = bytes
            .chunks_exact(format.width())
            .map(|sample| format.decode(sample))
            .collect();

        Ok(Self {
            samples,
            channels: usize::from(geometry.channels()),
            format,
        })
    }

    /// An array with no frames.
    pub fn empty(geometry: &AudioGeometry) -> Self {
        Self {
            samples: Vec::new(),
            channels: usize::from(geometry.channels()),
            format: geometry.sample_format(),
        }
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.samples.len() / self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub const fn channels(&self) -> usize {
        self.channels
    }

    pub const fn format(&self) -> SampleFormat {
        self.format
    }

    /// `(frames, channels)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.len(), self.channels)
    }

    /// The channel samples of one frame.
    pub fn frame(&self, index: usize) -> Option<&[i32]> {
        let start = index.checked_mul(self.channels)?;
        self.samples.get(start..start + self.channels)
    }

    /// Iterate over frames in order.
    pub fn frames(&self) -> ChunksExact<'_, i32> {
        self.samples.chunks_exact(self.channels)
    }

    /// All samples, interleaved.
    pub fn samples(&self) -> &[i32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<i32> {
        self.samples
    }

    /// Encode back to little-endian PCM bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let width = self.format.width();
        let mut bytes = vec![0u8; self.samples.len() * width];
        for (sample, out) in self.samples.iter().zip(bytes.chunks_exact_mut(width)) {
            self.format.encode(*sample, out);
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo16() -> AudioGeometry {
        AudioGeometry::new(2, 2, 8000, 3).unwrap()
    }

    #[test]
    fn test_shape_and_frames() {
        let mut bytes = Vec::new();
        for sample in [1i16, -1, 2, -2, 3, -3] {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }

        let array = FrameArray::from_bytes(&bytes, &stereo16()).unwrap();
        assert_eq!(array.shape(), (3, 2));
        assert_eq!(array.frame(1), Some(&[2, -2][..]));
        assert_eq!(array.frame(3), None);
        assert_eq!(
            array.frames().map(<[i32]>::to_vec).collect::<Vec<_>>(),
            vec![vec![1, -1], vec![2, -2], vec![3, -3]]
        );
        assert_eq!(array.to_bytes(), bytes);
    }

    #[test]
    fn test_truncated_input_is_rejected() {
        let err = FrameArray::from_bytes(&[0u8; 6], &stereo16()).unwrap_err();
        assert!(matches!(
            err,
            Error::CorruptData {
                len: 6,
                frame_size: 4
            }
        ));
    }

    #[test]
    fn test_empty() {
        let array = FrameArray::from_bytes(&[], &stereo16()).unwrap();
        assert!(array.is_empty());
        assert_eq!(array, FrameArray::empty(&stereo16()));
        assert_eq!(array.shape(), (0, 2));
    }
}
