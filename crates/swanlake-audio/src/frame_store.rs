//! Frame-addressed random access over a seekable PCM byte source.
//!
//! Positions are frame indices; every move is translated to a byte offset
//! (frame index × frame size) on the underlying source.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::io::{self, Cursor, Read, Seek, SeekFrom};
use swanlake_core::{AudioGeometry, Error, FrameArray, Result, SampleFormat};
use tracing::{debug, trace};

/// How a frame offset is interpreted when moving the byte cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Whence {
    /// From frame 0.
    Absolute,
    /// From the current position.
    Relative,
}

/// Random-access frame reader over a byte source it owns exclusively.
pub struct FrameStore<S> {
    source: S,
    geometry: AudioGeometry,
    /// Current frame, `0..=frame_count`.
    position: u64,
}

impl FrameStore<Cursor<Vec<u8>>> {
    /// Wrap interleaved little-endian PCM held in memory.
    ///
    /// The frame count is derived from the byte length, which must be a
    /// whole number of frames.
    pub fn from_pcm(
        pcm: Vec<u8>,
        channels: u16,
        sample_width: usize,
        frame_rate: u32,
    ) -> Result<Self> {
        let geometry = AudioGeometry::from_byte_len(channels, sample_width, frame_rate, pcm.len())?;
        Self::new(Cursor::new(pcm), geometry)
    }
}

impl<S: Read + Seek> FrameStore<S> {
    /// Create a store positioned at frame 0.
    pub fn new(mut source: S, geometry: AudioGeometry) -> Result<Self> {
        source.seek(SeekFrom::Start(0))?;

        debug!(
            "Frame store: {} frames, {} channels, {}-bit, {} Hz",
            geometry.frame_count(),
            geometry.channels(),
            geometry.bit_depth(),
            geometry.frame_rate()
        );

        Ok(Self {
            source,
            geometry,
            position: 0,
        })
    }

    /// Move the position by a relative frame offset.
    pub fn seek(&mut self, frame_offset: i64) -> Result<()> {
        self.position = self.move_cursor(i128::from(frame_offset), Whence::Relative)?;
        Ok(())
    }

    /// Move the position to an absolute frame.
    pub fn jump(&mut self, frame: u64) -> Result<()> {
        self.position = self.move_cursor(i128::from(frame), Whence::Absolute)?;
        Ok(())
    }

    /// Read up to `frames` frames forward and advance past them.
    ///
    /// The result is shorter than requested only if the source ran out.
    pub fn read(&mut self, frames: usize) -> Result<FrameArray> {
        let frames = frames.min(self.remaining());
        let mut bytes = vec![0u8; frames * self.geometry.frame_size()];
        let read = self.read_into(&mut bytes)?;
        bytes.truncate(read * self.geometry.frame_size());
        FrameArray::from_bytes(&bytes, &self.geometry)
    }

    /// Read up to `frames` frames immediately before the position.
    ///
    /// Frames come back in stored order and the position does not move.
    pub fn read_left(&mut self, frames: usize) -> Result<FrameArray> {
        let frames = frames.min(usize::try_from(self.position).unwrap_or(usize::MAX));
        let mut bytes = vec![0u8; frames * self.geometry.frame_size()];
        let read = self.read_left_into(&mut bytes)?;
        bytes.truncate(read * self.geometry.frame_size());
        FrameArray::from_bytes(&bytes, &self.geometry)
    }

    /// Fill `out` with frames read forward, returning the frame count.
    ///
    /// Does not allocate. `out` must hold a whole number of frames.
    pub fn read_into(&mut self, out: &mut [u8]) -> Result<usize> {
        let frame_size = self.geometry.frame_size();
        let wanted = self.frames_in(out)?.min(self.remaining());

        let filled = match read_full(&mut self.source, &mut out[..wanted * frame_size]) {
            Ok(filled) => filled,
            Err(e) => {
                self.restore_cursor()?;
                return Err(e.into());
            }
        };
        if filled % frame_size != 0 {
            self.restore_cursor()?;
            return Err(Error::CorruptData {
                len: filled,
                frame_size,
            });
        }

        let frames = filled / frame_size;
        self.position += frames as u64;
        trace!("Read {frames} frames, now at frame {}", self.position);
        Ok(frames)
    }

    /// Fill the front of `out` with the frames preceding the position,
    /// returning the frame count.
    ///
    /// If the window would start before frame 0 it is clamped to start at
    /// frame 0 and shrunk by the overshoot, so it always ends exactly at the
    /// position.
    pub fn read_left_into(&mut self, out: &mut [u8]) -> Result<usize> {
        let frame_size = self.geometry.frame_size();
        let requested = self.frames_in(out)? as u64;

        let (start, frames) = match self.position.checked_sub(requested) {
            Some(start) => (start, requested),
            None => (0, self.position),
        };
        if frames == 0 {
            return Ok(0);
        }

        let len = frames as usize * frame_size;
        let result = self
            .move_cursor(i128::from(start), Whence::Absolute)
            .and_then(|_| read_full(&mut self.source, &mut out[..len]).map_err(Error::from));
        self.restore_cursor()?;
        let filled = result?;

        if filled != len {
            // The source is shorter than its geometry claims.
            return Err(Error::CorruptData {
                len: filled,
                frame_size,
            });
        }
        Ok(frames as usize)
    }

    /// Move the source cursor to a frame without touching the position.
    ///
    /// Bounds are checked in bytes against the total byte length.
    fn move_cursor(&mut self, frame_offset: i128, whence: Whence) -> Result<u64> {
        let target = match whence {
            Whence::Absolute => frame_offset,
            Whence::Relative => i128::from(self.position) + frame_offset,
        };

        let byte_offset = target * self.geometry.frame_size() as i128;
        if byte_offset < 0 || byte_offset >= i128::from(self.geometry.byte_len()) {
            return Err(Error::out_of_bounds(target, self.geometry.frame_count()));
        }

        self.source.seek(SeekFrom::Start(byte_offset as u64))?;
        Ok(target as u64)
    }

    /// Put the source cursor back on the current position.
    fn restore_cursor(&mut self) -> Result<()> {
        let byte_offset = self.position * self.geometry.frame_size() as u64;
        self.source.seek(SeekFrom::Start(byte_offset))?;
        Ok(())
    }

    fn frames_in(&self, out: &[u8]) -> Result<usize> {
        let frame_size = self.geometry.frame_size();
        if out.len() % frame_size != 0 {
            return Err(Error::InvalidArgument(format!(
                "buffer of {} bytes is not a whole number of {frame_size}-byte frames",
                out.len()
            )));
        }
        Ok(out.len() / frame_size)
    }

    fn remaining(&self) -> usize {
        let remaining = self.geometry.frame_count().saturating_sub(self.position);
        usize::try_from(remaining).unwrap_or(usize::MAX)
    }
}

impl<S> FrameStore<S> {
    pub const fn geometry(&self) -> &AudioGeometry {
        &self.geometry
    }

    /// Current frame.
    pub const fn position(&self) -> u64 {
        self.position
    }

    pub const fn channels(&self) -> u16 {
        self.geometry.channels()
    }

    /// Size of one sample in bytes (not one frame).
    pub const fn sample_width(&self) -> usize {
        self.geometry.sample_width()
    }

    pub const fn bit_depth(&self) -> u32 {
        self.geometry.bit_depth()
    }

    pub const fn sample_format(&self) -> SampleFormat {
        self.geometry.sample_format()
    }

    pub const fn frame_rate(&self) -> u32 {
        self.geometry.frame_rate()
    }

    pub const fn frame_count(&self) -> u64 {
        self.geometry.frame_count()
    }

    /// Size of one frame in bytes.
    pub const fn frame_size(&self) -> usize {
        self.geometry.frame_size()
    }

    pub const fn get_ref(&self) -> &S {
        &self.source
    }

    pub fn into_inner(self) -> S {
        self.source
    }
}

/// Read until `buf` is full or the source is exhausted.
fn read_full<R: Read>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
