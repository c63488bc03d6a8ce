//! Output scheduler abstraction.
//!
//! A backend owns the real-time side: it calls [`StreamCallback::fill_block`]
//! once per block while the stream is active and [`StreamCallback::finished`]
//! once per active → inactive transition, whatever caused it.

use std::sync::Arc;
use std::time::Duration;
use swanlake_core::{Result, SampleFormat};

pub mod clocked;
#[cfg(feature = "device-output")]
pub mod device;
pub mod manual;

pub use clocked::{BlockSink, ClockedBackend, ClockedStream, NullSink};
#[cfg(feature = "device-output")]
pub use device::{CpalBackend, CpalStream};
pub use manual::{ManualBackend, ManualStream};

/// Status reported by the scheduler with each callback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallbackFlags {
    /// The previous block reached the device late.
    pub output_underflow: bool,
}

/// What the scheduler should do after delivering a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    /// Keep calling back.
    Continue,
    /// Deliver this block, then deactivate the stream.
    Complete,
}

/// Real-time side of a playback engine.
pub trait StreamCallback: Send + Sync {
    /// Fill `out` completely. Must not block beyond a brief lock.
    fn fill_block(&self, out: &mut [u8], flags: CallbackFlags) -> BlockOutcome;

    /// The stream went from active to inactive.
    fn finished(&self);
}

/// Shape of the blocks a stream requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    pub channels: u16,
    pub frame_rate: u32,
    /// Frames per block.
    pub block_size: usize,
    pub sample_format: SampleFormat,
}

impl StreamParams {
    pub const fn frame_size(&self) -> usize {
        self.sample_format.width() * self.channels as usize
    }

    pub const fn block_bytes(&self) -> usize {
        self.block_size * self.frame_size()
    }

    /// Time it takes to play one block.
    pub fn block_duration(&self) -> Duration {
        Duration::from_secs_f64(self.block_size as f64 / f64::from(self.frame_rate))
    }
}

/// Control handle of an opened output stream.
///
/// Mirrors driver semantics: a stream that deactivated itself after
/// [`BlockOutcome::Complete`] is inactive but not stopped, and refuses to
/// start again until [`stop`](Self::stop) or [`abort`](Self::abort) resets it.
pub trait OutputStream {
    /// Begin calling back. Fails unless the stream is stopped.
    fn start(&mut self) -> Result<()>;

    /// Halt delivery and return once no callback is running.
    fn stop(&mut self) -> Result<()>;

    /// Halt delivery immediately and reset the stream.
    fn abort(&mut self) -> Result<()>;

    /// Callbacks are being delivered.
    fn is_active(&self) -> bool;

    /// Halted by `stop`/`abort` (or never started).
    fn is_stopped(&self) -> bool;
}

/// Opens output streams driving a [`StreamCallback`].
pub trait OutputBackend {
    type Stream: OutputStream;

    fn open(
        &self,
        params: StreamParams,
        callback: Arc<dyn StreamCallback>,
    ) -> Result<Self::Stream>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_params() {
        let params = StreamParams {
            channels: 2,
            frame_rate: 48000,
            block_size: 24000,
            sample_format: SampleFormat::I24,
        };
        assert_eq!(params.frame_size(), 6);
        assert_eq!(params.block_bytes(), 144_000);
        assert_eq!(params.block_duration(), Duration::from_millis(500));
    }
}
