//! # swanlake-audio
//!
//! Real-time PCM playback for Swanlake.
//!
//! Features:
//! - Frame-addressed random access over any `Read + Seek` PCM source
//! - Forward and reverse playback with looping and seeking
//! - Block-fill callback that never fails across the real-time boundary
//! - Clocked, manual, and cpal device output backends

pub mod engine;
pub mod frame_store;
pub mod output;

pub use engine::{EngineEvent, PlaybackEngine};
pub use frame_store::FrameStore;
pub use output::{
    BlockOutcome, CallbackFlags, ClockedBackend, ManualBackend, OutputBackend, OutputStream,
    StreamCallback, StreamParams,
};
