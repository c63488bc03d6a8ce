//! Core domain types for Swanlake.

pub mod frames;
pub mod geometry;
pub mod playback;

pub use frames::FrameArray;
pub use geometry::{AudioGeometry, SampleFormat};
pub use playback::{Direction, PlaybackMode, PlaybackState};
