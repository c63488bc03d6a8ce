//! # swanlake-core
//!
//! Core types, configuration, and error handling for the Swanlake playback engine.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::{EngineConfig, DEFAULT_BLOCK_SIZE};
pub use error::{Error, Result};
pub use types::*;
