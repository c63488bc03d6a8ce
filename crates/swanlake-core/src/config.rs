//! Playback engine configuration.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Frames delivered per output callback unless configured otherwise.
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// Playback engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Frames per output block.
    pub block_size: usize,
    /// Start with looping enabled.
    pub looping: bool,
    /// Start in reverse.
    pub reverse: bool,
    /// Play at this frame rate instead of the source's.
    pub framerate_override: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            looping: false,
            reverse: false,
            framerate_override: None,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::InvalidArgument(
                "block_size must be greater than 0".to_string(),
            ));
        }
        if self.framerate_override == Some(0) {
            return Err(Error::InvalidArgument(
                "framerate_override must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.block_size, 1024);
        assert!(!config.looping);
        assert!(!config.reverse);
        assert_eq!(config.framerate_override, None);
    }

    #[test]
    fn test_partial_json() {
        let config = EngineConfig::from_json(r#"{"looping": true, "block_size": 256}"#).unwrap();
        assert_eq!(config.block_size, 256);
        assert!(config.looping);
        assert!(!config.reverse);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            EngineConfig::from_json(r#"{"block_size": 0}"#),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{"framerate_override": 0}"#),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            EngineConfig::from_json("not json"),
            Err(Error::Json(_))
        ));
    }
}
