//! Error types for Swanlake.

use thiserror::Error;

/// Result type alias using Swanlake's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Swanlake.
#[derive(Error, Debug)]
pub enum Error {
    // Addressing errors
    #[error("Cannot move to {target} (valid range is 0..{len}): out of bounds")]
    OutOfBounds { target: i128, len: u64 },

    // Argument errors
    #[error("Invalid direction: -1 and 1 are valid, given {0}")]
    InvalidDirection(i64),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Geometry and data errors
    #[error("Unsupported sample width: {0} bytes (supported: 1, 2, 3, 4)")]
    UnsupportedSampleWidth(usize),

    #[error("Invalid audio geometry: {0}")]
    InvalidGeometry(String),

    #[error("Corrupt frame data: {len} bytes is not a whole number of {frame_size}-byte frames")]
    CorruptData { len: usize, frame_size: usize },

    // Output errors
    #[error("Output stream error: {0}")]
    Stream(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns true if this is a seek/jump bounds violation.
    pub const fn is_bounds(&self) -> bool {
        matches!(self, Self::OutOfBounds { .. })
    }

    /// Returns true if a caller passed a value the API does not accept.
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidDirection(_) | Self::InvalidArgument(_))
    }

    /// Build a bounds violation for `target` against a range of `len`.
    pub fn out_of_bounds(target: impl Into<i128>, len: u64) -> Self {
        Self::OutOfBounds {
            target: target.into(),
            len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert!(Error::out_of_bounds(-1, 10).is_bounds());
        assert!(Error::InvalidDirection(2).is_invalid_argument());
        assert!(!Error::Stream("gone".into()).is_bounds());
        assert!(!Error::CorruptData {
            len: 3,
            frame_size: 4
        }
        .is_invalid_argument());
    }

    #[test]
    fn test_error_display() {
        let err = Error::InvalidDirection(0);
        assert_eq!(
            err.to_string(),
            "Invalid direction: -1 and 1 are valid, given 0"
        );

        let err = Error::out_of_bounds(12, 10);
        assert_eq!(
            err.to_string(),
            "Cannot move to 12 (valid range is 0..10): out of bounds"
        );
    }
}
