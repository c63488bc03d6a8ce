//! Transport state shared between the control side and the output callback.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Playback direction through the frame sequence.
///
/// Reverse steps backward through frames; the channel order inside a frame
/// is never reversed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

impl Direction {
    /// Signed frame step: `1` forward, `-1` reverse.
    pub const fn step(self) -> i64 {
        match self {
            Self::Forward => 1,
            Self::Reverse => -1,
        }
    }

    pub const fn is_reverse(self) -> bool {
        matches!(self, Self::Reverse)
    }

    pub const fn from_reverse(reverse: bool) -> Self {
        if reverse {
            Self::Reverse
        } else {
            Self::Forward
        }
    }
}

impl TryFrom<i64> for Direction {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            1 => Ok(Self::Forward),
            -1 => Ok(Self::Reverse),
            other => Err(Error::InvalidDirection(other)),
        }
    }
}

impl From<Direction> for i64 {
    fn from(direction: Direction) -> Self {
        direction.step()
    }
}

/// Transport mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    /// Inactive; position resets on the next deactivation.
    #[default]
    Stopped,
    /// Inactive; position preserved.
    Paused,
    /// Active; the output callback is being invoked.
    Playing,
}

/// Position, direction, loop flag, and mode of one playback engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackState {
    /// Index of the next frame boundary to play from.
    pub curframe: u64,
    pub direction: Direction,
    pub looping: bool,
    pub mode: PlaybackMode,
}

impl PlaybackState {
    /// A stopped state at frame 0 with the given playback properties.
    pub const fn new(direction: Direction, looping: bool) -> Self {
        Self {
            curframe: 0,
            direction,
            looping,
            mode: PlaybackMode::Stopped,
        }
    }

    /// The state after a reset: frame 0, stopped, properties kept.
    pub const fn rewound(&self) -> Self {
        Self::new(self.direction, self.looping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_from_step() {
        assert_eq!(Direction::try_from(1).unwrap(), Direction::Forward);
        assert_eq!(Direction::try_from(-1).unwrap(), Direction::Reverse);
        for bad in [0, 2, -2, i64::MAX] {
            assert!(matches!(
                Direction::try_from(bad),
                Err(Error::InvalidDirection(v)) if v == bad
            ));
        }
        assert_eq!(i64::from(Direction::Reverse), -1);
    }

    #[test]
    fn test_rewound_keeps_properties() {
        let state = PlaybackState {
            curframe: 500,
            direction: Direction::Reverse,
            looping: true,
            mode: PlaybackMode::Playing,
        };

        let reset = state.rewound();
        assert_eq!(reset.curframe, 0);
        assert_eq!(reset.mode, PlaybackMode::Stopped);
        assert_eq!(reset.direction, Direction::Reverse);
        assert!(reset.looping);
    }

    #[test]
    fn test_defaults() {
        let state = PlaybackState::default();
        assert_eq!(state, PlaybackState::new(Direction::Forward, false));
    }
}
