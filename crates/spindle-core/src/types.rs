//! Common types for Spindle
//!
//! This module contains the fundamental audio types used throughout the
//! streaming engine: stereo frames, play state and streaming direction.

/// Default sample rate requested from the output device
pub const SAMPLE_RATE: u32 = 44100;

/// Audio sample type (32-bit float for processing)
pub type Sample = f32;

/// A single stereo frame (left and right channels)
///
/// Uses `#[repr(C)]` to ensure predictable memory layout: [left, right].
/// This enables zero-copy conversion between `&[StereoSample]` and `&[f32]`
/// (interleaved format) using bytemuck.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    /// Create a new stereo sample
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    /// Create a silent stereo sample
    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Create a mono sample (same value in both channels)
    #[inline]
    pub fn mono(value: Sample) -> Self {
        Self { left: value, right: value }
    }
}

impl std::ops::Add for StereoSample {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            left: self.left + other.left,
            right: self.right + other.right,
        }
    }
}

impl std::ops::Sub for StereoSample {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Self {
            left: self.left - other.left,
            right: self.right - other.right,
        }
    }
}

impl std::ops::Mul<Sample> for StereoSample {
    type Output = Self;

    #[inline]
    fn mul(self, factor: Sample) -> Self {
        Self {
            left: self.left * factor,
            right: self.right * factor,
        }
    }
}

/// View interleaved samples [L, R, L, R, ...] as stereo frames (zero-copy)
///
/// Panics if the slice has an odd length.
#[inline]
pub fn frames_from_interleaved_mut(interleaved: &mut [Sample]) -> &mut [StereoSample] {
    bytemuck::cast_slice_mut(interleaved)
}

/// View stereo frames as interleaved samples [L, R, L, R, ...] (zero-copy)
#[inline]
pub fn frames_as_interleaved(frames: &[StereoSample]) -> &[Sample] {
    bytemuck::cast_slice(frames)
}

/// Transport state of the player
///
/// `SeekHold` is entered while the play button is held down: the rate is
/// forced to zero so the jog wheel can be used to pick a seek target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayState {
    #[default]
    Paused,
    Playing,
    SeekHold,
}

impl PlayState {
    /// Encode for lock-free storage
    #[inline]
    pub fn to_u8(self) -> u8 {
        match self {
            PlayState::Paused => 0,
            PlayState::Playing => 1,
            PlayState::SeekHold => 2,
        }
    }

    /// Decode from lock-free storage (unknown values map to `Paused`)
    #[inline]
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => PlayState::Playing,
            2 => PlayState::SeekHold,
            _ => PlayState::Paused,
        }
    }
}

/// Direction in which the reader extends the buffered window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Read after the end of the window
    #[default]
    Forward,
    /// Read before the start of the window
    Backward,
}

impl Direction {
    /// Signed unit value (+1 / -1)
    #[inline]
    pub fn signum(self) -> i8 {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }

    /// Decode from a signed unit value (non-negative maps to `Forward`)
    #[inline]
    pub fn from_signum(value: i8) -> Self {
        if value < 0 {
            Direction::Backward
        } else {
            Direction::Forward
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_sample_operations() {
        let a = StereoSample::new(1.0, 2.0);
        let b = StereoSample::new(0.5, 0.5);

        let sum = a + b;
        assert_eq!(sum.left, 1.5);
        assert_eq!(sum.right, 2.5);

        let diff = a - b;
        assert_eq!(diff.left, 0.5);
        assert_eq!(diff.right, 1.5);

        let scaled = a * 0.5;
        assert_eq!(scaled.left, 0.5);
        assert_eq!(scaled.right, 1.0);
    }

    #[test]
    fn test_interleaved_views() {
        let mut interleaved = [1.0, 2.0, 3.0, 4.0];
        let frames = frames_from_interleaved_mut(&mut interleaved);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1], StereoSample::new(3.0, 4.0));

        frames[0] = StereoSample::mono(9.0);
        assert_eq!(frames_as_interleaved(frames), &[9.0, 9.0, 3.0, 4.0]);
    }

    #[test]
    fn test_play_state_roundtrip() {
        for state in [PlayState::Paused, PlayState::Playing, PlayState::SeekHold] {
            assert_eq!(PlayState::from_u8(state.to_u8()), state);
        }
        assert_eq!(PlayState::from_u8(42), PlayState::Paused);
    }

    #[test]
    fn test_direction_signum() {
        assert_eq!(Direction::Forward.signum(), 1);
        assert_eq!(Direction::from_signum(-1), Direction::Backward);
        assert_eq!(Direction::from_signum(0), Direction::Forward);
    }
}
