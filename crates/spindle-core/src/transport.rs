//! Transport control surface
//!
//! What a UI (or the console player) exchanges with the engine:
//!
//! - [`TransportCommand`]: play/pause, rate, jog, seek-hold, seek, load
//! - [`TransportEvent`]: position feedback and stream warnings
//! - [`TransportAtomics`]: lock-free mirror of position, state and rate
//! - [`WheelGesture`]: the seek-hold wheel gesture (touch, turn, release)

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use crate::types::{Direction, PlayState};

/// Wheel positions per revolution
pub const WHEEL_STEPS: u8 = 128;

/// Wheel movement (in steps) below which a seek-hold release does not seek
pub const WHEEL_DEAD_ZONE: i32 = 2;

/// Commands accepted by [`Player::apply`](crate::player::Player::apply)
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCommand {
    Play,
    Pause,
    TogglePlay,
    /// Continuous rate (1.0 = normal speed)
    SetRate(f64),
    /// Jog/scratch delta added to the jog accumulator
    Jog(f64),
    /// Absolute wheel position (0–127)
    MoveWheel(u8),
    /// Touch the wheel: output holds still until release
    BeginSeekHold,
    /// Release the wheel: seeks if the wheel moved while held
    EndSeekHold,
    /// Relative seek as a fraction of the track length
    Seek(f64),
    /// Seek to a position slider value (0–100)
    SeekToPercent(f64),
    /// Replace the current track
    Load(PathBuf),
}

/// Events reported back to the control side
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Playback position as an integer percentage of the track
    ///
    /// Only emitted when the value changes.
    Position { percent: u8 },
    /// A chunk request stayed unanswered for `blocks` render blocks
    ReadBacklog { blocks: u32 },
    /// The decoder delivered fewer frames than a chunk (end of track)
    ShortRead { requested: usize, obtained: usize },
    /// A new track is streaming
    TrackLoaded { path: PathBuf, frames: u64 },
    /// Opening a track failed; the previous track is still active
    TrackLoadFailed { path: PathBuf, reason: String },
    /// Playback jumped to `target` frames
    SeekCompleted { target: f64 },
    /// The window around `target` could not be buffered; playback stays
    /// where it was
    SeekFailed { target: f64, reason: String },
}

/// Integer percentage of `position` within a track of `track_length` frames
pub fn position_percent(position: f64, track_length: u64) -> u8 {
    if track_length == 0 {
        return 0;
    }
    let percent = (position / track_length as f64 * 100.0).floor();
    percent.clamp(0.0, 100.0) as u8
}

// ─────────────────────────────────────────────────────────────────────────────
// Lock-free state mirror
// ─────────────────────────────────────────────────────────────────────────────

/// Transport state published by the render callback every block
///
/// Readers on other threads get the value of the last completed block.
/// Floating-point values are stored as bit patterns.
#[derive(Debug)]
pub struct TransportAtomics {
    position: AtomicU64,
    track_length: AtomicU64,
    state: AtomicU8,
    rate: AtomicU64,
}

impl TransportAtomics {
    pub fn new() -> Self {
        Self {
            position: AtomicU64::new(0f64.to_bits()),
            track_length: AtomicU64::new(0),
            state: AtomicU8::new(PlayState::Paused.to_u8()),
            rate: AtomicU64::new(0f64.to_bits()),
        }
    }

    /// Playback position in frames
    #[inline]
    pub fn position(&self) -> f64 {
        f64::from_bits(self.position.load(Ordering::Relaxed))
    }

    /// Length of the streaming track in frames (0 when none is loaded)
    #[inline]
    pub fn track_length(&self) -> u64 {
        self.track_length.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn play_state(&self) -> PlayState {
        PlayState::from_u8(self.state.load(Ordering::Relaxed))
    }

    /// Effective rate of the last rendered block
    #[inline]
    pub fn rate(&self) -> f64 {
        f64::from_bits(self.rate.load(Ordering::Relaxed))
    }

    /// Position as a percentage of the track
    pub fn percent(&self) -> u8 {
        position_percent(self.position(), self.track_length())
    }

    pub(crate) fn publish(&self, position: f64, track_length: u64, state: PlayState, rate: f64) {
        self.position.store(position.to_bits(), Ordering::Relaxed);
        self.track_length.store(track_length, Ordering::Relaxed);
        self.state.store(state.to_u8(), Ordering::Relaxed);
        self.rate.store(rate.to_bits(), Ordering::Relaxed);
    }
}

impl Default for TransportAtomics {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wheel seek gesture
// ─────────────────────────────────────────────────────────────────────────────

/// Tracks an absolute jog wheel (0–127) and turns a held turn into a seek
///
/// While seek-hold is active the wheel's position at touch time is kept.
/// On release, a movement of more than [`WHEEL_DEAD_ZONE`] steps becomes a
/// relative seek of `(end - start) / 128` track lengths. The wheel wraps
/// from 127 to 0, so the end position is unwrapped using the direction the
/// wheel was last turned.
#[derive(Debug, Clone, Default)]
pub struct WheelGesture {
    position: u8,
    direction: Direction,
    held_from: Option<u8>,
}

impl WheelGesture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current absolute wheel position
    pub fn position(&self) -> u8 {
        self.position
    }

    /// Direction of the most recent movement
    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_held(&self) -> bool {
        self.held_from.is_some()
    }

    /// Record a new absolute wheel position
    ///
    /// Returns the signed step count along the shorter way around the wheel.
    pub fn move_to(&mut self, position: u8) -> i32 {
        let position = position % WHEEL_STEPS;
        let steps = WHEEL_STEPS as i32;
        let mut delta = position as i32 - self.position as i32;
        if delta > steps / 2 {
            delta -= steps;
        } else if delta < -steps / 2 {
            delta += steps;
        }

        if delta != 0 {
            self.direction = Direction::from_signum(delta.signum() as i8);
        }
        self.position = position;
        delta
    }

    /// Touch: remember where the wheel was
    pub fn begin(&mut self) {
        self.held_from = Some(self.position);
    }

    /// Release: relative seek change, if the wheel moved far enough
    pub fn end(&mut self) -> Option<f64> {
        let start = self.held_from.take()? as i32;
        let mut end = self.position as i32;

        if (end - start).abs() <= WHEEL_DEAD_ZONE {
            return None;
        }

        let steps = WHEEL_STEPS as i32;
        match self.direction {
            Direction::Forward if end < start => end += steps,
            Direction::Backward if end > start => end -= steps,
            _ => {}
        }
        Some((end - start) as f64 / steps as f64)
    }
}
