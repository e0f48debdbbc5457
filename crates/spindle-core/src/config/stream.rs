//! Streaming engine configuration
//!
//! Controls the ring buffer geometry, the read-ahead heuristic and the
//! transport's rate/jog behaviour.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid streaming configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A size that must be positive is zero
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    /// The ring cannot hold the read-ahead margin on both sides of the
    /// render cursor plus one chunk in flight
    #[error("capacity ({capacity}) must be at least 2 x read-ahead ({readahead}) + chunk ({chunk}) frames")]
    WindowTooSmall {
        capacity: usize,
        chunk: usize,
        readahead: usize,
    },

    /// A fractional parameter is outside its range
    #[error("{name} must be within {min}..={max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Minimum rate above maximum rate
    #[error("rate_min ({min}) must not exceed rate_max ({max})")]
    RateRange { min: f64, max: f64 },
}

/// Streaming engine configuration
///
/// All sizes are in frames (one frame = one stereo pair).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Ring buffer capacity
    /// Default: 131072 frames (~3s at 44.1kHz)
    pub capacity_frames: usize,

    /// Frames transferred from the decoder per reader wake-up
    /// Default: 16384 frames
    pub chunk_frames: usize,

    /// Minimum margin kept buffered ahead of the render cursor
    /// Default: 32768 frames
    pub readahead_frames: usize,

    /// Backlog warning threshold as a fraction of the read-ahead margin
    /// The warning fires after `fraction * readahead / block_frames`
    /// consecutive blocks with an unanswered request.
    /// Default: 0.9
    pub backlog_warn_fraction: f64,

    /// How long shutdown waits for the reader thread to exit
    /// Default: 2000 ms
    pub shutdown_timeout_ms: u64,

    /// Lower bound of the continuous rate control
    /// Default: 0.9
    pub rate_min: f64,

    /// Upper bound of the continuous rate control
    /// Default: 1.1
    pub rate_max: f64,

    /// Jog contribution multiplier: `rate = continuous + jog_gain * jog`
    /// Default: 4.0
    pub jog_gain: f64,

    /// Fraction of the jog value that decays away each render block
    /// Default: 0.3
    pub jog_smoothing: f64,

    /// Capacity of the command and event queues
    /// Default: 256
    pub queue_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            capacity_frames: 1 << 17,
            chunk_frames: 1 << 14,
            readahead_frames: 1 << 15,
            backlog_warn_fraction: 0.9,
            shutdown_timeout_ms: 2000,
            rate_min: 0.9,
            rate_max: 1.1,
            jog_gain: 4.0,
            jog_smoothing: 0.3,
            queue_capacity: 256,
        }
    }
}

impl StreamConfig {
    /// Create a config with explicit buffer geometry and default tuning
    pub fn with_geometry(capacity_frames: usize, chunk_frames: usize, readahead_frames: usize) -> Self {
        Self {
            capacity_frames,
            chunk_frames,
            readahead_frames,
            ..Default::default()
        }
    }

    /// Check the configuration for values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity_frames == 0 {
            return Err(ConfigError::Zero("capacity_frames"));
        }
        if self.chunk_frames == 0 {
            return Err(ConfigError::Zero("chunk_frames"));
        }
        if self.readahead_frames == 0 {
            return Err(ConfigError::Zero("readahead_frames"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Zero("queue_capacity"));
        }
        // Seek refills two chunks. A chunk read in either direction must
        // leave the read-ahead margin intact on the other side, otherwise
        // forward and backward reads undo each other indefinitely.
        if 2 * self.readahead_frames + self.chunk_frames > self.capacity_frames
            || 2 * self.chunk_frames > self.capacity_frames
        {
            return Err(ConfigError::WindowTooSmall {
                capacity: self.capacity_frames,
                chunk: self.chunk_frames,
                readahead: self.readahead_frames,
            });
        }
        check_range("backlog_warn_fraction", self.backlog_warn_fraction, 0.0, 1.0)?;
        if self.backlog_warn_fraction == 0.0 {
            return Err(ConfigError::OutOfRange {
                name: "backlog_warn_fraction",
                value: 0.0,
                min: f64::EPSILON,
                max: 1.0,
            });
        }
        check_range("jog_smoothing", self.jog_smoothing, 0.0, 1.0)?;
        if !(self.rate_min <= self.rate_max) {
            return Err(ConfigError::RateRange {
                min: self.rate_min,
                max: self.rate_max,
            });
        }
        Ok(())
    }

    /// Shutdown timeout as a `Duration`
    pub fn shutdown_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Number of consecutive backlogged blocks that triggers a warning
    ///
    /// Always at least one block.
    pub fn backlog_warn_blocks(&self, block_frames: usize) -> u32 {
        let block_frames = block_frames.max(1) as f64;
        let blocks = (self.backlog_warn_fraction * self.readahead_frames as f64 / block_frames).ceil();
        blocks.max(1.0) as u32
    }
}

fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_nan() || value < min || value > max {
        return Err(ConfigError::OutOfRange { name, value, min, max });
    }
    Ok(())
}
