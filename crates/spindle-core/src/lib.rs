//! Spindle Core - streaming variable-rate playback engine
//!
//! A decoder feeds a fixed-capacity ring buffer from a background reader
//! thread while the real-time render callback plays it back at any rate,
//! including reverse and scratch jogging.
//!
//! - [`player::Player`]: control handle (load, transport, seek, events)
//! - [`engine`]: ring buffer, reader thread, read-ahead scheduler, renderer
//! - [`decoder`]: WAV and compressed-format frame sources
//! - [`audio`]: cpal output stream hosting the render engine

pub mod audio;
pub mod config;
pub mod decoder;
pub mod engine;
pub mod player;
pub mod transport;
pub mod types;

pub use types::*;
