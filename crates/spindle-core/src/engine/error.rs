//! Engine error types

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::decoder::DecoderError;

/// Errors that stop the engine or its reader thread
#[derive(Error, Debug)]
pub enum EngineError {
    /// Reader thread did not exit within the shutdown timeout
    #[error("Reader thread did not stop within {0:?}")]
    ShutdownTimeout(Duration),

    /// Reader thread panicked
    #[error("Reader thread panicked")]
    ReaderPanicked,

    /// Reader thread could not be spawned
    #[error("Failed to spawn reader thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// Configuration rejected at startup
    #[error("Invalid stream configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Loading a new track failed; the previous track keeps playing
#[derive(Error, Debug)]
pub enum TrackLoadError {
    /// The decoder could not open the file
    #[error("Failed to open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: DecoderError,
    },

    /// The track contains no frames
    #[error("Track {0:?} is empty")]
    Empty(PathBuf),

    /// The render side did not accept the new stream (command queue full)
    #[error("Command queue full, track not loaded")]
    QueueFull,

    /// The reader for the new track could not be started
    #[error(transparent)]
    Engine(#[from] EngineError),
}
