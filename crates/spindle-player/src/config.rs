//! Player configuration for spindle-player
//!
//! Configuration is stored as YAML in the user's config directory.
//! Default location: ~/.config/spindle/spindle.yaml

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use spindle_core::audio::AudioConfig;
use spindle_core::config::{default_config_path, load_config, read_config, StreamConfig};

const CONFIG_FILE: &str = "spindle.yaml";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Ring buffer geometry and transport tuning
    pub stream: StreamConfig,
    /// Output device settings
    pub audio: AudioConfig,
}

pub fn config_path() -> PathBuf {
    default_config_path(CONFIG_FILE)
}

/// Load the configuration
///
/// An explicit path must exist and parse; the default location falls back
/// to defaults.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<PlayerConfig> {
    let config = match explicit {
        Some(path) => read_config(path)?,
        None => load_config(&config_path()),
    };
    Ok(config)
}
