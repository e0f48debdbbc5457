//! Configuration for the streaming engine
//!
//! This module provides:
//!
//! - Generic YAML config loading/saving
//! - Default config file location
//! - [`StreamConfig`]: ring buffer geometry, read-ahead and transport tuning
//!
//! # Usage
//!
//! ```ignore
//! use spindle_core::config::{load_config, default_config_path, StreamConfig};
//!
//! let config: StreamConfig = load_config(&default_config_path("spindle.yaml"));
//! config.validate()?;
//! ```

mod io;
mod paths;
mod stream;

pub use io::{load_config, read_config, save_config};
pub use paths::{default_config_dir, default_config_path};
pub use stream::{ConfigError, StreamConfig};
