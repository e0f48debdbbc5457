//! Audio output for the streaming player
//!
//! A single stereo output stream through cpal (ALSA/JACK/PulseAudio on
//! Linux, WASAPI on Windows, CoreAudio on macOS). The audio callback owns
//! the [`RenderEngine`](crate::engine::RenderEngine) exclusively.
//!
//! # Example Usage
//!
//! ```ignore
//! use spindle_core::audio::{start_audio_output, AudioConfig};
//! use spindle_core::player::Player;
//!
//! let (mut player, engine) = Player::new(StreamConfig::default())?;
//! let handle = start_audio_output(&AudioConfig::default(), engine)?;
//! println!("{}Hz, {:.1}ms", handle.sample_rate(), handle.latency_ms());
//! ```

mod config;
mod cpal_backend;
mod device;
mod error;

pub use config::{
    AudioConfig, BufferSize, DeviceId, DEFAULT_BUFFER_SIZE, DEFAULT_SAMPLE_RATE, LOW_LATENCY_BUFFER_SIZE,
    MAX_BUFFER_SIZE, MIN_BUFFER_SIZE,
};
pub use cpal_backend::{start_audio_output, AudioHandle};
pub use device::{find_device_by_id, get_cpal_default_device, get_output_devices, AudioDevice};
pub use error::{AudioError, AudioResult};
