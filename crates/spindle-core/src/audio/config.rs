//! Audio output configuration
//!
//! Device selection and buffer settings for the output stream.

use serde::{Deserialize, Serialize};

/// Largest device buffer accepted (frames)
pub const MAX_BUFFER_SIZE: u32 = 8192;

/// Smallest device buffer accepted (frames)
pub const MIN_BUFFER_SIZE: u32 = 64;

/// Buffer size when no preference is given (frames)
/// 512 frames @ 44.1kHz = ~11.6ms
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Buffer size used in low-latency mode (frames)
pub const LOW_LATENCY_BUFFER_SIZE: u32 = 256;

/// Sample rate requested when none is configured
pub const DEFAULT_SAMPLE_RATE: u32 = crate::types::SAMPLE_RATE;

/// Preferred buffer size for the output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BufferSize {
    /// [`DEFAULT_BUFFER_SIZE`]
    #[default]
    Default,
    /// Specific size in frames, clamped to the accepted range
    Fixed(u32),
    /// [`LOW_LATENCY_BUFFER_SIZE`]
    LowLatency,
}

impl BufferSize {
    /// Buffer size in frames
    pub fn frames(&self) -> u32 {
        match self {
            BufferSize::Default => DEFAULT_BUFFER_SIZE,
            BufferSize::Fixed(frames) => (*frames).clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE),
            BufferSize::LowLatency => LOW_LATENCY_BUFFER_SIZE,
        }
    }

    /// Latency in milliseconds at `sample_rate`
    pub fn latency_ms(&self, sample_rate: u32) -> f32 {
        (self.frames() as f32 / sample_rate as f32) * 1000.0
    }
}

/// Audio device identifier
///
/// Includes both the device name and the host backend (JACK, ALSA, etc.)
/// so devices can be picked from a specific host on systems with several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    /// Device name as reported by the system
    pub name: String,
    /// Audio host identifier (e.g., "JACK", "ALSA", "CoreAudio")
    /// If None, all hosts are searched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
        }
    }

    pub fn with_host(name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            host: Some(host.to_string()),
        }
    }

    /// Display label including the host if known
    pub fn display_label(&self) -> String {
        match &self.host {
            Some(host) => format!("[{}] {}", host, self.name),
            None => self.name.clone(),
        }
    }
}

/// Configuration for the output stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device (None = system default)
    pub device: Option<DeviceId>,

    /// Preferred buffer size
    pub buffer_size: BufferSize,

    /// Preferred sample rate (None = [`DEFAULT_SAMPLE_RATE`])
    pub sample_rate: Option<u32>,
}

impl AudioConfig {
    /// Config tuned for low latency
    pub fn low_latency() -> Self {
        Self {
            buffer_size: BufferSize::LowLatency,
            ..Default::default()
        }
    }

    pub fn with_device(mut self, device: DeviceId) -> Self {
        self.device = Some(device);
        self
    }

    /// Set a fixed buffer size in frames
    pub fn with_buffer_frames(mut self, frames: u32) -> Self {
        self.buffer_size = BufferSize::Fixed(frames);
        self
    }

    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    /// Sample rate to request from the device
    pub fn target_sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_size_frames() {
        assert_eq!(BufferSize::Default.frames(), 512);
        assert_eq!(AudioConfig::low_latency().buffer_size.frames(), 256);
        assert_eq!(BufferSize::Fixed(16).frames(), MIN_BUFFER_SIZE);
        assert_eq!(BufferSize::Fixed(100_000).frames(), MAX_BUFFER_SIZE);
        assert!((BufferSize::Fixed(441).latency_ms(44100) - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = AudioConfig::default()
            .with_device(DeviceId::with_host("hw:0,0", "ALSA"))
            .with_buffer_frames(128)
            .with_sample_rate(48000);

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: AudioConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
        assert_eq!(parsed.target_sample_rate(), 48000);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let parsed: AudioConfig = serde_yaml::from_str("device:\n  name: speakers\n").unwrap();
        assert_eq!(parsed.device, Some(DeviceId::new("speakers")));
        assert_eq!(parsed.buffer_size, BufferSize::Default);
        assert_eq!(parsed.target_sample_rate(), DEFAULT_SAMPLE_RATE);
        assert_eq!(parsed.device.unwrap().display_label(), "speakers");
    }
}
