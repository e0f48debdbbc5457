//! Audio decoders
//!
//! The streaming engine only needs a narrow capability from a decoder:
//! report the track length, read frames sequentially, and seek. Format
//! parsing is left entirely to the implementations behind [`Decoder`]:
//!
//! - [`WavDecoder`]: PCM/float WAV via `hound`
//! - [`SymphoniaDecoder`]: MP3, FLAC and Ogg Vorbis via `symphonia`
//! - [`MemoryDecoder`]: frames already in memory (generated material, tests)
//!
//! [`open_decoder`] picks an implementation from the file extension and
//! returns a typed error for anything it cannot open.

mod compressed;
mod memory;
mod wav;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::StereoSample;

pub use self::memory::MemoryDecoder;
pub use self::compressed::SymphoniaDecoder;
pub use self::wav::WavDecoder;

/// Errors raised while opening or reading a track
#[derive(Error, Debug)]
pub enum DecoderError {
    /// File could not be opened or read
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File has no extension to pick a decoder from
    #[error("Cannot determine format of {0:?}: no file extension")]
    MissingExtension(PathBuf),

    /// Extension or container is not supported
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Stream is structurally invalid (bad header, no audio track, unknown length)
    #[error("Invalid audio stream: {0}")]
    InvalidStream(String),

    /// Decoding or reading failed mid-stream
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Sequential frame source with random seek
///
/// Implementations own their position: `read` continues where the previous
/// `read` or `seek` left off. Decoders are moved onto the reader thread, so
/// they must be `Send`.
pub trait Decoder: Send {
    /// Total track length in frames
    fn length(&self) -> u64;

    /// Native sample rate of the track in Hz
    fn sample_rate(&self) -> u32;

    /// Read up to `out.len()` frames at the current position
    ///
    /// Returns the number of frames written. Fewer than requested means the
    /// end of the track was reached.
    fn read(&mut self, out: &mut [StereoSample]) -> Result<usize, DecoderError>;

    /// Move the read position to `frame` (clamped to the track length)
    fn seek(&mut self, frame: u64) -> Result<(), DecoderError>;
}

/// Decoder implementation chosen for a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderKind {
    Wav,
    Symphonia,
}

impl DecoderKind {
    /// Pick the decoder for a path by its (case-insensitive) extension
    pub fn from_path(path: &Path) -> Result<Self, DecoderError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| DecoderError::MissingExtension(path.to_path_buf()))?;

        match ext.to_ascii_lowercase().as_str() {
            "wav" | "wave" => Ok(DecoderKind::Wav),
            "mp3" | "flac" | "ogg" => Ok(DecoderKind::Symphonia),
            other => Err(DecoderError::UnsupportedFormat(format!(".{} files", other))),
        }
    }
}

/// Open a decoder for a media file
pub fn open_decoder(path: &Path) -> Result<Box<dyn Decoder>, DecoderError> {
    let kind = DecoderKind::from_path(path)?;
    log::debug!("open_decoder: {:?} -> {:?}", path, kind);

    let decoder: Box<dyn Decoder> = match kind {
        DecoderKind::Wav => Box::new(WavDecoder::open(path)?),
        DecoderKind::Symphonia => Box::new(SymphoniaDecoder::open(path)?),
    };

    log::info!(
        "Opened {:?}: {} frames at {}Hz",
        path,
        decoder.length(),
        decoder.sample_rate()
    );
    Ok(decoder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(DecoderKind::from_path(Path::new("a/b.wav")).unwrap(), DecoderKind::Wav);
        assert_eq!(DecoderKind::from_path(Path::new("TRACK.MP3")).unwrap(), DecoderKind::Symphonia);
        assert_eq!(DecoderKind::from_path(Path::new("x.flac")).unwrap(), DecoderKind::Symphonia);
    }

    #[test]
    fn test_unknown_or_missing_extension() {
        assert!(matches!(
            DecoderKind::from_path(Path::new("notes.txt")),
            Err(DecoderError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            DecoderKind::from_path(Path::new("README")),
            Err(DecoderError::MissingExtension(_))
        ));
    }

    #[test]
    fn test_open_missing_file_is_io_error() {
        let err = open_decoder(Path::new("/nonexistent/track.wav")).err().unwrap();
        assert!(matches!(err, DecoderError::Io { .. }), "got {}", err);
    }
}
