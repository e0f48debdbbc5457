//! WAV decoding via hound
//!
//! Supports integer PCM (8–32 bit) and 32-bit float. Mono files are
//! duplicated to both channels; files with more than two channels keep the
//! first two.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec};

use crate::types::{Sample, StereoSample};

use super::{Decoder, DecoderError};

/// WAV file decoder
pub struct WavDecoder {
    reader: WavReader<BufReader<File>>,
    spec: WavSpec,
    path: PathBuf,
    length: u64,
    position: u64,
}

impl WavDecoder {
    /// Open a WAV file and read its header
    pub fn open(path: &Path) -> Result<Self, DecoderError> {
        let reader = WavReader::open(path).map_err(|e| map_hound_error(path, e))?;
        let spec = reader.spec();

        if spec.channels == 0 {
            return Err(DecoderError::InvalidStream("WAV header declares zero channels".into()));
        }

        let length = reader.duration() as u64;
        log::debug!(
            "WavDecoder: {:?} {}ch {}bit {:?} {}Hz, {} frames",
            path,
            spec.channels,
            spec.bits_per_sample,
            spec.sample_format,
            spec.sample_rate,
            length
        );

        Ok(Self {
            reader,
            spec,
            path: path.to_path_buf(),
            length,
            position: 0,
        })
    }
}

impl Decoder for WavDecoder {
    fn length(&self) -> u64 {
        self.length
    }

    fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    fn read(&mut self, out: &mut [StereoSample]) -> Result<usize, DecoderError> {
        let remaining = self.length.saturating_sub(self.position);
        let wanted = (out.len() as u64).min(remaining) as usize;
        let out = &mut out[..wanted];
        let channels = self.spec.channels as usize;

        let frames = match self.spec.sample_format {
            SampleFormat::Float => {
                read_frames(self.reader.samples::<f32>(), channels, out, |s| s, &self.path)?
            }
            SampleFormat::Int => {
                let scale = 1.0 / (1u64 << (self.spec.bits_per_sample.clamp(1, 32) - 1)) as f64;
                read_frames(
                    self.reader.samples::<i32>(),
                    channels,
                    out,
                    |s| (s as f64 * scale) as Sample,
                    &self.path,
                )?
            }
        };

        self.position += frames as u64;
        Ok(frames)
    }

    fn seek(&mut self, frame: u64) -> Result<(), DecoderError> {
        let frame = frame.min(self.length);
        self.reader
            .seek(frame as u32)
            .map_err(|source| DecoderError::Io {
                path: self.path.clone(),
                source,
            })?;
        self.position = frame;
        Ok(())
    }
}

/// Pull whole frames from an interleaved sample iterator
///
/// Returns the number of complete frames written; a truncated final frame
/// is dropped.
fn read_frames<S, I, F>(
    mut samples: I,
    channels: usize,
    out: &mut [StereoSample],
    convert: F,
    path: &Path,
) -> Result<usize, DecoderError>
where
    I: Iterator<Item = hound::Result<S>>,
    F: Fn(S) -> Sample,
{
    for (n, frame) in out.iter_mut().enumerate() {
        let mut left = 0.0;
        let mut right = 0.0;
        for ch in 0..channels {
            let value = match samples.next() {
                Some(sample) => convert(sample.map_err(|e| map_hound_error(path, e))?),
                None => return Ok(n),
            };
            match ch {
                0 => left = value,
                1 => right = value,
                _ => {}
            }
        }
        if channels == 1 {
            right = left;
        }
        *frame = StereoSample::new(left, right);
    }
    Ok(out.len())
}

fn map_hound_error(path: &Path, err: hound::Error) -> DecoderError {
    match err {
        hound::Error::IoError(source) => DecoderError::Io {
            path: path.to_path_buf(),
            source,
        },
        hound::Error::FormatError(msg) => DecoderError::InvalidStream(msg.to_string()),
        hound::Error::Unsupported => DecoderError::UnsupportedFormat("WAV sample format".into()),
        other => DecoderError::Decode(other.to_string()),
    }
}
