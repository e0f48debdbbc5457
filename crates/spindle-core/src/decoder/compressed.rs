//! Compressed audio decoding via symphonia (MP3, FLAC, Ogg Vorbis)
//!
//! Symphonia decodes whole packets, so frames that don't fit the caller's
//! buffer are kept in `pending` and handed out on the next `read`.
//! Timestamps are assumed to be in frames, which holds for every audio
//! container enabled in this build.

use std::fs::File;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder as CodecDecoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::types::StereoSample;

use super::{Decoder, DecoderError};

/// Consecutive corrupt packets tolerated before a read fails
const MAX_DECODE_RETRIES: usize = 3;

/// Decoder for symphonia-supported compressed formats
pub struct SymphoniaDecoder {
    format: Box<dyn FormatReader>,
    codec: Box<dyn CodecDecoder>,
    track_id: u32,
    sample_rate: u32,
    length: u64,
    path: PathBuf,
    /// Decoded frames not yet returned to the caller
    pending: Vec<StereoSample>,
    pending_pos: usize,
    /// Frames to discard after an inexact seek
    skip: u64,
    position: u64,
    sample_buf: Option<SampleBuffer<f32>>,
}

impl SymphoniaDecoder {
    /// Probe a file and prepare its first audio track for decoding
    pub fn open(path: &Path) -> Result<Self, DecoderError> {
        let file = File::open(path).map_err(|source| DecoderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let format_opts = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };
        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &format_opts, &MetadataOptions::default())
            .map_err(|e| map_symphonia_error(path, e))?;
        let format = probed.format;

        let track = format
            .default_track()
            .filter(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .or_else(|| {
                format
                    .tracks()
                    .iter()
                    .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            })
            .ok_or_else(|| DecoderError::InvalidStream("no audio track found".into()))?;

        let track_id = track.id;
        let params = track.codec_params.clone();

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| DecoderError::InvalidStream("sample rate not found".into()))?;
        let length = params
            .n_frames
            .ok_or_else(|| DecoderError::InvalidStream("track length unknown".into()))?;

        let codec = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| map_symphonia_error(path, e))?;

        log::debug!(
            "SymphoniaDecoder: {:?} track {} {}Hz, {} frames",
            path,
            track_id,
            sample_rate,
            length
        );

        Ok(Self {
            format,
            codec,
            track_id,
            sample_rate,
            length,
            path: path.to_path_buf(),
            pending: Vec::new(),
            pending_pos: 0,
            skip: 0,
            position: 0,
            sample_buf: None,
        })
    }

    /// Decode the next packet of our track into `pending`
    ///
    /// Returns `false` at end of stream.
    fn decode_next_packet(&mut self) -> Result<bool, DecoderError> {
        let mut failures = 0;

        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.codec.reset();
                    continue;
                }
                Err(e) => return Err(map_symphonia_error(&self.path, e)),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.codec.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(msg)) => {
                    failures += 1;
                    log::warn!("SymphoniaDecoder: corrupt packet in {:?}: {}", self.path, msg);
                    if failures >= MAX_DECODE_RETRIES {
                        return Err(DecoderError::Decode(format!(
                            "{} consecutive corrupt packets in {:?}",
                            failures, self.path
                        )));
                    }
                    continue;
                }
                Err(e) => return Err(map_symphonia_error(&self.path, e)),
            };

            let spec = *decoded.spec();
            let channels = spec.channels.count();
            if channels == 0 {
                return Err(DecoderError::InvalidStream("decoded packet has no channels".into()));
            }

            let needs_alloc = self
                .sample_buf
                .as_ref()
                .map_or(true, |buf| buf.capacity() < decoded.capacity() * channels);
            if needs_alloc {
                self.sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
            }
            let Some(buf) = self.sample_buf.as_mut() else {
                continue;
            };
            buf.copy_interleaved_ref(decoded);

            self.pending.clear();
            self.pending_pos = 0;
            self.pending.extend(buf.samples().chunks_exact(channels).map(|frame| {
                let left = frame[0];
                let right = if channels > 1 { frame[1] } else { left };
                StereoSample::new(left, right)
            }));

            // Drop the frames that precede the requested seek target
            let skipped = (self.skip as usize).min(self.pending.len());
            self.pending_pos = skipped;
            self.skip -= skipped as u64;

            return Ok(true);
        }
    }
}

impl Decoder for SymphoniaDecoder {
    fn length(&self) -> u64 {
        self.length
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, out: &mut [StereoSample]) -> Result<usize, DecoderError> {
        let remaining = self.length.saturating_sub(self.position);
        let wanted = (out.len() as u64).min(remaining) as usize;
        let mut written = 0;

        while written < wanted {
            if self.pending_pos >= self.pending.len() && !self.decode_next_packet()? {
                break;
            }
            let available = &self.pending[self.pending_pos..];
            let n = available.len().min(wanted - written);
            out[written..written + n].copy_from_slice(&available[..n]);
            self.pending_pos += n;
            written += n;
        }

        self.position += written as u64;
        Ok(written)
    }

    fn seek(&mut self, frame: u64) -> Result<(), DecoderError> {
        let frame = frame.min(self.length);
        let seeked = self
            .format
            .seek(
                SeekMode::Accurate,
                SeekTo::TimeStamp {
                    ts: frame,
                    track_id: self.track_id,
                },
            )
            .map_err(|e| map_symphonia_error(&self.path, e))?;

        self.codec.reset();
        self.pending.clear();
        self.pending_pos = 0;
        self.skip = seeked.required_ts.saturating_sub(seeked.actual_ts);
        self.position = frame;
        Ok(())
    }
}

fn map_symphonia_error(path: &Path, err: SymphoniaError) -> DecoderError {
    match err {
        SymphoniaError::IoError(source) if source.kind() == std::io::ErrorKind::UnexpectedEof => {
            DecoderError::InvalidStream("unexpected end of stream".into())
        }
        SymphoniaError::IoError(source) => DecoderError::Io {
            path: path.to_path_buf(),
            source,
        },
        SymphoniaError::Unsupported(what) => DecoderError::UnsupportedFormat(what.to_string()),
        SymphoniaError::DecodeError(msg) => DecoderError::Decode(msg.to_string()),
        other => DecoderError::InvalidStream(other.to_string()),
    }
}
