//! In-memory decoder

use crate::types::StereoSample;

use super::{Decoder, DecoderError};

/// Decoder over frames that are already in memory
#[derive(Debug, Clone)]
pub struct MemoryDecoder {
    frames: Vec<StereoSample>,
    sample_rate: u32,
    position: usize,
}

impl MemoryDecoder {
    /// Wrap a frame vector
    pub fn new(frames: Vec<StereoSample>, sample_rate: u32) -> Self {
        Self {
            frames,
            sample_rate,
            position: 0,
        }
    }

    /// Build `len` frames from a generator called with each frame index
    pub fn from_fn(len: usize, sample_rate: u32, f: impl FnMut(usize) -> StereoSample) -> Self {
        Self::new((0..len).map(f).collect(), sample_rate)
    }

    /// Current read position in frames
    pub fn position(&self) -> u64 {
        self.position as u64
    }
}

impl Decoder for MemoryDecoder {
    fn length(&self) -> u64 {
        self.frames.len() as u64
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, out: &mut [StereoSample]) -> Result<usize, DecoderError> {
        let available = &self.frames[self.position..];
        let n = out.len().min(available.len());
        out[..n].copy_from_slice(&available[..n]);
        self.position += n;
        Ok(n)
    }

    fn seek(&mut self, frame: u64) -> Result<(), DecoderError> {
        self.position = (frame.min(self.frames.len() as u64)) as usize;
        Ok(())
    }
}
