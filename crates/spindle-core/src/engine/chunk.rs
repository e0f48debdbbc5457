//! Chunk transfer from the decoder into the ring buffer
//!
//! Runs on the reader thread only. Every transfer writes the ring first and
//! publishes the cursors afterwards, so the render side never sees a window
//! that covers slots still being written. The one exception is the frames
//! that drop out of the window: the window edge is moved before their slots
//! are reused.

use basedrop::Shared;

use crate::decoder::{Decoder, DecoderError};
use crate::types::{Direction, StereoSample};

use super::ring::StreamShared;

/// Number of chunks read synchronously after a seek
pub const SEEK_REFILL_CHUNKS: usize = 2;

/// Result of one chunk transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub direction: Direction,
    /// Frames asked of the decoder
    pub requested: usize,
    /// Frames the decoder delivered and that were stored
    pub obtained: usize,
}

impl ChunkOutcome {
    fn idle(direction: Direction) -> Self {
        Self {
            direction,
            requested: 0,
            obtained: 0,
        }
    }

    /// The decoder delivered fewer frames than a full chunk
    pub fn is_short(&self, chunk_frames: usize) -> bool {
        self.obtained < chunk_frames
    }
}

/// Decoder cursor value that forces a seek before the next read
const CURSOR_UNKNOWN: u64 = u64::MAX;

/// Owns the track's decoder and fills the shared ring from it
pub struct ChunkReader {
    shared: Shared<StreamShared>,
    decoder: Box<dyn Decoder>,
    /// Decoder output staging, long enough for a whole seek refill
    scratch: Vec<StereoSample>,
    chunk_frames: usize,
    /// Where the decoder will read next, to skip redundant seeks
    decoder_cursor: u64,
}

impl ChunkReader {
    pub fn new(shared: Shared<StreamShared>, decoder: Box<dyn Decoder>, chunk_frames: usize) -> Self {
        Self {
            shared,
            decoder,
            scratch: vec![StereoSample::silence(); chunk_frames * SEEK_REFILL_CHUNKS],
            chunk_frames,
            decoder_cursor: 0,
        }
    }

    pub fn chunk_frames(&self) -> usize {
        self.chunk_frames
    }

    pub fn shared(&self) -> &Shared<StreamShared> {
        &self.shared
    }

    /// Transfer one chunk in `direction`
    ///
    /// Forward extends the window past the file position; backward extends
    /// it before the window start. Returns an idle outcome when the track is
    /// exhausted in that direction.
    pub fn fulfil_chunk(&mut self, direction: Direction) -> Result<ChunkOutcome, DecoderError> {
        match direction {
            Direction::Forward => self.fulfil_forward(),
            Direction::Backward => self.fulfil_backward(),
        }
    }

    fn fulfil_forward(&mut self) -> Result<ChunkOutcome, DecoderError> {
        let shared = &self.shared;
        let cursors = &shared.cursors;
        let track_length = shared.track_length;
        let capacity = shared.ring.capacity() as u64;

        let start = cursors.file_position();
        if cursors.end_of_track() || start >= track_length {
            cursors.set_end_of_track(true);
            return Ok(ChunkOutcome::idle(Direction::Forward));
        }

        let requested = (self.chunk_frames as u64).min(track_length - start) as usize;
        if self.decoder_cursor != start {
            self.decoder.seek(start)?;
            self.decoder_cursor = start;
        }
        let obtained = self.decoder.read(&mut self.scratch[..requested])?.min(requested);
        self.decoder_cursor = start + obtained as u64;

        let end = start + obtained as u64;
        if end.saturating_sub(cursors.window_start()) > capacity {
            cursors.set_window_start(end - capacity);
        }
        shared.ring.write_frames(start, &self.scratch[..obtained]);
        cursors.set_file_position(end);

        if obtained < requested || end >= track_length {
            cursors.set_end_of_track(true);
        }

        Ok(ChunkOutcome {
            direction: Direction::Forward,
            requested,
            obtained,
        })
    }

    fn fulfil_backward(&mut self) -> Result<ChunkOutcome, DecoderError> {
        let shared = &self.shared;
        let cursors = &shared.cursors;
        let capacity = shared.ring.capacity() as u64;

        let window_start = cursors.window_start();
        if window_start == 0 {
            return Ok(ChunkOutcome::idle(Direction::Backward));
        }

        let start = window_start.saturating_sub(self.chunk_frames as u64);
        let requested = (window_start - start) as usize;
        if self.decoder_cursor != start {
            self.decoder.seek(start)?;
            self.decoder_cursor = start;
        }
        let obtained = self.decoder.read(&mut self.scratch[..requested])?.min(requested);
        self.decoder_cursor = start + obtained as u64;

        // A gap between the new frames and the window would be played as
        // stale audio; keep the window as it is.
        if obtained < requested {
            return Ok(ChunkOutcome {
                direction: Direction::Backward,
                requested,
                obtained: 0,
            });
        }

        let file_position = cursors.file_position();
        if file_position.saturating_sub(start) > capacity {
            cursors.set_file_position(start + capacity);
            cursors.set_end_of_track(false);
        }
        shared.ring.write_frames(start, &self.scratch[..obtained]);
        cursors.set_window_start(start);

        Ok(ChunkOutcome {
            direction: Direction::Backward,
            requested,
            obtained,
        })
    }

    /// Re-center the window on `frame` and refill it
    ///
    /// Up to [`SEEK_REFILL_CHUNKS`] chunks are decoded from `frame` before
    /// anything shared is touched. Only then does the window become
    /// `[frame, frame + buffered)`. On error the ring and the cursors are
    /// left exactly as they were. Returns the number of frames buffered.
    pub fn seek_refill(&mut self, frame: u64) -> Result<usize, DecoderError> {
        let track_length = self.shared.track_length;
        let frame = frame.min(track_length);

        let buffered = match self.decode_refill(frame) {
            Ok(buffered) => buffered,
            Err(e) => {
                self.decoder_cursor = CURSOR_UNKNOWN;
                return Err(e);
            }
        };

        let cursors = &self.shared.cursors;
        cursors.set_end_of_track(false);
        cursors.set_window_start(frame);
        cursors.set_file_position(frame);
        self.shared.ring.write_frames(frame, &self.scratch[..buffered]);
        let end = frame + buffered as u64;
        cursors.set_file_position(end);

        let requested = ((self.chunk_frames * SEEK_REFILL_CHUNKS) as u64).min(track_length - frame) as usize;
        if buffered < requested || end >= track_length {
            cursors.set_end_of_track(true);
        }
        Ok(buffered)
    }

    /// Decode the refill at `frame` into the staging buffer
    fn decode_refill(&mut self, frame: u64) -> Result<usize, DecoderError> {
        let track_length = self.shared.track_length;
        self.decoder.seek(frame)?;
        self.decoder_cursor = frame;

        let mut buffered = 0;
        for _ in 0..SEEK_REFILL_CHUNKS {
            let position = frame + buffered as u64;
            let requested = (self.chunk_frames as u64).min(track_length - position) as usize;
            if requested == 0 {
                break;
            }
            let obtained = self
                .decoder
                .read(&mut self.scratch[buffered..buffered + requested])?
                .min(requested);
            buffered += obtained;
            self.decoder_cursor = frame + buffered as u64;
            if obtained < requested {
                break;
            }
        }
        Ok(buffered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::MemoryDecoder;
    use crate::engine::gc::gc_handle;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn ramp_reader(track_length: usize, capacity: usize, chunk: usize) -> ChunkReader {
        let shared = Shared::new(&gc_handle(), StreamShared::new(capacity, track_length as u64));
        let decoder = MemoryDecoder::from_fn(track_length, 44100, |i| StereoSample::new(i as f32, -(i as f32)));
        ChunkReader::new(shared, Box::new(decoder), chunk)
    }

    #[test]
    fn test_forward_chunks_advance_window() {
        let mut reader = ramp_reader(1000, 300, 100);

        let outcome = reader.fulfil_chunk(Direction::Forward).unwrap();
        assert_eq!(outcome.obtained, 100);
        let shared = reader.shared().clone();
        assert_eq!(shared.cursors.file_position(), 100);
        assert_eq!(shared.cursors.window_start(), 0);

        for _ in 0..3 {
            reader.fulfil_chunk(Direction::Forward).unwrap();
        }
        // 400 frames read into a 300-frame ring: window slides
        assert_eq!(shared.cursors.file_position(), 400);
        assert_eq!(shared.cursors.window_start(), 100);
        assert_eq!(shared.cursors.front_position(300), 100);
        assert_eq!(shared.ring.get(shared.ring.slot(399)).left, 399.0);
        assert_eq!(shared.ring.get(shared.ring.slot(100)).left, 100.0);
    }

    #[test]
    fn test_short_read_marks_end_of_track() {
        let mut reader = ramp_reader(250, 1000, 100);
        let shared = reader.shared().clone();

        reader.fulfil_chunk(Direction::Forward).unwrap();
        reader.fulfil_chunk(Direction::Forward).unwrap();
        assert!(!shared.cursors.end_of_track());

        let outcome = reader.fulfil_chunk(Direction::Forward).unwrap();
        assert_eq!(outcome.obtained, 50);
        assert!(outcome.is_short(100));
        assert!(shared.cursors.end_of_track());
        assert_eq!(shared.cursors.file_position(), 250);

        let outcome = reader.fulfil_chunk(Direction::Forward).unwrap();
        assert_eq!(outcome.obtained, 0);
        assert_eq!(shared.cursors.file_position(), 250);
    }

    #[test]
    fn test_seek_refill_reads_two_chunks() {
        let mut reader = ramp_reader(1000, 1000, 100);
        let shared = reader.shared().clone();

        assert_eq!(reader.seek_refill(500).unwrap(), 200);
        assert_eq!(shared.cursors.window_start(), 500);
        assert_eq!(shared.cursors.file_position(), 700);
        for frame in 500..700u64 {
            let stored = shared.ring.get(shared.ring.slot(frame));
            assert_eq!(stored, StereoSample::new(frame as f32, -(frame as f32)));
        }
    }

    #[test]
    fn test_backward_chunk_extends_window_start() {
        let mut reader = ramp_reader(1000, 300, 100);
        let shared = reader.shared().clone();
        reader.seek_refill(600).unwrap();
        assert_eq!(shared.cursors.file_position(), 800);

        let outcome = reader.fulfil_chunk(Direction::Backward).unwrap();
        assert_eq!(outcome.obtained, 100);
        assert_eq!(shared.cursors.window_start(), 500);
        assert_eq!(shared.cursors.file_position(), 800);
        assert_eq!(shared.ring.get(shared.ring.slot(550)).left, 550.0);

        // Next backward chunk would exceed capacity: the front retreats
        reader.fulfil_chunk(Direction::Backward).unwrap();
        assert_eq!(shared.cursors.window_start(), 400);
        assert_eq!(shared.cursors.file_position(), 700);

        // Forward again resumes at the retreated front with a decoder seek
        reader.fulfil_chunk(Direction::Forward).unwrap();
        assert_eq!(shared.cursors.file_position(), 800);
        assert_eq!(shared.ring.get(shared.ring.slot(750)).left, 750.0);
    }

    #[test]
    fn test_backward_stops_at_track_start() {
        let mut reader = ramp_reader(1000, 1000, 100);
        let shared = reader.shared().clone();
        reader.seek_refill(30).unwrap();

        let outcome = reader.fulfil_chunk(Direction::Backward).unwrap();
        assert_eq!(outcome.obtained, 30);
        assert_eq!(shared.cursors.window_start(), 0);

        let outcome = reader.fulfil_chunk(Direction::Backward).unwrap();
        assert_eq!(outcome.obtained, 0);
    }

    /// Ramp decoder whose reads fail once its read allowance runs out
    struct FailingReads {
        inner: MemoryDecoder,
        reads_left: Arc<AtomicUsize>,
    }

    impl Decoder for FailingReads {
        fn length(&self) -> u64 {
            self.inner.length()
        }

        fn sample_rate(&self) -> u32 {
            self.inner.sample_rate()
        }

        fn read(&mut self, out: &mut [StereoSample]) -> Result<usize, DecoderError> {
            let left = self.reads_left.load(Ordering::SeqCst);
            if left == 0 {
                return Err(DecoderError::Decode("read failed".to_string()));
            }
            self.reads_left.store(left - 1, Ordering::SeqCst);
            self.inner.read(out)
        }

        fn seek(&mut self, frame: u64) -> Result<(), DecoderError> {
            self.inner.seek(frame)
        }
    }

    #[test]
    fn test_failed_seek_refill_leaves_window_untouched() {
        let reads_left = Arc::new(AtomicUsize::new(3));
        let shared = Shared::new(&gc_handle(), StreamShared::new(300, 1000));
        let decoder = FailingReads {
            inner: MemoryDecoder::from_fn(1000, 44100, |i| StereoSample::new(i as f32, -(i as f32))),
            reads_left: reads_left.clone(),
        };
        let mut reader = ChunkReader::new(shared.clone(), Box::new(decoder), 100);
        reader.seek_refill(0).unwrap();
        reader.fulfil_chunk(Direction::Forward).unwrap();
        assert_eq!(shared.cursors.file_position(), 300);

        // First refill chunk decodes, the second fails
        reads_left.store(1, Ordering::SeqCst);
        assert!(reader.seek_refill(600).is_err());
        assert_eq!(shared.cursors.window_start(), 0);
        assert_eq!(shared.cursors.file_position(), 300);
        assert!(!shared.cursors.end_of_track());
        // Frame 600 shares slot 0 with frame 0
        assert_eq!(shared.ring.get(shared.ring.slot(0)).left, 0.0);
        assert_eq!(shared.ring.get(shared.ring.slot(99)).left, 99.0);

        // The decoder is repositioned before the next forward chunk
        reads_left.store(1, Ordering::SeqCst);
        reader.fulfil_chunk(Direction::Forward).unwrap();
        assert_eq!(shared.cursors.file_position(), 400);
        assert_eq!(shared.ring.get(shared.ring.slot(300)).left, 300.0);
    }

    #[test]
    fn test_seek_refill_near_track_end_marks_end_of_track() {
        let mut reader = ramp_reader(1000, 1000, 100);
        let shared = reader.shared().clone();

        assert_eq!(reader.seek_refill(950).unwrap(), 50);
        assert_eq!(shared.cursors.file_position(), 1000);
        assert!(shared.cursors.end_of_track());
        assert_eq!(shared.ring.get(shared.ring.slot(999)).left, 999.0);
    }
}
