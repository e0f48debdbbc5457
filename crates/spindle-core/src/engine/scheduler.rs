//! Read-ahead scheduling, run once per render block
//!
//! Decides whether the buffered window needs another chunk and in which
//! direction. Never blocks: a request is a compare-and-swap on the shared
//! pending flag followed by a `try_send` into the reader's one-slot wake
//! channel. While a request is outstanding, further triggers only count
//! backlogged blocks.

use crossbeam::channel::Sender;

use crate::config::StreamConfig;
use crate::types::Direction;

use super::reader::Wake;
use super::ring::{distance, StreamShared};

/// What `check_read` did this block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadDecision {
    /// Margins are sufficient, or the track is exhausted where it is short
    Idle,
    /// A seek refill is in flight; scheduling is suspended
    Deferred,
    /// A chunk was requested in this direction
    Requested(Direction),
    /// A chunk is needed but one is already outstanding
    ///
    /// `warn` is set on the single block where the backlog reaches the
    /// warning threshold.
    Backlogged { blocks: u32, warn: bool },
}

/// Per-stream read-ahead state owned by the render callback
#[derive(Debug, Clone)]
pub struct ReadScheduler {
    readahead: u64,
    config: StreamConfig,
    direction: Direction,
    backlog: u32,
    warn_blocks: u32,
    warn_block_frames: usize,
}

impl ReadScheduler {
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            readahead: config.readahead_frames as u64,
            config: config.clone(),
            direction: Direction::Forward,
            backlog: 0,
            warn_blocks: 1,
            warn_block_frames: 0,
        }
    }

    /// Direction of the most recent request
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Consecutive blocks with an unanswered request
    pub fn backlog(&self) -> u32 {
        self.backlog
    }

    /// Forget per-track state
    pub fn reset(&mut self) {
        self.direction = Direction::Forward;
        self.backlog = 0;
    }

    /// Frames buffered ahead of the play position
    ///
    /// Circular distance from the play slot to the front slot, with the two
    /// cases the ring cannot tell apart resolved from the track cursors:
    /// playing at or past the file position (nothing ahead) and a full ring
    /// ahead (distance would wrap to zero).
    pub fn forward_margin(stream: &StreamShared, play_frame: u64) -> u64 {
        let capacity = stream.ring.capacity();
        let file_position = stream.cursors.file_position();
        if play_frame >= file_position {
            return 0;
        }
        if file_position - play_frame >= capacity as u64 {
            return capacity as u64;
        }
        distance(stream.ring.slot(play_frame), stream.cursors.front_position(capacity), capacity) as u64
    }

    /// Frames buffered behind the play position
    pub fn backward_margin(stream: &StreamShared, play_frame: u64) -> u64 {
        play_frame.saturating_sub(stream.cursors.window_start())
    }

    /// Run the read-ahead heuristic for one block
    ///
    /// `seek_in_flight` suspends scheduling while a seek completion is
    /// queued but not yet committed, because the play position is stale.
    pub fn check_read(
        &mut self,
        stream: &StreamShared,
        wake: &Sender<Wake>,
        play_position: f64,
        block_frames: usize,
        seek_in_flight: bool,
    ) -> ReadDecision {
        let cursors = &stream.cursors;
        if seek_in_flight || cursors.is_seeking() {
            return ReadDecision::Deferred;
        }

        let play_frame = play_position.max(0.0).floor() as u64;

        let forward_open = !cursors.end_of_track() && cursors.file_position() < stream.track_length;
        let wanted = if forward_open && Self::forward_margin(stream, play_frame) < self.readahead {
            Some(Direction::Forward)
        } else if cursors.window_start() > 0 && Self::backward_margin(stream, play_frame) < self.readahead {
            Some(Direction::Backward)
        } else {
            None
        };

        let Some(direction) = wanted else {
            self.backlog = 0;
            return ReadDecision::Idle;
        };

        if cursors.try_claim_pending() {
            self.direction = direction;
            self.backlog = 0;
            // The slot can only be occupied by a stop wake; the reader is
            // exiting then and the request is moot.
            let _ = wake.try_send(Wake::Read(direction));
            return ReadDecision::Requested(direction);
        }

        if block_frames != self.warn_block_frames {
            self.warn_blocks = self.config.backlog_warn_blocks(block_frames);
            self.warn_block_frames = block_frames;
        }
        self.backlog = self.backlog.saturating_add(1);
        ReadDecision::Backlogged {
            blocks: self.backlog,
            warn: self.backlog == self.warn_blocks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::MemoryDecoder;
    use crate::engine::chunk::ChunkReader;
    use crate::engine::gc::gc_handle;
    use crate::types::StereoSample;
    use basedrop::Shared;
    use crossbeam::channel::{self, Receiver};

    struct Harness {
        scheduler: ReadScheduler,
        reader: ChunkReader,
        shared: Shared<StreamShared>,
        wake_tx: Sender<Wake>,
        wake_rx: Receiver<Wake>,
    }

    fn harness(track_length: usize, capacity: usize, chunk: usize, readahead: usize) -> Harness {
        let config = StreamConfig::with_geometry(capacity, chunk, readahead);
        config.validate().unwrap();
        let shared = Shared::new(&gc_handle(), StreamShared::new(capacity, track_length as u64));
        let decoder = MemoryDecoder::from_fn(track_length, 44100, |i| StereoSample::mono(i as f32));
        let reader = ChunkReader::new(shared.clone(), Box::new(decoder), chunk);
        let (wake_tx, wake_rx) = channel::bounded(1);
        Harness {
            scheduler: ReadScheduler::new(&config),
            reader,
            shared,
            wake_tx,
            wake_rx,
        }
    }

    impl Harness {
        fn check(&mut self, play: f64, block: usize) -> ReadDecision {
            self.scheduler.check_read(&self.shared, &self.wake_tx, play, block, false)
        }

        /// Service any queued wake the way the reader thread does
        fn service(&mut self) {
            if let Ok(Wake::Read(direction)) = self.wake_rx.try_recv() {
                self.reader.fulfil_chunk(direction).unwrap();
                self.shared.cursors.clear_pending();
            }
        }
    }

    #[test]
    fn test_requests_forward_when_margin_short() {
        let mut h = harness(10_000, 1000, 100, 300);
        h.reader.seek_refill(0).unwrap();

        assert_eq!(h.check(0.0, 64), ReadDecision::Requested(Direction::Forward));
        assert_eq!(h.wake_rx.try_recv().unwrap(), Wake::Read(Direction::Forward));
        assert!(h.shared.cursors.is_pending());
    }

    #[test]
    fn test_pending_request_only_grows_backlog() {
        let mut h = harness(10_000, 1000, 100, 300);
        h.reader.seek_refill(0).unwrap();

        assert_eq!(h.check(0.0, 64), ReadDecision::Requested(Direction::Forward));
        // 0.9 * 300 / 64 -> warning on the 5th backlogged block
        for blocks in 1..=8u32 {
            let decision = h.check(0.0, 64);
            assert_eq!(decision, ReadDecision::Backlogged { blocks, warn: blocks == 5 });
        }
        // Still exactly one wake queued
        assert!(h.wake_rx.try_recv().is_ok());
        assert!(h.wake_rx.try_recv().is_err());

        h.reader.fulfil_chunk(Direction::Forward).unwrap();
        h.shared.cursors.clear_pending();
        assert_eq!(h.check(0.0, 64), ReadDecision::Idle);
        assert_eq!(h.scheduler.backlog(), 0);
    }

    #[test]
    fn test_margin_kept_while_advancing() {
        let (capacity, chunk, readahead) = (1000usize, 100usize, 300u64);
        let mut h = harness(10_000, capacity, chunk, readahead as usize);
        h.reader.seek_refill(0).unwrap();

        let block = 10;
        let mut play = 0.0f64;
        while play <= 700.0 {
            let decision = h.check(play, block);
            h.service();

            let margin = ReadScheduler::forward_margin(&h.shared, play as u64);
            assert!(
                margin >= readahead || h.shared.cursors.is_pending() || matches!(decision, ReadDecision::Requested(_)),
                "margin {} at play {}",
                margin,
                play
            );
            // The reader never laps the play position
            let cursors = &h.shared.cursors;
            assert!(cursors.window_start() <= play as u64);
            assert!(cursors.file_position() - cursors.window_start() <= capacity as u64);

            play += block as f64;
        }
        assert!(h.shared.cursors.file_position() >= 700 + readahead);
    }

    #[test]
    fn test_requests_backward_when_playing_in_reverse() {
        let mut h = harness(10_000, 1000, 100, 300);
        h.reader.seek_refill(5000).unwrap();
        // Forward is topped up first
        assert_eq!(h.check(5000.0, 64), ReadDecision::Requested(Direction::Forward));
        h.service();
        assert!(ReadScheduler::forward_margin(&h.shared, 5000) >= 300);

        assert_eq!(h.check(5000.0, 64), ReadDecision::Requested(Direction::Backward));
        assert_eq!(h.scheduler.direction(), Direction::Backward);
        h.service();
        assert_eq!(h.shared.cursors.window_start(), 4900);
    }

    #[test]
    fn test_stationary_position_settles() {
        let mut h = harness(20_000, 1000, 100, 300);
        h.reader.seek_refill(10_000).unwrap();

        let mut reads = 0;
        for _ in 0..200 {
            if let ReadDecision::Requested(_) = h.check(10_000.0, 64) {
                reads += 1;
            }
            h.service();
        }
        // One forward chunk then three backward chunks fill both margins
        assert_eq!(reads, 4);
        assert_eq!(h.check(10_000.0, 64), ReadDecision::Idle);
        assert_eq!(h.shared.cursors.window_start(), 9700);
        assert_eq!(h.shared.cursors.file_position(), 10_300);
    }

    #[test]
    fn test_no_forward_request_after_end_of_track() {
        let mut h = harness(250, 1000, 100, 300);
        h.reader.seek_refill(0).unwrap();
        h.check(0.0, 64);
        h.service();

        assert!(h.shared.cursors.end_of_track());
        assert_eq!(h.shared.cursors.file_position(), 250);
        for play in [0.0, 100.0, 249.0, 250.0] {
            assert_eq!(h.check(play, 64), ReadDecision::Idle);
        }
    }

    #[test]
    fn test_deferred_while_seeking() {
        let mut h = harness(10_000, 1000, 100, 300);
        assert_eq!(
            h.scheduler.check_read(&h.shared, &h.wake_tx, 0.0, 64, true),
            ReadDecision::Deferred
        );
        h.shared.cursors.set_seeking(true);
        assert_eq!(h.check(0.0, 64), ReadDecision::Deferred);
        assert!(!h.shared.cursors.is_pending());
    }

    #[test]
    fn test_forward_margin_edges() {
        let h = harness(10_000, 1000, 100, 300);
        h.shared.cursors.set_window_start(0);
        h.shared.cursors.set_file_position(1000);
        assert_eq!(ReadScheduler::forward_margin(&h.shared, 0), 1000);
        assert_eq!(ReadScheduler::forward_margin(&h.shared, 999), 1);
        assert_eq!(ReadScheduler::forward_margin(&h.shared, 1000), 0);
        assert_eq!(ReadScheduler::forward_margin(&h.shared, 1500), 0);
        assert_eq!(ReadScheduler::forward_margin(&h.shared, 250), 750);
    }
}
