//! Background reader thread
//!
//! Owns the track's [`ChunkReader`] and waits on two channels:
//!
//! - the **wake** channel (bounded to one slot) carries chunk requests from
//!   the render callback's scheduler; the shared pending flag guarantees at
//!   most one is outstanding
//! - the **control** channel carries seeks from the control thread
//!
//! Seeks are refilled here, never on the render callback. When the window
//! around the new position is buffered, a [`SeekCompletion`] is pushed to
//! the render callback, which commits the new play position at the start of
//! its next block. A refill that fails pushes nothing and reports
//! [`TransportEvent::SeekFailed`] instead.
//!
//! Shutdown: set the stop flag, send one wake, wait for the exit
//! notification with a timeout, join.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{self, select, Receiver, Sender, TryRecvError};

use crate::transport::TransportEvent;
use crate::types::Direction;

use super::chunk::ChunkReader;
use super::error::EngineError;

/// Message on the wake channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// Read one chunk in this direction
    Read(Direction),
    /// Re-check the stop flag
    Stop,
}

/// Seek target handed from the reader to the render callback once the
/// window around it is buffered
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekCompletion {
    /// New play position in frames
    pub target: f64,
}

enum ReaderControl {
    Seek { target: f64 },
}

/// Sends the exit notification however the thread leaves its loop
struct ExitNotifier(Sender<()>);

impl Drop for ExitNotifier {
    fn drop(&mut self) {
        let _ = self.0.send(());
    }
}

/// Handle to a running reader thread
pub struct ReaderTask {
    stop: Arc<AtomicBool>,
    wake_tx: Sender<Wake>,
    control_tx: Sender<ReaderControl>,
    done_rx: Receiver<()>,
    handle: Option<JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl ReaderTask {
    /// Start the reader thread
    ///
    /// Returns the task handle and the wake sender for the render callback.
    pub fn spawn(
        chunk_reader: ChunkReader,
        completions: rtrb::Producer<SeekCompletion>,
        events: Sender<TransportEvent>,
        shutdown_timeout: Duration,
    ) -> Result<(Self, Sender<Wake>), EngineError> {
        let stop = Arc::new(AtomicBool::new(false));
        let (wake_tx, wake_rx) = channel::bounded(1);
        let (control_tx, control_rx) = channel::unbounded();
        let (done_tx, done_rx) = channel::bounded(1);

        let thread_stop = stop.clone();
        let handle = std::thread::Builder::new()
            .name("stream-reader".to_string())
            .spawn(move || {
                let _exit = ExitNotifier(done_tx);
                let mut worker = ReaderWorker {
                    chunk_reader,
                    completions,
                    events,
                    wake_rx,
                    control_rx,
                    stop: thread_stop,
                };
                worker.run();
            })
            .map_err(EngineError::Spawn)?;

        log::debug!("Reader thread started");

        Ok((
            Self {
                stop,
                wake_tx: wake_tx.clone(),
                control_tx,
                done_rx,
                handle: Some(handle),
                shutdown_timeout,
            },
            wake_tx,
        ))
    }

    /// Ask the reader to refill around `target` frames
    ///
    /// Returns `false` if the thread has already exited.
    pub fn seek(&self, target: f64) -> bool {
        self.control_tx.send(ReaderControl::Seek { target }).is_ok()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Stop the thread and wait for it to exit
    ///
    /// Fails with [`EngineError::ShutdownTimeout`] if the thread does not
    /// exit in time; the thread is then detached.
    pub fn stop(&mut self) -> Result<(), EngineError> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        self.stop.store(true, Ordering::Release);
        // A full wake slot already guarantees the thread wakes up
        let _ = self.wake_tx.try_send(Wake::Stop);

        match self.done_rx.recv_timeout(self.shutdown_timeout) {
            Ok(()) | Err(channel::RecvTimeoutError::Disconnected) => {}
            Err(channel::RecvTimeoutError::Timeout) => {
                log::error!("Reader thread did not stop within {:?}", self.shutdown_timeout);
                return Err(EngineError::ShutdownTimeout(self.shutdown_timeout));
            }
        }

        handle.join().map_err(|_| EngineError::ReaderPanicked)?;
        log::debug!("Reader thread stopped");
        Ok(())
    }
}

impl Drop for ReaderTask {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("Reader shutdown on drop: {}", e);
        }
    }
}

struct ReaderWorker {
    chunk_reader: ChunkReader,
    completions: rtrb::Producer<SeekCompletion>,
    events: Sender<TransportEvent>,
    wake_rx: Receiver<Wake>,
    control_rx: Receiver<ReaderControl>,
    stop: Arc<AtomicBool>,
}

impl ReaderWorker {
    fn run(&mut self) {
        let wake_rx = self.wake_rx.clone();
        let control_rx = self.control_rx.clone();

        while !self.stop.load(Ordering::Acquire) {
            let keep_running = select! {
                recv(wake_rx) -> msg => match msg {
                    Ok(Wake::Read(direction)) if !self.stop.load(Ordering::Acquire) => {
                        self.read_chunk(direction);
                        true
                    }
                    _ => false,
                },
                recv(control_rx) -> msg => match msg {
                    Ok(ReaderControl::Seek { target }) => {
                        self.seek(target);
                        true
                    }
                    Err(_) => false,
                },
            };
            if !keep_running {
                break;
            }
        }
    }

    fn read_chunk(&mut self, direction: Direction) {
        let chunk_frames = self.chunk_reader.chunk_frames();
        match self.chunk_reader.fulfil_chunk(direction) {
            Ok(outcome) => {
                if direction == Direction::Forward && outcome.requested > 0 && outcome.is_short(chunk_frames) {
                    log::debug!(
                        "Short read: {} of {} frames, end of track",
                        outcome.obtained,
                        chunk_frames
                    );
                    let _ = self.events.send(TransportEvent::ShortRead {
                        requested: chunk_frames,
                        obtained: outcome.obtained,
                    });
                }
            }
            Err(e) => {
                log::error!("Chunk read ({:?}) failed: {}", direction, e);
                // Stop asking a decoder that cannot go further forward
                if direction == Direction::Forward {
                    self.chunk_reader.shared().cursors.set_end_of_track(true);
                }
            }
        }
        self.chunk_reader.shared().cursors.clear_pending();
    }

    fn seek(&mut self, target: f64) {
        let shared = self.chunk_reader.shared().clone();
        let target = target.clamp(0.0, shared.track_length as f64);

        shared.cursors.set_seeking(true);
        self.drain_wakes();

        let refill = self.chunk_reader.seek_refill(target.floor() as u64);

        // Requests issued against the old position are stale now
        self.drain_wakes();
        match refill {
            Ok(buffered) => {
                log::debug!("Seek to frame {:.0}: {} frames buffered", target, buffered);
                if self.completions.push(SeekCompletion { target }).is_err() {
                    log::warn!("Seek completion queue full, seek to {:.0} dropped", target);
                }
            }
            Err(e) => {
                // The window is unchanged, so playback carries on where it is
                log::error!("Seek refill at frame {:.0} failed: {}", target, e);
                let _ = self.events.send(TransportEvent::SeekFailed {
                    target,
                    reason: e.to_string(),
                });
            }
        }
        shared.cursors.clear_pending();
        shared.cursors.set_seeking(false);
    }

    fn drain_wakes(&mut self) {
        loop {
            match self.wake_rx.try_recv() {
                Ok(Wake::Read(_)) => continue,
                Ok(Wake::Stop) => {
                    // Keep the stop request for the main loop
                    self.stop.store(true, Ordering::Release);
                    break;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{Decoder, DecoderError, MemoryDecoder};
    use crate::engine::gc::gc_handle;
    use crate::engine::ring::StreamShared;
    use crate::types::StereoSample;
    use basedrop::Shared;

    fn spawn_ramp(
        track_length: usize,
        capacity: usize,
        chunk: usize,
    ) -> (
        ReaderTask,
        Sender<Wake>,
        Shared<StreamShared>,
        rtrb::Consumer<SeekCompletion>,
        Receiver<TransportEvent>,
    ) {
        let shared = Shared::new(&gc_handle(), StreamShared::new(capacity, track_length as u64));
        let decoder = MemoryDecoder::from_fn(track_length, 44100, |i| StereoSample::mono(i as f32));
        let chunk_reader = ChunkReader::new(shared.clone(), Box::new(decoder), chunk);
        let (completion_tx, completion_rx) = rtrb::RingBuffer::new(4);
        let (event_tx, event_rx) = channel::unbounded();
        let (task, wake) =
            ReaderTask::spawn(chunk_reader, completion_tx, event_tx, Duration::from_secs(2)).unwrap();
        (task, wake, shared, completion_rx, event_rx)
    }

    fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        panic!("condition not reached in time");
    }

    #[test]
    fn test_wake_reads_chunk_and_clears_pending() {
        let (mut task, wake, shared, _completions, _events) = spawn_ramp(1000, 1000, 100);

        assert!(shared.cursors.try_claim_pending());
        wake.try_send(Wake::Read(Direction::Forward)).unwrap();
        wait_until(|| !shared.cursors.is_pending());
        assert_eq!(shared.cursors.file_position(), 100);

        task.stop().unwrap();
    }

    #[test]
    fn test_seek_refills_and_completes() {
        let (mut task, _wake, shared, mut completions, _events) = spawn_ramp(1000, 1000, 100);

        assert!(task.seek(500.0));
        wait_until(|| !completions.is_empty());

        let done = completions.pop().unwrap();
        assert_eq!(done.target, 500.0);
        assert_eq!(shared.cursors.window_start(), 500);
        assert_eq!(shared.cursors.file_position(), 700);
        assert_eq!(shared.ring.get(shared.ring.slot(500)).left, 500.0);
        assert!(!shared.cursors.is_seeking());

        task.stop().unwrap();
    }

    #[test]
    fn test_short_read_event_at_track_end() {
        let (mut task, wake, shared, _completions, events) = spawn_ramp(150, 1000, 100);

        for _ in 0..2 {
            assert!(shared.cursors.try_claim_pending());
            wake.try_send(Wake::Read(Direction::Forward)).unwrap();
            wait_until(|| !shared.cursors.is_pending());
        }

        let event = events.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(event, TransportEvent::ShortRead { requested: 100, obtained: 50 });
        assert!(shared.cursors.end_of_track());

        task.stop().unwrap();
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut task, _wake, _shared, _completions, _events) = spawn_ramp(100, 200, 50);
        task.stop().unwrap();
        assert!(!task.is_running());
        task.stop().unwrap();
        assert!(!task.seek(10.0));
    }

    /// Ramp decoder that can only read from where it starts
    struct NoSeekDecoder(MemoryDecoder);

    impl Decoder for NoSeekDecoder {
        fn length(&self) -> u64 {
            self.0.length()
        }

        fn sample_rate(&self) -> u32 {
            self.0.sample_rate()
        }

        fn read(&mut self, out: &mut [StereoSample]) -> Result<usize, DecoderError> {
            self.0.read(out)
        }

        fn seek(&mut self, _frame: u64) -> Result<(), DecoderError> {
            Err(DecoderError::Decode("stream is not seekable".to_string()))
        }
    }

    #[test]
    fn test_failed_seek_is_not_committed() {
        let shared = Shared::new(&gc_handle(), StreamShared::new(1000, 10_000));
        let decoder = NoSeekDecoder(MemoryDecoder::from_fn(10_000, 44100, |i| StereoSample::mono(i as f32)));
        let chunk_reader = ChunkReader::new(shared.clone(), Box::new(decoder), 100);
        let (completion_tx, mut completions) = rtrb::RingBuffer::new(4);
        let (event_tx, events) = channel::unbounded();
        let (mut task, wake) =
            ReaderTask::spawn(chunk_reader, completion_tx, event_tx, Duration::from_secs(2)).unwrap();

        // Reading on from frame 0 needs no decoder seek
        assert!(shared.cursors.try_claim_pending());
        wake.try_send(Wake::Read(Direction::Forward)).unwrap();
        wait_until(|| !shared.cursors.is_pending());
        assert_eq!(shared.cursors.file_position(), 100);

        assert!(task.seek(5000.0));
        let event = events.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(
            event,
            TransportEvent::SeekFailed {
                target: 5000.0,
                reason: "Decode error: stream is not seekable".to_string(),
            }
        );
        wait_until(|| !shared.cursors.is_seeking());

        assert!(completions.pop().is_err());
        assert_eq!(shared.cursors.window_start(), 0);
        assert_eq!(shared.cursors.file_position(), 100);
        assert!(!shared.cursors.end_of_track());
        assert!(!shared.cursors.is_pending());

        task.stop().unwrap();
    }
}
