//! Circular frame store shared by the reader thread and the render callback
//!
//! Track frame `p` always lives in slot `p % capacity`. Slots hold the two
//! channels as `f32` bit patterns in atomics, so the reader can write while
//! the render callback reads without a lock. Safety of the overlap is a
//! geometry question, not a memory one: the reader only overwrites frames
//! more than one chunk behind the render cursor (see
//! [`StreamConfig::validate`](crate::config::StreamConfig::validate)).
//!
//! ```text
//!            window_start                   file_position
//!                 │                               │
//!   track  ───────[═══════════ buffered ══════════)──────────▶
//!                 │         ▲                     │
//!                 │   play position               │
//!   slots    p % C for every p in the window (len <= C)
//! ```

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::types::StereoSample;

/// Circular distance from slot `start` to slot `end` in a ring of `capacity`
///
/// `distance(x, x) == 0`; otherwise the number of slots walked forward from
/// `start` to reach `end`.
#[inline]
pub fn distance(start: usize, end: usize, capacity: usize) -> usize {
    if end >= start {
        end - start
    } else {
        end + capacity - start
    }
}

/// Fixed-capacity ring of stereo frames
pub struct RingBuffer {
    left: Box<[AtomicU32]>,
    right: Box<[AtomicU32]>,
}

impl RingBuffer {
    /// Allocate a silent ring of `capacity` frames
    pub fn new(capacity: usize) -> Self {
        let silent = || (0..capacity).map(|_| AtomicU32::new(0.0f32.to_bits())).collect();
        Self {
            left: silent(),
            right: silent(),
        }
    }

    /// Capacity in frames
    #[inline]
    pub fn capacity(&self) -> usize {
        self.left.len()
    }

    /// Slot holding track frame `frame`
    #[inline]
    pub fn slot(&self, frame: u64) -> usize {
        (frame % self.capacity() as u64) as usize
    }

    /// Read the frame stored in `slot`
    #[inline]
    pub fn get(&self, slot: usize) -> StereoSample {
        StereoSample::new(
            f32::from_bits(self.left[slot].load(Ordering::Relaxed)),
            f32::from_bits(self.right[slot].load(Ordering::Relaxed)),
        )
    }

    /// Overwrite the frame stored in `slot`
    #[inline]
    pub fn set(&self, slot: usize, frame: StereoSample) {
        self.left[slot].store(frame.left.to_bits(), Ordering::Relaxed);
        self.right[slot].store(frame.right.to_bits(), Ordering::Relaxed);
    }

    /// Store consecutive track frames starting at track frame `first`
    ///
    /// Wraps around the end of the ring. At most `capacity` frames are kept;
    /// a longer slice only leaves its tail in the ring.
    pub fn write_frames(&self, first: u64, frames: &[StereoSample]) {
        let capacity = self.capacity();
        let skip = frames.len().saturating_sub(capacity);
        let mut slot = self.slot(first + skip as u64);
        for &frame in &frames[skip..] {
            self.set(slot, frame);
            slot += 1;
            if slot == capacity {
                slot = 0;
            }
        }
    }
}

/// Window bookkeeping published by the reader and read by the render side
///
/// Writers store with `Release` after touching the ring; readers load with
/// `Acquire` so the slot writes that preceded a cursor update are visible.
#[derive(Debug, Default)]
pub struct StreamCursors {
    /// Exclusive end of the buffered window, in track frames
    file_position: AtomicU64,
    /// First buffered track frame
    window_start: AtomicU64,
    /// Forward reads reached the end of the track
    end_of_track: AtomicBool,
    /// The reader is refilling the window for a seek
    seeking: AtomicBool,
    /// A chunk request is queued or in flight
    pending: AtomicBool,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn file_position(&self) -> u64 {
        self.file_position.load(Ordering::Acquire)
    }

    #[inline]
    pub fn window_start(&self) -> u64 {
        self.window_start.load(Ordering::Acquire)
    }

    #[inline]
    pub fn end_of_track(&self) -> bool {
        self.end_of_track.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_seeking(&self) -> bool {
        self.seeking.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Slot the next forward chunk is written to
    #[inline]
    pub fn front_position(&self, capacity: usize) -> usize {
        (self.file_position() % capacity as u64) as usize
    }

    /// Claim the single outstanding-request slot
    ///
    /// Returns `false` if a request is already queued or in flight.
    #[inline]
    pub fn try_claim_pending(&self) -> bool {
        self.pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn clear_pending(&self) {
        self.pending.store(false, Ordering::Release);
    }

    pub(crate) fn set_file_position(&self, frame: u64) {
        self.file_position.store(frame, Ordering::Release);
    }

    pub(crate) fn set_window_start(&self, frame: u64) {
        self.window_start.store(frame, Ordering::Release);
    }

    pub(crate) fn set_end_of_track(&self, eot: bool) {
        self.end_of_track.store(eot, Ordering::Release);
    }

    pub(crate) fn set_seeking(&self, seeking: bool) {
        self.seeking.store(seeking, Ordering::Release);
    }
}

/// Everything the reader and the render callback share for one track
pub struct StreamShared {
    pub ring: RingBuffer,
    pub cursors: StreamCursors,
    /// Track length in frames
    pub track_length: u64,
}

impl StreamShared {
    pub fn new(capacity: usize, track_length: u64) -> Self {
        Self {
            ring: RingBuffer::new(capacity),
            cursors: StreamCursors::new(),
            track_length,
        }
    }
}
