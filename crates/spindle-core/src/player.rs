//! Control-side owner of a streaming player
//!
//! [`Player::new`] returns the two halves of a player: the [`Player`] stays
//! on the control thread (UI, console, MIDI), the [`RenderEngine`] moves into
//! the audio callback. They share nothing but lock-free queues and the
//! [`TransportAtomics`] mirror.
//!
//! ```ignore
//! let (mut player, engine) = Player::new(StreamConfig::default())?;
//! let _audio = start_audio_output(&AudioConfig::default(), engine)?;
//! player.load_track(Path::new("track.flac"))?;
//! player.apply(TransportCommand::Play)?;
//! for event in player.poll_events() { /* update UI */ }
//! player.shutdown()?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use basedrop::{Owned, Shared};
use crossbeam::channel::{self, Receiver, Sender};

use crate::config::StreamConfig;
use crate::decoder::{open_decoder, Decoder};
use crate::engine::gc::gc_handle;
use crate::engine::{
    command_channel, ChunkReader, EngineCommand, EngineError, ReaderTask, RenderEngine, RenderStream,
    StreamShared, TrackLoadError,
};
use crate::transport::{TransportAtomics, TransportCommand, TransportEvent, WheelGesture, WHEEL_STEPS};

/// Seek completions that can queue up before the render callback drains them
const SEEK_QUEUE_CAPACITY: usize = 16;

/// Control handle for one deck
pub struct Player {
    config: StreamConfig,
    commands: rtrb::Producer<EngineCommand>,
    render_events: rtrb::Consumer<TransportEvent>,
    reader_events_tx: Sender<TransportEvent>,
    reader_events_rx: Receiver<TransportEvent>,
    /// Events raised on the control thread itself (load results)
    local_events: Vec<TransportEvent>,
    atomics: Arc<TransportAtomics>,
    reader: Option<ReaderTask>,
    track: Option<PathBuf>,
    track_length: u64,
    /// Target of the latest seek the render callback has not committed yet
    pending_seek: Option<f64>,
    wheel: WheelGesture,
}

impl Player {
    /// Create a player and its render engine
    pub fn new(config: StreamConfig) -> Result<(Self, RenderEngine), EngineError> {
        config.validate()?;

        let (commands, command_rx) = command_channel(config.queue_capacity);
        let (event_tx, render_events) = rtrb::RingBuffer::new(config.queue_capacity);
        let (reader_events_tx, reader_events_rx) = channel::unbounded();
        let atomics = Arc::new(TransportAtomics::new());

        let engine = RenderEngine::new(config.clone(), command_rx, event_tx, atomics.clone());

        log::info!(
            "Player ready: ring {} frames, chunk {}, read-ahead {}",
            config.capacity_frames,
            config.chunk_frames,
            config.readahead_frames
        );

        Ok((
            Self {
                config,
                commands,
                render_events,
                reader_events_tx,
                reader_events_rx,
                local_events: Vec::new(),
                atomics,
                reader: None,
                track: None,
                track_length: 0,
                pending_seek: None,
                wheel: WheelGesture::new(),
            },
            engine,
        ))
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Lock-free view of the render state
    pub fn atomics(&self) -> Arc<TransportAtomics> {
        self.atomics.clone()
    }

    /// Path of the streaming track
    pub fn track(&self) -> Option<&Path> {
        self.track.as_deref()
    }

    /// Length of the streaming track in frames
    pub fn track_length(&self) -> u64 {
        self.track_length
    }

    /// Apply a transport command
    ///
    /// Only [`TransportCommand::Load`] can fail.
    pub fn apply(&mut self, command: TransportCommand) -> Result<(), TrackLoadError> {
        match command {
            TransportCommand::Play => self.send(EngineCommand::Play),
            TransportCommand::Pause => self.send(EngineCommand::Pause),
            TransportCommand::TogglePlay => self.send(EngineCommand::TogglePlay),
            TransportCommand::SetRate(rate) => self.send(EngineCommand::SetRate(rate)),
            TransportCommand::Jog(delta) => self.send(EngineCommand::Jog(delta)),
            TransportCommand::MoveWheel(position) => self.move_wheel(position),
            TransportCommand::BeginSeekHold => self.begin_seek_hold(),
            TransportCommand::EndSeekHold => self.end_seek_hold(),
            TransportCommand::Seek(change) => {
                self.seek(change);
            }
            TransportCommand::SeekToPercent(value) => {
                self.seek_to_percent(value);
            }
            TransportCommand::Load(path) => return self.load_track(&path),
        }
        Ok(())
    }

    fn send(&mut self, command: EngineCommand) {
        if self.commands.push(command).is_err() {
            log::warn!("Command queue full, command dropped");
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Track loading
    // ─────────────────────────────────────────────────────────────

    /// Open `path` and stream it in place of the current track
    ///
    /// On failure the current track keeps playing and a
    /// [`TransportEvent::TrackLoadFailed`] is queued.
    pub fn load_track(&mut self, path: &Path) -> Result<(), TrackLoadError> {
        log::info!("Loading track {:?}", path);
        match open_decoder(path) {
            Ok(decoder) => self.load_decoder(path, decoder),
            Err(source) => self.fail_load(TrackLoadError::Open {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Stream an already opened decoder; `label` names it in events
    pub fn load_decoder(&mut self, label: &Path, decoder: Box<dyn Decoder>) -> Result<(), TrackLoadError> {
        let length = decoder.length();
        if length == 0 {
            return self.fail_load(TrackLoadError::Empty(label.to_path_buf()));
        }

        let shared = Shared::new(&gc_handle(), StreamShared::new(self.config.capacity_frames, length));
        let chunk_reader = ChunkReader::new(shared.clone(), decoder, self.config.chunk_frames);
        let (completion_tx, completion_rx) = rtrb::RingBuffer::new(SEEK_QUEUE_CAPACITY);

        let (mut reader, wake) = match ReaderTask::spawn(
            chunk_reader,
            completion_tx,
            self.reader_events_tx.clone(),
            self.config.shutdown_timeout(),
        ) {
            Ok(started) => started,
            Err(e) => return self.fail_load(e.into()),
        };
        // Initial fill goes through the regular seek path
        reader.seek(0.0);

        let stream = RenderStream::new(shared, wake, completion_rx);
        if self
            .commands
            .push(EngineCommand::LoadTrack(Owned::new(&gc_handle(), stream)))
            .is_err()
        {
            if let Err(e) = reader.stop() {
                log::error!("Discarding unused reader: {}", e);
            }
            return self.fail_load(TrackLoadError::QueueFull);
        }

        let previous = self.reader.replace(reader);
        self.track = Some(label.to_path_buf());
        self.track_length = length;
        self.pending_seek = Some(0.0);
        self.local_events.push(TransportEvent::TrackLoaded {
            path: label.to_path_buf(),
            frames: length,
        });
        log::info!("Streaming {:?} ({} frames)", label, length);

        if let Some(mut previous) = previous {
            previous.stop()?;
        }
        Ok(())
    }

    fn fail_load(&mut self, error: TrackLoadError) -> Result<(), TrackLoadError> {
        let path = match &error {
            TrackLoadError::Open { path, .. } | TrackLoadError::Empty(path) => path.clone(),
            _ => PathBuf::new(),
        };
        log::warn!("Track load failed: {}", error);
        self.local_events.push(TransportEvent::TrackLoadFailed {
            path,
            reason: error.to_string(),
        });
        Err(error)
    }

    // ─────────────────────────────────────────────────────────────
    // Seeking
    // ─────────────────────────────────────────────────────────────

    /// Relative seek by `change` track lengths from the current position
    ///
    /// While an earlier seek is still in flight its target is the current
    /// position, so consecutive relative seeks add up. The target is clamped
    /// to the track. The reader refills the window and the render callback
    /// jumps once it is buffered. Returns `false` when no track is streaming.
    pub fn seek(&mut self, change: f64) -> bool {
        if !change.is_finite() {
            return false;
        }
        let base = self.seek_base();
        self.seek_to_frame(base + change * self.track_length as f64)
    }

    /// Seek to a position slider value (0–100)
    pub fn seek_to_percent(&mut self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        self.seek_to_frame(value / 100.0 * self.track_length as f64)
    }

    /// Position relative seeks start from
    fn seek_base(&mut self) -> f64 {
        self.collect_events();
        self.pending_seek.unwrap_or_else(|| self.atomics.position())
    }

    fn seek_to_frame(&mut self, target: f64) -> bool {
        let Some(reader) = &self.reader else {
            return false;
        };
        let target = target.clamp(0.0, self.track_length as f64);
        log::debug!("Seek to frame {:.0}", target);
        if !reader.seek(target) {
            return false;
        }
        self.pending_seek = Some(target);
        true
    }

    // ─────────────────────────────────────────────────────────────
    // Jog wheel
    // ─────────────────────────────────────────────────────────────

    /// Feed an absolute wheel position
    ///
    /// Outside seek-hold the movement becomes a jog delta of one track
    /// revolution per 128 steps.
    pub fn move_wheel(&mut self, position: u8) {
        let steps = self.wheel.move_to(position);
        if steps != 0 && !self.wheel.is_held() {
            self.send(EngineCommand::Jog(steps as f64 / WHEEL_STEPS as f64));
        }
    }

    /// Touch the wheel: output holds still until release
    pub fn begin_seek_hold(&mut self) {
        self.wheel.begin();
        self.send(EngineCommand::SeekHold(true));
    }

    /// Whether the wheel is being held for a seek
    pub fn is_seek_held(&self) -> bool {
        self.wheel.is_held()
    }

    /// Release the wheel, seeking if it was turned far enough
    pub fn end_seek_hold(&mut self) {
        if let Some(change) = self.wheel.end() {
            self.seek(change);
        }
        self.send(EngineCommand::SeekHold(false));
    }

    // ─────────────────────────────────────────────────────────────
    // Events & shutdown
    // ─────────────────────────────────────────────────────────────

    /// Move render and reader events into the local queue, settling the
    /// pending seek when its outcome arrives
    fn collect_events(&mut self) {
        let fresh = self.local_events.len();
        while let Ok(event) = self.render_events.pop() {
            self.local_events.push(event);
        }
        self.local_events.extend(self.reader_events_rx.try_iter());

        let Some(pending) = self.pending_seek else {
            return;
        };
        let settled = self.local_events[fresh..].iter().any(|event| match event {
            TransportEvent::SeekCompleted { target } | TransportEvent::SeekFailed { target, .. } => *target == pending,
            _ => false,
        });
        if settled {
            self.pending_seek = None;
        }
    }

    /// Collect events from the render callback, the reader and the control
    /// thread, logging the warnings among them
    pub fn poll_events(&mut self) -> Vec<TransportEvent> {
        self.collect_events();
        let events = std::mem::take(&mut self.local_events);

        for event in &events {
            match event {
                TransportEvent::ReadBacklog { blocks } => {
                    log::warn!("Reader is {} blocks behind the read-ahead margin", blocks)
                }
                TransportEvent::ShortRead { requested, obtained } => {
                    log::debug!("End of track: read {} of {} frames", obtained, requested)
                }
                TransportEvent::SeekFailed { target, reason } => {
                    log::warn!("Seek to frame {:.0} failed: {}", target, reason)
                }
                TransportEvent::SeekCompleted { target } => log::trace!("Seeked to frame {:.0}", target),
                TransportEvent::Position { percent } => log::trace!("Position {}%", percent),
                TransportEvent::TrackLoaded { .. } | TransportEvent::TrackLoadFailed { .. } => {}
            }
        }
        events
    }

    /// Stop streaming and wait for the reader thread to exit
    pub fn shutdown(&mut self) -> Result<(), EngineError> {
        self.send(EngineCommand::UnloadTrack);
        self.track = None;
        self.track_length = 0;
        self.pending_seek = None;
        match self.reader.take() {
            Some(mut reader) => reader.stop(),
            None => Ok(()),
        }
    }
}
