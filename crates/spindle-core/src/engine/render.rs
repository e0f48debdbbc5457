//! Render callback: variable-rate playback from the ring buffer
//!
//! [`RenderEngine::process`] runs once per audio block on the real-time
//! thread. Per block it:
//!
//! 1. applies queued [`EngineCommand`]s
//! 2. commits finished seeks and reports them
//! 3. renders interpolated frames at the current rate
//! 4. runs the read-ahead scheduler
//! 5. decays the jog, publishes [`TransportAtomics`], reports position
//!
//! Nothing here blocks, allocates or logs. Diagnostics go out as
//! [`TransportEvent`]s through a lock-free queue.

use std::sync::Arc;

use basedrop::{Owned, Shared};
use crossbeam::channel::Sender;

use crate::config::StreamConfig;
use crate::transport::{position_percent, TransportAtomics, TransportEvent};
use crate::types::{frames_from_interleaved_mut, PlayState, StereoSample};

use super::command::EngineCommand;
use super::reader::{SeekCompletion, Wake};
use super::ring::StreamShared;
use super::scheduler::{ReadDecision, ReadScheduler};
use super::scratch::{render_block, JogState};

/// Largest block rendered in one pass when the output is not stereo
pub const MAX_BLOCK_FRAMES: usize = 8192;

/// Render-side handles for one streaming track
pub struct RenderStream {
    shared: Shared<StreamShared>,
    wake: Sender<Wake>,
    completions: rtrb::Consumer<SeekCompletion>,
}

impl RenderStream {
    pub fn new(
        shared: Shared<StreamShared>,
        wake: Sender<Wake>,
        completions: rtrb::Consumer<SeekCompletion>,
    ) -> Self {
        Self {
            shared,
            wake,
            completions,
        }
    }

    pub fn track_length(&self) -> u64 {
        self.shared.track_length
    }
}

/// The real-time half of the player
pub struct RenderEngine {
    config: StreamConfig,
    commands: rtrb::Consumer<EngineCommand>,
    events: rtrb::Producer<TransportEvent>,
    atomics: Arc<TransportAtomics>,
    stream: Option<Owned<RenderStream>>,
    scheduler: ReadScheduler,
    jog: JogState,
    play_position: f64,
    state: PlayState,
    /// State to restore when seek-hold ends
    held_state: PlayState,
    continuous_rate: f64,
    last_percent: Option<u8>,
    /// Staging for non-stereo device buffers
    scratch: Vec<StereoSample>,
}

impl RenderEngine {
    pub fn new(
        config: StreamConfig,
        commands: rtrb::Consumer<EngineCommand>,
        events: rtrb::Producer<TransportEvent>,
        atomics: Arc<TransportAtomics>,
    ) -> Self {
        Self {
            scheduler: ReadScheduler::new(&config),
            config,
            commands,
            events,
            atomics,
            stream: None,
            jog: JogState::new(),
            play_position: 0.0,
            state: PlayState::Paused,
            held_state: PlayState::Paused,
            continuous_rate: 1.0,
            last_percent: None,
            scratch: vec![StereoSample::silence(); MAX_BLOCK_FRAMES],
        }
    }

    /// Current play position in frames
    pub fn play_position(&self) -> f64 {
        self.play_position
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn has_track(&self) -> bool {
        self.stream.is_some()
    }

    /// Shared state of the loaded stream
    pub fn stream(&self) -> Option<&StreamShared> {
        self.stream.as_ref().map(|s| &*s.shared)
    }

    pub fn atomics(&self) -> Arc<TransportAtomics> {
        self.atomics.clone()
    }

    /// Effective rate for the current state
    ///
    /// - playing: continuous rate plus jog
    /// - seek-hold: zero
    /// - paused: jog only
    pub fn rate(&self) -> f64 {
        let jog = self.config.jog_gain * self.jog.value();
        match self.state {
            PlayState::Playing => self.continuous_rate + jog,
            PlayState::SeekHold => 0.0,
            PlayState::Paused => jog,
        }
    }

    /// Apply queued commands (called at the start of every block)
    pub fn process_commands(&mut self) {
        while let Ok(command) = self.commands.pop() {
            self.apply(command);
        }
    }

    fn apply(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::LoadTrack(stream) => {
                // Old stream (if any) is dropped here; Owned defers the free
                self.stream = Some(stream);
                self.play_position = 0.0;
                self.jog.reset();
                self.scheduler.reset();
                self.last_percent = None;
            }
            EngineCommand::UnloadTrack => {
                self.stream = None;
                self.play_position = 0.0;
                self.jog.reset();
                self.scheduler.reset();
                self.last_percent = None;
                if self.state == PlayState::Playing {
                    self.state = PlayState::Paused;
                }
            }
            EngineCommand::Play => self.set_state(PlayState::Playing),
            EngineCommand::Pause => self.set_state(PlayState::Paused),
            EngineCommand::TogglePlay => {
                let next = match self.state {
                    PlayState::Playing => PlayState::Paused,
                    PlayState::Paused => PlayState::Playing,
                    PlayState::SeekHold => {
                        // Toggles what the hold will restore
                        self.held_state = match self.held_state {
                            PlayState::Playing => PlayState::Paused,
                            _ => PlayState::Playing,
                        };
                        return;
                    }
                };
                self.state = next;
            }
            EngineCommand::SetRate(rate) => {
                if rate.is_finite() {
                    self.continuous_rate = rate.clamp(self.config.rate_min, self.config.rate_max);
                }
            }
            EngineCommand::Jog(delta) => self.jog.push(delta),
            EngineCommand::SeekHold(true) => {
                if self.state != PlayState::SeekHold {
                    self.held_state = self.state;
                    self.state = PlayState::SeekHold;
                }
            }
            EngineCommand::SeekHold(false) => {
                if self.state == PlayState::SeekHold {
                    self.state = self.held_state;
                }
            }
        }
    }

    fn set_state(&mut self, state: PlayState) {
        if self.state == PlayState::SeekHold {
            self.held_state = state;
        } else {
            self.state = state;
        }
    }

    /// Render one block of stereo frames
    pub fn process(&mut self, out: &mut [StereoSample]) {
        self.process_commands();

        let rate = self.rate();
        let block_frames = out.len();

        let Some(stream) = self.stream.as_mut() else {
            out.fill(StereoSample::silence());
            self.jog.decay(self.config.jog_smoothing);
            self.atomics.publish(0.0, 0, self.state, rate);
            return;
        };

        let track_length = stream.shared.track_length;
        let mut committed = None;
        while let Ok(done) = stream.completions.pop() {
            self.play_position = done.target.clamp(0.0, track_length as f64);
            committed = Some(done.target);
        }

        if rate == 0.0 {
            // Holding still: no DC from repeating one frame
            out.fill(StereoSample::silence());
        } else {
            render_block(
                &stream.shared.ring,
                &mut self.play_position,
                rate,
                track_length as f64,
                out,
            );
        }

        let seek_in_flight = !stream.completions.is_empty();
        let decision = self.scheduler.check_read(
            &stream.shared,
            &stream.wake,
            self.play_position,
            block_frames,
            seek_in_flight,
        );
        if let ReadDecision::Backlogged { blocks, warn: true } = decision {
            let _ = self.events.push(TransportEvent::ReadBacklog { blocks });
        }

        self.jog.decay(self.config.jog_smoothing);
        self.atomics
            .publish(self.play_position, track_length, self.state, rate);

        // After the publish, so the control side sees the new position with it
        if let Some(target) = committed {
            let _ = self.events.push(TransportEvent::SeekCompleted { target });
        }

        let percent = position_percent(self.play_position, track_length);
        if self.last_percent != Some(percent) {
            // Retried next block if the queue is full
            if self.events.push(TransportEvent::Position { percent }).is_ok() {
                self.last_percent = Some(percent);
            }
        }
    }

    /// Render into an interleaved device buffer with `channels` channels
    ///
    /// Stereo buffers are rendered in place; other layouts go through a
    /// staging buffer, with extra channels silenced and mono downmixed.
    pub fn process_interleaved(&mut self, data: &mut [f32], channels: usize) {
        if channels == 2 {
            self.process(frames_from_interleaved_mut(data));
            return;
        }
        if channels == 0 {
            return;
        }

        let mut scratch = std::mem::take(&mut self.scratch);
        for block in data.chunks_mut(MAX_BLOCK_FRAMES * channels) {
            let frames = block.len() / channels;
            let staged = &mut scratch[..frames];
            self.process(staged);

            for (out, frame) in block.chunks_mut(channels).zip(staged.iter()) {
                if channels == 1 {
                    out[0] = 0.5 * (frame.left + frame.right);
                    continue;
                }
                out[0] = frame.left;
                out[1] = frame.right;
                for extra in out.iter_mut().skip(2) {
                    *extra = 0.0;
                }
            }
        }
        self.scratch = scratch;
    }
}
