//! Lock-free command queue from the control thread to the render callback
//!
//! The control side pushes [`EngineCommand`]s into an `rtrb` SPSC ring; the
//! render callback drains it at the start of every block, so state changes
//! land on block boundaries and neither side ever blocks.
//!
//! ```ignore
//! let (mut tx, mut rx) = command_channel(256);
//! tx.push(EngineCommand::Play)?;          // control thread
//! engine.process_commands();              // render callback
//! ```

use basedrop::Owned;

use super::render::RenderStream;

/// Commands sent from the control thread to the render callback
pub enum EngineCommand {
    // ─────────────────────────────────────────────────────────────
    // Track Management
    // ─────────────────────────────────────────────────────────────
    /// Swap in a freshly started stream
    ///
    /// `Owned` defers the old stream's deallocation to the GC thread when
    /// the render callback drops it.
    LoadTrack(Owned<RenderStream>),
    /// Drop the current stream and render silence
    UnloadTrack,

    // ─────────────────────────────────────────────────────────────
    // Playback Control
    // ─────────────────────────────────────────────────────────────
    Play,
    Pause,
    TogglePlay,
    /// Set the continuous rate (clamped to the configured range)
    SetRate(f64),
    /// Add to the jog accumulator
    Jog(f64),
    /// Enter (`true`) or leave (`false`) seek-hold
    ///
    /// Leaving restores the play state that was active before the hold.
    SeekHold(bool),
}

/// Create a command channel (producer for the control thread, consumer for
/// the render callback)
pub fn command_channel(
    capacity: usize,
) -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(capacity)
}
