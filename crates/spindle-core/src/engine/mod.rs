//! Streaming playback engine
//!
//! - [`RingBuffer`] / [`StreamCursors`]: the shared circular frame store
//! - [`ChunkReader`] / [`ReaderTask`]: decoder-to-ring transfer on a
//!   background thread
//! - [`ReadScheduler`]: per-block read-ahead decisions
//! - [`RenderEngine`]: the real-time render callback
//! - [`EngineCommand`]: lock-free control → render queue

mod chunk;
mod command;
mod error;
pub mod gc;
mod reader;
mod render;
mod ring;
mod scheduler;
mod scratch;

pub use chunk::{ChunkOutcome, ChunkReader, SEEK_REFILL_CHUNKS};
pub use command::{command_channel, EngineCommand};
pub use error::{EngineError, TrackLoadError};
pub use reader::{ReaderTask, SeekCompletion, Wake};
pub use render::{RenderEngine, RenderStream, MAX_BLOCK_FRAMES};
pub use ring::{distance, RingBuffer, StreamCursors, StreamShared};
pub use scheduler::{ReadDecision, ReadScheduler};
pub use scratch::{lerp, render_block, JogState};
