//! Deferred deallocation for streams dropped on the render thread
//!
//! Replacing a track drops the old ring buffer (megabytes of frames) inside
//! the audio callback. Wrapping per-track state in `basedrop::Shared` /
//! `basedrop::Owned` turns that drop into a pointer push; a background
//! thread owns the `Collector` and frees the memory.
//!
//! ```ignore
//! let shared = Shared::new(&gc_handle(), StreamShared::new(capacity, len));
//! drop(shared); // last reference: queued, freed later on the GC thread
//! ```

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

/// How often the GC thread frees queued allocations
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    // Collector is !Sync, so it is created on and never leaves its thread
    thread::Builder::new()
        .name("stream-gc".to_string())
        .spawn(move || {
            let mut collector = Collector::new();
            if tx.send(collector.handle()).is_err() {
                return;
            }
            log::debug!("Stream GC thread started");

            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        })
        .expect("Failed to spawn stream GC thread");

    rx.recv().expect("Failed to receive GC handle")
}

/// Handle for allocating `Shared<T>` / `Owned<T>` values
///
/// The collector thread is started on first use and lives for the rest of
/// the process.
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use basedrop::Shared;

    #[test]
    fn test_shared_clone_and_drop() {
        let a = Shared::new(&gc_handle(), vec![1.0f32; 1024]);
        let b = Shared::clone(&a);
        assert_eq!(b.len(), 1024);
        drop(a);
        assert_eq!(b[0], 1.0);
        drop(b);
    }
}
