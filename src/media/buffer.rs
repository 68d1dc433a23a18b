use std::sync::{Arc, Mutex};

use crate::media::types::CameraFrame;

/// Single-slot holder of the most recent frame for one source.
///
/// Last write wins; there is no queue. Slow consumers re-read whatever is
/// current at their own cadence and drop intermediate frames, so a stalled
/// client can never build up backlog for the producer or other consumers.
pub struct FrameBuffer {
    name: String,
    slot: Mutex<Option<Arc<CameraFrame>>>,
}

impl FrameBuffer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slot: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the stored frame unconditionally.
    pub fn set(&self, frame: CameraFrame) {
        *self.slot.lock().unwrap() = Some(Arc::new(frame));
    }

    /// Latest frame, or `None` if nothing has arrived yet.
    ///
    /// The returned `Arc` is the consumer's own handle; the lock is held
    /// only for the clone, never across I/O.
    pub fn get(&self) -> Option<Arc<CameraFrame>> {
        self.slot.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[path = "buffer_test.rs"]
mod buffer_test;
