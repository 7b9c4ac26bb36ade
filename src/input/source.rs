//! In-memory input source

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use super::InputSource;

/// Input source over per-room pressed flags
///
/// The daemon carries no GPIO binding of its own; whatever owns the
/// hardware (a GPIO shim forwarding level changes over IPC, or a test)
/// flips these flags and the poller sees them on its next sample.
#[derive(Debug)]
pub struct SharedInput {
    channels: HashMap<String, AtomicBool>,
}

impl SharedInput {
    pub fn new<I, S>(rooms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let channels = rooms
            .into_iter()
            .map(|room| (room.into(), AtomicBool::new(false)))
            .collect();
        Self { channels }
    }

    /// Set a room's button level; returns false for unknown rooms
    pub fn set_pressed(&self, room_id: &str, pressed: bool) -> bool {
        match self.channels.get(room_id) {
            Some(flag) => {
                flag.store(pressed, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }
}

impl InputSource for SharedInput {
    fn is_pressed(&self, room_id: &str) -> bool {
        self.channels
            .get(room_id)
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}
