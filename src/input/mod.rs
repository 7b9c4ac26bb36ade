//! Button input: polled level source plus the edge-deriving poller
//!
//! Hardware owns the button levels; the daemon only polls. Press/release
//! edges are derived by comparing consecutive polls, so the poller is the
//! single producer of press events and hold samples.

mod poller;
mod source;

pub use poller::{InputError, InputPoller};
pub use source::SharedInput;

/// Polled view of the button hardware
///
/// A source reports current level only; it never buffers edges.
pub trait InputSource: Send + Sync {
    fn is_pressed(&self, room_id: &str) -> bool;
}
