//! The control core
//!
//! Everything with temporal or state-consistency concerns lives here:
//! hold-to-reset detection, the clear-then-reveal transition staging, and
//! the single-writer controller that serializes press edges, hold samples,
//! and delayed transition fires onto one queue.

mod controller;
mod hold;
mod transition;

pub use controller::ClueController;
pub use hold::HoldDetector;
pub use transition::{Staged, TransitionScheduler};
