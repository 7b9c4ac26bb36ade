//! Event types flowing between components
//!
//! `ClueEvent` is the broadcast type observed by the IPC layer and the
//! status-sync loop; `ControlEvent` is the internal queue feeding the
//! controller and is never serialized (it carries monotonic timestamps).

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Events emitted by the controller as the clue box is played
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClueEvent {
    /// A press advanced a room's progress; the clue will appear after the
    /// transition delay
    ClueRequested {
        room_id: String,
        /// Zero-based index of the requested clue
        index: usize,
    },

    /// A staged clue's audio and text were delivered to the sinks
    CluePresented {
        room_id: String,
        index: usize,
    },

    /// A press arrived after the room's last clue was dispensed
    RoomExhausted { room_id: String },

    /// Every room's progress returned to zero
    ResetFired,

    /// A clue's audio could not be started; its text was still shown
    AudioFailed { room_id: String, detail: String },
}

impl std::fmt::Display for ClueEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClueEvent::ClueRequested { room_id, index } => {
                write!(f, "CLUE_REQUESTED {room_id}[{index}]")
            }
            ClueEvent::CluePresented { room_id, index } => {
                write!(f, "CLUE_PRESENTED {room_id}[{index}]")
            }
            ClueEvent::RoomExhausted { room_id } => write!(f, "ROOM_EXHAUSTED {room_id}"),
            ClueEvent::ResetFired => write!(f, "RESET_FIRED"),
            ClueEvent::AudioFailed { room_id, detail } => {
                write!(f, "AUDIO_FAILED {room_id}: {detail}")
            }
        }
    }
}

/// Events consumed by the controller's single queue
///
/// All three time-driven sources (press edges, hold samples, delayed
/// transition fires) land here, which serializes them onto one timeline.
#[derive(Debug, Clone)]
pub enum ControlEvent {
    /// A button went from released to pressed
    Press { room_id: String, at: Instant },

    /// Periodic level sample of the "any button held" signal
    Sample { any_held: bool, at: Instant },

    /// A staged transition's delay elapsed; `token` is checked against the
    /// currently staged transition before any side effect
    TransitionDue { room_id: String, token: u64 },

    /// Operator-requested global reset
    Reset,
}
