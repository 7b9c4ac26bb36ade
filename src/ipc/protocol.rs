//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::events::ClueEvent;

/// Requests from operator tooling to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request current daemon status
    GetStatus,

    /// Set a room button's level; the bridge for a GPIO shim or a test rig.
    /// Edges and hold timing are derived by the daemon's own poller.
    SetPressed { room: String, pressed: bool },

    /// Queue a global reset on the control loop
    Reset,

    /// Ping to check connectivity
    Ping,

    /// Subscribe to clue event notifications
    Subscribe,
}

/// Responses from daemon to operator tooling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current daemon status
    Status(DaemonStatus),

    /// Request accepted (SetPressed, Reset)
    Accepted,

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

/// Push notification from daemon to subscribed clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A clue event occurred
    ClueEvent { event: ClueEvent },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Uptime in seconds
    pub uptime_secs: u64,

    /// Per-room progress, in configuration order
    pub rooms: Vec<RoomStatus>,
}

impl DaemonStatus {
    pub fn new(rooms: Vec<RoomStatus>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: 0,
            rooms,
        }
    }
}

/// Progress of one room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomStatus {
    pub room_id: String,
    pub clues_dispensed: usize,
    pub clue_count: usize,
    pub exhausted: bool,
}

impl RoomStatus {
    pub fn fresh(room_id: String, clue_count: usize) -> Self {
        Self {
            room_id,
            clues_dispensed: 0,
            clue_count,
            exhausted: false,
        }
    }

    /// Record the number of clues dispensed so far
    pub fn record_dispensed(&mut self, dispensed: usize) {
        self.clues_dispensed = dispensed;
        self.exhausted = dispensed >= self.clue_count;
    }
}
