//! Clear-then-reveal transition staging
//!
//! Audio playback and text rendering are not transactional with respect to
//! each other, so a clue never appears in one piece. The forced blank beat
//! between clearing the display and revealing the next clue masks that,
//! however fast presses arrive.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use crate::config::Clue;
use crate::events::ControlEvent;

/// A transition staged for a room, waiting out the blank beat
#[derive(Debug, Clone)]
pub struct Staged {
    pub clue: Clue,
    pub index: usize,
    token: u64,
}

/// Stages the two-phase clue handoff with cancel-on-supersede semantics
///
/// `stage` replaces any earlier staging for the room and spawns a delayed
/// `TransitionDue` send back into the controller queue. Each staging gets a
/// fresh token; a due event whose token no longer matches (superseded by a
/// later press, or cancelled by a reset) is a no-op, so a timer that
/// already fired can never race a newer transition's side effects.
#[derive(Debug)]
pub struct TransitionScheduler {
    delay: Duration,
    event_tx: mpsc::Sender<ControlEvent>,
    staged: HashMap<String, Staged>,
    next_token: u64,
}

impl TransitionScheduler {
    pub fn new(delay: Duration, event_tx: mpsc::Sender<ControlEvent>) -> Self {
        Self {
            delay,
            event_tx,
            staged: HashMap::new(),
            next_token: 0,
        }
    }

    /// Stage a clue for a room, superseding any earlier staging
    pub fn stage(&mut self, room_id: &str, clue: Clue, index: usize) -> u64 {
        self.next_token += 1;
        let token = self.next_token;

        self.staged
            .insert(room_id.to_string(), Staged { clue, index, token });

        let event_tx = self.event_tx.clone();
        let delay = self.delay;
        let room_id = room_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let due = ControlEvent::TransitionDue { room_id, token };
            let _ = event_tx.send(due).await;
        });

        token
    }

    /// Take the staged transition if `token` is still live
    pub fn fire(&mut self, room_id: &str, token: u64) -> Option<Staged> {
        match self.staged.get(room_id) {
            Some(staged) if staged.token == token => self.staged.remove(room_id),
            _ => {
                debug!(room = room_id, token, "stale transition fire ignored");
                None
            }
        }
    }

    /// Drop every staged transition
    pub fn cancel_all(&mut self) {
        self.staged.clear();
    }
}
