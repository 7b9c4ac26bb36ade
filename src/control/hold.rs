//! Long-press reset detection

use std::time::{Duration, Instant};

/// One continuous hold window
#[derive(Debug, Clone, Copy)]
struct HoldSession {
    started_at: Instant,
    /// Set once the reset fires; an unbroken hold never fires twice
    fired: bool,
}

/// Level-triggered detector over the "any button held" signal
///
/// Fed one sample per poll period. Duration accumulates across different
/// buttons as long as at least one stays pressed; a sample with every
/// button released discards the window, so two sub-threshold holds never
/// add up to a reset.
#[derive(Debug)]
pub struct HoldDetector {
    threshold: Duration,
    session: Option<HoldSession>,
}

impl HoldDetector {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            session: None,
        }
    }

    /// Open the hold window from a press edge, if none is open
    ///
    /// Gives the window the edge's timestamp instead of the next sample's,
    /// so the threshold measures from the actual press.
    pub fn note_press(&mut self, at: Instant) {
        self.session.get_or_insert(HoldSession {
            started_at: at,
            fired: false,
        });
    }

    /// Feed one level sample; returns true when the reset should fire
    pub fn sample(&mut self, any_held: bool, now: Instant) -> bool {
        if !any_held {
            self.session = None;
            return false;
        }

        let session = self.session.get_or_insert(HoldSession {
            started_at: now,
            fired: false,
        });

        if !session.fired && now.duration_since(session.started_at) >= self.threshold {
            session.fired = true;
            true
        } else {
            false
        }
    }
}
