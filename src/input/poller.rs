//! Fixed-period button sampling

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::events::ControlEvent;

use super::InputSource;

/// Errors that can occur starting the poller
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("input poller is already running")]
    AlreadyRunning,
}

/// Polls an `InputSource` on a fixed period and feeds the controller queue
///
/// Each tick sends one `Press` per released-to-pressed edge, then a single
/// `Sample` carrying the "any button held" level for the hold detector.
/// Presses are sent before the sample so a hold window opens from the edge
/// that started it.
pub struct InputPoller {
    source: Arc<dyn InputSource>,
    event_tx: mpsc::Sender<ControlEvent>,
    rooms: Vec<String>,
    period: Duration,
    running: Arc<AtomicBool>,
}

impl InputPoller {
    pub fn new(
        source: Arc<dyn InputSource>,
        event_tx: mpsc::Sender<ControlEvent>,
        rooms: Vec<String>,
        period: Duration,
    ) -> Self {
        Self {
            source,
            event_tx,
            rooms,
            period,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the sampling task
    ///
    /// Runs until `stop()` is called or the controller queue closes.
    pub fn start(&self) -> Result<(), InputError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(InputError::AlreadyRunning);
        }

        let source = Arc::clone(&self.source);
        let event_tx = self.event_tx.clone();
        let rooms = self.rooms.clone();
        let period = self.period;
        let running = Arc::clone(&self.running);

        tokio::spawn(async move {
            info!(rooms = rooms.len(), period_ms = period.as_millis() as u64, "input poller started");

            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            let mut last: HashMap<String, bool> =
                rooms.iter().map(|room| (room.clone(), false)).collect();

            'poll: while running.load(Ordering::SeqCst) {
                interval.tick().await;
                let now = Instant::now();
                let mut any_held = false;

                for room in &rooms {
                    let pressed = source.is_pressed(room);
                    any_held |= pressed;

                    let was = last.insert(room.clone(), pressed).unwrap_or(false);
                    if pressed && !was {
                        debug!(room = %room, "press edge");
                        let press = ControlEvent::Press {
                            room_id: room.clone(),
                            at: now,
                        };
                        if event_tx.send(press).await.is_err() {
                            break 'poll;
                        }
                    }
                }

                let sample = ControlEvent::Sample { any_held, at: now };
                if event_tx.send(sample).await.is_err() {
                    break 'poll;
                }
            }

            running.store(false, Ordering::SeqCst);
            info!("input poller stopped");
        });

        Ok(())
    }

    /// Stop the sampling task; it exits on its next tick
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the poller is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
