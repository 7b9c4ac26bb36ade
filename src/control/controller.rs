//! The clue controller
//!
//! Single writer over all mutable state. Every event source (press edges
//! from the poller, hold samples, delayed transition fires, operator
//! commands) lands on one mpsc queue and is handled to completion before
//! the next. A press can therefore never observe a half-applied reset, and
//! transition replacement observes presses in arrival order.

use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::config::Timing;
use crate::events::{ClueEvent, ControlEvent};
use crate::rooms::{CatalogError, ClueCatalog, RoomState};
use crate::sinks::{AudioSink, DisplaySink};

use super::hold::HoldDetector;
use super::transition::TransitionScheduler;

/// Orchestrates room progress, hold detection, and clue transitions
pub struct ClueController {
    catalog: ClueCatalog,
    rooms: HashMap<String, RoomState>,
    hold: HoldDetector,
    transitions: TransitionScheduler,
    display: Box<dyn DisplaySink>,
    audio: Box<dyn AudioSink>,
    /// Channel for emitting clue events
    event_tx: broadcast::Sender<ClueEvent>,
}

impl ClueController {
    /// Create a controller over the given catalog and sinks
    ///
    /// `control_tx` must be a sender into the same queue `run` consumes;
    /// staged transitions post their due events through it.
    pub fn new(
        catalog: ClueCatalog,
        timing: &Timing,
        display: Box<dyn DisplaySink>,
        audio: Box<dyn AudioSink>,
        event_tx: broadcast::Sender<ClueEvent>,
        control_tx: mpsc::Sender<ControlEvent>,
    ) -> Self {
        let rooms = catalog
            .room_ids()
            .map(|room_id| (room_id.to_string(), RoomState::new(room_id)))
            .collect();

        Self {
            rooms,
            hold: HoldDetector::new(timing.hold_threshold()),
            transitions: TransitionScheduler::new(timing.transition_delay(), control_tx),
            catalog,
            display,
            audio,
            event_tx,
        }
    }

    /// Run the controller, draining the control queue until it closes
    pub async fn run(&mut self, mut control_rx: mpsc::Receiver<ControlEvent>) {
        info!(rooms = self.rooms.len(), "clue controller started");

        while let Some(event) = control_rx.recv().await {
            self.handle(event);
        }

        info!("clue controller stopped");
    }

    fn handle(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::Press { room_id, at } => self.handle_press(&room_id, at),
            ControlEvent::Sample { any_held, at } => self.handle_sample(any_held, at),
            ControlEvent::TransitionDue { room_id, token } => {
                self.handle_transition_due(&room_id, token)
            }
            ControlEvent::Reset => {
                info!("reset requested");
                self.reset();
            }
        }
    }

    /// Handle a released-to-pressed edge on a room's button
    fn handle_press(&mut self, room_id: &str, at: Instant) {
        let Some(room) = self.rooms.get_mut(room_id) else {
            warn!(room = room_id, "press for unconfigured room ignored");
            return;
        };

        // A press is also the potential start of a hold-to-reset gesture
        self.hold.note_press(at);

        let index = room.next_clue();
        match self.catalog.clue_at(room_id, index) {
            Ok(clue) => {
                debug!(room = room_id, clue = index, "staging clue");
                // Blank beat starts now; the reveal comes on the due event.
                // The counter advances immediately, not on reveal: a rapid
                // double press moves two clues forward even though only the
                // last staging is ultimately shown.
                self.display.present("");
                self.transitions.stage(room_id, clue.clone(), index);
                room.advance();
                self.emit(ClueEvent::ClueRequested {
                    room_id: room_id.to_string(),
                    index,
                });
            }
            Err(CatalogError::ClueOutOfRange { .. }) => {
                info!(room = room_id, "clues exhausted");
                self.display.present(&format!("No more clues for {room_id}."));
                self.emit(ClueEvent::RoomExhausted {
                    room_id: room_id.to_string(),
                });
            }
            Err(error @ CatalogError::UnknownRoom(_)) => {
                warn!(%error, "press ignored");
            }
        }
    }

    /// Handle one "any button held" level sample
    fn handle_sample(&mut self, any_held: bool, at: Instant) {
        if self.hold.sample(any_held, at) {
            info!("hold threshold reached, resetting");
            self.reset();
        }
    }

    /// Handle a staged transition's delay elapsing
    fn handle_transition_due(&mut self, room_id: &str, token: u64) {
        let Some(staged) = self.transitions.fire(room_id, token) else {
            return;
        };

        // Silence the previous clue before the new one starts
        self.audio.stop_all();
        if let Err(error) = self.audio.play(&staged.clue.sound) {
            warn!(room = room_id, %error, "clue audio failed, presenting text only");
            self.emit(ClueEvent::AudioFailed {
                room_id: room_id.to_string(),
                detail: error.to_string(),
            });
        }
        self.display.present(&staged.clue.text);
        self.emit(ClueEvent::CluePresented {
            room_id: room_id.to_string(),
            index: staged.index,
        });
    }

    /// Return every room to the start of its sequence
    ///
    /// Also cancels staged transitions and silences audio; a cancelled
    /// timer that later fires hits a dead token and does nothing.
    fn reset(&mut self) {
        for room in self.rooms.values_mut() {
            room.reset();
        }
        self.transitions.cancel_all();
        self.audio.stop_all();
        self.display.present("");
        self.emit(ClueEvent::ResetFired);
        info!("all rooms reset");
    }

    fn emit(&self, event: ClueEvent) {
        debug!(%event, "emitting event");
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Clue, RoomConfig};
    use crate::sinks::AudioError;
    use std::cell::RefCell;
    use std::path::{Path, PathBuf};
    use std::rc::Rc;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct TestDisplay(Rc<RefCell<Vec<String>>>);

    impl TestDisplay {
        fn last(&self) -> String {
            self.0.borrow().last().cloned().unwrap_or_default()
        }

        fn count(&self) -> usize {
            self.0.borrow().len()
        }
    }

    impl DisplaySink for TestDisplay {
        fn present(&mut self, text: &str) {
            self.0.borrow_mut().push(text.to_string());
        }
    }

    #[derive(Clone, Default)]
    struct TestAudio {
        played: Rc<RefCell<Vec<PathBuf>>>,
        stops: Rc<RefCell<usize>>,
        fail: bool,
    }

    impl AudioSink for TestAudio {
        fn play(&mut self, sound: &Path) -> Result<(), AudioError> {
            if self.fail {
                return Err(AudioError::Open {
                    path: sound.to_owned(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
                });
            }
            self.played.borrow_mut().push(sound.to_owned());
            Ok(())
        }

        fn stop_all(&mut self) {
            *self.stops.borrow_mut() += 1;
        }
    }

    const DELAY_MS: u64 = 10;

    fn timing() -> Timing {
        Timing {
            sample_period_ms: 5,
            hold_threshold_ms: 3000,
            transition_delay_ms: DELAY_MS,
        }
    }

    fn catalog() -> ClueCatalog {
        ClueCatalog::from_rooms(&[
            RoomConfig {
                room_id: "library".to_string(),
                input_channel: 17,
                clues: vec![
                    Clue {
                        text: "Look under the desk".to_string(),
                        sound: PathBuf::from("one.wav"),
                    },
                    Clue {
                        text: "The globe spins".to_string(),
                        sound: PathBuf::from("two.wav"),
                    },
                ],
            },
            RoomConfig {
                room_id: "vault".to_string(),
                input_channel: 27,
                clues: vec![Clue {
                    text: "Count the candles".to_string(),
                    sound: PathBuf::from("three.wav"),
                }],
            },
        ])
    }

    struct Harness {
        controller: ClueController,
        control_tx: mpsc::Sender<ControlEvent>,
        control_rx: mpsc::Receiver<ControlEvent>,
        events: broadcast::Receiver<ClueEvent>,
        display: TestDisplay,
        audio: TestAudio,
    }

    fn harness() -> Harness {
        harness_with_audio(TestAudio::default())
    }

    fn harness_with_audio(audio: TestAudio) -> Harness {
        let (control_tx, control_rx) = mpsc::channel(64);
        let (event_tx, events) = broadcast::channel(64);
        let display = TestDisplay::default();
        let controller = ClueController::new(
            catalog(),
            &timing(),
            Box::new(display.clone()),
            Box::new(audio.clone()),
            event_tx,
            control_tx.clone(),
        );
        Harness {
            controller,
            control_tx,
            control_rx,
            events,
            display,
            audio,
        }
    }

    fn press(controller: &mut ClueController, room: &str) {
        controller.handle(ControlEvent::Press {
            room_id: room.to_string(),
            at: Instant::now(),
        });
    }

    /// Pull the next queued event (normally a transition due) and handle it
    async fn fire_next(harness: &mut Harness) {
        let event = harness.control_rx.recv().await.expect("control queue closed");
        harness.controller.handle(event);
    }

    fn drain_events(rx: &mut broadcast::Receiver<ClueEvent>) -> Vec<ClueEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn reset_count(events: &[ClueEvent]) -> usize {
        events
            .iter()
            .filter(|event| matches!(event, ClueEvent::ResetFired))
            .count()
    }

    #[tokio::test]
    async fn test_presses_walk_the_clue_sequence() {
        let mut h = harness();

        press(&mut h.controller, "library");
        assert_eq!(h.display.last(), "", "staging must clear the display");

        fire_next(&mut h).await;
        assert_eq!(h.display.last(), "Look under the desk");
        assert_eq!(*h.audio.played.borrow(), vec![PathBuf::from("one.wav")]);

        press(&mut h.controller, "library");
        fire_next(&mut h).await;
        assert_eq!(h.display.last(), "The globe spins");

        let events = drain_events(&mut h.events);
        assert!(matches!(
            events[0],
            ClueEvent::ClueRequested { ref room_id, index: 0 } if room_id == "library"
        ));
        assert!(matches!(
            events[1],
            ClueEvent::CluePresented { ref room_id, index: 0 } if room_id == "library"
        ));
        assert!(matches!(events[3], ClueEvent::CluePresented { index: 1, .. }));
    }

    #[tokio::test]
    async fn test_exhausted_press_reports_immediately() {
        let mut h = harness();

        press(&mut h.controller, "vault");
        fire_next(&mut h).await;

        let shows_before = h.display.count();
        press(&mut h.controller, "vault");

        // Exhaustion shows at once: one display write, no clear/delay cycle
        assert_eq!(h.display.count(), shows_before + 1);
        assert_eq!(h.display.last(), "No more clues for vault.");

        // And nothing was staged
        tokio::time::sleep(Duration::from_millis(DELAY_MS * 3)).await;
        assert!(h.control_rx.try_recv().is_err());

        let events = drain_events(&mut h.events);
        assert!(events
            .iter()
            .any(|event| matches!(event, ClueEvent::RoomExhausted { room_id } if room_id == "vault")));
    }

    #[tokio::test]
    async fn test_rapid_presses_last_one_wins() {
        let mut h = harness();

        // Second press lands before the first transition fires
        press(&mut h.controller, "library");
        press(&mut h.controller, "library");

        fire_next(&mut h).await;
        fire_next(&mut h).await;

        // Exactly one audio/text pair: the second press's clue
        assert_eq!(*h.audio.played.borrow(), vec![PathBuf::from("two.wav")]);
        assert_eq!(h.display.last(), "The globe spins");

        // The counter advanced per press, so the room is now exhausted
        press(&mut h.controller, "library");
        assert_eq!(h.display.last(), "No more clues for library.");
    }

    #[tokio::test]
    async fn test_rooms_advance_independently() {
        let mut h = harness();

        press(&mut h.controller, "library");
        fire_next(&mut h).await;
        press(&mut h.controller, "vault");
        fire_next(&mut h).await;

        assert_eq!(
            *h.audio.played.borrow(),
            vec![PathBuf::from("one.wav"), PathBuf::from("three.wav")]
        );

        // Library still has its second clue
        press(&mut h.controller, "library");
        fire_next(&mut h).await;
        assert_eq!(h.display.last(), "The globe spins");
    }

    #[tokio::test]
    async fn test_audio_failure_still_presents_text() {
        let mut h = harness_with_audio(TestAudio {
            fail: true,
            ..TestAudio::default()
        });

        press(&mut h.controller, "library");
        fire_next(&mut h).await;

        assert_eq!(h.display.last(), "Look under the desk");

        let events = drain_events(&mut h.events);
        assert!(events
            .iter()
            .any(|event| matches!(event, ClueEvent::AudioFailed { .. })));
        assert!(events
            .iter()
            .any(|event| matches!(event, ClueEvent::CluePresented { index: 0, .. })));
    }

    #[tokio::test]
    async fn test_reset_returns_all_rooms_to_start() {
        let mut h = harness();

        press(&mut h.controller, "library");
        fire_next(&mut h).await;
        press(&mut h.controller, "library");
        fire_next(&mut h).await;
        press(&mut h.controller, "vault");

        h.controller.handle(ControlEvent::Reset);
        assert_eq!(h.display.last(), "", "reset must clear the display");

        // The vault transition staged before the reset dies on its token
        let played = h.audio.played.borrow().len();
        fire_next(&mut h).await;
        assert_eq!(h.audio.played.borrow().len(), played);

        // Counters are back at zero for every room
        press(&mut h.controller, "library");
        fire_next(&mut h).await;
        assert_eq!(h.display.last(), "Look under the desk");
        press(&mut h.controller, "vault");
        fire_next(&mut h).await;
        assert_eq!(h.display.last(), "Count the candles");
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let mut h = harness();

        h.controller.handle(ControlEvent::Reset);
        h.controller.handle(ControlEvent::Reset);

        assert!(h.audio.played.borrow().is_empty());
        let events = drain_events(&mut h.events);
        assert_eq!(reset_count(&events), 2);

        press(&mut h.controller, "library");
        fire_next(&mut h).await;
        assert_eq!(h.display.last(), "Look under the desk");
    }

    #[test]
    fn test_hold_fires_reset_exactly_once() {
        let mut h = harness();
        let t0 = Instant::now();

        h.controller.handle(ControlEvent::Sample {
            any_held: true,
            at: t0,
        });
        h.controller.handle(ControlEvent::Sample {
            any_held: true,
            at: t0 + Duration::from_secs(3),
        });
        h.controller.handle(ControlEvent::Sample {
            any_held: true,
            at: t0 + Duration::from_secs(5),
        });

        let events = drain_events(&mut h.events);
        assert_eq!(reset_count(&events), 1);
    }

    #[test]
    fn test_release_resets_hold_window() {
        let mut h = harness();
        let t0 = Instant::now();
        let sample = |h: &mut Harness, held: bool, ms: u64| {
            h.controller.handle(ControlEvent::Sample {
                any_held: held,
                at: t0 + Duration::from_millis(ms),
            });
        };

        // Two 2s holds separated by a release: never fires
        sample(&mut h, true, 0);
        sample(&mut h, true, 2000);
        sample(&mut h, false, 2100);
        sample(&mut h, true, 2200);
        sample(&mut h, true, 4200);
        assert_eq!(reset_count(&drain_events(&mut h.events)), 0);

        // The second window reaching 3s on its own does fire
        sample(&mut h, true, 5200);
        assert_eq!(reset_count(&drain_events(&mut h.events)), 1);
    }

    #[test]
    fn test_unknown_room_press_is_ignored() {
        let mut h = harness();

        press(&mut h.controller, "garage");

        assert_eq!(h.display.count(), 0);
        assert!(drain_events(&mut h.events).is_empty());
    }

    #[tokio::test]
    async fn test_run_drains_the_queue_end_to_end() {
        let Harness {
            mut controller,
            control_tx,
            control_rx,
            mut events,
            display,
            audio,
        } = harness();

        let drive = async {
            control_tx
                .send(ControlEvent::Press {
                    room_id: "library".to_string(),
                    at: Instant::now(),
                })
                .await
                .unwrap();

            loop {
                if let Ok(ClueEvent::CluePresented { .. }) = events.recv().await {
                    break;
                }
            }

            control_tx.send(ControlEvent::Reset).await.unwrap();
            loop {
                if let Ok(ClueEvent::ResetFired) = events.recv().await {
                    break;
                }
            }
        };

        tokio::select! {
            _ = controller.run(control_rx) => panic!("controller exited early"),
            _ = drive => {}
        }

        assert_eq!(*audio.played.borrow(), vec![PathBuf::from("one.wav")]);
        assert_eq!(display.last(), "");
    }
}
