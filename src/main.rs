//! cluebox-daemon: drives a physical escape-room clue box
//!
//! Each configured room is wired to a button; successive presses dispense
//! that room's clues in order (audio + text), and holding any button for
//! the hold threshold resets every room. The daemon provides:
//! - Fixed-period button polling with edge derivation
//! - A single-writer control loop sequencing presses, holds, and
//!   clue transitions
//! - An IPC server for operator tooling (status, reset, button bridge)

mod config;
mod control;
mod events;
mod input;
mod ipc;
mod lifecycle;
mod rooms;
mod sinks;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::control::ClueController;
use crate::events::ClueEvent;
use crate::input::{InputPoller, InputSource, SharedInput};
use crate::ipc::{RoomStatus, Server};
use crate::rooms::ClueCatalog;
use crate::sinks::{AudioSink, ConsoleDisplay, NullAudio, RodioAudio};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "cluebox-daemon starting"
    );

    // Load configuration; a broken rooms file means there is nothing to
    // drive, so it is fatal here rather than a degraded start
    let config = Config::load()?;
    config.ensure_dirs()?;

    let (room_configs, timing) =
        config::load_rooms(&config.rooms_path).context("loading rooms file")?;
    info!(
        rooms_file = ?config.rooms_path,
        rooms = room_configs.len(),
        "configuration loaded"
    );
    if room_configs.is_empty() {
        warn!("no rooms configured, the box will be inert");
    }

    let catalog = ClueCatalog::from_rooms(&room_configs);
    let room_ids: Vec<String> = catalog.room_ids().map(str::to_string).collect();
    let room_statuses: Vec<RoomStatus> = room_configs
        .iter()
        .map(|room| RoomStatus::fresh(room.room_id.clone(), room.clues.len()))
        .collect();

    // Poller, transition timers, and IPC -> controller
    let (control_tx, control_rx) = mpsc::channel(64);
    // Controller -> IPC server and status sync
    let (event_tx, _event_rx) = broadcast::channel::<ClueEvent>(64);

    // A missing audio device must not take the box down; clue text still
    // flows through the display
    let audio: Box<dyn AudioSink> = match RodioAudio::new() {
        Ok(audio) => Box::new(audio),
        Err(e) => {
            warn!(%e, "continuing without audio output");
            Box::new(NullAudio)
        }
    };

    let mut controller = ClueController::new(
        catalog,
        &timing,
        Box::new(ConsoleDisplay),
        audio,
        event_tx.clone(),
        control_tx.clone(),
    );

    // Button levels are owned here and settable over IPC; a GPIO shim
    // forwards the physical wiring
    let input = Arc::new(SharedInput::new(room_ids.iter().cloned()));
    let poller = InputPoller::new(
        Arc::clone(&input) as Arc<dyn InputSource>,
        control_tx.clone(),
        room_ids,
        timing.sample_period(),
    );
    match poller.start() {
        Ok(()) => info!("input poller started"),
        Err(e) => {
            error!(?e, "failed to start input poller");
            warn!("continuing without button input - IPC can still drive the box");
        }
    }

    // Create IPC server with command and event wiring
    let server = Server::new(
        &config.socket_path,
        room_statuses,
        control_tx.clone(),
        Arc::clone(&input),
        event_tx.clone(),
    )?;

    // Subscribe to clue events to keep the IPC status in sync
    let mut status_rx = event_tx.subscribe();
    let server_for_events = &server;

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        // Run the controller (processes presses, holds, transitions)
        _ = controller.run(control_rx) => {
            info!("controller exited");
        }

        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Mirror room progress into the IPC status
        _ = async {
            loop {
                match status_rx.recv().await {
                    Ok(ClueEvent::ClueRequested { room_id, index }) => {
                        server_for_events.set_progress(&room_id, index + 1).await;
                    }
                    Ok(ClueEvent::ResetFired) => {
                        server_for_events.reset_progress().await;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "status receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("status sync exited");
        }

        // Wait for shutdown signal
        _ = lifecycle::shutdown_signal() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    poller.stop();
    server.shutdown().await;

    info!("cluebox-daemon stopped");

    Ok(())
}
