//! Unix domain socket server for IPC
//!
//! Request-response communication for operator tooling, plus push
//! notifications of clue events to subscribed clients. Requests can also
//! drive the box: `SetPressed` feeds the shared input source and `Reset`
//! queues a command on the control loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::events::{ClueEvent, ControlEvent};
use crate::input::SharedInput;

use super::protocol::{DaemonStatus, Notification, Request, Response, RoomStatus};

/// IPC server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    shared: Arc<Shared>,
    shutdown_tx: broadcast::Sender<()>,
}

/// State and handles shared with client tasks
struct Shared {
    state: RwLock<ServerState>,
    /// Command channel into the control loop
    control_tx: mpsc::Sender<ControlEvent>,
    /// Button levels, settable by clients
    input: Arc<SharedInput>,
    /// Clue events forwarded to subscribed clients
    event_tx: broadcast::Sender<ClueEvent>,
}

struct ServerState {
    status: DaemonStatus,
    start_time: Instant,
}

impl Server {
    /// Create a new IPC server bound to `socket_path`
    pub fn new(
        socket_path: &Path,
        rooms: Vec<RoomStatus>,
        control_tx: mpsc::Sender<ControlEvent>,
        input: Arc<SharedInput>,
        event_tx: broadcast::Sender<ClueEvent>,
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        let shared = Arc::new(Shared {
            state: RwLock::new(ServerState {
                status: DaemonStatus::new(rooms),
                start_time: Instant::now(),
            }),
            control_tx,
            input,
            event_tx,
        });

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            shared,
            shutdown_tx,
        })
    }

    /// Record a room's dispensed-clue count after a press
    pub async fn set_progress(&self, room_id: &str, dispensed: usize) {
        let mut state = self.shared.state.write().await;
        if let Some(room) = state
            .status
            .rooms
            .iter_mut()
            .find(|room| room.room_id == room_id)
        {
            room.record_dispensed(dispensed);
        }
    }

    /// Zero every room's progress after a reset
    pub async fn reset_progress(&self) {
        let mut state = self.shared.state.write().await;
        for room in &mut state.status.rooms {
            room.record_dispensed(0);
        }
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let shared = Arc::clone(&self.shared);
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, shared) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(stream: UnixStream, shared: Arc<Shared>) -> Result<()> {
        let (mut reader, writer) = stream.into_split();
        let writer = Arc::new(Mutex::new(writer));
        let mut notify_task = None;

        let result = Self::serve_requests(&mut reader, &writer, &mut notify_task, &shared).await;

        // The notification forwarder dies with the connection
        if let Some(task) = notify_task {
            task.abort();
        }

        result
    }

    /// Request-response loop over the connection's read half
    async fn serve_requests(
        reader: &mut OwnedReadHalf,
        writer: &Arc<Mutex<OwnedWriteHalf>>,
        notify_task: &mut Option<tokio::task::JoinHandle<()>>,
        shared: &Arc<Shared>,
    ) -> Result<()> {
        let mut len_buf = [0u8; 4];

        loop {
            // Read message length (4-byte little-endian)
            match reader.read_exact(&mut len_buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("client disconnected");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            if len > 1024 * 1024 {
                warn!(len, "message too large, disconnecting");
                return Ok(());
            }

            // Read message body
            let mut msg_buf = vec![0u8; len];
            reader.read_exact(&mut msg_buf).await?;

            // Parse request
            let request: Request =
                serde_json::from_slice(&msg_buf).context("failed to parse request")?;

            debug!(?request, "received request");

            // Process request
            let (response, subscribe) = Self::process_request(request, shared).await;
            Self::send_message(writer, &response).await?;

            if subscribe && notify_task.is_none() {
                *notify_task = Some(Self::spawn_notifier(writer, shared));
                debug!("client subscribed to notifications");
            }
        }
    }

    /// Forward clue events to a subscribed client until it disconnects
    fn spawn_notifier(
        writer: &Arc<Mutex<OwnedWriteHalf>>,
        shared: &Arc<Shared>,
    ) -> tokio::task::JoinHandle<()> {
        let writer = Arc::clone(writer);
        let mut event_rx = shared.event_tx.subscribe();

        tokio::spawn(async move {
            loop {
                match event_rx.recv().await {
                    Ok(event) => {
                        let notification = Notification::ClueEvent { event };
                        if Self::send_message(&writer, &notification).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "notification receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Send a length-prefixed JSON message
    async fn send_message<T: serde::Serialize>(
        writer: &Arc<Mutex<OwnedWriteHalf>>,
        msg: &T,
    ) -> Result<()> {
        let msg_bytes = serde_json::to_vec(msg)?;
        let msg_len = (msg_bytes.len() as u32).to_le_bytes();

        let mut writer = writer.lock().await;
        writer.write_all(&msg_len).await?;
        writer.write_all(&msg_bytes).await?;

        Ok(())
    }

    /// Process a request and return a response
    /// Returns (Response, should_subscribe)
    async fn process_request(request: Request, shared: &Shared) -> (Response, bool) {
        match request {
            Request::Ping => (Response::Pong, false),

            Request::GetStatus => {
                let mut state = shared.state.write().await;
                state.status.uptime_secs = state.start_time.elapsed().as_secs();
                (Response::Status(state.status.clone()), false)
            }

            Request::SetPressed { room, pressed } => {
                if shared.input.set_pressed(&room, pressed) {
                    debug!(room = %room, pressed, "button level set via IPC");
                    (Response::Accepted, false)
                } else {
                    let response = Response::Error {
                        code: "unknown_room".to_string(),
                        message: format!("no room {room:?} is configured"),
                    };
                    (response, false)
                }
            }

            Request::Reset => {
                if shared.control_tx.send(ControlEvent::Reset).await.is_ok() {
                    info!("reset queued via IPC");
                    (Response::Accepted, false)
                } else {
                    let response = Response::Error {
                        code: "control_loop_down".to_string(),
                        message: "control loop is not running".to_string(),
                    };
                    (response, false)
                }
            }

            Request::Subscribe => (Response::Subscribed, true),
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared_fixture() -> (Arc<Shared>, mpsc::Receiver<ControlEvent>) {
        let (control_tx, control_rx) = mpsc::channel(16);
        let (event_tx, _) = broadcast::channel(16);
        let shared = Arc::new(Shared {
            state: RwLock::new(ServerState {
                status: DaemonStatus::new(vec![RoomStatus::fresh("library".to_string(), 2)]),
                start_time: Instant::now(),
            }),
            control_tx,
            input: Arc::new(SharedInput::new(["library"])),
            event_tx,
        });
        (shared, control_rx)
    }

    #[tokio::test]
    async fn test_ping() {
        let (shared, _control_rx) = shared_fixture();
        let (response, subscribe) = Server::process_request(Request::Ping, &shared).await;
        assert!(matches!(response, Response::Pong));
        assert!(!subscribe);
    }

    #[tokio::test]
    async fn test_set_pressed_drives_input() {
        let (shared, _control_rx) = shared_fixture();

        let (response, _) = Server::process_request(
            Request::SetPressed {
                room: "library".to_string(),
                pressed: true,
            },
            &shared,
        )
        .await;

        assert!(matches!(response, Response::Accepted));
        use crate::input::InputSource;
        assert!(shared.input.is_pressed("library"));
    }

    #[tokio::test]
    async fn test_set_pressed_unknown_room() {
        let (shared, _control_rx) = shared_fixture();

        let (response, _) = Server::process_request(
            Request::SetPressed {
                room: "garage".to_string(),
                pressed: true,
            },
            &shared,
        )
        .await;

        assert!(matches!(response, Response::Error { code, .. } if code == "unknown_room"));
    }

    #[tokio::test]
    async fn test_reset_queues_control_event() {
        let (shared, mut control_rx) = shared_fixture();

        let (response, _) = Server::process_request(Request::Reset, &shared).await;
        assert!(matches!(response, Response::Accepted));
        assert!(matches!(control_rx.recv().await, Some(ControlEvent::Reset)));
    }

    #[tokio::test]
    async fn test_status_reflects_progress() {
        let (shared, _control_rx) = shared_fixture();

        {
            let mut state = shared.state.write().await;
            state.status.rooms[0].record_dispensed(2);
        }

        let (response, _) = Server::process_request(Request::GetStatus, &shared).await;
        let Response::Status(status) = response else {
            panic!("expected status response");
        };
        assert_eq!(status.rooms[0].clues_dispensed, 2);
        assert!(status.rooms[0].exhausted);
    }

    #[tokio::test]
    async fn test_subscribe_flags_subscription() {
        let (shared, _control_rx) = shared_fixture();
        let (response, subscribe) = Server::process_request(Request::Subscribe, &shared).await;
        assert!(matches!(response, Response::Subscribed));
        assert!(subscribe);
    }
}
