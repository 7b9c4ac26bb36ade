//! IPC module for daemon-operator communication

mod protocol;
mod server;

pub use protocol::{DaemonStatus, Notification, Request, Response, RoomStatus};
pub use server::Server;
