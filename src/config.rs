//! Configuration loading and validation
//!
//! The daemon reads its room definitions from a JSON rooms file: a map of
//! room id to button input channel plus the ordered clue list, with an
//! optional `timing` section overriding the control-loop defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Path to the rooms file
    pub rooms_path: PathBuf,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let home = std::env::var("HOME")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("cluebox");

        let socket_path = data_dir.join("daemon.sock");

        let rooms_path = match std::env::var_os("CLUEBOX_ROOMS") {
            Some(path) => PathBuf::from(path),
            None => data_dir.join("rooms.json"),
        };

        Ok(Self {
            socket_path,
            data_dir,
            rooms_path,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}

/// One clue: the text shown on screen and the sound played alongside it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Clue {
    pub text: String,
    pub sound: PathBuf,
}

/// A configured room: identifier, button input channel, ordered clues
#[derive(Debug, Clone)]
pub struct RoomConfig {
    pub room_id: String,
    pub input_channel: u8,
    pub clues: Vec<Clue>,
}

/// Time-based contracts of the control loop, overridable per rooms file
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Button sampling period in milliseconds
    pub sample_period_ms: u64,

    /// Continuous hold duration that triggers a global reset, in milliseconds
    pub hold_threshold_ms: u64,

    /// Blank beat between clearing the display and revealing a clue,
    /// in milliseconds
    pub transition_delay_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            sample_period_ms: 100,
            hold_threshold_ms: 3000,
            transition_delay_ms: 500,
        }
    }
}

impl Timing {
    pub fn sample_period(&self) -> Duration {
        Duration::from_millis(self.sample_period_ms)
    }

    pub fn hold_threshold(&self) -> Duration {
        Duration::from_millis(self.hold_threshold_ms)
    }

    pub fn transition_delay(&self) -> Duration {
        Duration::from_millis(self.transition_delay_ms)
    }
}

/// Errors raised while loading or validating the rooms file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("rooms file not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("failed to read rooms file: {0}")]
    Io(#[from] std::io::Error),

    #[error("rooms file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("room {room:?} has no clues")]
    NoClues { room: String },

    #[error("room {room:?} clue {index} has an empty sound reference")]
    EmptySoundRef { room: String, index: usize },

    #[error("input channel {channel} is wired to both {first:?} and {second:?}")]
    DuplicateChannel {
        channel: u8,
        first: String,
        second: String,
    },
}

/// On-disk shape of the rooms file
#[derive(Debug, Deserialize)]
struct RoomsFile {
    #[serde(default)]
    rooms: BTreeMap<String, RoomEntry>,
    #[serde(default)]
    timing: Timing,
}

#[derive(Debug, Deserialize)]
struct RoomEntry {
    /// `gpio_pin` accepted as an alias for Pi-wired installs
    #[serde(alias = "gpio_pin")]
    input_channel: u8,
    clues: Vec<Clue>,
}

/// Load and validate the rooms file
///
/// An empty `rooms` map is valid: the daemon starts with nothing to drive.
/// Room ids are unique by construction (JSON object keys); input channels
/// are checked here because two rooms wired to one button is a wiring fault
/// that should surface at startup, not mid-game.
pub fn load_rooms(path: &Path) -> Result<(Vec<RoomConfig>, Timing), ConfigError> {
    if !path.exists() {
        return Err(ConfigError::Missing(path.to_owned()));
    }

    let raw = std::fs::read_to_string(path)?;
    let file: RoomsFile = serde_json::from_str(&raw)?;

    let mut channels: BTreeMap<u8, String> = BTreeMap::new();
    let mut rooms = Vec::with_capacity(file.rooms.len());

    for (room_id, entry) in file.rooms {
        if entry.clues.is_empty() {
            return Err(ConfigError::NoClues { room: room_id });
        }

        if let Some(index) = entry
            .clues
            .iter()
            .position(|clue| clue.sound.as_os_str().is_empty())
        {
            return Err(ConfigError::EmptySoundRef {
                room: room_id,
                index,
            });
        }

        if let Some(first) = channels.insert(entry.input_channel, room_id.clone()) {
            return Err(ConfigError::DuplicateChannel {
                channel: entry.input_channel,
                first,
                second: room_id,
            });
        }

        rooms.push(RoomConfig {
            room_id,
            input_channel: entry.input_channel,
            clues: entry.clues,
        });
    }

    Ok((rooms, file.timing))
}
