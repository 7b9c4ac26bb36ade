//! Immutable clue lookup built from validated configuration

use std::collections::HashMap;

use crate::config::{Clue, RoomConfig};

/// Lookup failures against the catalog
///
/// These indicate an internal inconsistency (an input channel bound to a
/// room the catalog does not know, or progress beyond the clue list); the
/// controller logs them and drops the offending press.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("unknown room {0:?}")]
    UnknownRoom(String),

    #[error("room {room:?} has no clue at index {index}")]
    ClueOutOfRange { room: String, index: usize },
}

/// Per-room ordered clue lists, loaded once at startup
///
/// Pure lookups, no mutation. Configuration validation (unique ids,
/// non-empty clue lists, well-formed sound references) happens in
/// `config::load_rooms`; the catalog assumes it.
#[derive(Debug, Clone, Default)]
pub struct ClueCatalog {
    /// Room ids in rooms-file order, for stable iteration
    order: Vec<String>,
    clues: HashMap<String, Vec<Clue>>,
}

impl ClueCatalog {
    pub fn from_rooms(rooms: &[RoomConfig]) -> Self {
        let order = rooms.iter().map(|room| room.room_id.clone()).collect();
        let clues = rooms
            .iter()
            .map(|room| (room.room_id.clone(), room.clues.clone()))
            .collect();
        Self { order, clues }
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Room ids in configuration order
    pub fn room_ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn clue_at(&self, room_id: &str, index: usize) -> Result<&Clue, CatalogError> {
        let clues = self
            .clues
            .get(room_id)
            .ok_or_else(|| CatalogError::UnknownRoom(room_id.to_string()))?;

        clues.get(index).ok_or_else(|| CatalogError::ClueOutOfRange {
            room: room_id.to_string(),
            index,
        })
    }

    pub fn clue_count(&self, room_id: &str) -> Result<usize, CatalogError> {
        self.clues
            .get(room_id)
            .map(Vec::len)
            .ok_or_else(|| CatalogError::UnknownRoom(room_id.to_string()))
    }
}
