//! Room catalog and per-room progress
//!
//! The catalog is the immutable side (which clues exist, in what order);
//! `RoomState` is the mutable side (how far each room has progressed),
//! owned exclusively by the controller.

mod catalog;
mod state;

pub use catalog::{CatalogError, ClueCatalog};
pub use state::RoomState;
