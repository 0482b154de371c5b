//! # warden-store
//!
//! Pluggable persistence for directory records.
//!
//! The [`Storage`] trait is the port the directory engine writes through.
//! Operations are atomic per call; there are no cross-call transactions,
//! and higher layers tolerate concurrent mutation as last-writer-wins.
//!
//! Implementations:
//!
//! - [`MemoryStore`]: RwLock'd maps. The test backend, with an injectable
//!   save failure for exercising error paths.
//! - [`SledStore`]: bincode-encoded records in sled trees. The persistent
//!   backend.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
mod memory;
mod sled_store;

pub use error::{Result, StoreError};
pub use memory::{MemoryStore, POISON_KEY};
pub use sled_store::SledStore;

use warden_proto::{Entity, Group};

/// The storage port: load, save, delete, and enumerate directory records.
///
/// Entities are keyed by ID, groups by name. `next_*_number` returns
/// `max(existing) + 1`, starting from 1 on an empty store. Enumeration
/// order is unspecified but stable within one call.
pub trait Storage: Send + Sync {
    /// Load an entity by ID.
    fn load_entity(&self, id: &str) -> Result<Entity>;

    /// Save an entity, replacing any record with the same ID.
    fn save_entity(&self, entity: &Entity) -> Result<()>;

    /// Delete an entity by ID.
    fn delete_entity(&self, id: &str) -> Result<()>;

    /// The next free entity number.
    fn next_entity_number(&self) -> Result<i32>;

    /// All stored entities.
    fn list_entities(&self) -> Result<Vec<Entity>>;

    /// Load a group by name.
    fn load_group(&self, name: &str) -> Result<Group>;

    /// Save a group, replacing any record with the same name.
    fn save_group(&self, group: &Group) -> Result<()>;

    /// Delete a group by name.
    fn delete_group(&self, name: &str) -> Result<()>;

    /// The next free group number.
    fn next_group_number(&self) -> Result<i32>;

    /// All stored groups.
    fn list_groups(&self) -> Result<Vec<Group>>;
}
