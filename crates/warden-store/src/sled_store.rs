//! Sled-backed persistent storage.

use std::path::Path;

use tracing::info;

use warden_proto::{Entity, Group};

use crate::error::{Result, StoreError};
use crate::Storage;

/// Tree name for entity records.
const ENTITIES_TREE: &str = "warden_entities";

/// Tree name for group records.
const GROUPS_TREE: &str = "warden_groups";

/// Persistent storage backed by sled.
///
/// Uses two sled trees:
/// - `warden_entities`: entity ID → bincode-serialized [`Entity`]
/// - `warden_groups`: group name → bincode-serialized [`Group`]
///
/// Each call maps to one sled operation, which gives the per-record
/// atomicity the port requires. Record numbers are computed by scanning,
/// matching the unspecified-order contract of the trait.
pub struct SledStore {
    db: sled::Db,
    entities: sled::Tree,
    groups: sled::Tree,
}

impl SledStore {
    /// Open or create a store in the given directory.
    pub fn open(path: &Path) -> Result<Self> {
        let db = sled::open(path).map_err(|e| StoreError::Internal(e.to_string()))?;
        let entities = db
            .open_tree(ENTITIES_TREE)
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let groups = db
            .open_tree(GROUPS_TREE)
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        info!(path = %path.display(), "Opened directory store");
        Ok(Self { db, entities, groups })
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map(|_| ())
            .map_err(|e| StoreError::Internal(e.to_string()))
    }
}

impl Storage for SledStore {
    fn load_entity(&self, id: &str) -> Result<Entity> {
        match self
            .entities
            .get(id.as_bytes())
            .map_err(|e| StoreError::Internal(e.to_string()))?
        {
            Some(bytes) => {
                bincode::deserialize(&bytes).map_err(|e| StoreError::Internal(e.to_string()))
            }
            None => Err(StoreError::UnknownEntity(id.to_string())),
        }
    }

    fn save_entity(&self, entity: &Entity) -> Result<()> {
        let bytes =
            bincode::serialize(entity).map_err(|e| StoreError::Internal(e.to_string()))?;
        self.entities
            .insert(entity.id.as_bytes(), bytes)
            .map(|_| ())
            .map_err(|e| StoreError::Internal(e.to_string()))
    }

    fn delete_entity(&self, id: &str) -> Result<()> {
        match self
            .entities
            .remove(id.as_bytes())
            .map_err(|e| StoreError::Internal(e.to_string()))?
        {
            Some(_) => Ok(()),
            None => Err(StoreError::UnknownEntity(id.to_string())),
        }
    }

    fn next_entity_number(&self) -> Result<i32> {
        Ok(self
            .list_entities()?
            .iter()
            .map(|e| e.number)
            .max()
            .unwrap_or(0)
            + 1)
    }

    fn list_entities(&self) -> Result<Vec<Entity>> {
        self.entities
            .iter()
            .values()
            .map(|v| {
                let bytes = v.map_err(|e| StoreError::Internal(e.to_string()))?;
                bincode::deserialize(&bytes).map_err(|e| StoreError::Internal(e.to_string()))
            })
            .collect()
    }

    fn load_group(&self, name: &str) -> Result<Group> {
        match self
            .groups
            .get(name.as_bytes())
            .map_err(|e| StoreError::Internal(e.to_string()))?
        {
            Some(bytes) => {
                bincode::deserialize(&bytes).map_err(|e| StoreError::Internal(e.to_string()))
            }
            None => Err(StoreError::UnknownGroup(name.to_string())),
        }
    }

    fn save_group(&self, group: &Group) -> Result<()> {
        let bytes =
            bincode::serialize(group).map_err(|e| StoreError::Internal(e.to_string()))?;
        self.groups
            .insert(group.name.as_bytes(), bytes)
            .map(|_| ())
            .map_err(|e| StoreError::Internal(e.to_string()))
    }

    fn delete_group(&self, name: &str) -> Result<()> {
        match self
            .groups
            .remove(name.as_bytes())
            .map_err(|e| StoreError::Internal(e.to_string()))?
        {
            Some(_) => Ok(()),
            None => Err(StoreError::UnknownGroup(name.to_string())),
        }
    }

    fn next_group_number(&self) -> Result<i32> {
        Ok(self
            .list_groups()?
            .iter()
            .map(|g| g.number)
            .max()
            .unwrap_or(0)
            + 1)
    }

    fn list_groups(&self) -> Result<Vec<Group>> {
        self.groups
            .iter()
            .values()
            .map(|v| {
                let bytes = v.map_err(|e| StoreError::Internal(e.to_string()))?;
                bincode::deserialize(&bytes).map_err(|e| StoreError::Internal(e.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, SledStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SledStore::open(dir.path()).unwrap();
            let mut e = Entity::with_id("foo");
            e.number = 4;
            store.save_entity(&e).unwrap();
            store.flush().unwrap();
        }
        let store = SledStore::open(dir.path()).unwrap();
        assert_eq!(store.load_entity("foo").unwrap().number, 4);
        assert_eq!(store.next_entity_number().unwrap(), 5);
    }

    #[test]
    fn missing_records_are_unknown() {
        let (_dir, store) = open_temp();
        assert!(matches!(
            store.load_entity("nope"),
            Err(StoreError::UnknownEntity(_))
        ));
        assert!(matches!(
            store.delete_group("nope"),
            Err(StoreError::UnknownGroup(_))
        ));
    }

    #[test]
    fn group_roundtrip() {
        let (_dir, store) = open_temp();
        let mut g = Group::with_name("admins");
        g.number = 1;
        g.expansions = vec!["INCLUDE:ops".to_string()];
        store.save_group(&g).unwrap();
        assert_eq!(store.load_group("admins").unwrap(), g);
        assert_eq!(store.list_groups().unwrap().len(), 1);
    }
}
