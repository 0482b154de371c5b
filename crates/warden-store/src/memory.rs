//! In-memory storage backend.

use std::collections::HashMap;
use std::sync::RwLock;

use warden_proto::{Entity, Group};

use crate::error::{Result, StoreError};
use crate::Storage;

/// Key that makes saves fail with an internal error.
///
/// Tests create a record with this ID to drive the engine's save-failure
/// paths without a special backend.
pub const POISON_KEY: &str = "save-error";

/// Map-backed storage. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    entities: RwLock<HashMap<String, Entity>>,
    groups: RwLock<HashMap<String, Group>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStore {
    fn load_entity(&self, id: &str) -> Result<Entity> {
        self.entities
            .read()
            .expect("entity map poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::UnknownEntity(id.to_string()))
    }

    fn save_entity(&self, entity: &Entity) -> Result<()> {
        if entity.id == POISON_KEY {
            return Err(StoreError::Internal("injected save failure".to_string()));
        }
        self.entities
            .write()
            .expect("entity map poisoned")
            .insert(entity.id.clone(), entity.clone());
        Ok(())
    }

    fn delete_entity(&self, id: &str) -> Result<()> {
        self.entities
            .write()
            .expect("entity map poisoned")
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::UnknownEntity(id.to_string()))
    }

    fn next_entity_number(&self) -> Result<i32> {
        let max = self
            .entities
            .read()
            .expect("entity map poisoned")
            .values()
            .map(|e| e.number)
            .max()
            .unwrap_or(0);
        Ok(max + 1)
    }

    fn list_entities(&self) -> Result<Vec<Entity>> {
        Ok(self
            .entities
            .read()
            .expect("entity map poisoned")
            .values()
            .cloned()
            .collect())
    }

    fn load_group(&self, name: &str) -> Result<Group> {
        self.groups
            .read()
            .expect("group map poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::UnknownGroup(name.to_string()))
    }

    fn save_group(&self, group: &Group) -> Result<()> {
        if group.name == POISON_KEY {
            return Err(StoreError::Internal("injected save failure".to_string()));
        }
        self.groups
            .write()
            .expect("group map poisoned")
            .insert(group.name.clone(), group.clone());
        Ok(())
    }

    fn delete_group(&self, name: &str) -> Result<()> {
        self.groups
            .write()
            .expect("group map poisoned")
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::UnknownGroup(name.to_string()))
    }

    fn next_group_number(&self) -> Result<i32> {
        let max = self
            .groups
            .read()
            .expect("group map poisoned")
            .values()
            .map(|g| g.number)
            .max()
            .unwrap_or(0);
        Ok(max + 1)
    }

    fn list_groups(&self) -> Result<Vec<Group>> {
        Ok(self
            .groups
            .read()
            .expect("group map poisoned")
            .values()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_crud() {
        let store = MemoryStore::new();

        assert!(matches!(
            store.load_entity("foo"),
            Err(StoreError::UnknownEntity(_))
        ));

        let mut e = Entity::with_id("foo");
        e.number = 1;
        store.save_entity(&e).unwrap();
        assert_eq!(store.load_entity("foo").unwrap().number, 1);

        store.delete_entity("foo").unwrap();
        assert!(matches!(
            store.delete_entity("foo"),
            Err(StoreError::UnknownEntity(_))
        ));
    }

    #[test]
    fn numbers_count_up_from_one() {
        let store = MemoryStore::new();
        assert_eq!(store.next_entity_number().unwrap(), 1);

        let mut e = Entity::with_id("foo");
        e.number = 7;
        store.save_entity(&e).unwrap();
        assert_eq!(store.next_entity_number().unwrap(), 8);

        assert_eq!(store.next_group_number().unwrap(), 1);
    }

    #[test]
    fn poison_key_fails_saves() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.save_entity(&Entity::with_id(POISON_KEY)),
            Err(StoreError::Internal(_))
        ));
        assert!(matches!(
            store.save_group(&Group::with_name(POISON_KEY)),
            Err(StoreError::Internal(_))
        ));
    }

    #[test]
    fn group_crud() {
        let store = MemoryStore::new();
        let mut g = Group::with_name("admins");
        g.number = 1;
        store.save_group(&g).unwrap();
        assert_eq!(store.list_groups().unwrap().len(), 1);
        store.delete_group("admins").unwrap();
        assert!(matches!(
            store.load_group("admins"),
            Err(StoreError::UnknownGroup(_))
        ));
    }
}
