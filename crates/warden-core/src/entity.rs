//! Entity manager operations.
//!
//! Each operation builds a delta from its arguments, selects the hook
//! chain for the mutation, and runs it. Reads bypass the pipeline and
//! return safe copies.

use std::str::FromStr;

use tracing::info;

use warden_proto::{Capability, Entity, EntityMeta};
use warden_store::Storage;

use crate::directory::Directory;
use crate::error::{Result, TreeError};
use crate::util;

impl Directory {
    /// Create a new entity.
    ///
    /// A negative `number` auto-assigns the next free one. An empty
    /// secret is permitted and produces an account that cannot
    /// authenticate.
    pub fn new_entity(&self, id: &str, number: i32, secret: &str) -> Result<()> {
        self.check_writable()?;
        let mut delta = Entity::with_id(id);
        delta.number = number;
        delta.secret = Some(secret.to_string());
        self.run_entity_chain("CREATE", &delta)?;
        info!(entity = id, "Entity created");
        Ok(())
    }

    /// Delete an entity. Not idempotent: a second delete fails with
    /// `UnknownEntity`.
    pub fn delete_entity_by_id(&self, id: &str) -> Result<()> {
        self.check_writable()?;
        self.run_entity_chain("DESTROY", &Entity::with_id(id))?;
        info!(entity = id, "Entity deleted");
        Ok(())
    }

    /// Check a plaintext secret against the stored verifier.
    ///
    /// A locked entity fails with `EntityLocked` regardless of the
    /// secret; otherwise a mismatch is `AuthorizationFailure`.
    pub fn validate_secret(&self, id: &str, secret: &str) -> Result<()> {
        let mut delta = Entity::with_id(id);
        delta.secret = Some(secret.to_string());
        self.run_entity_chain("VALIDATE-IDENTITY", &delta)?;
        Ok(())
    }

    /// Replace an entity's secret, rehashing through the crypto port.
    pub fn set_entity_secret_by_id(&self, id: &str, secret: &str) -> Result<()> {
        self.check_writable()?;
        let mut delta = Entity::with_id(id);
        delta.secret = Some(secret.to_string());
        self.run_entity_chain("SET-SECRET", &delta)?;
        info!(entity = id, "Entity secret changed");
        Ok(())
    }

    /// Lock an entity against authentication. Idempotent.
    pub fn lock_entity(&self, id: &str) -> Result<()> {
        self.check_writable()?;
        self.run_entity_chain("LOCK", &Entity::with_id(id))?;
        info!(entity = id, "Entity locked");
        Ok(())
    }

    /// Unlock an entity. Idempotent.
    pub fn unlock_entity(&self, id: &str) -> Result<()> {
        self.check_writable()?;
        self.run_entity_chain("UNLOCK", &Entity::with_id(id))?;
        info!(entity = id, "Entity unlocked");
        Ok(())
    }

    /// Grant a capability, named by its wire string.
    pub fn set_entity_capability_by_id(&self, id: &str, capability: &str) -> Result<()> {
        self.check_writable()?;
        let cap = Capability::from_str(capability)?;
        let mut delta = Entity::with_id(id);
        delta.capabilities = vec![cap];
        self.run_entity_chain("SET-CAPABILITY", &delta)?;
        info!(entity = id, capability = %cap, "Capability granted");
        Ok(())
    }

    /// Revoke a capability, named by its wire string.
    pub fn remove_entity_capability_by_id(&self, id: &str, capability: &str) -> Result<()> {
        self.check_writable()?;
        let cap = Capability::from_str(capability)?;
        let mut delta = Entity::with_id(id);
        delta.capabilities = vec![cap];
        self.run_entity_chain("REMOVE-CAPABILITY", &delta)?;
        info!(entity = id, capability = %cap, "Capability revoked");
        Ok(())
    }

    /// Manage an entity's public keys.
    ///
    /// `ADD` stores `TYPE:VALUE` (type uppercased), `DEL` removes keys
    /// whose value starts with `value`, `LIST` returns every key.
    pub fn update_entity_keys(
        &self,
        id: &str,
        mode: &str,
        keytype: &str,
        value: &str,
    ) -> Result<Vec<String>> {
        match mode.to_uppercase().as_str() {
            "LIST" => Ok(self.storage.load_entity(id)?.keys),
            "ADD" => {
                self.check_writable()?;
                let mut delta = Entity::with_id(id);
                delta.keys = vec![format!("{}:{}", keytype, value)];
                self.run_entity_chain("ADD-KEY", &delta)?;
                Ok(Vec::new())
            }
            "DEL" => {
                self.check_writable()?;
                let mut delta = Entity::with_id(id);
                delta.keys = vec![value.to_string()];
                self.run_entity_chain("DEL-KEY", &delta)?;
                Ok(Vec::new())
            }
            _ => Err(TreeError::UnknownMode(mode.to_string())),
        }
    }

    /// Merge caller-supplied metadata into an entity.
    ///
    /// Blacklisted fields (the group-membership list) are silently
    /// dropped by the merge hook.
    pub fn update_entity_meta(&self, id: &str, meta: EntityMeta) -> Result<()> {
        self.check_writable()?;
        let mut delta = Entity::with_id(id);
        delta.meta = meta;
        self.run_entity_chain("MERGE-METADATA", &delta)?;
        Ok(())
    }

    /// Manage free-form `key:value` metadata.
    ///
    /// Modes are `UPSERT`, `READ`, `CLEARFUZZY`, and `CLEAREXACT`
    /// (case-insensitive). `READ` with key `*` returns every pair. A key
    /// ending in `*` is multi-valued and accumulates on upsert.
    pub fn manage_untyped_entity_meta(
        &self,
        id: &str,
        mode: &str,
        key: &str,
        value: &str,
    ) -> Result<Vec<String>> {
        let chain = match mode.to_uppercase().as_str() {
            "READ" => {
                let entity = self.storage.load_entity(id)?;
                return Ok(util::read_kv(&entity.untyped_meta, key));
            }
            "UPSERT" => "UEM-UPSERT",
            "CLEARFUZZY" => "UEM-CLEARFUZZY",
            "CLEAREXACT" => "UEM-CLEAREXACT",
            _ => return Err(TreeError::UnknownMode(mode.to_string())),
        };

        self.check_writable()?;
        let mut delta = Entity::with_id(id);
        delta.untyped_meta = vec![format!("{}:{}", key, value)];
        self.run_entity_chain(chain, &delta)?;
        Ok(Vec::new())
    }

    /// Fetch a safe copy of an entity: the secret field reads
    /// `<REDACTED>`.
    pub fn get_entity(&self, id: &str) -> Result<Entity> {
        let entity = self.storage.load_entity(id)?;
        Ok(util::safe_copy_entity(&entity))
    }

    /// Case-insensitive substring search over IDs and name fields.
    /// Results are safe copies, ordered by ID.
    pub fn search_entities(&self, expression: &str) -> Result<Vec<Entity>> {
        let needle = expression.to_lowercase();
        let mut matches: Vec<Entity> = self
            .storage
            .list_entities()?
            .iter()
            .filter(|e| {
                e.id.to_lowercase().contains(&needle)
                    || e.meta
                        .display_name
                        .as_deref()
                        .is_some_and(|n| n.to_lowercase().contains(&needle))
                    || e.meta
                        .legal_name
                        .as_deref()
                        .is_some_and(|n| n.to_lowercase().contains(&needle))
            })
            .map(util::safe_copy_entity)
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matches)
    }
}
