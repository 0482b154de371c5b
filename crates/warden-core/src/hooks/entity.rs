//! Builtin entity hooks.

use std::sync::Arc;

use warden_proto::Entity;
use warden_store::Storage;

use crate::error::{Result, TreeError};
use crate::hooks::{EntityHook, HookContext, HookRegistry};
use crate::util;

/// Register every builtin entity hook constructor.
pub fn register_builtin(registry: &mut HookRegistry) {
    registry.register_entity_hook("ensure-entity-does-not-exist", EnsureEntityDoesNotExist::new);
    registry.register_entity_hook("ensure-entity-exists", EnsureEntityExists::new);
    registry.register_entity_hook("fill-entity-defaults", FillEntityDefaults::new);
    registry.register_entity_hook("set-entity-secret", SetEntitySecret::new);
    registry.register_entity_hook("validate-entity-secret", ValidateEntitySecret::new);
    registry.register_entity_hook("merge-entity-meta", MergeEntityMeta::new);
    registry.register_entity_hook("set-entity-capability", ManageEntityCapabilities::new_add);
    registry.register_entity_hook("remove-entity-capability", ManageEntityCapabilities::new_del);
    registry.register_entity_hook("add-entity-key", ManageEntityKeys::new_add);
    registry.register_entity_hook("del-entity-key", ManageEntityKeys::new_del);
    registry.register_entity_hook("upsert-untyped-meta", ManageUntypedMeta::new_upsert);
    registry.register_entity_hook("clearfuzzy-untyped-meta", ManageUntypedMeta::new_clearfuzzy);
    registry.register_entity_hook("clearexact-untyped-meta", ManageUntypedMeta::new_clearexact);
    registry.register_entity_hook("add-direct-group", ManageDirectGroups::new_add);
    registry.register_entity_hook("del-direct-group", ManageDirectGroups::new_del);
    registry.register_entity_hook("lock-entity", SetEntityLock::new_lock);
    registry.register_entity_hook("unlock-entity", SetEntityLock::new_unlock);
    registry.register_entity_hook("destroy-entity", DestroyEntity::new);
    registry.register_entity_hook("save-entity", SaveEntity::new);
}

/// Fails with `DuplicateEntityID` if storage has a record for `delta.id`.
struct EnsureEntityDoesNotExist {
    ctx: HookContext,
}

impl EnsureEntityDoesNotExist {
    fn new(ctx: &HookContext) -> Result<Arc<dyn EntityHook>> {
        Ok(Arc::new(Self { ctx: ctx.clone() }))
    }
}

impl EntityHook for EnsureEntityDoesNotExist {
    fn name(&self) -> &'static str {
        "ensure-entity-does-not-exist"
    }
    fn priority(&self) -> u32 {
        10
    }
    fn run(&self, _current: &mut Entity, delta: &Entity) -> Result<()> {
        match self.ctx.storage.load_entity(&delta.id) {
            Ok(_) => Err(TreeError::DuplicateEntityID(delta.id.clone())),
            Err(warden_store::StoreError::UnknownEntity(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Loads the stored record for `delta.id` into the working copy, failing
/// with `UnknownEntity` if there is none.
struct EnsureEntityExists {
    ctx: HookContext,
}

impl EnsureEntityExists {
    fn new(ctx: &HookContext) -> Result<Arc<dyn EntityHook>> {
        Ok(Arc::new(Self { ctx: ctx.clone() }))
    }
}

impl EntityHook for EnsureEntityExists {
    fn name(&self) -> &'static str {
        "ensure-entity-exists"
    }
    fn priority(&self) -> u32 {
        10
    }
    fn run(&self, current: &mut Entity, delta: &Entity) -> Result<()> {
        *current = self.ctx.storage.load_entity(&delta.id)?;
        Ok(())
    }
}

/// Seeds a new entity: ID from the delta, number assigned if unset.
struct FillEntityDefaults {
    ctx: HookContext,
}

impl FillEntityDefaults {
    fn new(ctx: &HookContext) -> Result<Arc<dyn EntityHook>> {
        Ok(Arc::new(Self { ctx: ctx.clone() }))
    }
}

impl EntityHook for FillEntityDefaults {
    fn name(&self) -> &'static str {
        "fill-entity-defaults"
    }
    fn priority(&self) -> u32 {
        20
    }
    fn run(&self, current: &mut Entity, delta: &Entity) -> Result<()> {
        current.id = delta.id.clone();
        current.number = if delta.number < 0 {
            self.ctx.storage.next_entity_number()?
        } else {
            delta.number
        };
        Ok(())
    }
}

/// Replaces the working secret with a freshly secured verifier.
///
/// An empty delta secret clears the verifier, leaving an account that can
/// never authenticate.
struct SetEntitySecret {
    ctx: HookContext,
}

impl SetEntitySecret {
    fn new(ctx: &HookContext) -> Result<Arc<dyn EntityHook>> {
        Ok(Arc::new(Self { ctx: ctx.clone() }))
    }
}

impl EntityHook for SetEntitySecret {
    fn name(&self) -> &'static str {
        "set-entity-secret"
    }
    fn priority(&self) -> u32 {
        40
    }
    fn run(&self, current: &mut Entity, delta: &Entity) -> Result<()> {
        match delta.secret.as_deref() {
            Some(secret) if !secret.is_empty() => {
                current.secret = Some(self.ctx.crypto.secure_secret(secret)?);
            }
            _ => current.secret = None,
        }
        Ok(())
    }
}

/// Checks the delta's plaintext secret against the stored verifier.
///
/// A locked entity fails with `EntityLocked` before the secret is even
/// looked at; an absent verifier fails like a mismatch.
struct ValidateEntitySecret {
    ctx: HookContext,
}

impl ValidateEntitySecret {
    fn new(ctx: &HookContext) -> Result<Arc<dyn EntityHook>> {
        Ok(Arc::new(Self { ctx: ctx.clone() }))
    }
}

impl EntityHook for ValidateEntitySecret {
    fn name(&self) -> &'static str {
        "validate-entity-secret"
    }
    fn priority(&self) -> u32 {
        50
    }
    fn run(&self, current: &mut Entity, delta: &Entity) -> Result<()> {
        if current.locked {
            return Err(TreeError::EntityLocked(current.id.clone()));
        }
        let verifier = current
            .secret
            .as_deref()
            .ok_or(TreeError::AuthorizationFailure)?;
        self.ctx
            .crypto
            .verify_secret(delta.secret.as_deref().unwrap_or(""), verifier)?;
        Ok(())
    }
}

/// Copies permitted fields from the delta's meta into the working copy.
///
/// The group-membership list is owned by the group manager and is
/// silently dropped here, whatever the delta says.
struct MergeEntityMeta;

impl MergeEntityMeta {
    fn new(_ctx: &HookContext) -> Result<Arc<dyn EntityHook>> {
        Ok(Arc::new(Self))
    }
}

impl EntityHook for MergeEntityMeta {
    fn name(&self) -> &'static str {
        "merge-entity-meta"
    }
    fn priority(&self) -> u32 {
        50
    }
    fn run(&self, current: &mut Entity, delta: &Entity) -> Result<()> {
        let m = &delta.meta;
        if m.display_name.is_some() {
            current.meta.display_name = m.display_name.clone();
        }
        if m.legal_name.is_some() {
            current.meta.legal_name = m.legal_name.clone();
        }
        if m.shell.is_some() {
            current.meta.shell = m.shell.clone();
        }
        if m.home.is_some() {
            current.meta.home = m.home.clone();
        }
        if m.location.is_some() {
            current.meta.location = m.location.clone();
        }
        Ok(())
    }
}

/// Adds or removes capabilities as configured. An empty capability list
/// in the delta is an `UnknownCapability` error.
struct ManageEntityCapabilities {
    add: bool,
}

impl ManageEntityCapabilities {
    fn new_add(_ctx: &HookContext) -> Result<Arc<dyn EntityHook>> {
        Ok(Arc::new(Self { add: true }))
    }
    fn new_del(_ctx: &HookContext) -> Result<Arc<dyn EntityHook>> {
        Ok(Arc::new(Self { add: false }))
    }
}

impl EntityHook for ManageEntityCapabilities {
    fn name(&self) -> &'static str {
        if self.add {
            "set-entity-capability"
        } else {
            "remove-entity-capability"
        }
    }
    fn priority(&self) -> u32 {
        50
    }
    fn run(&self, current: &mut Entity, delta: &Entity) -> Result<()> {
        if delta.capabilities.is_empty() {
            return Err(TreeError::UnknownCapability(String::new()));
        }
        for cap in &delta.capabilities {
            if self.add {
                if !current.capabilities.contains(cap) {
                    current.capabilities.push(*cap);
                }
            } else {
                current.capabilities.retain(|c| c != cap);
            }
        }
        Ok(())
    }
}

/// Adds keys (delta entries are `TYPE:VALUE`) or removes them by value
/// prefix (delta entries are bare values).
struct ManageEntityKeys {
    add: bool,
}

impl ManageEntityKeys {
    fn new_add(_ctx: &HookContext) -> Result<Arc<dyn EntityHook>> {
        Ok(Arc::new(Self { add: true }))
    }
    fn new_del(_ctx: &HookContext) -> Result<Arc<dyn EntityHook>> {
        Ok(Arc::new(Self { add: false }))
    }
}

impl EntityHook for ManageEntityKeys {
    fn name(&self) -> &'static str {
        if self.add {
            "add-entity-key"
        } else {
            "del-entity-key"
        }
    }
    fn priority(&self) -> u32 {
        50
    }
    fn run(&self, current: &mut Entity, delta: &Entity) -> Result<()> {
        for entry in &delta.keys {
            if self.add {
                let (keytype, value) = entry
                    .split_once(':')
                    .ok_or_else(|| TreeError::Internal(format!("malformed key: {entry}")))?;
                util::add_key(&mut current.keys, keytype, value);
            } else {
                util::del_key(&mut current.keys, entry);
            }
        }
        Ok(())
    }
}

/// Untyped-meta mutation modes.
#[derive(Clone, Copy)]
enum UntypedMode {
    Upsert,
    ClearFuzzy,
    ClearExact,
}

/// Applies untyped-metadata changes. Delta entries are `key:value` pairs;
/// the value is ignored for fuzzy clears.
struct ManageUntypedMeta {
    mode: UntypedMode,
}

impl ManageUntypedMeta {
    fn new_upsert(_ctx: &HookContext) -> Result<Arc<dyn EntityHook>> {
        Ok(Arc::new(Self { mode: UntypedMode::Upsert }))
    }
    fn new_clearfuzzy(_ctx: &HookContext) -> Result<Arc<dyn EntityHook>> {
        Ok(Arc::new(Self { mode: UntypedMode::ClearFuzzy }))
    }
    fn new_clearexact(_ctx: &HookContext) -> Result<Arc<dyn EntityHook>> {
        Ok(Arc::new(Self { mode: UntypedMode::ClearExact }))
    }
}

impl EntityHook for ManageUntypedMeta {
    fn name(&self) -> &'static str {
        match self.mode {
            UntypedMode::Upsert => "upsert-untyped-meta",
            UntypedMode::ClearFuzzy => "clearfuzzy-untyped-meta",
            UntypedMode::ClearExact => "clearexact-untyped-meta",
        }
    }
    fn priority(&self) -> u32 {
        50
    }
    fn run(&self, current: &mut Entity, delta: &Entity) -> Result<()> {
        for entry in &delta.untyped_meta {
            let (key, value) = entry.split_once(':').unwrap_or((entry.as_str(), ""));
            match self.mode {
                UntypedMode::Upsert => util::upsert_kv(&mut current.untyped_meta, key, value),
                UntypedMode::ClearFuzzy => util::clear_fuzzy_kv(&mut current.untyped_meta, key),
                UntypedMode::ClearExact => {
                    util::clear_exact_kv(&mut current.untyped_meta, key, value)
                }
            }
        }
        Ok(())
    }
}

/// Maintains the direct group-membership list on behalf of the group
/// manager. This is the one writer of `meta.groups`.
struct ManageDirectGroups {
    add: bool,
}

impl ManageDirectGroups {
    fn new_add(_ctx: &HookContext) -> Result<Arc<dyn EntityHook>> {
        Ok(Arc::new(Self { add: true }))
    }
    fn new_del(_ctx: &HookContext) -> Result<Arc<dyn EntityHook>> {
        Ok(Arc::new(Self { add: false }))
    }
}

impl EntityHook for ManageDirectGroups {
    fn name(&self) -> &'static str {
        if self.add {
            "add-direct-group"
        } else {
            "del-direct-group"
        }
    }
    fn priority(&self) -> u32 {
        50
    }
    fn run(&self, current: &mut Entity, delta: &Entity) -> Result<()> {
        for group in &delta.meta.groups {
            if self.add {
                if !current.meta.groups.contains(group) {
                    current.meta.groups.push(group.clone());
                }
            } else {
                current.meta.groups.retain(|g| g != group);
            }
        }
        Ok(())
    }
}

/// Sets or clears the lock flag. Idempotent by construction.
struct SetEntityLock {
    locked: bool,
}

impl SetEntityLock {
    fn new_lock(_ctx: &HookContext) -> Result<Arc<dyn EntityHook>> {
        Ok(Arc::new(Self { locked: true }))
    }
    fn new_unlock(_ctx: &HookContext) -> Result<Arc<dyn EntityHook>> {
        Ok(Arc::new(Self { locked: false }))
    }
}

impl EntityHook for SetEntityLock {
    fn name(&self) -> &'static str {
        if self.locked {
            "lock-entity"
        } else {
            "unlock-entity"
        }
    }
    fn priority(&self) -> u32 {
        50
    }
    fn run(&self, current: &mut Entity, _delta: &Entity) -> Result<()> {
        current.locked = self.locked;
        Ok(())
    }
}

/// Removes the record from storage. Terminal hook of the DESTROY chain.
struct DestroyEntity {
    ctx: HookContext,
}

impl DestroyEntity {
    fn new(ctx: &HookContext) -> Result<Arc<dyn EntityHook>> {
        Ok(Arc::new(Self { ctx: ctx.clone() }))
    }
}

impl EntityHook for DestroyEntity {
    fn name(&self) -> &'static str {
        "destroy-entity"
    }
    fn priority(&self) -> u32 {
        99
    }
    fn run(&self, _current: &mut Entity, delta: &Entity) -> Result<()> {
        self.ctx.storage.delete_entity(&delta.id)?;
        Ok(())
    }
}

/// Persists the working copy. Terminal hook of every write chain.
struct SaveEntity {
    ctx: HookContext,
}

impl SaveEntity {
    fn new(ctx: &HookContext) -> Result<Arc<dyn EntityHook>> {
        Ok(Arc::new(Self { ctx: ctx.clone() }))
    }
}

impl EntityHook for SaveEntity {
    fn name(&self) -> &'static str {
        "save-entity"
    }
    fn priority(&self) -> u32 {
        99
    }
    fn run(&self, current: &mut Entity, _delta: &Entity) -> Result<()> {
        self.ctx.storage.save_entity(current)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use warden_crypto::PlainEngine;
    use warden_store::{MemoryStore, Storage};

    fn ctx() -> HookContext {
        HookContext {
            storage: Arc::new(MemoryStore::new()),
            crypto: Arc::new(PlainEngine),
        }
    }

    #[test]
    fn ensure_absent_rejects_existing() {
        let ctx = ctx();
        ctx.storage.save_entity(&Entity::with_id("foo")).unwrap();

        let hook = EnsureEntityDoesNotExist::new(&ctx).unwrap();
        let err = hook
            .run(&mut Entity::default(), &Entity::with_id("foo"))
            .unwrap_err();
        assert_eq!(err, TreeError::DuplicateEntityID("foo".to_string()));

        assert!(hook
            .run(&mut Entity::default(), &Entity::with_id("bar"))
            .is_ok());
    }

    #[test]
    fn ensure_exists_loads_current() {
        let ctx = ctx();
        let mut stored = Entity::with_id("foo");
        stored.number = 42;
        ctx.storage.save_entity(&stored).unwrap();

        let hook = EnsureEntityExists::new(&ctx).unwrap();
        let mut current = Entity::default();
        hook.run(&mut current, &Entity::with_id("foo")).unwrap();
        assert_eq!(current.number, 42);

        let err = hook
            .run(&mut Entity::default(), &Entity::with_id("nope"))
            .unwrap_err();
        assert_eq!(err, TreeError::UnknownEntity("nope".to_string()));
    }

    #[test]
    fn defaults_auto_assign_number() {
        let ctx = ctx();
        let mut seeded = Entity::with_id("seed");
        seeded.number = 4;
        ctx.storage.save_entity(&seeded).unwrap();

        let hook = FillEntityDefaults::new(&ctx).unwrap();

        let mut current = Entity::default();
        let mut delta = Entity::with_id("auto");
        delta.number = -1;
        hook.run(&mut current, &delta).unwrap();
        assert_eq!(current.number, 5);

        let mut current = Entity::default();
        delta.number = 9;
        hook.run(&mut current, &delta).unwrap();
        assert_eq!(current.number, 9);
    }

    #[test]
    fn validate_secret_checks_lock_first() {
        let ctx = ctx();
        let hook = ValidateEntitySecret::new(&ctx).unwrap();

        let mut current = Entity::with_id("foo");
        current.secret = Some("s".to_string());
        current.locked = true;

        let mut delta = Entity::with_id("foo");
        delta.secret = Some("s".to_string());

        // Locked wins even with a correct secret.
        assert_eq!(
            hook.run(&mut current, &delta).unwrap_err(),
            TreeError::EntityLocked("foo".to_string())
        );

        current.locked = false;
        assert!(hook.run(&mut current, &delta).is_ok());

        delta.secret = Some("wrong".to_string());
        assert_eq!(
            hook.run(&mut current, &delta).unwrap_err(),
            TreeError::AuthorizationFailure
        );
    }

    #[test]
    fn secretless_account_cannot_authenticate() {
        let ctx = ctx();
        let hook = ValidateEntitySecret::new(&ctx).unwrap();

        let mut current = Entity::with_id("foo");
        let mut delta = Entity::with_id("foo");
        delta.secret = Some(String::new());

        assert_eq!(
            hook.run(&mut current, &delta).unwrap_err(),
            TreeError::AuthorizationFailure
        );
    }

    #[test]
    fn meta_merge_drops_groups() {
        let ctx = ctx();
        let hook = MergeEntityMeta::new(&ctx).unwrap();

        let mut current = Entity::with_id("foo");
        current.meta.groups = vec!["keep".to_string()];

        let mut delta = Entity::with_id("foo");
        delta.meta.legal_name = Some("Foobert McMillan".to_string());
        delta.meta.groups = vec!["smuggled".to_string()];

        hook.run(&mut current, &delta).unwrap();
        assert_eq!(
            current.meta.legal_name.as_deref(),
            Some("Foobert McMillan")
        );
        assert_eq!(current.meta.groups, vec!["keep"]);
    }

    #[test]
    fn capability_hook_requires_nonempty_list() {
        let ctx = ctx();
        let hook = ManageEntityCapabilities::new_add(&ctx).unwrap();
        let err = hook
            .run(&mut Entity::default(), &Entity::default())
            .unwrap_err();
        assert_eq!(err, TreeError::UnknownCapability(String::new()));
    }
}
