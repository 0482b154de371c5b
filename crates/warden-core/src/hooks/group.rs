//! Builtin group hooks.

use std::sync::Arc;

use warden_proto::Group;
use warden_store::Storage;

use crate::error::{Result, TreeError};
use crate::hooks::{GroupHook, HookContext, HookRegistry};
use crate::util::{parse_expansion, ExpansionOp};

/// Register every builtin group hook constructor.
pub fn register_builtin(registry: &mut HookRegistry) {
    registry.register_group_hook("ensure-group-does-not-exist", EnsureGroupDoesNotExist::new);
    registry.register_group_hook("ensure-group-exists", EnsureGroupExists::new);
    registry.register_group_hook("fill-group-defaults", FillGroupDefaults::new);
    registry.register_group_hook("merge-group-meta", MergeGroupMeta::new);
    registry.register_group_hook("set-group-capability", ManageGroupCapabilities::new_add);
    registry.register_group_hook("remove-group-capability", ManageGroupCapabilities::new_del);
    registry.register_group_hook("check-expansion-targets", CheckExpansionTargets::new);
    registry.register_group_hook("apply-expansions", ApplyExpansions::new);
    registry.register_group_hook("destroy-group", DestroyGroup::new);
    registry.register_group_hook("save-group", SaveGroup::new);
}

/// Fails with `DuplicateGroupName` if storage has a record for `delta.name`.
struct EnsureGroupDoesNotExist {
    ctx: HookContext,
}

impl EnsureGroupDoesNotExist {
    fn new(ctx: &HookContext) -> Result<Arc<dyn GroupHook>> {
        Ok(Arc::new(Self { ctx: ctx.clone() }))
    }
}

impl GroupHook for EnsureGroupDoesNotExist {
    fn name(&self) -> &'static str {
        "ensure-group-does-not-exist"
    }
    fn priority(&self) -> u32 {
        10
    }
    fn run(&self, _current: &mut Group, delta: &Group) -> Result<()> {
        match self.ctx.storage.load_group(&delta.name) {
            Ok(_) => Err(TreeError::DuplicateGroupName(delta.name.clone())),
            Err(warden_store::StoreError::UnknownGroup(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Loads the stored record for `delta.name` into the working copy.
struct EnsureGroupExists {
    ctx: HookContext,
}

impl EnsureGroupExists {
    fn new(ctx: &HookContext) -> Result<Arc<dyn GroupHook>> {
        Ok(Arc::new(Self { ctx: ctx.clone() }))
    }
}

impl GroupHook for EnsureGroupExists {
    fn name(&self) -> &'static str {
        "ensure-group-exists"
    }
    fn priority(&self) -> u32 {
        10
    }
    fn run(&self, current: &mut Group, delta: &Group) -> Result<()> {
        *current = self.ctx.storage.load_group(&delta.name)?;
        Ok(())
    }
}

/// Seeds a new group from the delta, assigning a number if unset.
struct FillGroupDefaults {
    ctx: HookContext,
}

impl FillGroupDefaults {
    fn new(ctx: &HookContext) -> Result<Arc<dyn GroupHook>> {
        Ok(Arc::new(Self { ctx: ctx.clone() }))
    }
}

impl GroupHook for FillGroupDefaults {
    fn name(&self) -> &'static str {
        "fill-group-defaults"
    }
    fn priority(&self) -> u32 {
        20
    }
    fn run(&self, current: &mut Group, delta: &Group) -> Result<()> {
        current.name = delta.name.clone();
        current.display_name = delta.display_name.clone();
        current.managed_by = delta.managed_by.clone();
        current.number = if delta.number < 0 {
            self.ctx.storage.next_group_number()?
        } else {
            delta.number
        };
        Ok(())
    }
}

/// Copies permitted fields from the delta. Capabilities and expansions
/// are mutated through their own chains.
struct MergeGroupMeta;

impl MergeGroupMeta {
    fn new(_ctx: &HookContext) -> Result<Arc<dyn GroupHook>> {
        Ok(Arc::new(Self))
    }
}

impl GroupHook for MergeGroupMeta {
    fn name(&self) -> &'static str {
        "merge-group-meta"
    }
    fn priority(&self) -> u32 {
        50
    }
    fn run(&self, current: &mut Group, delta: &Group) -> Result<()> {
        if delta.display_name.is_some() {
            current.display_name = delta.display_name.clone();
        }
        if delta.managed_by.is_some() {
            current.managed_by = delta.managed_by.clone();
        }
        Ok(())
    }
}

/// Adds or removes capabilities as configured. An empty capability list
/// in the delta is an `UnknownCapability` error.
struct ManageGroupCapabilities {
    add: bool,
}

impl ManageGroupCapabilities {
    fn new_add(_ctx: &HookContext) -> Result<Arc<dyn GroupHook>> {
        Ok(Arc::new(Self { add: true }))
    }
    fn new_del(_ctx: &HookContext) -> Result<Arc<dyn GroupHook>> {
        Ok(Arc::new(Self { add: false }))
    }
}

impl GroupHook for ManageGroupCapabilities {
    fn name(&self) -> &'static str {
        if self.add {
            "set-group-capability"
        } else {
            "remove-group-capability"
        }
    }
    fn priority(&self) -> u32 {
        50
    }
    fn run(&self, current: &mut Group, delta: &Group) -> Result<()> {
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

/// Validates expansion targets in the delta.
///
/// `DROP` rules are always accepted; `INCLUDE` and `EXCLUDE` must name a
/// group that exists in storage.
struct CheckExpansionTargets {
    ctx: HookContext,
}

impl CheckExpansionTargets {
    fn new(ctx: &HookContext) -> Result<Arc<dyn GroupHook>> {
        Ok(Arc::new(Self { ctx: ctx.clone() }))
    }
}

impl GroupHook for CheckExpansionTargets {
    fn name(&self) -> &'static str {
        "check-expansion-targets"
    }
    fn priority(&self) -> u32 {
        40
    }
    fn run(&self, _current: &mut Group, delta: &Group) -> Result<()> {
        for raw in &delta.expansions {
            let (op, target) = parse_expansion(raw)?;
            if op == ExpansionOp::Drop {
                continue;
            }
            self.ctx.storage.load_group(target)?;
        }
        Ok(())
    }
}

/// Applies expansion rules from the delta to the working copy.
///
/// `INCLUDE`/`EXCLUDE` replace any existing rule for the same target, so
/// a target appears at most once. `DROP` removes existing rules for its
/// target, stale or not.
struct ApplyExpansions;

impl ApplyExpansions {
    fn new(_ctx: &HookContext) -> Result<Arc<dyn GroupHook>> {
        Ok(Arc::new(Self))
    }
}

impl GroupHook for ApplyExpansions {
    fn name(&self) -> &'static str {
        "apply-expansions"
    }
    fn priority(&self) -> u32 {
        50
    }
    fn run(&self, current: &mut Group, delta: &Group) -> Result<()> {
        for raw in &delta.expansions {
            let (op, target) = parse_expansion(raw)?;
            current.expansions.retain(|e| {
                parse_expansion(e).map(|(_, t)| t != target).unwrap_or(false)
            });
            match op {
                ExpansionOp::Include | ExpansionOp::Exclude => {
                    current
                        .expansions
                        .push(format!("{}:{}", op.as_str(), target));
                }
                ExpansionOp::Drop => {}
            }
        }
        Ok(())
    }
}

/// Removes the record from storage. Terminal hook of the DESTROY chain.
struct DestroyGroup {
    ctx: HookContext,
}

impl DestroyGroup {
    fn new(ctx: &HookContext) -> Result<Arc<dyn GroupHook>> {
        Ok(Arc::new(Self { ctx: ctx.clone() }))
    }
}

impl GroupHook for DestroyGroup {
    fn name(&self) -> &'static str {
        "destroy-group"
    }
    fn priority(&self) -> u32 {
        99
    }
    fn run(&self, _current: &mut Group, delta: &Group) -> Result<()> {
        self.ctx.storage.delete_group(&delta.name)?;
        Ok(())
    }
}

/// Persists the working copy. Terminal hook of every write chain.
struct SaveGroup {
    ctx: HookContext,
}

impl SaveGroup {
    fn new(ctx: &HookContext) -> Result<Arc<dyn GroupHook>> {
        Ok(Arc::new(Self { ctx: ctx.clone() }))
    }
}

impl GroupHook for SaveGroup {
    fn name(&self) -> &'static str {
        "save-group"
    }
    fn priority(&self) -> u32 {
        99
    }
    fn run(&self, current: &mut Group, _delta: &Group) -> Result<()> {
        self.ctx.storage.save_group(current)?;
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
    fn drop_expansion_always_accepted() {
        let ctx = ctx();
        let hook = CheckExpansionTargets::new(&ctx).unwrap();

        let mut delta = Group::with_name("g1");
        delta.expansions = vec!["DROP:deleted-group".to_string()];
        assert!(hook.run(&mut Group::default(), &delta).is_ok());
    }

    #[test]
    fn include_of_missing_group_rejected() {
        let ctx = ctx();
        let hook = CheckExpansionTargets::new(&ctx).unwrap();

        let mut delta = Group::with_name("g1");
        delta.expansions = vec!["INCLUDE:missing-group".to_string()];
        assert_eq!(
            hook.run(&mut Group::default(), &delta).unwrap_err(),
            TreeError::UnknownGroup("missing-group".to_string())
        );
    }

    #[test]
    fn exclude_of_missing_group_rejected() {
        let ctx = ctx();
        let hook = CheckExpansionTargets::new(&ctx).unwrap();

        let mut delta = Group::with_name("g1");
        delta.expansions = vec!["EXCLUDE:missing-group".to_string()];
        assert!(matches!(
            hook.run(&mut Group::default(), &delta),
            Err(TreeError::UnknownGroup(_))
        ));
    }

    #[test]
    fn apply_replaces_and_drops() {
        let ctx = ctx();
        let hook = ApplyExpansions::new(&ctx).unwrap();

        let mut current = Group::with_name("g1");
        current.expansions = vec!["INCLUDE:ops".to_string(), "INCLUDE:eng".to_string()];

        // EXCLUDE replaces the existing INCLUDE for the same target.
        let mut delta = Group::with_name("g1");
        delta.expansions = vec!["EXCLUDE:ops".to_string()];
        hook.run(&mut current, &delta).unwrap();
        assert_eq!(current.expansions, vec!["INCLUDE:eng", "EXCLUDE:ops"]);

        // DROP removes whatever references the target.
        delta.expansions = vec!["DROP:ops".to_string()];
        hook.run(&mut current, &delta).unwrap();
        assert_eq!(current.expansions, vec!["INCLUDE:eng"]);
    }

    #[test]
    fn fill_defaults_assigns_numbers() {
        let ctx = ctx();
        let mut seeded = Group::with_name("seed");
        seeded.number = 2;
        ctx.storage.save_group(&seeded).unwrap();

        let hook = FillGroupDefaults::new(&ctx).unwrap();
        let mut current = Group::default();
        let mut delta = Group::with_name("auto");
        delta.number = -1;
        hook.run(&mut current, &delta).unwrap();
        assert_eq!(current.number, 3);
    }
}
