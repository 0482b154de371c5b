//! The hook pipeline: the extensibility seam for all mutations.
//!
//! A hook is a named, priority-ordered unit of mutation logic. Hooks are
//! assembled into frozen [`EntityChain`]s / [`GroupChain`]s, one chain per
//! directory operation, and run fail-fast: the first hook to error aborts
//! the chain and its error is returned verbatim.
//!
//! Hook constructors are registered by name in an explicit
//! [`HookRegistry`] value built at process start and handed to the
//! directory; after construction the registry is never mutated. Duplicate
//! registration under one name overwrites: the last registrant wins.

pub mod entity;
pub mod group;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use warden_crypto::SecretStore;
use warden_proto::{Entity, Group};
use warden_store::Storage;

use crate::error::{Result, TreeError};

/// Ports handed to hook constructors.
///
/// Hooks that consult storage for referential checks or delegate secret
/// work hold clones of these handles.
#[derive(Clone)]
pub struct HookContext {
    /// The storage port.
    pub storage: Arc<dyn Storage>,
    /// The crypto port.
    pub crypto: Arc<dyn SecretStore>,
}

/// A unit of entity mutation logic.
///
/// `run` receives the working pre-state (`current`, mutable) and the
/// caller-supplied delta. Lower priorities run earlier; persistence runs
/// at priority 99 so validation always precedes the write.
pub trait EntityHook: Send + Sync {
    /// Registered name of this hook.
    fn name(&self) -> &'static str;

    /// Execution order; lower runs earlier.
    fn priority(&self) -> u32;

    /// Apply this hook.
    fn run(&self, current: &mut Entity, delta: &Entity) -> Result<()>;
}

/// A unit of group mutation logic.
pub trait GroupHook: Send + Sync {
    /// Registered name of this hook.
    fn name(&self) -> &'static str;

    /// Execution order; lower runs earlier.
    fn priority(&self) -> u32;

    /// Apply this hook.
    fn run(&self, current: &mut Group, delta: &Group) -> Result<()>;
}

/// Constructor for a registered entity hook.
pub type EntityHookConstructor = fn(&HookContext) -> Result<Arc<dyn EntityHook>>;

/// Constructor for a registered group hook.
pub type GroupHookConstructor = fn(&HookContext) -> Result<Arc<dyn GroupHook>>;

/// Registry of hook constructors, keyed by (kind, name).
#[derive(Default)]
pub struct HookRegistry {
    entity: HashMap<&'static str, EntityHookConstructor>,
    group: HashMap<&'static str, GroupHookConstructor>,
}

impl HookRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every builtin hook registered.
    pub fn with_builtin_hooks() -> Self {
        let mut registry = Self::new();
        entity::register_builtin(&mut registry);
        group::register_builtin(&mut registry);
        registry
    }

    /// Register an entity hook constructor. Overwrites silently.
    pub fn register_entity_hook(&mut self, name: &'static str, ctor: EntityHookConstructor) {
        self.entity.insert(name, ctor);
    }

    /// Register a group hook constructor. Overwrites silently.
    pub fn register_group_hook(&mut self, name: &'static str, ctor: GroupHookConstructor) {
        self.group.insert(name, ctor);
    }

    /// Instantiate a registered entity hook.
    pub fn entity_hook(&self, name: &str, ctx: &HookContext) -> Result<Arc<dyn EntityHook>> {
        match self.entity.get(name) {
            Some(ctor) => ctor(ctx),
            None => Err(TreeError::UnknownHook(name.to_string())),
        }
    }

    /// Instantiate a registered group hook.
    pub fn group_hook(&self, name: &str, ctx: &HookContext) -> Result<Arc<dyn GroupHook>> {
        match self.group.get(name) {
            Some(ctor) => ctor(ctx),
            None => Err(TreeError::UnknownHook(name.to_string())),
        }
    }
}

impl std::fmt::Debug for dyn EntityHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityHook")
            .field("name", &self.name())
            .field("priority", &self.priority())
            .finish()
    }
}

/// A frozen, priority-ordered pipeline of entity hooks.
#[derive(Debug)]
pub struct EntityChain {
    name: String,
    hooks: Vec<Arc<dyn EntityHook>>,
}

impl EntityChain {
    /// Assemble a chain from registered hook names.
    ///
    /// Hooks are sorted ascending by priority; the listing order only
    /// breaks ties. Fails with [`TreeError::UnknownHook`] if any name is
    /// unregistered.
    pub fn new(
        name: impl Into<String>,
        hook_names: &[&str],
        registry: &HookRegistry,
        ctx: &HookContext,
    ) -> Result<Self> {
        let mut hooks = hook_names
            .iter()
            .map(|n| registry.entity_hook(n, ctx))
            .collect::<Result<Vec<_>>>()?;
        hooks.sort_by_key(|h| h.priority());
        Ok(Self {
            name: name.into(),
            hooks,
        })
    }

    /// Run every hook in order, aborting on the first error.
    pub fn run(&self, current: &mut Entity, delta: &Entity) -> Result<()> {
        for hook in &self.hooks {
            trace!(chain = %self.name, hook = hook.name(), "Running entity hook");
            hook.run(current, delta)?;
        }
        Ok(())
    }
}

/// A frozen, priority-ordered pipeline of group hooks.
pub struct GroupChain {
    name: String,
    hooks: Vec<Arc<dyn GroupHook>>,
}

impl GroupChain {
    /// Assemble a chain from registered hook names.
    pub fn new(
        name: impl Into<String>,
        hook_names: &[&str],
        registry: &HookRegistry,
        ctx: &HookContext,
    ) -> Result<Self> {
        let mut hooks = hook_names
            .iter()
            .map(|n| registry.group_hook(n, ctx))
            .collect::<Result<Vec<_>>>()?;
        hooks.sort_by_key(|h| h.priority());
        Ok(Self {
            name: name.into(),
            hooks,
        })
    }

    /// Run every hook in order, aborting on the first error.
    pub fn run(&self, current: &mut Group, delta: &Group) -> Result<()> {
        for hook in &self.hooks {
            trace!(chain = %self.name, hook = hook.name(), "Running group hook");
            hook.run(current, delta)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use warden_crypto::PlainEngine;
    use warden_store::MemoryStore;

    fn ctx() -> HookContext {
        HookContext {
            storage: Arc::new(MemoryStore::new()),
            crypto: Arc::new(PlainEngine),
        }
    }

    struct Recorder {
        name: &'static str,
        priority: u32,
        log: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    impl EntityHook for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }
        fn priority(&self) -> u32 {
            self.priority
        }
        fn run(&self, _current: &mut Entity, _delta: &Entity) -> Result<()> {
            self.log.lock().unwrap().push(self.name);
            if self.fail {
                Err(TreeError::Internal("recorder failure".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn chain_of(hooks: Vec<Recorder>) -> EntityChain {
        let mut hooks: Vec<Arc<dyn EntityHook>> = hooks
            .into_iter()
            .map(|h| Arc::new(h) as Arc<dyn EntityHook>)
            .collect();
        hooks.sort_by_key(|h| h.priority());
        EntityChain {
            name: "test".to_string(),
            hooks,
        }
    }

    #[test]
    fn hooks_run_in_priority_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = chain_of(vec![
            Recorder { name: "late", priority: 99, log: log.clone(), fail: false },
            Recorder { name: "early", priority: 10, log: log.clone(), fail: false },
            Recorder { name: "middle", priority: 50, log: log.clone(), fail: false },
        ]);

        let mut current = Entity::default();
        chain.run(&mut current, &Entity::default()).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["early", "middle", "late"]);
    }

    #[test]
    fn chain_aborts_on_first_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = chain_of(vec![
            Recorder { name: "boom", priority: 10, log: log.clone(), fail: true },
            Recorder { name: "never", priority: 50, log: log.clone(), fail: false },
        ]);

        let mut current = Entity::default();
        let err = chain.run(&mut current, &Entity::default()).unwrap_err();
        assert_eq!(err, TreeError::Internal("recorder failure".to_string()));
        assert_eq!(*log.lock().unwrap(), vec!["boom"]);
    }

    #[test]
    fn unknown_hook_fails_assembly() {
        let registry = HookRegistry::with_builtin_hooks();
        let err = EntityChain::new("bad", &["no-such-hook"], &registry, &ctx()).unwrap_err();
        assert_eq!(err, TreeError::UnknownHook("no-such-hook".to_string()));
    }

    #[test]
    fn registration_overwrites_silently() {
        fn a(_: &HookContext) -> Result<Arc<dyn EntityHook>> {
            Err(TreeError::Internal("a".to_string()))
        }
        fn b(_: &HookContext) -> Result<Arc<dyn EntityHook>> {
            Err(TreeError::Internal("b".to_string()))
        }

        let mut registry = HookRegistry::new();
        registry.register_entity_hook("dup", a);
        registry.register_entity_hook("dup", b);
        // Last registrant wins.
        let err = registry.entity_hook("dup", &ctx()).unwrap_err();
        assert_eq!(err, TreeError::Internal("b".to_string()));
    }
}
