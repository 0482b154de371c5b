//! The directory façade: chain assembly, the read-only gate, and the
//! bootstrap escape hatch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use warden_crypto::SecretStore;
use warden_proto::{Capability, Entity, Group};
use warden_store::Storage;

use crate::error::{Result, TreeError};
use crate::hooks::{EntityChain, GroupChain, HookContext, HookRegistry};

/// Entity chain names, paired with their hook listings.
const ENTITY_CHAINS: &[(&str, &[&str])] = &[
    (
        "CREATE",
        &[
            "ensure-entity-does-not-exist",
            "fill-entity-defaults",
            "set-entity-secret",
            "save-entity",
        ],
    ),
    ("DESTROY", &["ensure-entity-exists", "destroy-entity"]),
    (
        "SET-SECRET",
        &["ensure-entity-exists", "set-entity-secret", "save-entity"],
    ),
    (
        "VALIDATE-IDENTITY",
        &["ensure-entity-exists", "validate-entity-secret"],
    ),
    ("LOCK", &["ensure-entity-exists", "lock-entity", "save-entity"]),
    (
        "UNLOCK",
        &["ensure-entity-exists", "unlock-entity", "save-entity"],
    ),
    (
        "SET-CAPABILITY",
        &["ensure-entity-exists", "set-entity-capability", "save-entity"],
    ),
    (
        "REMOVE-CAPABILITY",
        &[
            "ensure-entity-exists",
            "remove-entity-capability",
            "save-entity",
        ],
    ),
    (
        "ADD-KEY",
        &["ensure-entity-exists", "add-entity-key", "save-entity"],
    ),
    (
        "DEL-KEY",
        &["ensure-entity-exists", "del-entity-key", "save-entity"],
    ),
    (
        "MERGE-METADATA",
        &["ensure-entity-exists", "merge-entity-meta", "save-entity"],
    ),
    (
        "UEM-UPSERT",
        &["ensure-entity-exists", "upsert-untyped-meta", "save-entity"],
    ),
    (
        "UEM-CLEARFUZZY",
        &[
            "ensure-entity-exists",
            "clearfuzzy-untyped-meta",
            "save-entity",
        ],
    ),
    (
        "UEM-CLEAREXACT",
        &[
            "ensure-entity-exists",
            "clearexact-untyped-meta",
            "save-entity",
        ],
    ),
    (
        "GROUP-ADD",
        &["ensure-entity-exists", "add-direct-group", "save-entity"],
    ),
    (
        "GROUP-DEL",
        &["ensure-entity-exists", "del-direct-group", "save-entity"],
    ),
];

/// Group chain names, paired with their hook listings.
const GROUP_CHAINS: &[(&str, &[&str])] = &[
    (
        "CREATE",
        &[
            "ensure-group-does-not-exist",
            "fill-group-defaults",
            "save-group",
        ],
    ),
    ("DESTROY", &["ensure-group-exists", "destroy-group"]),
    (
        "MERGE-METADATA",
        &["ensure-group-exists", "merge-group-meta", "save-group"],
    ),
    (
        "SET-CAPABILITY",
        &["ensure-group-exists", "set-group-capability", "save-group"],
    ),
    (
        "REMOVE-CAPABILITY",
        &["ensure-group-exists", "remove-group-capability", "save-group"],
    ),
    (
        "ADD-EXPANSION",
        &[
            "ensure-group-exists",
            "check-expansion-targets",
            "apply-expansions",
            "save-group",
        ],
    ),
    (
        "DROP-EXPANSION",
        &["ensure-group-exists", "apply-expansions", "save-group"],
    ),
];

/// The directory engine.
///
/// Holds the storage and crypto ports, the pre-assembled hook chains, and
/// the two gate flags. The engine itself takes no locks: atomicity lives
/// in the storage port and interleaved writers are last-writer-wins.
pub struct Directory {
    pub(crate) storage: Arc<dyn Storage>,
    entity_chains: HashMap<&'static str, EntityChain>,
    group_chains: HashMap<&'static str, GroupChain>,
    readonly: AtomicBool,
    bootstrap_done: AtomicBool,
}

impl Directory {
    /// Construct a directory with the builtin hook set.
    pub fn new(storage: Arc<dyn Storage>, crypto: Arc<dyn SecretStore>) -> Result<Self> {
        Self::with_registry(storage, crypto, &HookRegistry::with_builtin_hooks())
    }

    /// Construct a directory against an explicit registry.
    ///
    /// Every standard chain is assembled here; a registry missing a
    /// builtin hook fails construction with `UnknownHook`.
    pub fn with_registry(
        storage: Arc<dyn Storage>,
        crypto: Arc<dyn SecretStore>,
        registry: &HookRegistry,
    ) -> Result<Self> {
        let ctx = HookContext {
            storage: storage.clone(),
            crypto,
        };

        let mut entity_chains = HashMap::new();
        for (name, hooks) in ENTITY_CHAINS {
            entity_chains.insert(*name, EntityChain::new(*name, hooks, registry, &ctx)?);
        }

        let mut group_chains = HashMap::new();
        for (name, hooks) in GROUP_CHAINS {
            group_chains.insert(*name, GroupChain::new(*name, hooks, registry, &ctx)?);
        }

        Ok(Self {
            storage,
            entity_chains,
            group_chains,
            readonly: AtomicBool::new(false),
            bootstrap_done: AtomicBool::new(false),
        })
    }

    /// Gate a write operation on the read-only flag.
    pub(crate) fn check_writable(&self) -> Result<()> {
        if self.readonly.load(Ordering::Relaxed) {
            return Err(TreeError::ReadOnly);
        }
        Ok(())
    }

    /// Run a named entity chain over a fresh working copy.
    pub(crate) fn run_entity_chain(&self, chain: &str, delta: &Entity) -> Result<Entity> {
        let chain = self
            .entity_chains
            .get(chain)
            .ok_or_else(|| TreeError::Internal(format!("unassembled entity chain: {chain}")))?;
        let mut current = Entity::default();
        chain.run(&mut current, delta)?;
        Ok(current)
    }

    /// Run a named group chain over a fresh working copy.
    pub(crate) fn run_group_chain(&self, chain: &str, delta: &Group) -> Result<Group> {
        let chain = self
            .group_chains
            .get(chain)
            .ok_or_else(|| TreeError::Internal(format!("unassembled group chain: {chain}")))?;
        let mut current = Group::default();
        chain.run(&mut current, delta)?;
        Ok(current)
    }

    /// Whether the directory currently refuses writes.
    pub fn readonly(&self) -> bool {
        self.readonly.load(Ordering::Relaxed)
    }

    /// Set or clear the read-only gate.
    pub fn set_readonly(&self, readonly: bool) {
        self.readonly.store(readonly, Ordering::Relaxed);
        info!(readonly, "Directory write gate changed");
    }

    /// One-shot promotion of an entity to `GLOBAL_ROOT`.
    ///
    /// Creates the entity if absent, unlocks it if locked, and grants the
    /// root capability. A no-op once bootstrap is done; intended to run
    /// before the service accepts traffic.
    pub fn make_bootstrap(&self, id: &str, secret: &str) -> Result<()> {
        if self.bootstrap_done.load(Ordering::Relaxed) {
            warn!(entity = id, "Bootstrap requested but already complete");
            return Ok(());
        }

        match self.storage.load_entity(id) {
            Ok(_) => {}
            Err(warden_store::StoreError::UnknownEntity(_)) => {
                self.new_entity(id, -1, secret)?;
            }
            Err(e) => return Err(e.into()),
        }

        self.unlock_entity(id)?;
        self.set_entity_capability_by_id(id, Capability::GlobalRoot.as_str())?;
        self.bootstrap_done.store(true, Ordering::Relaxed);
        info!(entity = id, "Bootstrap complete");
        Ok(())
    }

    /// Irreversibly close the bootstrap window for this process.
    pub fn disable_bootstrap(&self) {
        self.bootstrap_done.store(true, Ordering::Relaxed);
        info!("Bootstrap disabled");
    }

    /// Whether bootstrap has run or been disabled.
    pub fn bootstrap_done(&self) -> bool {
        self.bootstrap_done.load(Ordering::Relaxed)
    }
}
