//! Group manager operations: CRUD, membership, expansions, and
//! capability derivation.

use std::collections::{HashSet, VecDeque};
use std::str::FromStr;

use tracing::{debug, info};

use warden_proto::{Capability, Entity, Group};
use warden_store::Storage;

use crate::directory::Directory;
use crate::error::Result;
use crate::util::{self, parse_expansion, ExpansionOp};

impl Directory {
    /// Create a new group. A negative `number` auto-assigns.
    pub fn new_group(
        &self,
        name: &str,
        display_name: &str,
        managed_by: &str,
        number: i32,
    ) -> Result<()> {
        self.check_writable()?;
        let mut delta = Group::with_name(name);
        delta.number = number;
        if !display_name.is_empty() {
            delta.display_name = Some(display_name.to_string());
        }
        if !managed_by.is_empty() {
            delta.managed_by = Some(managed_by.to_string());
        }
        self.run_group_chain("CREATE", &delta)?;
        info!(group = name, "Group created");
        Ok(())
    }

    /// Delete a group. Does not cascade: stale expansion references in
    /// other groups error at their next expansion unless DROPped.
    pub fn delete_group(&self, name: &str) -> Result<()> {
        self.check_writable()?;
        self.run_group_chain("DESTROY", &Group::with_name(name))?;
        info!(group = name, "Group deleted");
        Ok(())
    }

    /// Merge caller-supplied metadata into a group.
    pub fn update_group_meta(&self, name: &str, delta: Group) -> Result<()> {
        self.check_writable()?;
        let mut delta = delta;
        delta.name = name.to_string();
        self.run_group_chain("MERGE-METADATA", &delta)?;
        Ok(())
    }

    /// Grant a capability to a group, named by its wire string.
    pub fn set_group_capability(&self, name: &str, capability: &str) -> Result<()> {
        self.check_writable()?;
        let cap = Capability::from_str(capability)?;
        let mut delta = Group::with_name(name);
        delta.capabilities = vec![cap];
        self.run_group_chain("SET-CAPABILITY", &delta)?;
        info!(group = name, capability = %cap, "Group capability granted");
        Ok(())
    }

    /// Revoke a capability from a group, named by its wire string.
    pub fn remove_group_capability(&self, name: &str, capability: &str) -> Result<()> {
        self.check_writable()?;
        let cap = Capability::from_str(capability)?;
        let mut delta = Group::with_name(name);
        delta.capabilities = vec![cap];
        self.run_group_chain("REMOVE-CAPABILITY", &delta)?;
        info!(group = name, capability = %cap, "Group capability revoked");
        Ok(())
    }

    /// Add, replace, or drop one expansion rule on a group.
    ///
    /// `INCLUDE`/`EXCLUDE` require `target` to exist; `DROP` always
    /// succeeds and removes whatever rule references `target`.
    pub fn modify_group_expansions(&self, name: &str, target: &str, op: ExpansionOp) -> Result<()> {
        self.check_writable()?;
        let mut delta = Group::with_name(name);
        delta.expansions = vec![format!("{}:{}", op.as_str(), target)];
        let chain = match op {
            ExpansionOp::Include | ExpansionOp::Exclude => "ADD-EXPANSION",
            ExpansionOp::Drop => "DROP-EXPANSION",
        };
        self.run_group_chain(chain, &delta)?;
        info!(group = name, rule = %format!("{}:{}", op.as_str(), target), "Expansions updated");
        Ok(())
    }

    /// Fetch a group by name.
    pub fn get_group(&self, name: &str) -> Result<Group> {
        Ok(self.storage.load_group(name)?)
    }

    /// Case-insensitive substring search over names and display names.
    pub fn search_groups(&self, expression: &str) -> Result<Vec<Group>> {
        let needle = expression.to_lowercase();
        let mut matches: Vec<Group> = self
            .storage
            .list_groups()?
            .into_iter()
            .filter(|g| {
                g.name.to_lowercase().contains(&needle)
                    || g.display_name
                        .as_deref()
                        .is_some_and(|n| n.to_lowercase().contains(&needle))
            })
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(matches)
    }

    /// Add an entity to a group's direct membership.
    pub fn add_entity_to_group(&self, id: &str, group: &str) -> Result<()> {
        self.check_writable()?;
        // Referential check up front so a typo'd group is caught here
        // rather than surfacing as a stale membership later.
        self.storage.load_group(group)?;
        let mut delta = Entity::with_id(id);
        delta.meta.groups = vec![group.to_string()];
        self.run_entity_chain("GROUP-ADD", &delta)?;
        info!(entity = id, group, "Entity added to group");
        Ok(())
    }

    /// Remove an entity from a group's direct membership.
    ///
    /// The group itself need not exist, so memberships of deleted groups
    /// can still be cleaned up.
    pub fn remove_entity_from_group(&self, id: &str, group: &str) -> Result<()> {
        self.check_writable()?;
        let mut delta = Entity::with_id(id);
        delta.meta.groups = vec![group.to_string()];
        self.run_entity_chain("GROUP-DEL", &delta)?;
        info!(entity = id, group, "Entity removed from group");
        Ok(())
    }

    /// Compute the effective member-group set `E(G)`.
    ///
    /// Breadth-first over `INCLUDE` rules with a visited set (cycles
    /// short-circuit, no error), then the expansions of every `EXCLUDE`
    /// target are removed. Missing `INCLUDE`/`EXCLUDE` targets fail with
    /// `UnknownGroup`.
    pub fn expand_group(&self, name: &str) -> Result<Vec<String>> {
        let mut excludes: Vec<String> = Vec::new();
        let included = self.bfs_includes(name, Some(&mut excludes))?;

        let mut excluded: HashSet<String> = HashSet::new();
        for target in excludes {
            for g in self.bfs_includes(&target, None)? {
                excluded.insert(g);
            }
        }

        Ok(included
            .into_iter()
            .filter(|g| !excluded.contains(g))
            .collect())
    }

    /// Transitive closure over INCLUDE rules, in BFS discovery order.
    /// EXCLUDE targets encountered anywhere in the walk are appended to
    /// `excludes` when provided.
    fn bfs_includes(
        &self,
        name: &str,
        mut excludes: Option<&mut Vec<String>>,
    ) -> Result<Vec<String>> {
        let mut order = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::from([name.to_string()]);

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            let group = self.storage.load_group(&current)?;
            order.push(current);

            for raw in &group.expansions {
                let (op, target) = parse_expansion(raw)?;
                match op {
                    ExpansionOp::Include => {
                        if !visited.contains(target) {
                            queue.push_back(target.to_string());
                        }
                    }
                    ExpansionOp::Exclude => {
                        if let Some(ex) = excludes.as_deref_mut() {
                            ex.push(target.to_string());
                        }
                    }
                    // Stale-reference cleanup markers; nothing to expand.
                    ExpansionOp::Drop => {}
                }
            }
        }
        Ok(order)
    }

    /// List a group's members: every entity whose direct membership
    /// intersects the group's expansion. Safe copies, ordered by ID.
    pub fn list_members(&self, name: &str) -> Result<Vec<Entity>> {
        let expanded: HashSet<String> = self.expand_group(name)?.into_iter().collect();
        let mut members: Vec<Entity> = self
            .storage
            .list_entities()?
            .iter()
            .filter(|e| e.meta.groups.iter().any(|g| expanded.contains(g)))
            .map(util::safe_copy_entity)
            .collect();
        members.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(members)
    }

    /// The effective group-name set an entity belongs to: the union of
    /// `E(g)` over its direct memberships.
    ///
    /// Direct memberships pointing at deleted groups are skipped; stale
    /// references inside surviving groups still error.
    pub fn get_memberships(&self, entity: &Entity) -> Result<Vec<String>> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut memberships = Vec::new();
        for direct in &entity.meta.groups {
            match self.storage.load_group(direct) {
                Ok(_) => {}
                Err(warden_store::StoreError::UnknownGroup(_)) => {
                    debug!(entity = %entity.id, group = %direct, "Skipping stale membership");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
            for g in self.expand_group(direct)? {
                if seen.insert(g.clone()) {
                    memberships.push(g);
                }
            }
        }
        Ok(memberships)
    }

    /// An entity's effective capabilities: its own plus those of every
    /// group in the expansion of each group it directly belongs to.
    pub fn effective_capabilities(&self, entity: &Entity) -> Result<Vec<Capability>> {
        let mut caps: Vec<Capability> = entity.capabilities.clone();
        for name in self.get_memberships(entity)? {
            let group = self.storage.load_group(&name)?;
            for cap in group.capabilities {
                if !caps.contains(&cap) {
                    caps.push(cap);
                }
            }
        }
        caps.sort();
        Ok(caps)
    }
}
