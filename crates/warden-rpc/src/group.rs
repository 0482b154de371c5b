//! Group operation handlers.

use tracing::info;

use warden_core::util::parse_expansion;
use warden_proto::{Capability, Group, GroupRequest, Response};

use crate::error::{Result, RpcError};
use crate::RpcServer;

fn require_group<'a>(req: &'a GroupRequest) -> Result<&'a Group> {
    req.group
        .as_ref()
        .ok_or_else(|| RpcError::MalformedRequest("group is required".to_string()))
}

fn require_member<'a>(req: &'a GroupRequest) -> Result<&'a str> {
    req.entity
        .as_ref()
        .map(|e| e.id.as_str())
        .ok_or_else(|| RpcError::MalformedRequest("entity is required".to_string()))
}

impl RpcServer {
    /// Create a group. Requires `CREATE_GROUP`.
    pub fn group_create(&self, req: &GroupRequest) -> Result<Response> {
        let claims = self.authenticate(&req.auth)?;
        self.check_capability(&claims, Capability::CreateGroup)?;

        let group = require_group(req)?;
        let number = if group.number <= 0 { -1 } else { group.number };
        self.dir.new_group(
            &group.name,
            group.display_name.as_deref().unwrap_or(""),
            group.managed_by.as_deref().unwrap_or(""),
            number,
        )?;

        info!(group = %group.name, requestor = %claims.entity_id, "Group created");
        Ok(Response::ok("group created"))
    }

    /// Merge metadata into a group. Requires `MODIFY_GROUP_META` or
    /// effective membership in the group's `managed_by` group.
    pub fn group_update(&self, req: &GroupRequest) -> Result<Response> {
        let claims = self.authenticate(&req.auth)?;
        let delta = req
            .data
            .as_ref()
            .or(req.group.as_ref())
            .ok_or_else(|| RpcError::MalformedRequest("group is required".to_string()))?;
        self.check_group_authority(&claims, &delta.name, Capability::ModifyGroupMeta)?;

        self.dir.update_group_meta(&delta.name, delta.clone())?;
        Ok(Response::ok("group updated"))
    }

    /// Destroy a group. Requires `DESTROY_GROUP`.
    pub fn group_destroy(&self, req: &GroupRequest) -> Result<Response> {
        let claims = self.authenticate(&req.auth)?;
        self.check_capability(&claims, Capability::DestroyGroup)?;

        let group = require_group(req)?;
        self.dir.delete_group(&group.name)?;
        info!(group = %group.name, requestor = %claims.entity_id, "Group destroyed");
        Ok(Response::ok("group destroyed"))
    }

    /// Add an entity to a group. Requires `MODIFY_GROUP_MEMBERS` or
    /// `managed_by` delegation.
    pub fn group_add_member(&self, req: &GroupRequest) -> Result<Response> {
        let claims = self.authenticate(&req.auth)?;
        let group = require_group(req)?;
        self.check_group_authority(&claims, &group.name, Capability::ModifyGroupMembers)?;

        let member = require_member(req)?;
        self.dir.add_entity_to_group(member, &group.name)?;
        Ok(Response::ok("member added"))
    }

    /// Remove an entity from a group. Requires `MODIFY_GROUP_MEMBERS` or
    /// `managed_by` delegation.
    pub fn group_del_member(&self, req: &GroupRequest) -> Result<Response> {
        let claims = self.authenticate(&req.auth)?;
        let group = require_group(req)?;
        self.check_group_authority(&claims, &group.name, Capability::ModifyGroupMembers)?;

        let member = require_member(req)?;
        self.dir.remove_entity_from_group(member, &group.name)?;
        Ok(Response::ok("member removed"))
    }

    /// List a group's effective members. No capability required.
    pub fn group_list_members(&self, req: &GroupRequest) -> Result<Response> {
        let group = require_group(req)?;
        let members = self.dir.list_members(&group.name)?;
        let mut resp = Response::ok("members listed");
        resp.entities = members;
        Ok(resp)
    }

    /// Apply expansion rules to a group. Requires `MODIFY_GROUP_META` or
    /// `managed_by` delegation.
    pub fn group_update_expansion(&self, req: &GroupRequest) -> Result<Response> {
        let claims = self.authenticate(&req.auth)?;
        let delta = req
            .data
            .as_ref()
            .or(req.group.as_ref())
            .ok_or_else(|| RpcError::MalformedRequest("group is required".to_string()))?;
        self.check_group_authority(&claims, &delta.name, Capability::ModifyGroupMeta)?;

        for raw in &delta.expansions {
            let (op, target) = parse_expansion(raw).map_err(RpcError::Tree)?;
            self.dir.modify_group_expansions(&delta.name, target, op)?;
        }
        Ok(Response::ok("expansions updated"))
    }
}
