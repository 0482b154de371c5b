//! # warden-rpc
//!
//! The RPC handler layer: every wire operation validates authentication
//! through the token port, checks the capability its mutation requires,
//! invokes the directory, and maps errors onto stable wire codes.
//!
//! The layer is transport-independent: [`RpcServer::handle`] takes a
//! decoded [`Request`] and returns a [`Response`], so tests drive it
//! directly and the node binary only frames bytes. Handlers are
//! synchronous; caller cancellation is observed at the transport's await
//! points, never mid-chain.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entity;
pub mod error;
mod group;

pub use error::{Result, RpcError};

use std::sync::Arc;

use chrono::Duration;
use tracing::info;

use warden_core::Directory;
use warden_proto::{
    AuthData, Capability, PingRequest, Request, Response, SearchRequest, TokenRequest,
};
use warden_token::{Claims, TokenService};

/// Default token lifetime: eight hours.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 8 * 60 * 60;

/// The RPC surface over one directory.
pub struct RpcServer {
    dir: Arc<Directory>,
    tokens: Arc<dyn TokenService>,
    token_lifetime: Duration,
}

impl RpcServer {
    /// Create a server over a directory and token service.
    pub fn new(dir: Arc<Directory>, tokens: Arc<dyn TokenService>) -> Self {
        Self {
            dir,
            tokens,
            token_lifetime: Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS),
        }
    }

    /// Override the lifetime of issued tokens.
    pub fn with_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.token_lifetime = lifetime;
        self
    }

    /// The directory this server fronts.
    pub fn directory(&self) -> &Arc<Directory> {
        &self.dir
    }

    /// Dispatch a framed request and fold any error into the response.
    pub fn handle(&self, request: Request) -> Response {
        let result = match request {
            Request::Ping(req) => self.ping(&req),
            Request::AuthEntity(req) => self.auth_entity(&req),
            Request::GetToken(req) => self.get_token(&req),
            Request::ValidateToken(req) => self.validate_token(&req),
            Request::EntityCreate(req) => self.entity_create(&req),
            Request::EntityUpdate(req) => self.entity_update(&req),
            Request::EntityDestroy(req) => self.entity_destroy(&req),
            Request::EntityLock(req) => self.entity_lock(&req),
            Request::EntityUnlock(req) => self.entity_unlock(&req),
            Request::EntitySearch(req) => self.entity_search(&req),
            Request::GroupCreate(req) => self.group_create(&req),
            Request::GroupUpdate(req) => self.group_update(&req),
            Request::GroupDestroy(req) => self.group_destroy(&req),
            Request::GroupAddMember(req) => self.group_add_member(&req),
            Request::GroupDelMember(req) => self.group_del_member(&req),
            Request::GroupListMembers(req) => self.group_list_members(&req),
            Request::GroupUpdateExpansion(req) => self.group_update_expansion(&req),
            Request::GroupSearch(req) => self.group_search(&req),
        };
        result.unwrap_or_else(|err| Response::error(err.wire_code(), err.to_string()))
    }

    /// Liveness probe.
    pub fn ping(&self, req: &PingRequest) -> Result<Response> {
        info!(client = ?req.info.client_id, "Ping");
        Ok(Response::ok("pong"))
    }

    /// Verify an entity's secret without issuing a token.
    pub fn auth_entity(&self, req: &TokenRequest) -> Result<Response> {
        let entity = req
            .entity
            .as_ref()
            .ok_or_else(|| RpcError::MalformedRequest("entity is required".to_string()))?;
        self.dir
            .validate_secret(&entity.id, entity.secret.as_deref().unwrap_or(""))?;
        Ok(Response::ok("entity authenticated"))
    }

    /// Verify an entity's secret and issue a capability token.
    pub fn get_token(&self, req: &TokenRequest) -> Result<Response> {
        let entity = req
            .entity
            .as_ref()
            .ok_or_else(|| RpcError::MalformedRequest("entity is required".to_string()))?;
        self.dir
            .validate_secret(&entity.id, entity.secret.as_deref().unwrap_or(""))?;

        let stored = self.dir.get_entity(&entity.id)?;
        let capabilities = self.dir.effective_capabilities(&stored)?;
        let claims = Claims::new(&entity.id, capabilities, self.token_lifetime);
        let token = self
            .tokens
            .generate(&claims)
            .map_err(|e| RpcError::Tree(warden_core::TreeError::Internal(e.to_string())))?;

        info!(entity = %entity.id, "Token issued");
        let mut resp = Response::ok("token issued");
        resp.token = Some(token);
        Ok(resp)
    }

    /// Validate a bearer token.
    pub fn validate_token(&self, req: &TokenRequest) -> Result<Response> {
        let claims = self.authenticate(&req.auth)?;
        Ok(Response::ok(format!("token valid for {}", claims.entity_id)))
    }

    /// Validate the request's bearer token and recover its claims.
    pub(crate) fn authenticate(&self, auth: &Option<AuthData>) -> Result<Claims> {
        let token = auth
            .as_ref()
            .and_then(|a| a.token.as_deref())
            .ok_or(RpcError::Unauthenticated)?;
        self.tokens
            .validate(token)
            .map_err(|_| RpcError::Unauthenticated)
    }

    /// Require a capability in the claims.
    pub(crate) fn check_capability(&self, claims: &Claims, cap: Capability) -> Result<()> {
        if claims.has_capability(cap) {
            return Ok(());
        }
        Err(RpcError::RequestorUnqualified)
    }

    /// Require a capability, or effective membership in the group's
    /// `managed_by` group.
    pub(crate) fn check_group_authority(
        &self,
        claims: &Claims,
        group_name: &str,
        cap: Capability,
    ) -> Result<()> {
        if claims.has_capability(cap) {
            return Ok(());
        }
        let group = self.dir.get_group(group_name)?;
        if let Some(managed_by) = group.managed_by.as_deref() {
            if let Ok(requestor) = self.dir.get_entity(&claims.entity_id) {
                if self
                    .dir
                    .get_memberships(&requestor)?
                    .iter()
                    .any(|g| g == managed_by)
                {
                    return Ok(());
                }
            }
        }
        Err(RpcError::RequestorUnqualified)
    }

    /// Search entities by substring.
    pub fn entity_search(&self, req: &SearchRequest) -> Result<Response> {
        let entities = self.dir.search_entities(&req.expression)?;
        let mut resp = Response::ok("search complete");
        resp.entities = entities;
        Ok(resp)
    }

    /// Search groups by substring.
    pub fn group_search(&self, req: &SearchRequest) -> Result<Response> {
        let groups = self.dir.search_groups(&req.expression)?;
        let mut resp = Response::ok("search complete");
        resp.groups = groups;
        Ok(resp)
    }
}
