//! Entity operation handlers.

use tracing::info;

use warden_proto::{Capability, Entity, EntityRequest, Response};

use crate::error::{Result, RpcError};
use crate::RpcServer;

fn require_entity<'a>(req: &'a EntityRequest) -> Result<&'a Entity> {
    req.entity
        .as_ref()
        .ok_or_else(|| RpcError::MalformedRequest("entity is required".to_string()))
}

impl RpcServer {
    /// Create an entity. Requires `CREATE_ENTITY`.
    pub fn entity_create(&self, req: &EntityRequest) -> Result<Response> {
        let claims = self.authenticate(&req.auth)?;
        self.check_capability(&claims, Capability::CreateEntity)?;

        let entity = require_entity(req)?;
        // An omitted number decodes as zero; both spellings mean
        // auto-assign on the wire.
        let number = if entity.number <= 0 { -1 } else { entity.number };
        self.dir
            .new_entity(&entity.id, number, entity.secret.as_deref().unwrap_or(""))?;

        info!(entity = %entity.id, requestor = %claims.entity_id, "Entity created");
        Ok(Response::ok("entity created"))
    }

    /// Merge metadata into an entity. Requires `MODIFY_ENTITY_META`.
    pub fn entity_update(&self, req: &EntityRequest) -> Result<Response> {
        let claims = self.authenticate(&req.auth)?;
        self.check_capability(&claims, Capability::ModifyEntityMeta)?;

        let data = req
            .data
            .as_ref()
            .or(req.entity.as_ref())
            .ok_or_else(|| RpcError::MalformedRequest("data is required".to_string()))?;
        self.dir.update_entity_meta(&data.id, data.meta.clone())?;
        Ok(Response::ok("entity updated"))
    }

    /// Destroy an entity. Requires `DESTROY_ENTITY`.
    pub fn entity_destroy(&self, req: &EntityRequest) -> Result<Response> {
        let claims = self.authenticate(&req.auth)?;
        self.check_capability(&claims, Capability::DestroyEntity)?;

        let entity = require_entity(req)?;
        self.dir.delete_entity_by_id(&entity.id)?;
        info!(entity = %entity.id, requestor = %claims.entity_id, "Entity destroyed");
        Ok(Response::ok("entity destroyed"))
    }

    /// Lock an entity. Requires `LOCK_ENTITY`.
    pub fn entity_lock(&self, req: &EntityRequest) -> Result<Response> {
        let claims = self.authenticate(&req.auth)?;
        self.check_capability(&claims, Capability::LockEntity)?;

        let entity = require_entity(req)?;
        self.dir.lock_entity(&entity.id)?;
        Ok(Response::ok("entity locked"))
    }

    /// Unlock an entity. Requires `UNLOCK_ENTITY`.
    pub fn entity_unlock(&self, req: &EntityRequest) -> Result<Response> {
        let claims = self.authenticate(&req.auth)?;
        self.check_capability(&claims, Capability::UnlockEntity)?;

        let entity = require_entity(req)?;
        self.dir.unlock_entity(&entity.id)?;
        Ok(Response::ok("entity unlocked"))
    }
}
