//! # warden-client
//!
//! Client library for the warden directory service.
//!
//! One JSON-encoded request per line over TCP, one response line back.
//! Tokens are cached in a [`TokenStore`] keyed by entity ID and reused
//! until their embedded expiry passes.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod store;

pub use error::{ClientError, Result};
pub use store::{FsTokenStore, MemoryTokenStore, TokenStore};

use chrono::Utc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

use warden_proto::{
    AuthData, ClientInfo, Entity, EntityMeta, EntityRequest, Group, GroupRequest, PingRequest,
    Request, Response, SearchRequest, TokenRequest,
};

/// A connection to a warden server.
pub struct WardenClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    info: ClientInfo,
    tokens: Box<dyn TokenStore>,
}

impl WardenClient {
    /// Connect to a server.
    ///
    /// `service_id` and `client_id` are echoed into server logs; pass
    /// empty strings to omit them. Tokens are cached in memory; use
    /// [`WardenClient::with_token_store`] to persist them.
    pub async fn connect(
        server: &str,
        port: u16,
        service_id: &str,
        client_id: &str,
    ) -> Result<Self> {
        let stream = TcpStream::connect((server, port)).await?;
        let (read, write) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read),
            writer: write,
            info: ClientInfo {
                client_id: some_if_nonempty(client_id),
                service_id: some_if_nonempty(service_id),
            },
            tokens: Box::new(MemoryTokenStore::new()),
        })
    }

    /// Replace the token store.
    pub fn with_token_store(mut self, tokens: Box<dyn TokenStore>) -> Self {
        self.tokens = tokens;
        self
    }

    async fn call(&mut self, request: Request) -> Result<Response> {
        let mut line = serde_json::to_string(&request)
            .map_err(|e| ClientError::Protocol(e.to_string()))?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;

        let mut reply = String::new();
        let n = self.reader.read_line(&mut reply).await?;
        if n == 0 {
            return Err(ClientError::Protocol("server closed connection".to_string()));
        }
        let response: Response =
            serde_json::from_str(reply.trim_end()).map_err(|e| ClientError::Protocol(e.to_string()))?;

        if response.code.is_ok() {
            Ok(response)
        } else {
            Err(ClientError::Server {
                code: response.code,
                msg: response.msg,
            })
        }
    }

    /// Ping the server.
    pub async fn ping(&mut self) -> Result<String> {
        let resp = self
            .call(Request::Ping(PingRequest {
                info: self.info.clone(),
            }))
            .await?;
        Ok(resp.msg)
    }

    /// Verify an entity's secret without obtaining a token.
    pub async fn auth_entity(&mut self, id: &str, secret: &str) -> Result<String> {
        let resp = self
            .call(Request::AuthEntity(TokenRequest {
                entity: Some(entity_with_secret(id, secret)),
                auth: None,
                info: self.info.clone(),
            }))
            .await?;
        Ok(resp.msg)
    }

    /// Obtain a token for an entity, consulting the local store first.
    pub async fn get_token(&mut self, id: &str, secret: &str) -> Result<String> {
        if let Some(token) = self.tokens.get(id)? {
            if !token_expired(&token) {
                debug!(entity = id, "Using cached token");
                return Ok(token);
            }
            self.tokens.forget(id)?;
        }

        let resp = self
            .call(Request::GetToken(TokenRequest {
                entity: Some(entity_with_secret(id, secret)),
                auth: None,
                info: self.info.clone(),
            }))
            .await?;
        let token = resp
            .token
            .ok_or_else(|| ClientError::Protocol("server issued no token".to_string()))?;
        self.tokens.put(id, &token)?;
        Ok(token)
    }

    /// Ask the server to validate a token.
    pub async fn validate_token(&mut self, token: &str) -> Result<String> {
        let resp = self
            .call(Request::ValidateToken(TokenRequest {
                entity: None,
                auth: Some(AuthData {
                    token: Some(token.to_string()),
                }),
                info: self.info.clone(),
            }))
            .await?;
        Ok(resp.msg)
    }

    /// Create an entity.
    pub async fn entity_create(
        &mut self,
        token: &str,
        id: &str,
        secret: &str,
        number: i32,
    ) -> Result<String> {
        let mut entity = entity_with_secret(id, secret);
        entity.number = number;
        let resp = self
            .call(Request::EntityCreate(self.entity_request(token, Some(entity), None)))
            .await?;
        Ok(resp.msg)
    }

    /// Merge metadata into an entity.
    pub async fn entity_update(&mut self, token: &str, id: &str, meta: EntityMeta) -> Result<String> {
        let mut data = Entity::with_id(id);
        data.meta = meta;
        let resp = self
            .call(Request::EntityUpdate(self.entity_request(token, None, Some(data))))
            .await?;
        Ok(resp.msg)
    }

    /// Destroy an entity.
    pub async fn entity_destroy(&mut self, token: &str, id: &str) -> Result<String> {
        let resp = self
            .call(Request::EntityDestroy(self.entity_request(
                token,
                Some(Entity::with_id(id)),
                None,
            )))
            .await?;
        Ok(resp.msg)
    }

    /// Lock an entity.
    pub async fn entity_lock(&mut self, token: &str, id: &str) -> Result<String> {
        let resp = self
            .call(Request::EntityLock(self.entity_request(
                token,
                Some(Entity::with_id(id)),
                None,
            )))
            .await?;
        Ok(resp.msg)
    }

    /// Unlock an entity.
    pub async fn entity_unlock(&mut self, token: &str, id: &str) -> Result<String> {
        let resp = self
            .call(Request::EntityUnlock(self.entity_request(
                token,
                Some(Entity::with_id(id)),
                None,
            )))
            .await?;
        Ok(resp.msg)
    }

    /// Search entities by substring.
    pub async fn entity_search(&mut self, expression: &str) -> Result<Vec<Entity>> {
        let resp = self
            .call(Request::EntitySearch(SearchRequest {
                expression: expression.to_string(),
                info: self.info.clone(),
            }))
            .await?;
        Ok(resp.entities)
    }

    /// Search groups by substring.
    pub async fn group_search(&mut self, expression: &str) -> Result<Vec<Group>> {
        let resp = self
            .call(Request::GroupSearch(SearchRequest {
                expression: expression.to_string(),
                info: self.info.clone(),
            }))
            .await?;
        Ok(resp.groups)
    }

    /// Create a group.
    pub async fn group_create(
        &mut self,
        token: &str,
        name: &str,
        display_name: &str,
        managed_by: &str,
        number: i32,
    ) -> Result<String> {
        let mut group = Group::with_name(name);
        group.number = number;
        group.display_name = some_if_nonempty(display_name);
        group.managed_by = some_if_nonempty(managed_by);
        let resp = self
            .call(Request::GroupCreate(self.group_request(token, Some(group), None, None)))
            .await?;
        Ok(resp.msg)
    }

    /// Merge metadata into a group.
    pub async fn group_update(&mut self, token: &str, delta: Group) -> Result<String> {
        let resp = self
            .call(Request::GroupUpdate(self.group_request(token, None, Some(delta), None)))
            .await?;
        Ok(resp.msg)
    }

    /// Destroy a group.
    pub async fn group_destroy(&mut self, token: &str, name: &str) -> Result<String> {
        let resp = self
            .call(Request::GroupDestroy(self.group_request(
                token,
                Some(Group::with_name(name)),
                None,
                None,
            )))
            .await?;
        Ok(resp.msg)
    }

    /// Add an entity to a group.
    pub async fn group_add_member(&mut self, token: &str, group: &str, id: &str) -> Result<String> {
        let resp = self
            .call(Request::GroupAddMember(self.group_request(
                token,
                Some(Group::with_name(group)),
                None,
                Some(Entity::with_id(id)),
            )))
            .await?;
        Ok(resp.msg)
    }

    /// Remove an entity from a group.
    pub async fn group_del_member(&mut self, token: &str, group: &str, id: &str) -> Result<String> {
        let resp = self
            .call(Request::GroupDelMember(self.group_request(
                token,
                Some(Group::with_name(group)),
                None,
                Some(Entity::with_id(id)),
            )))
            .await?;
        Ok(resp.msg)
    }

    /// List a group's effective members.
    pub async fn group_list_members(&mut self, group: &str) -> Result<Vec<Entity>> {
        let resp = self
            .call(Request::GroupListMembers(self.group_request(
                "",
                Some(Group::with_name(group)),
                None,
                None,
            )))
            .await?;
        Ok(resp.entities)
    }

    /// Apply one expansion rule (`INCLUDE:g`, `EXCLUDE:g`, `DROP:g`).
    pub async fn group_update_expansion(
        &mut self,
        token: &str,
        group: &str,
        rule: &str,
    ) -> Result<String> {
        let mut delta = Group::with_name(group);
        delta.expansions = vec![rule.to_string()];
        let resp = self
            .call(Request::GroupUpdateExpansion(self.group_request(
                token,
                None,
                Some(delta),
                None,
            )))
            .await?;
        Ok(resp.msg)
    }

    fn entity_request(
        &self,
        token: &str,
        entity: Option<Entity>,
        data: Option<Entity>,
    ) -> EntityRequest {
        EntityRequest {
            auth: auth_for(token),
            entity,
            data,
            info: self.info.clone(),
        }
    }

    fn group_request(
        &self,
        token: &str,
        group: Option<Group>,
        data: Option<Group>,
        entity: Option<Entity>,
    ) -> GroupRequest {
        GroupRequest {
            auth: auth_for(token),
            group,
            data,
            entity,
            info: self.info.clone(),
        }
    }
}

fn some_if_nonempty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn auth_for(token: &str) -> Option<AuthData> {
    if token.is_empty() {
        None
    } else {
        Some(AuthData {
            token: Some(token.to_string()),
        })
    }
}

fn entity_with_secret(id: &str, secret: &str) -> Entity {
    let mut e = Entity::with_id(id);
    e.secret = Some(secret.to_string());
    e
}

/// Whether a token's embedded expiry has passed.
///
/// The payload half of a token is hex-encoded JSON; the signature half
/// is opaque. Anything unreadable is treated as expired so the caller
/// falls back to requesting a fresh token.
fn token_expired(token: &str) -> bool {
    let Some((payload_hex, _)) = token.split_once('.') else {
        return true;
    };
    let Ok(payload) = hex::decode(payload_hex) else {
        return true;
    };
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(&payload) else {
        return true;
    };
    let Some(expires_at) = value.get("expires_at").and_then(|v| v.as_i64()) else {
        return true;
    };
    Utc::now().timestamp() >= expires_at
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_tokens_count_as_expired() {
        assert!(token_expired(""));
        assert!(token_expired("no-dot"));
        assert!(token_expired("zz.zz"));
    }

    #[test]
    fn fresh_token_is_not_expired() {
        let now = Utc::now().timestamp();
        let payload = format!(r#"{{"entity_id":"foo","expires_at":{}}}"#, now + 3600);
        let token = format!("{}.deadbeef", hex::encode(payload));
        assert!(!token_expired(&token));

        let stale = format!(r#"{{"entity_id":"foo","expires_at":{}}}"#, now - 1);
        let token = format!("{}.deadbeef", hex::encode(stale));
        assert!(token_expired(&token));
    }
}
