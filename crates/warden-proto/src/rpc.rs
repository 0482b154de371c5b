//! RPC request and response envelopes.
//!
//! Requests carry an optional bearer token in `auth`, the record(s) the
//! operation applies to, and `info` identifying the calling client. The
//! transport frames one JSON-encoded [`Request`] per line and receives one
//! [`Response`] per line; the `op` tag selects the operation.

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::group::Group;

/// Identification of the calling client, echoed into server logs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Name of the calling program or host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Name of the service the client is acting for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
}

/// Bearer credentials for an authenticated request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthData {
    /// An opaque token previously issued by `GetToken`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Liveness probe.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PingRequest {
    /// Calling client identification.
    #[serde(default)]
    pub info: ClientInfo,
}

/// Authentication and token operations.
///
/// `AuthEntity` and `GetToken` read the ID and plaintext secret from
/// `entity`; `ValidateToken` reads the token from `auth`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenRequest {
    /// The entity authenticating, with `secret` set to the plaintext.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<Entity>,

    /// Bearer token, for validation calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthData>,

    /// Calling client identification.
    #[serde(default)]
    pub info: ClientInfo,
}

/// Entity mutations and reads.
///
/// `entity` names the target of the operation; `data` carries the delta for
/// operations that take one (metadata merges, key and untyped-meta updates).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRequest {
    /// Bearer credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthData>,

    /// Target entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<Entity>,

    /// Caller-supplied delta.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Entity>,

    /// Calling client identification.
    #[serde(default)]
    pub info: ClientInfo,
}

/// Group mutations and reads.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupRequest {
    /// Bearer credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthData>,

    /// Target group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Group>,

    /// Caller-supplied delta.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Group>,

    /// Entity for membership operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<Entity>,

    /// Calling client identification.
    #[serde(default)]
    pub info: ClientInfo,
}

/// Directory search.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Case-insensitive substring matched against IDs and display fields.
    pub expression: String,

    /// Calling client identification.
    #[serde(default)]
    pub info: ClientInfo,
}

/// A framed request, tagged by operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
#[allow(missing_docs)]
pub enum Request {
    Ping(PingRequest),
    AuthEntity(TokenRequest),
    GetToken(TokenRequest),
    ValidateToken(TokenRequest),
    EntityCreate(EntityRequest),
    EntityUpdate(EntityRequest),
    EntityDestroy(EntityRequest),
    EntityLock(EntityRequest),
    EntityUnlock(EntityRequest),
    EntitySearch(SearchRequest),
    GroupCreate(GroupRequest),
    GroupUpdate(GroupRequest),
    GroupDestroy(GroupRequest),
    GroupAddMember(GroupRequest),
    GroupDelMember(GroupRequest),
    GroupListMembers(GroupRequest),
    GroupUpdateExpansion(GroupRequest),
    GroupSearch(SearchRequest),
}

/// Stable wire status codes.
///
/// Every error sentinel in the directory maps onto exactly one of these.
/// Only `Internal` is retryable at the client's discretion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WireCode {
    /// Success.
    Ok,
    /// Write attempted while the service is read-only.
    ReadOnly,
    /// Token invalid, expired, or unparseable.
    Unauthenticated,
    /// Token valid but lacks the required capability.
    RequestorUnqualified,
    /// Uniqueness violation.
    Exists,
    /// Missing target.
    DoesNotExist,
    /// Request rejected before reaching the directory.
    Malformed,
    /// Storage or crypto port failure.
    Internal,
}

impl WireCode {
    /// Whether this code represents success.
    pub fn is_ok(&self) -> bool {
        matches!(self, WireCode::Ok)
    }
}

/// A framed response.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Status code.
    pub code: WireCode,

    /// Human-readable outcome description.
    #[serde(default)]
    pub msg: String,

    /// Single-entity payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<Entity>,

    /// Multi-entity payload (searches, member listings).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<Entity>,

    /// Single-group payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Group>,

    /// Multi-group payload.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<Group>,

    /// Issued token, for `GetToken`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// String payload: key lists, `k:v` pairs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl Default for WireCode {
    fn default() -> Self {
        WireCode::Ok
    }
}

impl Response {
    /// A success response with a message.
    pub fn ok(msg: impl Into<String>) -> Self {
        Response {
            code: WireCode::Ok,
            msg: msg.into(),
            ..Response::default()
        }
    }

    /// An error response.
    pub fn error(code: WireCode, msg: impl Into<String>) -> Self {
        Response {
            code,
            msg: msg.into(),
            ..Response::default()
        }
    }
}
