//! Entity records and their metadata.

use serde::{Deserialize, Serialize};

use crate::capability::Capability;

/// Placeholder stored in the secret field of safe copies handed outside
/// the directory. The verifier never leaves storage.
pub const REDACTED_SECRET: &str = "<REDACTED>";

/// A principal in the directory: a user or service account.
///
/// The `id` is the stable human-readable identifier; `number` is a unique
/// numeric identifier assigned at creation (explicitly or auto-incremented).
/// The `secret` field holds the crypto-port verifier while the record is
/// inside the directory, and the literal `<REDACTED>` on any copy returned
/// to a caller.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique, case-sensitive identifier.
    pub id: String,

    /// Unique numeric identifier, >= 1 once assigned.
    #[serde(default)]
    pub number: i32,

    /// Secret verifier, or `<REDACTED>` on safe copies. `None` means the
    /// account has no secret and cannot authenticate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    /// Descriptive metadata.
    #[serde(default)]
    pub meta: EntityMeta,

    /// Typed public keys, encoded as `TYPE:VALUE` strings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,

    /// Directly held capabilities.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<Capability>,

    /// A locked entity cannot authenticate, even with a correct secret.
    #[serde(default)]
    pub locked: bool,

    /// Free-form `key:value` metadata entries. Keys are unique unless the
    /// key name ends in the multi-value marker `*`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub untyped_meta: Vec<String>,
}

impl Entity {
    /// Construct an entity with just an ID set.
    pub fn with_id(id: impl Into<String>) -> Self {
        Entity {
            id: id.into(),
            ..Entity::default()
        }
    }
}

/// Descriptive metadata attached to an entity.
///
/// `groups` is the direct group-membership list. It is maintained by the
/// group manager only; entity metadata updates silently drop it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityMeta {
    /// Preferred display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Legal name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_name: Option<String>,

    /// Login shell.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,

    /// Home directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,

    /// Physical or organizational location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Names of groups this entity is a direct member of.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}
