//! The closed capability enumeration.
//!
//! Capabilities gate privileged operations at the RPC layer and are the
//! payload of token claims. The set is closed: names outside this
//! enumeration are rejected wherever they are parsed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a capability name is not in the closed enumeration.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown capability: {0:?}")]
pub struct UnknownCapability(pub String);

/// A privileged operation grant.
///
/// `GlobalRoot` implies every other capability; the remaining values each
/// unlock one family of mutations. The wire form is the
/// SCREAMING_SNAKE_CASE name (`GLOBAL_ROOT`, `CREATE_ENTITY`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    /// Unrestricted access to every operation.
    GlobalRoot,
    /// Create new entities.
    CreateEntity,
    /// Destroy existing entities.
    DestroyEntity,
    /// Modify entity metadata.
    ModifyEntityMeta,
    /// Add and remove entity public keys.
    ModifyEntityKeys,
    /// Change another entity's secret.
    ChangeEntitySecret,
    /// Lock entities against authentication.
    LockEntity,
    /// Unlock previously locked entities.
    UnlockEntity,
    /// Create new groups.
    CreateGroup,
    /// Destroy existing groups.
    DestroyGroup,
    /// Modify group metadata and expansions.
    ModifyGroupMeta,
    /// Add and remove group members.
    ModifyGroupMembers,
}

impl Capability {
    /// All capabilities, in declaration order.
    pub const ALL: &'static [Capability] = &[
        Capability::GlobalRoot,
        Capability::CreateEntity,
        Capability::DestroyEntity,
        Capability::ModifyEntityMeta,
        Capability::ModifyEntityKeys,
        Capability::ChangeEntitySecret,
        Capability::LockEntity,
        Capability::UnlockEntity,
        Capability::CreateGroup,
        Capability::DestroyGroup,
        Capability::ModifyGroupMeta,
        Capability::ModifyGroupMembers,
    ];

    /// The wire name of this capability.
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::GlobalRoot => "GLOBAL_ROOT",
            Capability::CreateEntity => "CREATE_ENTITY",
            Capability::DestroyEntity => "DESTROY_ENTITY",
            Capability::ModifyEntityMeta => "MODIFY_ENTITY_META",
            Capability::ModifyEntityKeys => "MODIFY_ENTITY_KEYS",
            Capability::ChangeEntitySecret => "CHANGE_ENTITY_SECRET",
            Capability::LockEntity => "LOCK_ENTITY",
            Capability::UnlockEntity => "UNLOCK_ENTITY",
            Capability::CreateGroup => "CREATE_GROUP",
            Capability::DestroyGroup => "DESTROY_GROUP",
            Capability::ModifyGroupMeta => "MODIFY_GROUP_META",
            Capability::ModifyGroupMembers => "MODIFY_GROUP_MEMBERS",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .iter()
            .find(|c| c.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownCapability(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_all_names() {
        for cap in Capability::ALL {
            let parsed: Capability = cap.as_str().parse().unwrap();
            assert_eq!(parsed, *cap);
        }
    }

    #[test]
    fn unknown_name_rejected() {
        assert_eq!(
            "DO_ALL_THE_THINGS".parse::<Capability>(),
            Err(UnknownCapability("DO_ALL_THE_THINGS".to_string()))
        );
        assert!("".parse::<Capability>().is_err());
        // Case matters on the wire.
        assert!("global_root".parse::<Capability>().is_err());
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&Capability::GlobalRoot).unwrap();
        assert_eq!(json, "\"GLOBAL_ROOT\"");
        let back: Capability = serde_json::from_str("\"MODIFY_GROUP_MEMBERS\"").unwrap();
        assert_eq!(back, Capability::ModifyGroupMembers);
    }
}
