//! Group records.

use serde::{Deserialize, Serialize};

use crate::capability::Capability;

/// A named collection of entities.
///
/// Membership is derived: entities list the groups they belong to directly,
/// and a group's `expansions` pull in (or mask out) the membership of other
/// groups. Expansions are ordered `OP:target` strings with
/// `OP ∈ {INCLUDE, EXCLUDE, DROP}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// Unique group name.
    pub name: String,

    /// Unique numeric identifier, >= 1 once assigned.
    #[serde(default)]
    pub number: i32,

    /// Human-friendly name for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Name of a group whose members may manage this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_by: Option<String>,

    /// Capabilities conferred on effective members.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<Capability>,

    /// Ordered `OP:target` membership rules.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expansions: Vec<String>,
}

impl Group {
    /// Construct a group with just a name set.
    pub fn with_name(name: impl Into<String>) -> Self {
        Group {
            name: name.into(),
            ..Group::default()
        }
    }
}
