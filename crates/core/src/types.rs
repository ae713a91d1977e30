//! Core domain types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Opaque per-unit settings version.
///
/// Versions may be reset when a relation is recreated, so only equality is
/// meaningful.
pub type ChangeVersion = i64;

/// Identifier of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationId(u64);

impl RelationId {
    /// Wrap a raw relation id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for RelationId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl FromStr for RelationId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a relation, unit, or application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Life {
    #[default]
    Alive,
    Dying,
    Dead,
}

impl Life {
    pub const fn is_alive(self) -> bool {
        matches!(self, Self::Alive)
    }

    pub const fn is_dying(self) -> bool {
        matches!(self, Self::Dying)
    }
}

impl fmt::Display for Life {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alive => f.write_str("alive"),
            Self::Dying => f.write_str("dying"),
            Self::Dead => f.write_str("dead"),
        }
    }
}

/// Kind of hook executed against a unit's charm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookKind {
    Install,
    Start,
    ConfigChanged,
    UpgradeCharm,
    Stop,
    RelationJoined,
    RelationChanged,
    RelationDeparted,
    RelationBroken,
}

impl HookKind {
    /// Charm-facing name of the hook kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Start => "start",
            Self::ConfigChanged => "config-changed",
            Self::UpgradeCharm => "upgrade-charm",
            Self::Stop => "stop",
            Self::RelationJoined => "relation-joined",
            Self::RelationChanged => "relation-changed",
            Self::RelationDeparted => "relation-departed",
            Self::RelationBroken => "relation-broken",
        }
    }

    /// Whether the hook belongs to a relation.
    pub const fn is_relation(self) -> bool {
        matches!(
            self,
            Self::RelationJoined
                | Self::RelationChanged
                | Self::RelationDeparted
                | Self::RelationBroken
        )
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single hook to run.
///
/// `remote_unit` is empty for `relation-broken` and for non-relation hooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookInfo {
    pub kind: HookKind,
    pub relation_id: RelationId,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub remote_unit: String,
    #[serde(default)]
    pub change_version: ChangeVersion,
}

impl HookInfo {
    pub fn joined(relation_id: RelationId, unit: impl Into<String>, version: ChangeVersion) -> Self {
        Self {
            kind: HookKind::RelationJoined,
            relation_id,
            remote_unit: unit.into(),
            change_version: version,
        }
    }

    pub fn changed(relation_id: RelationId, unit: impl Into<String>, version: ChangeVersion) -> Self {
        Self {
            kind: HookKind::RelationChanged,
            relation_id,
            remote_unit: unit.into(),
            change_version: version,
        }
    }

    pub fn departed(
        relation_id: RelationId,
        unit: impl Into<String>,
        version: ChangeVersion,
    ) -> Self {
        Self {
            kind: HookKind::RelationDeparted,
            relation_id,
            remote_unit: unit.into(),
            change_version: version,
        }
    }

    pub const fn broken(relation_id: RelationId) -> Self {
        Self {
            kind: HookKind::RelationBroken,
            relation_id,
            remote_unit: String::new(),
            change_version: 0,
        }
    }
}

impl fmt::Display for HookInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.remote_unit.is_empty() {
            write!(f, "{} (relation {})", self.kind, self.relation_id)
        } else {
            write!(
                f,
                "{} {} (relation {}, version {})",
                self.kind, self.remote_unit, self.relation_id, self.change_version
            )
        }
    }
}
