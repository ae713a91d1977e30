//! Remotely observed relation state, as delivered by the watch layer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uniter_core::{ChangeVersion, Life, RelationId};

/// Membership and lifecycle of one relation as seen by the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationSnapshot {
    #[serde(default)]
    pub life: Life,
    /// Remote units in scope, with their current settings version.
    #[serde(default)]
    pub members: HashMap<String, ChangeVersion>,
}

impl RelationSnapshot {
    pub fn new(life: Life) -> Self {
        Self {
            life,
            members: HashMap::new(),
        }
    }

    pub fn with_member(mut self, unit: impl Into<String>, version: ChangeVersion) -> Self {
        self.members.insert(unit.into(), version);
        self
    }
}

/// Remote state relevant to the relation engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Life of the local unit's application.
    #[serde(default)]
    pub life: Life,
    #[serde(default)]
    pub relations: HashMap<RelationId, RelationSnapshot>,
}

impl Snapshot {
    pub fn new(life: Life) -> Self {
        Self {
            life,
            relations: HashMap::new(),
        }
    }

    pub fn with_relation(mut self, id: RelationId, relation: RelationSnapshot) -> Self {
        self.relations.insert(id, relation);
        self
    }
}
