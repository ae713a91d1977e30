//! Local relation state: the unit's record of which remote units it has
//! seen join a relation, and at which settings version.

use std::collections::HashMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use uniter_core::{ChangeVersion, HookInfo, HookKind, RelationId};

use crate::error::{Error, Result};
use crate::statedir::is_storable_unit_name;

/// Membership record for a single relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Relation the record belongs to.
    pub relation_id: RelationId,
    /// Remote units that have joined, with the last settings version the
    /// unit was told about.
    pub members: HashMap<String, ChangeVersion>,
    /// Unit owed a `relation-changed` hook that has not been committed yet.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub changed_pending: String,
}

impl State {
    /// Create an empty record.
    pub fn new(relation_id: RelationId) -> Self {
        Self {
            relation_id,
            members: HashMap::new(),
            changed_pending: String::new(),
        }
    }

    /// Add a member (builder style, mostly useful in tests and tooling).
    pub fn with_member(mut self, unit: impl Into<String>, version: ChangeVersion) -> Self {
        self.members.insert(unit.into(), version);
        self
    }

    /// Mark a member as owed a `relation-changed` hook.
    pub fn with_changed_pending(mut self, unit: impl Into<String>) -> Self {
        self.changed_pending = unit.into();
        self
    }

    /// Whether a `relation-changed` hook is owed.
    pub fn has_changed_pending(&self) -> bool {
        !self.changed_pending.is_empty()
    }

    /// Member unit names in sorted order.
    pub fn member_names(&self) -> Vec<String> {
        self.members.keys().sorted().cloned().collect()
    }

    /// Returns an error if `info` does not describe a valid change to this
    /// record. Hooks must be validated before they run so that the
    /// documented hook ordering is never violated.
    pub fn validate(&self, info: &HookInfo) -> Result<()> {
        let reject = |reason: String| Err(Error::inappropriate_hook(info.kind, &info.remote_unit, reason));

        if info.relation_id != self.relation_id {
            return reject(format!(
                "expected relation {}, got relation {}",
                self.relation_id, info.relation_id
            ));
        }
        if !info.kind.is_relation() {
            return Err(Error::NotRelationHook { kind: info.kind });
        }
        if info.kind == HookKind::RelationBroken {
            return if self.members.is_empty() {
                Ok(())
            } else {
                reject("cannot run \"relation-broken\" while units still present".to_string())
            };
        }
        if self.has_changed_pending() {
            if info.remote_unit != self.changed_pending || info.kind != HookKind::RelationChanged
            {
                return reject(format!(
                    "expected \"relation-changed\" for {:?}",
                    self.changed_pending
                ));
            }
            return Ok(());
        }
        let joined = self.members.contains_key(&info.remote_unit);
        if !joined && !is_storable_unit_name(&info.remote_unit) {
            return reject(format!(
                "unit name {:?} cannot be stored as a relation member",
                info.remote_unit
            ));
        }
        match (joined, info.kind) {
            (true, HookKind::RelationJoined) => reject("unit already joined".to_string()),
            (false, kind) if kind != HookKind::RelationJoined => {
                reject("unit has not joined".to_string())
            }
            _ => Ok(()),
        }
    }

    /// Apply the committed effect of `info` to the in-memory record.
    ///
    /// | hook       | effect                                             |
    /// |------------|----------------------------------------------------|
    /// | `joined`   | add the unit with its version                      |
    /// | `changed`  | record the new version, clear a matching pending   |
    /// | `departed` | remove the unit                                    |
    /// | `broken`   | clear every member                                 |
    ///
    /// Non-relation hooks leave the record untouched.
    pub fn apply(&mut self, info: &HookInfo) {
        match info.kind {
            HookKind::RelationJoined => {
                self.members
                    .insert(info.remote_unit.clone(), info.change_version);
            }
            HookKind::RelationChanged => {
                self.members
                    .insert(info.remote_unit.clone(), info.change_version);
                if self.changed_pending == info.remote_unit {
                    self.changed_pending.clear();
                }
            }
            HookKind::RelationDeparted => {
                self.members.remove(&info.remote_unit);
                if self.changed_pending == info.remote_unit {
                    self.changed_pending.clear();
                }
            }
            HookKind::RelationBroken => {
                self.members.clear();
                self.changed_pending.clear();
            }
            HookKind::Install
            | HookKind::Start
            | HookKind::ConfigChanged
            | HookKind::UpgradeCharm
            | HookKind::Stop => {}
        }
    }
}
