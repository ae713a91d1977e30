//! Per-relation state holder.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uniter_core::{HookInfo, HookKind, RelationId};

use crate::abort::AbortSignal;
use crate::api::{RelationUnit, UnitWatcher};
use crate::error::{Error, Result};
use crate::scope::ScopeJoin;
use crate::statedir::StateDir;

/// Read-only view of a relation handed to hook execution contexts.
#[derive(Clone)]
pub struct RelationInfo {
    pub relation_unit: Arc<dyn RelationUnit>,
    /// Remote units currently in the relation, sorted.
    pub member_names: Vec<String>,
}

impl std::fmt::Debug for RelationInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationInfo")
            .field("relation_id", &self.relation_unit.relation_id())
            .field("endpoint", &self.relation_unit.endpoint().name)
            .field("member_names", &self.member_names)
            .finish()
    }
}

/// Manages the unit's participation in a single relation: scope
/// membership plus the durable record of remote members.
pub struct Relationer {
    relation_unit: Arc<dyn RelationUnit>,
    dir: StateDir,
    dying: bool,
    changed_after_join: bool,
}

impl Relationer {
    pub fn new(relation_unit: Arc<dyn RelationUnit>, dir: StateDir) -> Self {
        Self {
            relation_unit,
            dir,
            dying: false,
            changed_after_join: false,
        }
    }

    /// Owe a `relation-changed` hook after every committed join.
    #[must_use]
    pub const fn with_changed_after_join(mut self, enabled: bool) -> Self {
        self.changed_after_join = enabled;
        self
    }

    pub fn relation_id(&self) -> RelationId {
        self.relation_unit.relation_id()
    }

    /// Endpoint name, used as the prefix of every relation hook.
    pub fn endpoint_name(&self) -> &str {
        &self.relation_unit.endpoint().name
    }

    pub fn relation_unit(&self) -> &Arc<dyn RelationUnit> {
        &self.relation_unit
    }

    pub const fn state_dir(&self) -> &StateDir {
        &self.dir
    }

    /// Implicit relations are joined but never run hooks.
    pub fn is_implicit(&self) -> bool {
        self.relation_unit.endpoint().is_implicit()
    }

    pub const fn is_dying(&self) -> bool {
        self.dying
    }

    /// Build the scope join for this relation. The returned protocol runs
    /// independently of the relationer; call [`Relationer::joined`] once it
    /// reports success. A dying relationer stops `watcher` and refuses.
    pub async fn scope_join(
        &self,
        mut watcher: Box<dyn UnitWatcher>,
        abort: AbortSignal,
    ) -> Result<ScopeJoin> {
        if self.dying {
            let relation_id = self.relation_id();
            if let Err(e) = watcher.stop().await {
                warn!(relation_id = %relation_id, error = %e, "while stopping unit watcher");
            }
            return Err(Error::DyingJoin { relation_id });
        }
        Ok(ScopeJoin::new(self.relation_unit.clone(), watcher, abort))
    }

    /// Record that the unit is now in scope.
    pub fn joined(&self) -> Result<()> {
        self.dir.ensure()
    }

    /// Restrict future hooks to those that tear the relation down. An
    /// implicit relation is torn down at once, since it runs no hooks.
    pub async fn set_dying(&mut self) -> Result<()> {
        if self.is_implicit() {
            self.die().await?;
        }
        self.dying = true;
        Ok(())
    }

    /// Name of the charm hook to run for `info`.
    pub fn prepare_hook(&self, info: &HookInfo) -> Result<String> {
        if self.is_implicit() {
            return Err(Error::ImplicitRelationHook {
                relation_id: self.relation_id(),
            });
        }
        self.dir.validate(info)?;
        Ok(format!("{}-{}", self.endpoint_name(), info.kind))
    }

    /// Persist the effect of a hook that ran successfully.
    pub async fn commit_hook(&mut self, info: &HookInfo) -> Result<()> {
        if self.is_implicit() {
            return Err(Error::ImplicitRelationHook {
                relation_id: self.relation_id(),
            });
        }
        self.dir.validate(info)?;
        if info.kind == HookKind::RelationBroken {
            return self.die().await;
        }
        self.dir.write(info, self.changed_after_join)
    }

    /// Current membership for hook contexts.
    pub fn context_info(&self) -> RelationInfo {
        RelationInfo {
            relation_unit: self.relation_unit.clone(),
            member_names: self.dir.state().member_names(),
        }
    }

    /// Leave scope and delete the durable record.
    async fn die(&mut self) -> Result<()> {
        let relation_id = self.relation_id();
        match self.relation_unit.leave_scope().await {
            Ok(()) => {}
            Err(e) if e.is_not_found_or_unauthorized() => {
                debug!(relation_id = %relation_id, reason = %e, "relation already gone while leaving scope");
            }
            Err(e) => return Err(e.into()),
        }
        self.dir.remove()?;
        info!(relation_id = %relation_id, "left relation");
        Ok(())
    }
}
