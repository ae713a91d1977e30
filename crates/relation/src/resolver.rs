//! Glue between the relation engine and the unit's hook execution loop.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uniter_core::HookInfo;

use crate::error::Result;
use crate::relations::Relations;
use crate::remote::Snapshot;

/// What the unit's operation executor is currently doing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Install,
    /// Idle and ready for new work.
    #[default]
    Continue,
    RunHook,
    RunAction,
    Upgrade,
}

/// Local operation state as seen by resolvers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalState {
    pub kind: OperationKind,
}

impl LocalState {
    pub const fn new(kind: OperationKind) -> Self {
        Self { kind }
    }
}

/// Builds executable operations. Hook execution itself happens outside
/// the relation engine.
pub trait OperationFactory {
    type Operation;

    fn new_run_hook(&self, info: HookInfo) -> Result<Self::Operation>;
}

/// Resolves relation differences into hook operations.
pub struct RelationsResolver {
    relations: Relations,
}

impl RelationsResolver {
    pub const fn new(relations: Relations) -> Self {
        Self { relations }
    }

    pub const fn relations(&self) -> &Relations {
        &self.relations
    }

    /// Mutable access for committing hooks after they ran.
    pub fn relations_mut(&mut self) -> &mut Relations {
        &mut self.relations
    }

    /// Next operation to run, or `None` when the relations need nothing.
    pub async fn next_op<F: OperationFactory>(
        &mut self,
        local: &LocalState,
        remote: &Snapshot,
        factory: &F,
    ) -> Result<Option<F::Operation>> {
        let hook = self.relations.next_hook(local, remote).await?;
        debug!(hook = ?hook, "relations resolver picked next hook");
        hook.map(|info| factory.new_run_hook(info)).transpose()
    }
}
