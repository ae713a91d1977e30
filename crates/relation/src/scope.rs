//! Scope join protocol.
//!
//! Entering a relation's scope makes the local unit visible to its peers.
//! Entry may be refused for a while (a co-located subordinate still being
//! torn down, for instance); the protocol then waits for the unit watcher
//! to report a change and tries again. It finishes when entry succeeds, the
//! abort signal fires, or a non-retryable error occurs, and it always stops
//! its watcher on the way out.

use std::sync::Arc;

use tracing::{debug, error, warn};
use uniter_core::RelationId;

use crate::abort::AbortSignal;
use crate::api::{RelationUnit, UnitWatcher};
use crate::error::{Error, Result};

/// How a scope join ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The unit is in scope.
    Joined,
    /// The abort signal fired first.
    Aborted,
}

/// A single in-progress attempt to enter one relation's scope.
pub struct ScopeJoin {
    relation_unit: Arc<dyn RelationUnit>,
    watcher: Box<dyn UnitWatcher>,
    abort: AbortSignal,
}

impl ScopeJoin {
    pub fn new(
        relation_unit: Arc<dyn RelationUnit>,
        watcher: Box<dyn UnitWatcher>,
        abort: AbortSignal,
    ) -> Self {
        Self {
            relation_unit,
            watcher,
            abort,
        }
    }

    pub fn relation_id(&self) -> RelationId {
        self.relation_unit.relation_id()
    }

    /// Run the protocol to completion.
    pub async fn run(mut self) -> Result<JoinOutcome> {
        let relation_id = self.relation_id();
        let result = self.enter_when_possible().await;
        let stopped = self.watcher.stop().await;

        match (result, stopped) {
            (Ok(JoinOutcome::Joined), Ok(())) => {
                debug!(relation_id = %relation_id, "entered relation scope");
                Ok(JoinOutcome::Joined)
            }
            (Ok(JoinOutcome::Joined), Err(e)) => Err(e.into()),
            (Ok(JoinOutcome::Aborted), stopped) => {
                if let Err(e) = stopped {
                    warn!(relation_id = %relation_id, error = %e, "while stopping unit watcher");
                }
                Ok(JoinOutcome::Aborted)
            }
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(stop_err)) => {
                error!(relation_id = %relation_id, error = %stop_err, "while stopping unit watcher");
                Err(e)
            }
        }
    }

    async fn enter_when_possible(&mut self) -> Result<JoinOutcome> {
        let relation_id = self.relation_id();
        let mut attempts = 0u32;
        loop {
            tokio::select! {
                biased;
                () = self.abort.aborted() => {
                    debug!(relation_id = %relation_id, attempts, "scope join aborted");
                    return Ok(JoinOutcome::Aborted);
                }
                change = self.watcher.next_change() => {
                    if change.is_none() {
                        return Err(Error::WatcherClosed);
                    }
                }
            }

            attempts = attempts.saturating_add(1);
            let entered = tokio::select! {
                biased;
                () = self.abort.aborted() => {
                    debug!(relation_id = %relation_id, attempts, "scope join aborted while entering");
                    return Ok(JoinOutcome::Aborted);
                }
                entered = self.relation_unit.enter_scope() => entered,
            };

            match entered {
                Ok(()) => return Ok(JoinOutcome::Joined),
                Err(e) if e.is_retryable() => {
                    debug!(
                        relation_id = %relation_id,
                        attempts,
                        reason = %e,
                        "cannot enter scope yet; waiting for the next unit change"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
