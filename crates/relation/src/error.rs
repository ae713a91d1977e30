//! Error types for the relation engine.

use std::path::PathBuf;

use thiserror::Error;
use uniter_core::{ApiError, HookKind, RelationId};

/// Result type alias for relation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Relation engine error types.
#[derive(Debug, Error)]
pub enum Error {
    /// No relationer is registered for the relation.
    #[error("unknown relation: {relation_id}")]
    UnknownRelation { relation_id: RelationId },

    /// A non-relation hook was handed to the relation engine.
    #[error("not a relation hook: {kind}")]
    NotRelationHook { kind: HookKind },

    /// The hook does not represent a valid change to the relation state.
    #[error("inappropriate {kind:?} for {unit:?}: {reason}")]
    InappropriateHook {
        kind: HookKind,
        unit: String,
        reason: String,
    },

    /// Implicit relations never run hooks.
    #[error("implicit relation {relation_id} must not run hooks")]
    ImplicitRelationHook { relation_id: RelationId },

    /// A relationer already marked dying was asked to join.
    #[error("dying relationer for relation {relation_id} must not join")]
    DyingJoin { relation_id: RelationId },

    /// Durable relation state could not be loaded.
    #[error("cannot load relation state from '{path}': {reason}")]
    StateLoad { path: PathBuf, reason: String },

    /// Durable relation state could not be written.
    #[error("failed to write {kind} hook info for {unit:?} on state directory '{path}': {reason}")]
    StateWrite {
        kind: HookKind,
        unit: String,
        path: PathBuf,
        reason: String,
    },

    /// Durable relation state could not be removed.
    #[error("cannot remove relation state '{path}': {reason}")]
    StateRemove { path: PathBuf, reason: String },

    /// The unit watcher's change channel closed underneath a scope join.
    #[error("unit watcher closed")]
    WatcherClosed,

    /// The abort signal fired. Not a failure; the loop is shutting down.
    #[error("reconciliation loop aborted")]
    LoopAborted,

    /// A spawned scope join task panicked or was cancelled.
    #[error("scope join task for relation {relation_id} failed: {reason}")]
    JoinTaskFailed {
        relation_id: RelationId,
        reason: String,
    },

    /// The operation factory could not build an operation for a hook.
    #[error("cannot create operation: {reason}")]
    Operation { reason: String },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Failure reported by an external capability.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl Error {
    /// Create an unknown relation error.
    pub const fn unknown_relation(relation_id: RelationId) -> Self {
        Self::UnknownRelation { relation_id }
    }

    /// Create an inappropriate hook error.
    pub fn inappropriate_hook(
        kind: HookKind,
        unit: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InappropriateHook {
            kind,
            unit: unit.into(),
            reason: reason.into(),
        }
    }

    /// Create a state load error.
    pub fn state_load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::StateLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a state write error.
    pub fn state_write(
        kind: HookKind,
        unit: impl Into<String>,
        path: impl Into<PathBuf>,
        reason: impl Into<String>,
    ) -> Self {
        Self::StateWrite {
            kind,
            unit: unit.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a state remove error.
    pub fn state_remove(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::StateRemove {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an operation error.
    pub fn operation(reason: impl Into<String>) -> Self {
        Self::Operation {
            reason: reason.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Whether this is the graceful-shutdown outcome rather than a failure.
    pub const fn is_aborted(&self) -> bool {
        matches!(self, Self::LoopAborted)
    }

    /// Whether this is the permanent scope-entry rejection.
    pub fn is_cannot_enter_scope(&self) -> bool {
        matches!(self, Self::Api(err) if err.is_cannot_enter_scope())
    }

    /// Whether the error names a relation the engine does not know.
    pub const fn is_unknown_relation(&self) -> bool {
        matches!(self, Self::UnknownRelation { .. })
    }
}
