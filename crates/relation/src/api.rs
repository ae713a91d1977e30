//! Capabilities the relation engine consumes from its collaborators.
//!
//! The controller API, the unit watcher, and the charm metadata reader are
//! all provided from outside the engine. Every fallible call reports an
//! [`ApiError`] whose code drives retry and skip decisions.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uniter_core::{ApiError, Life, RelationId};

/// Result of a call into an external capability.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Role an endpoint plays in a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Provider,
    Requirer,
    Peer,
}

/// One side of a relation, as declared by an application's charm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub application_name: String,
    /// Endpoint name; relation hooks are prefixed with it.
    pub name: String,
    pub interface: String,
    pub role: Role,
}

impl Endpoint {
    pub fn new(
        application_name: impl Into<String>,
        name: impl Into<String>,
        interface: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            application_name: application_name.into(),
            name: name.into(),
            interface: interface.into(),
            role,
        }
    }

    /// Whether every charm provides this endpoint without declaring it.
    /// Implicit relations never run hooks.
    pub fn is_implicit(&self) -> bool {
        self.name == "juju-info" && self.interface == "juju-info" && self.role == Role::Provider
    }
}

/// Change notifications for the local unit.
///
/// Implementations send one notification as soon as they start, then one
/// per change.
#[async_trait]
pub trait UnitWatcher: Send {
    /// Wait for the next notification. `None` means the watcher died.
    async fn next_change(&mut self) -> Option<()>;

    /// Stop the watcher and release its resources, reporting the error it
    /// died with, if any.
    async fn stop(&mut self) -> ApiResult<()>;
}

/// The local unit's membership in one relation.
#[async_trait]
pub trait RelationUnit: Send + Sync {
    fn relation_id(&self) -> RelationId;

    /// The local application's endpoint in the relation.
    fn endpoint(&self) -> &Endpoint;

    /// Make the local unit visible to the relation's other units.
    ///
    /// Fails with `CannotEnterScopeYet` while entry is temporarily
    /// impossible and with `CannotEnterScope` when it never will be.
    async fn enter_scope(&self) -> ApiResult<()>;

    /// Withdraw the local unit from the relation.
    async fn leave_scope(&self) -> ApiResult<()>;
}

/// Handle on a relation.
#[async_trait]
pub trait Relation: Send + Sync {
    fn id(&self) -> RelationId;

    /// Human readable key, e.g. `"wordpress:db mysql:server"`.
    fn key(&self) -> &str;

    async fn life(&self) -> ApiResult<Life>;

    /// The local application's endpoint in this relation.
    async fn endpoint(&self) -> ApiResult<Endpoint>;

    /// The given unit's view of this relation.
    async fn unit(&self, unit_name: &str) -> ApiResult<Arc<dyn RelationUnit>>;
}

/// The local unit.
#[async_trait]
pub trait Unit: Send + Sync {
    fn name(&self) -> &str;

    /// Relations the unit is currently in scope of.
    async fn joined_relations(&self) -> ApiResult<Vec<RelationId>>;

    /// Start watching the unit.
    async fn watch(&self) -> ApiResult<Box<dyn UnitWatcher>>;
}

/// Relation lookup on the controller.
#[async_trait]
pub trait RelationApi: Send + Sync {
    async fn relation_by_id(&self, id: RelationId) -> ApiResult<Arc<dyn Relation>>;
}

/// The single question the engine asks about the deployed charm.
pub trait CharmEndpoints: Send + Sync {
    /// Whether the charm in `charm_dir` implements `endpoint`.
    fn implemented_by(&self, endpoint: &Endpoint, charm_dir: &Path) -> ApiResult<bool>;
}
