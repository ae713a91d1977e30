//! Relation reconciliation for a unit agent.
//!
//! A unit takes part in relations with remote applications. For each one it
//! must enter the relation's scope, remember which remote units it has seen
//! and at which settings version, and run charm hooks in a fixed order as
//! remote membership changes:
//!
//! - `relation-departed` for units that left
//! - `relation-broken` once the relation is dying and empty
//! - `relation-joined` for units that arrived
//! - `relation-changed` for units whose settings moved on
//!
//! # Key Concepts
//!
//! ## Durable state
//!
//! [`StateDir`] keeps one directory per relation with a small YAML file per
//! remote member. A hook's effect is committed there only after the hook
//! ran, so a restarted agent replays whatever was not committed.
//!
//! ## Reconciliation
//!
//! [`next_relation_hook`] is a pure function from the local [`State`] and
//! a [`RelationSnapshot`] to the next hook. [`Relations`] applies it across
//! every relation and keeps the set of [`Relationer`]s current.
//!
//! # Example
//!
//! ```ignore
//! use uniter_relation::{
//!     LocalState, RelationsBuilder, RelationsConfig, RelationsResolver, Snapshot,
//! };
//!
//! let relations = RelationsBuilder::new()
//!     .with_api(api)
//!     .with_unit(unit)
//!     .with_charm(charm)
//!     .with_config(RelationsConfig::new("/var/lib/unit/relations", "/var/lib/unit/charm"))
//!     .build()
//!     .await?;
//!
//! let mut resolver = RelationsResolver::new(relations);
//! while let Some(op) = resolver.next_op(&LocalState::default(), &snapshot, &factory).await? {
//!     run(op).await?;
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod abort;
pub mod api;
pub mod config;
pub mod error;
pub mod next_hook;
pub mod relationer;
pub mod relations;
pub mod remote;
pub mod resolver;
pub mod scope;
pub mod state;
pub mod statedir;

pub use abort::{AbortHandle, AbortSignal, abort_channel};
pub use api::{
    ApiResult, CharmEndpoints, Endpoint, Relation, RelationApi, RelationUnit, Role, Unit,
    UnitWatcher,
};
pub use config::RelationsConfig;
pub use error::{Error, Result};
pub use next_hook::next_relation_hook;
pub use relationer::{RelationInfo, Relationer};
pub use relations::{Relations, RelationsBuilder};
pub use remote::{RelationSnapshot, Snapshot};
pub use resolver::{LocalState, OperationFactory, OperationKind, RelationsResolver};
pub use scope::{JoinOutcome, ScopeJoin};
pub use state::State;
pub use statedir::{StateDir, read_all_state_dirs};
