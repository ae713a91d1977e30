//! # uniter-core
//!
//! Domain primitives shared by the unit agent's relation engine: relation
//! identifiers, lifecycle values, relation hook descriptions, and the
//! classified error returned by external capabilities.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod types;

pub use error::{ApiError, ErrorCode};
pub use types::{ChangeVersion, HookInfo, HookKind, Life, RelationId};
