//! Classified errors returned by external capabilities.
//!
//! Callers never inspect message text. Every failure coming back from the
//! controller API carries an [`ErrorCode`], and retry decisions are made on
//! the code alone.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of an external API failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    /// The requested entity does not exist.
    NotFound,
    /// The caller may not see or touch the entity.
    Unauthorized,
    /// The unit can never enter the relation's scope.
    CannotEnterScope,
    /// The unit cannot enter the relation's scope yet, typically because a
    /// co-located subordinate has not been removed.
    CannotEnterScopeYet,
    /// Anything else.
    Other,
}

impl ErrorCode {
    /// Returns the stable wire name of the code.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not found",
            Self::Unauthorized => "unauthorized access",
            Self::CannotEnterScope => "cannot enter scope",
            Self::CannotEnterScopeYet => "cannot enter scope yet",
            Self::Other => "error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by an external capability (controller API, watcher).
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message} ({code})")]
pub struct ApiError {
    /// Classification used for dispatch.
    pub code: ErrorCode,
    /// Human readable detail.
    pub message: String,
}

impl ApiError {
    /// Create an error with an explicit code.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Create an unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Create a permanent scope-entry rejection.
    pub fn cannot_enter_scope(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CannotEnterScope, message)
    }

    /// Create a transient scope-entry rejection.
    pub fn cannot_enter_scope_yet(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CannotEnterScopeYet, message)
    }

    /// Create an unclassified error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Other, message)
    }

    /// Whether the failed call may succeed if attempted again later.
    ///
    /// Only a transient scope-entry rejection is retryable.
    pub const fn is_retryable(&self) -> bool {
        matches!(self.code, ErrorCode::CannotEnterScopeYet)
    }

    /// Whether the entity is gone or hidden from the caller.
    pub const fn is_not_found_or_unauthorized(&self) -> bool {
        matches!(self.code, ErrorCode::NotFound | ErrorCode::Unauthorized)
    }

    /// Whether this is the permanent scope-entry rejection.
    pub const fn is_cannot_enter_scope(&self) -> bool {
        matches!(self.code, ErrorCode::CannotEnterScope)
    }
}
