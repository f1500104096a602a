// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for the document store and repositories.
//!
//! Every store backend reports failures through [`DatabaseError`]. The
//! variants carry a machine-checkable status code (see
//! [`DatabaseError::status_code`]) so callers can tell "does not exist" (404)
//! from "create conflict" (409) and "stale write" (412) without string
//! matching.

use thiserror::Error;

/// Result type using [`DatabaseError`].
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Errors produced by the document store, the typed client and repositories.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DatabaseError {
    /// The requested document is absent (or expired).
    #[error("document '{id}' not found")]
    NotFound {
        /// The document ID that was not found.
        id: String,
    },

    /// An active document with the same ID already exists (raw store conflict on create).
    #[error("document '{id}' already exists")]
    AlreadyExists {
        /// The conflicting document ID.
        id: String,
    },

    /// The stored version token no longer matches the one presented.
    #[error("precondition failed for document '{id}'")]
    PreconditionFailed {
        /// The document ID whose version moved on.
        id: String,
    },

    /// The document ID is not in canonical (lowercase) form.
    #[error("id {id:?} is not lower case")]
    Validation {
        /// The offending ID.
        id: String,
    },

    /// A patch mutator declined to apply its change.
    #[error("{reason}")]
    Rejected {
        /// Why the mutator refused.
        reason: String,
    },

    /// An async operation was asked to leave a terminal state.
    #[error("async operation '{id}' cannot transition from {from} to {to}")]
    InvalidTransition {
        /// The operation ID.
        id: String,
        /// The current (terminal) status.
        from: String,
        /// The requested status.
        to: String,
    },

    /// Sealing or opening a sensitive field failed.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// A document could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The store itself failed (unreachable, query error, ...).
    #[error("store error during '{operation}': {details}")]
    Infrastructure {
        /// The store operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },
}

impl DatabaseError {
    /// Build a [`DatabaseError::Rejected`] from any message.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// HTTP-equivalent status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::AlreadyExists { .. } => 409,
            Self::PreconditionFailed { .. } => 412,
            Self::Validation { .. } | Self::Rejected { .. } => 400,
            Self::InvalidTransition { .. } => 409,
            Self::Encryption(_) | Self::Serialization(_) | Self::Infrastructure { .. } => 500,
        }
    }

    /// Stable error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",
            Self::PreconditionFailed { .. } => "PRECONDITION_FAILED",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Rejected { .. } => "REJECTED",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Encryption(_) => "ENCRYPTION_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Infrastructure { .. } => "INFRASTRUCTURE_ERROR",
        }
    }

    /// True for [`DatabaseError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True for [`DatabaseError::PreconditionFailed`].
    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, Self::PreconditionFailed { .. })
    }

    /// True for [`DatabaseError::Infrastructure`].
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Infrastructure { .. })
    }
}

/// Collapse a raw create conflict into a precondition failure.
///
/// Applied at the repository boundary so that "someone already created this
/// ID" and "someone replaced this document" look the same to callers. Every
/// other error passes through untouched.
pub fn remap_create_conflict(err: DatabaseError) -> DatabaseError {
    match err {
        DatabaseError::AlreadyExists { id } => DatabaseError::PreconditionFailed { id },
        other => other,
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        DatabaseError::Infrastructure {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for DatabaseError {
    fn from(err: serde_json::Error) -> Self {
        DatabaseError::Serialization(err.to_string())
    }
}
