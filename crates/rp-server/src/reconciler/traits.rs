// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Reconciler trait definitions.

use async_trait::async_trait;
use rp_database::api::OpenShiftClusterDocument;
use thiserror::Error;

/// Errors from reconciling a cluster.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReconcileError {
    /// The cluster could not be brought to the requested state.
    #[error("{code}: {message}")]
    Failed {
        /// Error code reported on the async operation.
        code: String,
        /// Human-readable detail.
        message: String,
    },

    /// Other error.
    #[error("Other: {0}")]
    Other(String),
}

impl ReconcileError {
    pub fn failed(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Code recorded on the failed async operation.
    pub fn code(&self) -> &str {
        match self {
            Self::Failed { code, .. } => code,
            Self::Other(_) => "InternalServerError",
        }
    }
}

/// Result type for reconciler operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Drives one cluster to the state its document asks for.
///
/// Implementations must be safe to call again for the same cluster: a
/// lease that expires mid-reconcile hands the cluster to another worker.
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// Short name used in logs.
    fn reconciler_type(&self) -> &'static str;

    /// Install or update the cluster.
    async fn create_or_update(&self, doc: &OpenShiftClusterDocument) -> Result<()>;

    /// Tear the cluster down.
    async fn delete(&self, doc: &OpenShiftClusterDocument) -> Result<()>;
}
