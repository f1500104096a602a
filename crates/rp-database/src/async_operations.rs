// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Async operation tracker.
//!
//! Operations move `InProgress -> {Succeeded, Failed, Canceled}` and stay
//! there. All status changes go through [`Repository::patch`], so a
//! transition computed from a stale read is retried against the latest
//! revision and re-checked.

use chrono::Utc;
use tracing::{debug, info};

use crate::api::{AsyncOperationDocument, OperationError, OperationStatus};
use crate::error::{DatabaseError, Result};
use crate::repository::Repository;

/// Repository of [`AsyncOperationDocument`]s.
pub type AsyncOperations = Repository<AsyncOperationDocument>;

impl Repository<AsyncOperationDocument> {
    /// Move an operation to `status`, attaching `error` if given.
    ///
    /// Fails with [`DatabaseError::InvalidTransition`] when the latest
    /// revision is already terminal. Entering a terminal state stamps the
    /// end time.
    pub async fn transition(
        &self,
        id: &str,
        status: OperationStatus,
        error: Option<OperationError>,
    ) -> Result<AsyncOperationDocument> {
        let doc = self
            .patch(id, |doc| {
                let op = &mut doc.async_operation;
                if op.status.is_terminal() {
                    return Err(DatabaseError::InvalidTransition {
                        id: doc.id.clone(),
                        from: op.status.to_string(),
                        to: status.to_string(),
                    });
                }

                op.status = status;
                if status.is_terminal() {
                    op.end_time = Some(Utc::now());
                }
                if let Some(error) = &error {
                    op.error = Some(error.clone());
                }
                Ok(())
            })
            .await?;

        info!(operation_id = %id, status = %status, "Async operation transitioned");
        Ok(doc)
    }

    /// Cancel an operation that is still running.
    ///
    /// Returns `Ok(None)` when the operation already reached a terminal state.
    pub async fn cancel(&self, id: &str) -> Result<Option<AsyncOperationDocument>> {
        match self.transition(id, OperationStatus::Canceled, None).await {
            Ok(doc) => Ok(Some(doc)),
            Err(DatabaseError::InvalidTransition { from, .. }) => {
                debug!(operation_id = %id, status = %from, "Operation already finished, not canceled");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
