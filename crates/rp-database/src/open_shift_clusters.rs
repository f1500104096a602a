// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cluster repository and the backend's lease protocol.
//!
//! A backend worker claims a cluster by writing its name and a lease expiry
//! into the document with a conditional replace. Losing that race surfaces as
//! `PreconditionFailed` and the worker moves on to the next candidate; the
//! version token is the only coordination between workers.

use std::time::Duration;

use tracing::{debug, info};

use crate::api::{OpenShiftClusterDocument, ProvisioningState};
use crate::error::{DatabaseError, Result};
use crate::repository::Repository;
use crate::retry::retry_on_precondition_failed;

/// Repository of [`OpenShiftClusterDocument`]s.
pub type OpenShiftClusters = Repository<OpenShiftClusterDocument>;

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn lease_expiry(now: i64, lease: Duration) -> i64 {
    let lease = i64::try_from(lease.as_millis()).unwrap_or(i64::MAX);
    now.saturating_add(lease.max(1))
}

fn lease_lost(id: &str, owner: &str) -> DatabaseError {
    DatabaseError::rejected(format!("lease on '{id}' is no longer held by '{owner}'"))
}

impl Repository<OpenShiftClusterDocument> {
    /// Claim the first cluster that needs work and has no live lease.
    ///
    /// Returns `Ok(None)` when nothing is claimable.
    pub async fn dequeue(
        &self,
        owner: &str,
        lease: Duration,
    ) -> Result<Option<OpenShiftClusterDocument>> {
        let now = now_millis();

        for mut doc in self.list().await? {
            if !doc.needs_work() || !doc.lease_is_free(now) {
                continue;
            }

            doc.lease_owner = Some(owner.to_string());
            doc.lease_expires = Some(lease_expiry(now, lease));
            doc.dequeues += 1;

            match self.client().replace(&doc).await {
                Ok(claimed) => {
                    debug!(
                        cluster = %claimed.id,
                        owner = %owner,
                        dequeues = claimed.dequeues,
                        "Claimed cluster"
                    );
                    return Ok(Some(claimed));
                }
                Err(e) if e.is_precondition_failed() || e.is_not_found() => {
                    debug!(cluster = %doc.id, "Lost claim race, trying next candidate");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(None)
    }

    /// Extend a lease held by `owner`.
    pub async fn lease(
        &self,
        id: &str,
        owner: &str,
        lease: Duration,
    ) -> Result<OpenShiftClusterDocument> {
        self.patch(id, |doc| {
            if doc.lease_owner.as_deref() != Some(owner) {
                return Err(lease_lost(id, owner));
            }
            doc.lease_expires = Some(lease_expiry(now_millis(), lease));
            Ok(())
        })
        .await
    }

    /// Release a lease held by `owner`.
    ///
    /// When the document is still driven by `operation_id`, `outcome`
    /// becomes its provisioning state and the active operation is cleared.
    /// A document that moved on to a newer operation only loses the lease.
    pub async fn end_lease(
        &self,
        id: &str,
        owner: &str,
        operation_id: Option<&str>,
        outcome: Option<ProvisioningState>,
    ) -> Result<OpenShiftClusterDocument> {
        let doc = self
            .patch(id, |doc| {
                if doc.lease_owner.as_deref() != Some(owner) {
                    return Err(lease_lost(id, owner));
                }
                doc.lease_owner = None;
                doc.lease_expires = None;

                let current = doc.async_operation_id.as_deref() == operation_id;
                if let Some(outcome) = outcome
                    && current
                {
                    let properties = &mut doc.open_shift_cluster.properties;
                    properties.failed_provisioning_state = match outcome {
                        ProvisioningState::Failed => Some(properties.provisioning_state),
                        _ => None,
                    };
                    properties.provisioning_state = outcome;
                    doc.async_operation_id = None;
                }
                Ok(())
            })
            .await?;

        info!(
            cluster = %id,
            provisioning_state = doc.provisioning_state().as_str(),
            "Lease released"
        );
        Ok(doc)
    }

    /// Delete a cluster leased by `owner` whose delete `operation_id` finished.
    ///
    /// Returns `Ok(false)` without deleting when a newer operation took over
    /// the document in the meantime.
    pub async fn delete_leased(&self, id: &str, owner: &str, operation_id: &str) -> Result<bool> {
        retry_on_precondition_failed(self.retry_policy(), || async move {
            let doc = self.get(id).await?;
            if doc.lease_owner.as_deref() != Some(owner) {
                return Err(lease_lost(id, owner));
            }
            if doc.async_operation_id.as_deref() != Some(operation_id) {
                return Ok(false);
            }
            self.delete(&doc).await?;
            Ok(true)
        })
        .await
    }
}
