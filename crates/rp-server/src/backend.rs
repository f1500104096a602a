// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Backend worker loop.
//!
//! The backend polls the cluster collection for documents in a non-terminal
//! provisioning state, claims each one with a lease, and hands it to the
//! [`Reconciler`]. While a reconcile runs its lease is renewed at half the
//! lease duration. When it finishes, the async operation is resolved first
//! and the cluster document second, so a poller never sees a terminal cluster
//! next to a running operation.
//!
//! On the drain signal the loop stops claiming work, waits for every
//! in-flight reconcile, and then reports drained.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rp_database::api::{
    Billing, BillingDocument, OpenShiftClusterDocument, OperationError, OperationStatus,
    ProvisioningState,
};
use rp_database::{Database, DatabaseError};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::health::Health;
use crate::metrics::{Dimensions, MetricsEmitter};
use crate::reconciler::{ReconcileError, Reconciler};
use crate::shutdown::{DrainReporter, StopSignal};

/// Configuration for the backend loop.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Delay between polls when there is nothing to claim.
    pub poll_interval: Duration,
    /// Maximum concurrent reconciles.
    pub max_workers: usize,
    /// Lease taken on a claimed cluster.
    pub lease_duration: Duration,
    /// Upper bound on the delay after consecutive store failures.
    pub max_backoff: Duration,
    /// Consecutive store failures after which the process reports not-live.
    pub unhealthy_after: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_workers: 8,
            lease_duration: Duration::from_secs(60),
            max_backoff: Duration::from_secs(30),
            unhealthy_after: 5,
        }
    }
}

/// Lower bound on the poll interval and on failure backoff.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

impl BackendConfig {
    fn poll_interval(&self) -> Duration {
        self.poll_interval.max(MIN_POLL_INTERVAL)
    }

    fn backoff(&self, failures: u32) -> Duration {
        let shift = failures.saturating_sub(1).min(16);
        self.poll_interval()
            .saturating_mul(1u32 << shift)
            .min(self.max_backoff)
            .max(MIN_POLL_INTERVAL)
    }
}

/// The backend loop.
pub struct Backend {
    worker: Arc<Worker>,
    health: Health,
    config: BackendConfig,
}

/// Everything a single reconcile task needs.
struct Worker {
    db: Database,
    reconciler: Arc<dyn Reconciler>,
    metrics: Arc<dyn MetricsEmitter>,
    owner: String,
    lease_duration: Duration,
}

impl Backend {
    pub fn new(
        db: Database,
        reconciler: Arc<dyn Reconciler>,
        metrics: Arc<dyn MetricsEmitter>,
        health: Health,
        config: BackendConfig,
    ) -> Self {
        let worker = Worker {
            db,
            reconciler,
            metrics,
            owner: format!("backend-{}", Uuid::new_v4()),
            lease_duration: config.lease_duration,
        };
        Self {
            worker: Arc::new(worker),
            health,
            config,
        }
    }

    /// Lease owner name this backend writes into claimed documents.
    pub fn owner(&self) -> &str {
        &self.worker.owner
    }

    /// Run until the drain signal fires and all in-flight work has finished.
    pub async fn run(self, stop: StopSignal, reporter: DrainReporter) {
        info!(
            owner = %self.worker.owner,
            reconciler = self.worker.reconciler.reconciler_type(),
            max_workers = self.config.max_workers,
            poll_interval_ms = self.config.poll_interval().as_millis() as u64,
            "Backend started"
        );

        let mut tasks: JoinSet<()> = JoinSet::new();
        let mut failures = 0u32;
        let mut delay = Duration::ZERO;

        loop {
            tokio::select! {
                biased;

                _ = stop.stopped() => {
                    info!(in_flight = tasks.len(), "Backend received drain signal");
                    break;
                }

                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Reconcile task failed");
                    }
                    self.emit_active(&tasks);
                    delay = Duration::ZERO;
                    continue;
                }

                _ = tokio::time::sleep(delay) => {}
            }

            if tasks.len() >= self.config.max_workers.max(1) {
                delay = self.config.poll_interval();
                continue;
            }

            match self
                .worker
                .db
                .open_shift_clusters
                .dequeue(&self.worker.owner, self.worker.lease_duration)
                .await
            {
                Ok(claimed) => {
                    if failures > 0 {
                        info!(failures, "Backend recovered");
                        self.health.set_backend_healthy(true);
                    }
                    failures = 0;

                    match claimed {
                        Some(doc) => {
                            let worker = self.worker.clone();
                            tasks.spawn(async move { worker.process(doc).await });
                            self.emit_active(&tasks);
                            delay = Duration::ZERO;
                        }
                        None => delay = self.config.poll_interval(),
                    }
                }
                Err(e) => {
                    failures += 1;
                    delay = self.config.backoff(failures);
                    warn!(
                        error = %e,
                        failures,
                        retry_in_ms = delay.as_millis() as u64,
                        "Dequeue failed"
                    );
                    self.worker
                        .metrics
                        .emit_counter("backend.dequeue.failed", 1, &Dimensions::new());
                    if failures >= self.config.unhealthy_after {
                        self.health.set_backend_healthy(false);
                    }
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Reconcile task failed during drain");
            }
        }
        self.emit_active(&tasks);

        info!("Backend stopped");
        reporter.drained();
    }

    fn emit_active(&self, tasks: &JoinSet<()>) {
        self.worker
            .metrics
            .emit_gauge("backend.workers.active", tasks.len() as i64, &Dimensions::new());
    }
}

impl Worker {
    async fn process(&self, doc: OpenShiftClusterDocument) {
        let state = doc.provisioning_state();
        debug!(
            cluster = %doc.id,
            provisioning_state = state.as_str(),
            operation_id = doc.async_operation_id.as_deref().unwrap_or(""),
            "Reconciling cluster"
        );

        let outcome = self.reconcile_with_lease(&doc).await;
        let dimensions = Dimensions::from([
            ("provisioningState", state.as_str().to_string()),
            ("outcome", if outcome.is_ok() { "Succeeded" } else { "Failed" }.to_string()),
        ]);
        self.metrics
            .emit_counter("backend.reconcile.count", 1, &dimensions);

        if let Err(e) = self.finish(&doc, outcome).await {
            error!(cluster = %doc.id, error = %e, "Failed to record reconcile outcome");
        }
    }

    /// Run the reconciler, renewing the lease at half its duration.
    async fn reconcile_with_lease(
        &self,
        doc: &OpenShiftClusterDocument,
    ) -> Result<(), ReconcileError> {
        let work = async {
            match doc.provisioning_state() {
                ProvisioningState::Deleting => self.reconciler.delete(doc).await,
                _ => self.reconciler.create_or_update(doc).await,
            }
        };
        tokio::pin!(work);

        let period = (self.lease_duration / 2).max(Duration::from_millis(100));
        let mut renew = tokio::time::interval_at(Instant::now() + period, period);
        renew.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                result = &mut work => return result,
                _ = renew.tick() => {
                    match self
                        .db
                        .open_shift_clusters
                        .lease(&doc.id, &self.owner, self.lease_duration)
                        .await
                    {
                        Ok(_) => debug!(cluster = %doc.id, "Lease renewed"),
                        Err(e) => warn!(cluster = %doc.id, error = %e, "Failed to renew lease"),
                    }
                }
            }
        }
    }

    /// Resolve the operation, then the cluster document.
    async fn finish(
        &self,
        doc: &OpenShiftClusterDocument,
        outcome: Result<(), ReconcileError>,
    ) -> rp_database::Result<()> {
        let operation_id = doc.async_operation_id.as_deref();

        if let Some(operation_id) = operation_id {
            let (status, error) = match &outcome {
                Ok(()) => (OperationStatus::Succeeded, None),
                Err(e) => (
                    OperationStatus::Failed,
                    Some(OperationError::new(e.code(), e.to_string())),
                ),
            };
            match self
                .db
                .async_operations
                .transition(operation_id, status, error)
                .await
            {
                Ok(_) => {}
                Err(DatabaseError::InvalidTransition { from, .. }) => {
                    info!(
                        operation_id,
                        status = %from,
                        "Operation already finished, leaving it as is"
                    );
                }
                Err(e) if e.is_not_found() => {
                    warn!(operation_id, "Async operation is gone");
                }
                Err(e) => return Err(e),
            }
        }

        if outcome.is_ok() {
            match doc.provisioning_state() {
                ProvisioningState::Deleting => return self.finish_delete(doc, operation_id).await,
                ProvisioningState::Creating => self.ensure_billing(doc).await?,
                _ => {}
            }
        }

        let state = match outcome {
            Ok(()) => ProvisioningState::Succeeded,
            Err(_) => ProvisioningState::Failed,
        };
        self.db
            .open_shift_clusters
            .end_lease(&doc.id, &self.owner, operation_id, Some(state))
            .await?;
        Ok(())
    }

    async fn finish_delete(
        &self,
        doc: &OpenShiftClusterDocument,
        operation_id: Option<&str>,
    ) -> rp_database::Result<()> {
        if let Err(e) = self.db.billing.mark_for_deletion(&doc.id).await
            && !e.is_not_found()
        {
            return Err(e);
        }

        if let Some(operation_id) = operation_id
            && self
                .db
                .open_shift_clusters
                .delete_leased(&doc.id, &self.owner, operation_id)
                .await?
        {
            info!(cluster = %doc.id, "Cluster deleted");
            return Ok(());
        }

        // A newer operation owns the document now; hand it back.
        self.db
            .open_shift_clusters
            .end_lease(&doc.id, &self.owner, operation_id, None)
            .await?;
        Ok(())
    }

    async fn ensure_billing(&self, doc: &OpenShiftClusterDocument) -> rp_database::Result<()> {
        let tenant_id = match subscription_id(&doc.id) {
            Some(subscription_id) => match self.db.subscriptions.get(subscription_id).await {
                Ok(subscription) => subscription.subscription.properties.tenant_id,
                Err(e) if e.is_not_found() => String::new(),
                Err(e) => return Err(e),
            },
            None => String::new(),
        };

        let billing = BillingDocument::new(
            doc.id.clone(),
            doc.open_shift_cluster.id.clone(),
            Billing {
                creation_date: Utc::now().timestamp(),
                deletion_time: None,
                last_billing_timestamp: None,
                location: doc.open_shift_cluster.location.clone(),
                tenant_id,
            },
        );
        self.db.billing.ensure(&billing).await?;
        Ok(())
    }
}

/// Subscription segment of a lowercase resource key.
fn subscription_id(key: &str) -> Option<&str> {
    let mut segments = key.trim_start_matches('/').split('/');
    match (segments.next(), segments.next()) {
        (Some("subscriptions"), Some(id)) if !id.is_empty() => Some(id),
        _ => None,
    }
}
