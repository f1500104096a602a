// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Metrics emission.
//!
//! Emitters are fire-and-forget: they never block and never fail the caller.
//! [`MetricsWorker`] periodically publishes document counts by state.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rp_database::{Database, OperationStatus, ProvisioningState};
use tokio::sync::Notify;
use tracing::{debug, error, info};

/// Dimension set of one data point.
pub type Dimensions = BTreeMap<&'static str, String>;

/// Sink for gauges and counters.
pub trait MetricsEmitter: Send + Sync {
    fn emit_gauge(&self, name: &str, value: i64, dimensions: &Dimensions);

    fn emit_counter(&self, name: &str, value: i64, dimensions: &Dimensions) {
        self.emit_gauge(name, value, dimensions);
    }
}

/// Emits data points as tracing events on the `rp_server::metrics` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEmitter;

impl MetricsEmitter for TracingEmitter {
    fn emit_gauge(&self, name: &str, value: i64, dimensions: &Dimensions) {
        info!(target: "rp_server::metrics", metric = name, kind = "gauge", value, ?dimensions);
    }

    fn emit_counter(&self, name: &str, value: i64, dimensions: &Dimensions) {
        info!(target: "rp_server::metrics", metric = name, kind = "counter", value, ?dimensions);
    }
}

/// Drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEmitter;

impl MetricsEmitter for NoopEmitter {
    fn emit_gauge(&self, _name: &str, _value: i64, _dimensions: &Dimensions) {}
}

/// One recorded data point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPoint {
    pub name: String,
    pub value: i64,
    pub dimensions: Dimensions,
}

/// Keeps every data point in memory, for tests.
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    points: Mutex<Vec<DataPoint>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self) -> Vec<DataPoint> {
        self.points
            .lock()
            .map(|points| points.clone())
            .unwrap_or_default()
    }

    /// Latest value emitted for `name` with dimension `key=value`.
    pub fn latest(&self, name: &str, key: &str, value: &str) -> Option<i64> {
        self.points()
            .into_iter()
            .rev()
            .find(|p| p.name == name && p.dimensions.get(key).map(String::as_str) == Some(value))
            .map(|p| p.value)
    }
}

impl MetricsEmitter for RecordingEmitter {
    fn emit_gauge(&self, name: &str, value: i64, dimensions: &Dimensions) {
        if let Ok(mut points) = self.points.lock() {
            points.push(DataPoint {
                name: name.to_string(),
                value,
                dimensions: dimensions.clone(),
            });
        }
    }
}

/// Background worker that publishes document counts.
pub struct MetricsWorker {
    db: Database,
    emitter: Arc<dyn MetricsEmitter>,
    interval: Duration,
    shutdown: Arc<Notify>,
}

impl MetricsWorker {
    pub fn new(db: Database, emitter: Arc<dyn MetricsEmitter>, interval: Duration) -> Self {
        Self {
            db,
            emitter,
            interval,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Get a handle that can be used to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Emit until the shutdown signal is received.
    pub async fn run(&self) {
        info!(interval_secs = self.interval.as_secs(), "Metrics worker started");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    info!("Metrics worker received shutdown signal");
                    break;
                }

                _ = tokio::time::sleep(self.interval) => {
                    if let Err(e) = self.emit_once().await {
                        error!(error = %e, "Failed to emit document metrics");
                    }
                }
            }
        }

        info!("Metrics worker stopped");
    }

    /// Count clusters by provisioning state and operations by status.
    pub async fn emit_once(&self) -> rp_database::Result<()> {
        let clusters = self.db.open_shift_clusters.list().await?;
        for state in ProvisioningState::ALL {
            let count = clusters
                .iter()
                .filter(|doc| doc.provisioning_state() == state)
                .count();
            let dimensions = Dimensions::from([("provisioningState", state.as_str().to_string())]);
            self.emitter
                .emit_gauge("database.openshiftclusters.count", count as i64, &dimensions);
        }

        let operations = self.db.async_operations.list().await?;
        for status in OperationStatus::ALL {
            let count = operations.iter().filter(|doc| doc.status() == status).count();
            let dimensions = Dimensions::from([("status", status.as_str().to_string())]);
            self.emitter
                .emit_gauge("database.asyncoperations.count", count as i64, &dimensions);
        }

        debug!(
            clusters = clusters.len(),
            operations = operations.len(),
            "Document metrics emitted"
        );
        Ok(())
    }
}
