// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embeddable resource provider runtime.
//!
//! [`RpRuntime`] wires the frontend, the backend and the metrics worker to
//! one [`Database`] and one [`ShutdownCoordinator`].
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rp_server::reconciler::MockReconciler;
//! use rp_server::runtime::RpRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = RpRuntime::builder()
//!         .database(db)
//!         .reconciler(Arc::new(MockReconciler::new()))
//!         .bind_addr("127.0.0.1:8443".parse()?)
//!         .build()?
//!         .start()
//!         .await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     runtime.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rp_database::Database;
use tokio::net::TcpListener;
use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::backend::{Backend, BackendConfig};
use crate::frontend::Frontend;
use crate::health::Health;
use crate::metrics::{MetricsEmitter, MetricsWorker, TracingEmitter};
use crate::reconciler::Reconciler;
use crate::shutdown::{ShutdownCoordinator, StopSignal};

/// Builder for creating an [`RpRuntime`].
pub struct RpRuntimeBuilder {
    database: Option<Database>,
    reconciler: Option<Arc<dyn Reconciler>>,
    metrics: Arc<dyn MetricsEmitter>,
    bind_addr: SocketAddr,
    backend_config: BackendConfig,
    metrics_interval: Duration,
}

impl Default for RpRuntimeBuilder {
    fn default() -> Self {
        Self {
            database: None,
            reconciler: None,
            metrics: Arc::new(TracingEmitter),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8443)),
            backend_config: BackendConfig::default(),
            metrics_interval: Duration::from_secs(60),
        }
    }
}

impl RpRuntimeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the repositories (required).
    pub fn database(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }

    /// Set the reconciler the backend drives clusters with (required).
    pub fn reconciler(mut self, reconciler: Arc<dyn Reconciler>) -> Self {
        self.reconciler = Some(reconciler);
        self
    }

    /// Set the metrics sink.
    ///
    /// Default: [`TracingEmitter`]
    pub fn metrics(mut self, metrics: Arc<dyn MetricsEmitter>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Set the HTTP bind address. Port 0 picks a free port.
    ///
    /// Default: `0.0.0.0:8443`
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn backend_config(mut self, config: BackendConfig) -> Self {
        self.backend_config = config;
        self
    }

    /// Set how often document counts are emitted.
    ///
    /// Default: 60 seconds
    pub fn metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval = interval;
        self
    }

    /// Build the runtime configuration.
    ///
    /// Returns an error if required fields are missing.
    pub fn build(self) -> Result<RpRuntimeConfig> {
        let database = self
            .database
            .ok_or_else(|| anyhow::anyhow!("database is required"))?;
        let reconciler = self
            .reconciler
            .ok_or_else(|| anyhow::anyhow!("reconciler is required"))?;

        Ok(RpRuntimeConfig {
            database,
            reconciler,
            metrics: self.metrics,
            bind_addr: self.bind_addr,
            backend_config: self.backend_config,
            metrics_interval: self.metrics_interval,
        })
    }
}

/// Configuration for an [`RpRuntime`].
pub struct RpRuntimeConfig {
    database: Database,
    reconciler: Arc<dyn Reconciler>,
    metrics: Arc<dyn MetricsEmitter>,
    bind_addr: SocketAddr,
    backend_config: BackendConfig,
    metrics_interval: Duration,
}

impl RpRuntimeConfig {
    /// Bind the listener and spawn the frontend, backend and metrics tasks.
    pub async fn start(self) -> Result<RpRuntime> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        let local_addr = listener.local_addr()?;

        let (coordinator, reporters) = ShutdownCoordinator::new();
        let health = Health::new(coordinator.stop_signal());

        let backend = Backend::new(
            self.database.clone(),
            self.reconciler.clone(),
            self.metrics.clone(),
            health.clone(),
            self.backend_config.clone(),
        );
        let backend_stop = coordinator.stop_signal();
        let backend_handle = tokio::spawn(backend.run(backend_stop, reporters.backend));

        let frontend = Frontend::new(
            self.database.clone(),
            health.clone(),
            coordinator.stop_signal(),
        );
        let (close_tx, close_rx) = oneshot::channel::<()>();
        let frontend_handle = tokio::spawn(frontend.run(listener, reporters.frontend, async move {
            let _ = close_rx.await;
        }));

        let metrics_worker = MetricsWorker::new(
            self.database.clone(),
            self.metrics.clone(),
            self.metrics_interval,
        );
        let metrics_shutdown = metrics_worker.shutdown_handle();
        let metrics_handle = tokio::spawn(async move {
            metrics_worker.run().await;
        });

        info!(
            addr = %local_addr,
            database = self.database.name(),
            reconciler = self.reconciler.reconciler_type(),
            "RpRuntime started"
        );

        Ok(RpRuntime {
            coordinator,
            health,
            local_addr,
            frontend_handle,
            backend_handle,
            metrics_handle,
            close_tx,
            metrics_shutdown,
        })
    }
}

/// A running resource provider.
///
/// Call [`shutdown`](Self::shutdown) for graceful termination.
pub struct RpRuntime {
    coordinator: ShutdownCoordinator,
    health: Health,
    local_addr: SocketAddr,
    frontend_handle: JoinHandle<std::io::Result<()>>,
    backend_handle: JoinHandle<()>,
    metrics_handle: JoinHandle<()>,
    close_tx: oneshot::Sender<()>,
    metrics_shutdown: Arc<Notify>,
}

impl RpRuntime {
    pub fn builder() -> RpRuntimeBuilder {
        RpRuntimeBuilder::new()
    }

    /// Address the frontend is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn health(&self) -> &Health {
        &self.health
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.coordinator.stop_signal()
    }

    /// Fire the drain signal without waiting. Returns false if already fired.
    pub fn trigger(&self) -> bool {
        self.coordinator.trigger()
    }

    /// Drain and stop.
    ///
    /// Fires the drain signal, waits until both loops report drained, then
    /// closes the listener and stops the metrics worker.
    pub async fn shutdown(self) -> Result<()> {
        info!("RpRuntime shutting down...");

        self.coordinator.trigger();
        self.coordinator.wait_drained().await;

        self.metrics_shutdown.notify_one();
        let _ = self.close_tx.send(());

        if let Err(e) = self.backend_handle.await {
            error!("Backend task panicked: {}", e);
        }
        if let Err(e) = self.metrics_handle.await {
            error!("Metrics worker task panicked: {}", e);
        }

        match self.frontend_handle.await {
            Ok(Ok(())) => {
                info!("RpRuntime shutdown complete");
                Ok(())
            }
            Ok(Err(e)) => {
                error!("Frontend error during shutdown: {}", e);
                Err(e.into())
            }
            Err(e) => {
                error!("Frontend task panicked: {}", e);
                Err(anyhow::anyhow!("frontend task panicked: {}", e))
            }
        }
    }

    /// Check if every task is still running.
    pub fn is_running(&self) -> bool {
        !self.frontend_handle.is_finished()
            && !self.backend_handle.is_finished()
            && !self.metrics_handle.is_finished()
    }
}
