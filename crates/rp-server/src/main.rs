// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Resource provider - frontend, backend and coordinated drain in one process.
//!
//! On SIGTERM (or Ctrl-C) the process stops admitting API requests, lets
//! in-flight requests and reconciles finish, and exits once both loops have
//! drained.

use std::sync::Arc;

use rp_server::backend::BackendConfig;
use rp_server::config::Config;
use rp_server::db;
use rp_server::reconciler::{MockReconciler, Reconciler};
use rp_server::runtime::RpRuntime;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rp_server=info,rp_database=info".into()),
        )
        .init();

    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let config = Config::from_env()?;

    info!(
        http_addr = %config.http_addr,
        database = %config.database_name,
        local_development = config.local_development,
        "Starting resource provider"
    );

    let store = db::open_store(&config).await?;
    let database = db::open_database(&config, store)?;

    let reconciler = Arc::new(MockReconciler::new());
    info!(
        reconciler = reconciler.reconciler_type(),
        "Reconciler initialized"
    );

    let runtime = RpRuntime::builder()
        .database(database)
        .reconciler(reconciler)
        .bind_addr(config.http_addr)
        .backend_config(BackendConfig {
            poll_interval: config.backend_poll_interval,
            max_workers: config.backend_max_workers,
            lease_duration: config.lease_duration,
            ..BackendConfig::default()
        })
        .metrics_interval(config.metrics_interval)
        .build()?
        .start()
        .await?;

    info!(addr = %runtime.local_addr(), "Resource provider ready");

    wait_for_termination().await?;
    info!("Termination signal received, draining");

    runtime.shutdown().await?;

    info!("Resource provider shut down");

    Ok(())
}

#[cfg(unix)]
async fn wait_for_termination() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
