// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Frontend request loop.
//!
//! An axum server that accepts resource requests, records them as documents
//! and async operations, and leaves the actual work to the backend.
//!
//! ## Routes
//!
//! - `GET /healthz` - liveness probe
//! - `GET /healthz/ready` - readiness probe, 503 once draining
//! - `PUT|GET /subscriptions/{subscriptionId}` - subscription registration
//! - `PUT|GET|DELETE {cluster resource ID}` - cluster lifecycle
//! - `GET /subscriptions/{subscriptionId}/providers/Microsoft.RedHatOpenShift/locations/{location}/operationsstatus/{operationId}`
//!
//! ## Drain
//!
//! Once the drain signal fires, every API request is answered with 503 while
//! requests admitted earlier run to completion. When the last of them
//! finishes the frontend reports drained. The listener keeps answering until
//! the runtime closes it.

mod handlers;
mod middleware;

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::routing::get;
use rp_database::Database;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::health::Health;
use crate::shutdown::{DrainReporter, StopSignal};

pub use handlers::{ClusterRequest, ClusterRequestProperties};

/// Path of a subscription.
pub const SUBSCRIPTION_PATH: &str = "/subscriptions/{subscription_id}";

/// Path of a cluster resource.
pub const CLUSTER_PATH: &str = "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/Microsoft.RedHatOpenShift/openShiftClusters/{cluster_name}";

/// Path of an async operation status.
pub const OPERATION_PATH: &str = "/subscriptions/{subscription_id}/providers/Microsoft.RedHatOpenShift/locations/{location}/operationsstatus/{operation_id}";

/// Shared state of all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub health: Health,
    pub stop: StopSignal,
    pub in_flight: InFlight,
}

/// Counter of admitted requests that have not finished yet.
#[derive(Clone, Default)]
pub struct InFlight {
    inner: Arc<InFlightInner>,
}

#[derive(Default)]
struct InFlightInner {
    count: AtomicUsize,
    idle: Notify,
}

/// Decrements the in-flight count when dropped.
pub struct InFlightGuard {
    inner: Arc<InFlightInner>,
}

impl InFlight {
    /// Count a request until the returned guard is dropped.
    pub fn enter(&self) -> InFlightGuard {
        self.inner.count.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            inner: self.inner.clone(),
        }
    }

    pub fn count(&self) -> usize {
        self.inner.count.load(Ordering::SeqCst)
    }

    /// Resolve once no request is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let mut notified = pin!(self.inner.idle.notified());
            notified.as_mut().enable();
            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.inner.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

/// Build the frontend router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            SUBSCRIPTION_PATH,
            get(handlers::get_subscription).put(handlers::put_subscription),
        )
        .route(
            CLUSTER_PATH,
            get(handlers::get_cluster)
                .put(handlers::put_cluster)
                .delete(handlers::delete_cluster),
        )
        .route(OPERATION_PATH, get(handlers::get_operation))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::admit_request,
        ));

    Router::new()
        .route("/healthz", get(handlers::live))
        .route("/healthz/ready", get(handlers::ready))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The frontend loop.
pub struct Frontend {
    state: AppState,
}

impl Frontend {
    pub fn new(db: Database, health: Health, stop: StopSignal) -> Self {
        Self {
            state: AppState {
                db,
                health,
                stop,
                in_flight: InFlight::default(),
            },
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve on `listener` until `close` resolves.
    ///
    /// Reports drained once the drain signal has fired and the last admitted
    /// request has finished.
    pub async fn run<F>(
        self,
        listener: TcpListener,
        reporter: DrainReporter,
        close: F,
    ) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let drain = {
            let state = self.state.clone();
            tokio::spawn(async move {
                state.stop.stopped().await;
                info!(in_flight = state.in_flight.count(), "Frontend draining");
                state.in_flight.wait_idle().await;
                reporter.drained();
            })
        };

        if let Ok(addr) = listener.local_addr() {
            info!(addr = %addr, "Frontend listening");
        }

        let result = axum::serve(listener, router(self.state))
            .with_graceful_shutdown(close)
            .await;

        if !drain.is_finished() {
            warn!("Frontend closed before draining");
            drain.abort();
        }
        info!("Frontend stopped");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_idle_returns_immediately_when_idle() {
        let in_flight = InFlight::default();
        tokio::time::timeout(Duration::from_millis(100), in_flight.wait_idle())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_idle_waits_for_last_guard() {
        let in_flight = InFlight::default();
        let first = in_flight.enter();
        let second = in_flight.enter();
        assert_eq!(in_flight.count(), 2);

        let waiter = {
            let in_flight = in_flight.clone();
            tokio::spawn(async move { in_flight.wait_idle().await })
        };

        drop(first);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(second);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(in_flight.count(), 0);
    }
}
