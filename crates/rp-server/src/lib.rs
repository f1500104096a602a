// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Resource provider server.
//!
//! Two loops share one document store: the frontend accepts resource
//! requests over HTTP and records them, the backend claims recorded work and
//! reconciles it. A shutdown coordinator drains both before the process
//! exits.
//!
//! # Architecture
//!
//! ```text
//!        API callers
//!             │
//!             ▼
//! ┌──────────────────────┐                 ┌──────────────────────┐
//! │      frontend        │                 │       backend        │
//! │  axum, admits until  │                 │  dequeue + lease,    │
//! │  the drain signal    │                 │  Reconciler per doc  │
//! └──────────┬───────────┘                 └───────────┬──────────┘
//!            │   documents, async operations           │
//!            └──────────────────┬──────────────────────┘
//!                               ▼
//!                  ┌────────────────────────┐
//!                  │  rp-database (etags,   │
//!                  │  patch retry, leases)  │
//!                  └────────────────────────┘
//! ```
//!
//! # Request Lifecycle
//!
//! | Step | Who | Effect |
//! |------|-----|--------|
//! | PUT / DELETE | frontend | new `InProgress` operation, cluster points at it |
//! | dequeue | backend | lease taken on a non-terminal cluster |
//! | reconcile | backend | lease renewed at half its duration |
//! | finish | backend | operation resolved, then cluster state and lease |
//!
//! # Drain
//!
//! | Signal | Fired by | Observed by |
//! |--------|----------|-------------|
//! | drain | termination handler, once | frontend, backend, readiness probe |
//! | frontend drained | frontend, after its last admitted request | coordinator |
//! | backend drained | backend, after its last reconcile | coordinator |
//!
//! # Configuration
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `RP_DB_ENCRYPTION_KEY` | Yes | - | base64 of the 32-byte field key |
//! | `RP_DATABASE_URL` | Yes* | - | PostgreSQL URL (*optional in local development) |
//! | `RP_LOCAL_DEVELOPMENT` | No | `false` | local development mode |
//! | `RP_DATABASE_NAME` | local only | - | database name, required in local development |
//! | `RP_HTTP_PORT` | No | `8443` | frontend port |
//! | `RP_BACKEND_POLL_INTERVAL_MS` | No | `1000` | backend scan interval |
//! | `RP_BACKEND_MAX_WORKERS` | No | `8` | concurrent reconciles |
//! | `RP_LEASE_DURATION_SECS` | No | `60` | backend lease length |
//! | `RP_PATCH_MAX_ATTEMPTS` | No | unbounded | patch retry cap |
//! | `RP_PATCH_BACKOFF_MS` | No | `0` | patch retry backoff base |
//! | `RP_METRICS_INTERVAL_SECS` | No | `60` | document metrics interval |

/// Backend worker loop.
pub mod backend;

/// Configuration loaded from environment variables.
pub mod config;

/// Opening the configured document store.
pub mod db;

/// Error types.
pub mod error;

/// HTTP frontend.
pub mod frontend;

/// Liveness and readiness state.
pub mod health;

/// Metrics emitters and the document count worker.
pub mod metrics;

/// Cluster reconcilers.
pub mod reconciler;

/// Embeddable runtime.
pub mod runtime;

/// Drain coordination.
pub mod shutdown;

pub use backend::{Backend, BackendConfig};
pub use error::{ApiError, Error, Result};
pub use frontend::Frontend;
pub use health::Health;
pub use runtime::RpRuntime;
pub use shutdown::{DrainReporter, ShutdownCoordinator, StopSignal};
