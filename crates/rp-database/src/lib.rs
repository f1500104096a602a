// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! RP Database - optimistic-concurrency document store
//!
//! This crate provides the persistence layer of the resource provider: a
//! key-addressed document store with per-document version tokens (ETags),
//! typed repositories for every document kind, and the async operation
//! tracker.
//!
//! # Layers
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ Database                                                      │
//! │  AsyncOperations  OpenShiftClusters  Subscriptions  Billings  │
//! │  Portals                                                      │
//! └───────────────────────────────────────────────────────────────┘
//!                │ Repository<D>: lowercase IDs, create remap, patch retry
//!                ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │ DocumentClient<D>: serde, sensitive field encryption          │
//! └───────────────────────────────────────────────────────────────┘
//!                │ RawDocument
//!                ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │ DocumentStore: MemoryStore | PostgresStore                    │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Store contract
//!
//! | Operation | Failure |
//! |-----------|---------|
//! | `create` | `AlreadyExists` (409) if an active document has the ID |
//! | `get` | `NotFound` (404) if absent or expired |
//! | `replace` | `PreconditionFailed` (412) if the presented token is stale |
//! | `delete` | `PreconditionFailed` on a stale token, `NotFound` if absent |
//!
//! # Repository contract
//!
//! Repositories reject non-canonical (non-lowercase) IDs before any I/O and
//! report a create conflict as `PreconditionFailed`, so every caller handles
//! contention with one strategy. [`Repository::patch`] is the
//! read-modify-write primitive: it re-reads and re-applies the mutator until
//! the conditional replace goes through, or until the configured
//! [`RetryPolicy`] gives up (never, by default).
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use rp_database::{Cipher, Database, MemoryStore, OperationKind, OperationStatus};
//! use rp_database::api::AsyncOperationDocument;
//!
//! let db = Database::new(Arc::new(MemoryStore::new()), "dev", Arc::new(Cipher::generate()));
//! db.async_operations
//!     .create(&AsyncOperationDocument::new("op-1", "cluster-key", OperationKind::Create))
//!     .await?;
//! db.async_operations.transition("op-1", OperationStatus::Succeeded, None).await?;
//! ```

pub mod api;
pub mod async_operations;
pub mod billing;
pub mod client;
pub mod database;
pub mod document;
pub mod encryption;
pub mod error;
pub mod migrations;
pub mod open_shift_clusters;
pub mod portal;
pub mod repository;
pub mod retry;
pub mod store;
pub mod subscriptions;

pub use api::{OperationKind, OperationStatus, ProvisioningState};
pub use async_operations::AsyncOperations;
pub use billing::Billings;
pub use client::DocumentClient;
pub use database::{Database, PRODUCTION_DATABASE_NAME, database_name};
pub use document::{Document, validate_id};
pub use encryption::Cipher;
pub use error::{DatabaseError, Result, remap_create_conflict};
pub use open_shift_clusters::OpenShiftClusters;
pub use portal::Portals;
pub use repository::Repository;
pub use retry::{RetryPolicy, retry_on_precondition_failed};
pub use store::{Collection, DocumentStore, MemoryStore, PostgresStore, RawDocument};
pub use subscriptions::Subscriptions;
