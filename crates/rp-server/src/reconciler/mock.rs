// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock reconciler.
//!
//! Simulates cluster installation with a fixed delay. A gated mock holds
//! every call until [`MockReconciler::release`], which lets tests observe the
//! process while work is in flight.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rp_database::api::OpenShiftClusterDocument;
use tokio::sync::{Mutex, Notify, Semaphore};

use super::traits::*;

/// Which entry point a recorded call went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    CreateOrUpdate,
    Delete,
}

/// Mock reconciler for tests and local development.
pub struct MockReconciler {
    /// Simulated work per call.
    pub delay: Duration,
    /// If true, every call fails.
    pub fail_by_default: bool,
    gate: Option<Arc<Semaphore>>,
    started: Arc<Notify>,
    calls: Arc<Mutex<Vec<(String, ReconcileAction)>>>,
}

impl Default for MockReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl MockReconciler {
    pub fn new() -> Self {
        Self {
            delay: Duration::from_millis(10),
            fail_by_default: false,
            gate: None,
            started: Arc::new(Notify::new()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A mock whose calls all fail.
    pub fn failing() -> Self {
        Self {
            fail_by_default: true,
            ..Self::new()
        }
    }

    /// A mock whose calls block until [`MockReconciler::release`].
    pub fn gated() -> Self {
        Self {
            delay: Duration::ZERO,
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::new()
        }
    }

    /// Let all blocked and future calls through.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.close();
        }
    }

    /// Resolve once a call has started (immediately if one already has).
    pub async fn wait_started(&self) {
        if !self.calls.lock().await.is_empty() {
            return;
        }
        self.started.notified().await;
    }

    /// Calls seen so far, by document ID.
    pub async fn calls(&self) -> Vec<(String, ReconcileAction)> {
        self.calls.lock().await.clone()
    }

    async fn reconcile(&self, doc: &OpenShiftClusterDocument, action: ReconcileAction) -> Result<()> {
        self.calls.lock().await.push((doc.id.clone(), action));
        self.started.notify_waiters();
        self.started.notify_one();

        if let Some(gate) = &self.gate {
            // Closing the semaphore is the release.
            let _ = gate.acquire().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.fail_by_default {
            Err(ReconcileError::failed(
                "InternalServerError",
                format!("Mock failure reconciling {}", doc.open_shift_cluster.name),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Reconciler for MockReconciler {
    fn reconciler_type(&self) -> &'static str {
        "mock"
    }

    async fn create_or_update(&self, doc: &OpenShiftClusterDocument) -> Result<()> {
        self.reconcile(doc, ReconcileAction::CreateOrUpdate).await
    }

    async fn delete(&self, doc: &OpenShiftClusterDocument) -> Result<()> {
        self.reconcile(doc, ReconcileAction::Delete).await
    }
}
