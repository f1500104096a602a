// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Liveness and readiness state shared by the probes and the backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::shutdown::StopSignal;

/// Probe state.
///
/// Readiness is derived from the drain signal, so it flips to not-ready the
/// moment drain begins and never flips back. Liveness follows the backend's
/// view of the store.
#[derive(Clone)]
pub struct Health {
    stop: StopSignal,
    backend_healthy: Arc<AtomicBool>,
}

impl Health {
    pub fn new(stop: StopSignal) -> Self {
        Self {
            stop,
            backend_healthy: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_ready(&self) -> bool {
        !self.stop.is_stopped()
    }

    pub fn is_live(&self) -> bool {
        self.backend_healthy.load(Ordering::SeqCst)
    }

    pub fn set_backend_healthy(&self, healthy: bool) {
        self.backend_healthy.store(healthy, Ordering::SeqCst);
    }
}
