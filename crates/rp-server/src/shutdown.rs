// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Process-wide drain protocol.
//!
//! One drain signal, fired once by the termination handler and observed by
//! any number of consumers. Two completion signals, one per loop, each fired
//! once when that loop has no outstanding work. The process is drained when
//! both completion signals have fired.
//!
//! ```text
//!  SIGTERM ──► trigger() ──► StopSignal (watch, fan-out)
//!                               │                 │
//!                               ▼                 ▼
//!                           frontend           backend
//!                               │                 │
//!                     DrainReporter        DrainReporter
//!                        (oneshot)            (oneshot)
//!                               └──► wait_drained() ◄┘
//! ```

use tokio::sync::{oneshot, watch};
use tracing::{info, warn};

/// Owner of the drain signal and the receiving ends of both completion signals.
pub struct ShutdownCoordinator {
    stop_tx: watch::Sender<bool>,
    frontend_rx: oneshot::Receiver<()>,
    backend_rx: oneshot::Receiver<()>,
}

/// Completion signal handles, one per loop.
pub struct DrainReporters {
    pub frontend: DrainReporter,
    pub backend: DrainReporter,
}

impl ShutdownCoordinator {
    /// Create a coordinator and the reporters to hand to the two loops.
    pub fn new() -> (Self, DrainReporters) {
        let (stop_tx, _) = watch::channel(false);
        let (frontend_tx, frontend_rx) = oneshot::channel();
        let (backend_tx, backend_rx) = oneshot::channel();

        (
            Self {
                stop_tx,
                frontend_rx,
                backend_rx,
            },
            DrainReporters {
                frontend: DrainReporter {
                    name: "frontend",
                    tx: frontend_tx,
                },
                backend: DrainReporter {
                    name: "backend",
                    tx: backend_tx,
                },
            },
        )
    }

    /// A new observer of the drain signal.
    pub fn stop_signal(&self) -> StopSignal {
        StopSignal {
            rx: self.stop_tx.subscribe(),
        }
    }

    /// Fire the drain signal. Returns false if it had already fired.
    pub fn trigger(&self) -> bool {
        let fired = self.stop_tx.send_if_modified(|stopped| {
            if *stopped {
                false
            } else {
                *stopped = true;
                true
            }
        });
        if fired {
            info!("Drain signal fired");
        }
        fired
    }

    pub fn is_triggered(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Wait until both loops have reported drained.
    ///
    /// A reporter dropped without firing (its loop panicked or was torn down)
    /// counts as drained.
    pub async fn wait_drained(self) {
        let (frontend, backend) = tokio::join!(self.frontend_rx, self.backend_rx);
        if frontend.is_err() {
            warn!(component = "frontend", "Drain reporter dropped without reporting");
        }
        if backend.is_err() {
            warn!(component = "backend", "Drain reporter dropped without reporting");
        }
        info!("Frontend and backend drained");
    }
}

/// Single-fire completion signal of one loop.
pub struct DrainReporter {
    name: &'static str,
    tx: oneshot::Sender<()>,
}

impl DrainReporter {
    /// Report that the loop has no outstanding work.
    pub fn drained(self) {
        info!(component = self.name, "Drained");
        let _ = self.tx.send(());
    }
}

/// Cloneable observer of the drain signal.
#[derive(Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// Whether the drain signal has fired.
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the drain signal has fired.
    ///
    /// Also resolves if the coordinator is gone, since nothing could fire it.
    pub async fn stopped(&self) {
        let mut rx = self.rx.clone();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}
