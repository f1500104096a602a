// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Reconcilers - the code that drives a cluster towards its requested state.
//!
//! The backend hands every claimed cluster to a [`Reconciler`]. Installing
//! and tearing down real clusters lives outside this crate; the mock
//! implementation is what the binary and the tests run with.

pub mod mock;
mod traits;

pub use mock::{MockReconciler, ReconcileAction};
pub use traits::*;
