// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use super::AppState;
use crate::error::ApiError;

/// Admit a request unless draining.
///
/// The request is counted before the drain signal is checked, so a request
/// that passes the check is always waited for.
pub(super) async fn admit_request(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let _guard = state.in_flight.enter();

    if state.stop.is_stopped() {
        debug!(method = %request.method(), uri = %request.uri(), "Rejected request while draining");
        return ApiError::draining().into_response();
    }

    next.run(request).await
}
