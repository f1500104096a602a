// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Retry helper for optimistic-concurrency conflicts.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::Result;

/// How often, and how patiently, to retry after `PreconditionFailed`.
///
/// The default retries forever without waiting: preconditions are expected
/// to clear quickly under normal contention. A cap and an exponential
/// backoff can be configured to bound worst-case latency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts allowed, `None` for unbounded.
    pub max_attempts: Option<u32>,
    /// Delay after the first failed attempt; doubles per attempt.
    pub backoff: Duration,
    /// Upper bound on a single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            backoff: Duration::ZERO,
            max_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Retry until the write goes through.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Give up after `max_attempts` attempts in total.
    pub fn bounded(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts.max(1)),
            ..Self::default()
        }
    }

    /// Wait `base * 2^(n-1)` (capped at `max`) after the n-th failed attempt.
    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff = base;
        self.max_backoff = max;
        self
    }

    /// Whether another attempt may follow attempt number `attempt` (1-based).
    pub fn allows_retry(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt < max)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.backoff.is_zero() {
            return Duration::ZERO;
        }
        let shift = attempt.saturating_sub(1).min(16);
        self.backoff
            .saturating_mul(1u32 << shift)
            .min(self.max_backoff)
    }
}

/// Run `op` until it does not fail with `PreconditionFailed`, or the policy
/// runs out of attempts.
///
/// Any other error, and the final `PreconditionFailed` once attempts are
/// exhausted, is returned to the caller as-is.
pub async fn retry_on_precondition_failed<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Err(e) if e.is_precondition_failed() && policy.allows_retry(attempt) => {
                let delay = policy.delay_for(attempt);
                debug!(
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Precondition failed, retrying"
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            result => return result,
        }
    }
}
