// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

use tracing::debug;

use crate::api::BillingDocument;
use crate::api::unix_now;
use crate::error::Result;
use crate::repository::Repository;

/// Repository of [`BillingDocument`]s.
pub type Billings = Repository<BillingDocument>;

impl Repository<BillingDocument> {
    /// Create the billing record unless one already exists.
    pub async fn ensure(&self, doc: &BillingDocument) -> Result<BillingDocument> {
        match self.create(doc).await {
            Err(e) if e.is_precondition_failed() => {
                debug!(billing = %doc.id, "Billing record already exists");
                self.get(&doc.id).await
            }
            other => other,
        }
    }

    /// Stamp the deletion time. Already deleted records keep their first stamp.
    pub async fn mark_for_deletion(&self, id: &str) -> Result<BillingDocument> {
        self.patch(id, |doc| {
            if doc.billing.deletion_time.is_none() {
                doc.billing.deletion_time = Some(unix_now());
            }
            Ok(())
        })
        .await
    }
}
