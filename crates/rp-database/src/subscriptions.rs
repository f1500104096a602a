// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::api::{Subscription, SubscriptionDocument};
use crate::error::Result;
use crate::repository::Repository;
use crate::retry::retry_on_precondition_failed;

/// Repository of [`SubscriptionDocument`]s.
pub type Subscriptions = Repository<SubscriptionDocument>;

impl Repository<SubscriptionDocument> {
    /// Create the subscription, or overwrite the stored one.
    ///
    /// Concurrent registrations race on create; the loser re-reads and
    /// patches instead.
    pub async fn put(&self, id: &str, subscription: Subscription) -> Result<SubscriptionDocument> {
        let subscription = &subscription;
        retry_on_precondition_failed(self.retry_policy(), || async move {
            match self.get(id).await {
                Ok(_) => {
                    self.patch(id, |doc| {
                        doc.subscription = subscription.clone();
                        Ok(())
                    })
                    .await
                }
                Err(e) if e.is_not_found() => {
                    self.create(&SubscriptionDocument::new(id, subscription.clone()))
                        .await
                }
                Err(e) => Err(e),
            }
        })
        .await
    }
}
