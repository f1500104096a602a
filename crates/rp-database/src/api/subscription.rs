// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

use serde::{Deserialize, Serialize};

use crate::document::Document;

/// Registration state of a tenant subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionState {
    Registered,
    Warned,
    Suspended,
    Unregistered,
    Deleted,
}

impl SubscriptionState {
    /// Whether resources may be created, updated or deleted.
    pub fn allows_writes(self) -> bool {
        matches!(self, SubscriptionState::Registered)
    }

    /// Whether resources may be read.
    pub fn allows_reads(self) -> bool {
        matches!(self, SubscriptionState::Registered | SubscriptionState::Warned)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionProperties {
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub registered_features: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub state: SubscriptionState,
    #[serde(default)]
    pub properties: SubscriptionProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDocument {
    /// Lowercase subscription ID.
    pub id: String,
    #[serde(rename = "_etag", default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    pub subscription: Subscription,
}

impl SubscriptionDocument {
    pub fn new(id: impl Into<String>, subscription: Subscription) -> Self {
        Self {
            id: id.into(),
            etag: None,
            subscription,
        }
    }
}

impl Document for SubscriptionDocument {
    const COLLECTION: &'static str = "Subscriptions";

    fn id(&self) -> &str {
        &self.id
    }

    fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    fn set_etag(&mut self, etag: Option<String>) {
        self.etag = etag;
    }
}
