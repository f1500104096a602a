// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

use serde::{Deserialize, Serialize};

use crate::document::Document;

/// Billing record of one cluster. Times are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Billing {
    pub creation_date: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_billing_timestamp: Option<i64>,
    pub location: String,
    pub tenant_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingDocument {
    /// Same ID as the cluster document.
    pub id: String,
    #[serde(rename = "_etag", default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Cluster resource ID as supplied by the caller.
    pub key: String,
    pub billing: Billing,
}

impl BillingDocument {
    pub fn new(id: impl Into<String>, key: impl Into<String>, billing: Billing) -> Self {
        Self {
            id: id.into(),
            etag: None,
            key: key.into(),
            billing,
        }
    }
}

impl Document for BillingDocument {
    const COLLECTION: &'static str = "Billing";

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
