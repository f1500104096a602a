// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cluster resource documents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::document::Document;

/// Provisioning state of a cluster as seen by API callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProvisioningState {
    Creating,
    Updating,
    Deleting,
    Succeeded,
    Failed,
}

impl ProvisioningState {
    pub const ALL: [ProvisioningState; 5] = [
        ProvisioningState::Creating,
        ProvisioningState::Updating,
        ProvisioningState::Deleting,
        ProvisioningState::Succeeded,
        ProvisioningState::Failed,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, ProvisioningState::Succeeded | ProvisioningState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProvisioningState::Creating => "Creating",
            ProvisioningState::Updating => "Updating",
            ProvisioningState::Deleting => "Deleting",
            ProvisioningState::Succeeded => "Succeeded",
            ProvisioningState::Failed => "Failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterProperties {
    pub provisioning_state: ProvisioningState,
    /// The non-terminal state the cluster was in when it failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_provisioning_state: Option<ProvisioningState>,
    #[serde(default)]
    pub version: String,
    /// Encrypted at rest, never returned by the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenShiftCluster {
    /// Resource ID as supplied by the caller (original casing).
    pub id: String,
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    pub properties: ClusterProperties,
}

impl OpenShiftCluster {
    /// Copy with sensitive properties removed, for API responses.
    pub fn redacted(&self) -> Self {
        let mut cluster = self.clone();
        cluster.properties.pull_secret = None;
        cluster
    }
}

/// Stored cluster plus backend bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenShiftClusterDocument {
    /// Lowercase resource ID.
    pub id: String,
    #[serde(rename = "_etag", default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Operation currently driving the cluster, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub async_operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_owner: Option<String>,
    /// Unix milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_expires: Option<i64>,
    #[serde(default)]
    pub dequeues: u32,
    pub open_shift_cluster: OpenShiftCluster,
}

impl OpenShiftClusterDocument {
    pub fn new(cluster: OpenShiftCluster) -> Self {
        Self {
            id: resource_key(&cluster.id),
            etag: None,
            async_operation_id: None,
            lease_owner: None,
            lease_expires: None,
            dequeues: 0,
            open_shift_cluster: cluster,
        }
    }

    pub fn provisioning_state(&self) -> ProvisioningState {
        self.open_shift_cluster.properties.provisioning_state
    }

    /// Whether the backend has something to do for this cluster.
    pub fn needs_work(&self) -> bool {
        !self.provisioning_state().is_terminal()
    }

    /// Whether no worker holds a live lease at `now` (unix milliseconds).
    pub fn lease_is_free(&self, now: i64) -> bool {
        self.lease_owner.is_none() || self.lease_expires.is_none_or(|expires| expires <= now)
    }
}

impl Document for OpenShiftClusterDocument {
    const COLLECTION: &'static str = "OpenShiftClusters";
    const SENSITIVE_FIELDS: &'static [&'static str] = &["/openShiftCluster/properties/pullSecret"];

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

/// Canonical document key for a resource ID.
pub fn resource_key(resource_id: &str) -> String {
    resource_id.to_lowercase()
}
