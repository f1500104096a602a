// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Request handlers.

use std::collections::BTreeMap;
use std::sync::Mutex;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rp_database::api::{
    AsyncOperationDocument, ClusterProperties, OpenShiftCluster, OpenShiftClusterDocument,
    OperationKind, ProvisioningState, Subscription, SubscriptionState, resource_key,
};
use rp_database::{Database, DatabaseError, retry_on_precondition_failed};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use super::AppState;
use crate::error::ApiError;

const ASYNC_OPERATION_HEADER: &str = "azure-asyncoperation";
const LOCATION_HEADER: &str = "location";

/// Body of a cluster PUT.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRequest {
    pub location: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub properties: ClusterRequestProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRequestProperties {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub pull_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ClusterPath {
    subscription_id: String,
    resource_group: String,
    cluster_name: String,
}

impl ClusterPath {
    /// Resource ID in the caller's casing.
    fn resource_id(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.RedHatOpenShift/openShiftClusters/{}",
            self.subscription_id, self.resource_group, self.cluster_name
        )
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct OperationPath {
    subscription_id: String,
    operation_id: String,
}

fn operation_url(subscription_id: &str, location: &str, operation_id: &str) -> String {
    format!(
        "/subscriptions/{subscription_id}/providers/Microsoft.RedHatOpenShift/locations/{location}/operationsstatus/{operation_id}"
    )
}

fn probe(ok: bool) -> Response {
    if ok {
        (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable" })),
        )
            .into_response()
    }
}

/// `GET /healthz`
pub(super) async fn live(State(state): State<AppState>) -> Response {
    probe(state.health.is_live())
}

/// `GET /healthz/ready`
pub(super) async fn ready(State(state): State<AppState>) -> Response {
    probe(state.health.is_ready())
}

/// Fail unless the subscription is registered in a state that allows the request.
async fn check_subscription(
    db: &Database,
    subscription_id: &str,
    write: bool,
) -> Result<(), ApiError> {
    let state = match db.subscriptions.get(&subscription_id.to_lowercase()).await {
        Ok(doc) => Some(doc.subscription.state),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e.into()),
    };

    let allowed = state.is_some_and(|state: SubscriptionState| {
        if write {
            state.allows_writes()
        } else {
            state.allows_reads()
        }
    });
    if allowed {
        Ok(())
    } else {
        Err(ApiError::invalid_subscription_state(format!(
            "Request is not allowed in subscription '{subscription_id}'."
        )))
    }
}

/// `PUT /subscriptions/{subscription_id}`
pub(super) async fn put_subscription(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
    body: Result<Json<Subscription>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(subscription) = body.map_err(invalid_body)?;
    let doc = state
        .db
        .subscriptions
        .put(&subscription_id.to_lowercase(), subscription)
        .await?;

    info!(subscription = %doc.id, state = ?doc.subscription.state, "Subscription registered");
    Ok((StatusCode::OK, Json(doc.subscription)).into_response())
}

/// `GET /subscriptions/{subscription_id}`
pub(super) async fn get_subscription(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
) -> Result<Response, ApiError> {
    let doc = state
        .db
        .subscriptions
        .get(&subscription_id.to_lowercase())
        .await?;
    Ok(Json(doc.subscription).into_response())
}

fn invalid_body(rejection: JsonRejection) -> ApiError {
    ApiError::new(
        StatusCode::BAD_REQUEST,
        "InvalidRequestContent",
        rejection.body_text(),
    )
}

/// A mutator refusal on a resource becomes a conflict for the caller.
fn not_allowed(err: DatabaseError) -> ApiError {
    match err {
        DatabaseError::Rejected { reason } => ApiError::request_not_allowed(reason),
        other => other.into(),
    }
}

async fn cancel_orphan(db: &Database, operation_id: &str) {
    if let Err(e) = db.async_operations.cancel(operation_id).await {
        warn!(operation_id, error = %e, "Failed to cancel orphaned operation");
    }
}

/// `PUT {cluster}`
///
/// Records the request as a new async operation and points the cluster at
/// it. The operation is written first so a poller that sees the cluster
/// change can always find it.
pub(super) async fn put_cluster(
    State(state): State<AppState>,
    Path(path): Path<ClusterPath>,
    body: Result<Json<ClusterRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body.map_err(invalid_body)?;
    check_subscription(&state.db, &path.subscription_id, true).await?;

    let db = &state.db;
    let resource_id = path.resource_id();
    let key = resource_key(&resource_id);
    let (request, resource_id, key) = (&request, &resource_id, &key);
    let name = &path.cluster_name;

    let (doc, created) =
        retry_on_precondition_failed(db.open_shift_clusters.retry_policy(), || async move {
            let operation_id = Uuid::new_v4().to_string();

            match db.open_shift_clusters.get(key).await {
                Ok(_) => {
                    db.async_operations
                        .create(&AsyncOperationDocument::new(
                            &operation_id,
                            key,
                            OperationKind::Update,
                        ))
                        .await?;

                    let updated = db
                        .open_shift_clusters
                        .patch(key, |doc| {
                            if let Some(active) = &doc.async_operation_id {
                                return Err(DatabaseError::rejected(format!(
                                    "Request is not allowed while operation '{active}' is in progress."
                                )));
                            }
                            let cluster = &mut doc.open_shift_cluster;
                            cluster.tags = request.tags.clone();
                            cluster.properties.version = request.properties.version.clone();
                            if request.properties.pull_secret.is_some() {
                                cluster.properties.pull_secret = request.properties.pull_secret.clone();
                            }
                            cluster.properties.provisioning_state = ProvisioningState::Updating;
                            cluster.properties.failed_provisioning_state = None;
                            doc.async_operation_id = Some(operation_id.clone());
                            Ok(())
                        })
                        .await;

                    match updated {
                        Ok(doc) => Ok((doc, false)),
                        Err(e) => {
                            cancel_orphan(db, &operation_id).await;
                            Err(e)
                        }
                    }
                }
                Err(e) if e.is_not_found() => {
                    db.async_operations
                        .create(&AsyncOperationDocument::new(
                            &operation_id,
                            key,
                            OperationKind::Create,
                        ))
                        .await?;

                    let mut doc = OpenShiftClusterDocument::new(OpenShiftCluster {
                        id: resource_id.clone(),
                        name: name.clone(),
                        location: request.location.clone(),
                        tags: request.tags.clone(),
                        properties: ClusterProperties {
                            provisioning_state: ProvisioningState::Creating,
                            failed_provisioning_state: None,
                            version: request.properties.version.clone(),
                            pull_secret: request.properties.pull_secret.clone(),
                        },
                    });
                    doc.async_operation_id = Some(operation_id.clone());

                    match db.open_shift_clusters.create(&doc).await {
                        Ok(doc) => Ok((doc, true)),
                        Err(e) => {
                            cancel_orphan(db, &operation_id).await;
                            Err(e)
                        }
                    }
                }
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(not_allowed)?;

    let operation_id = doc.async_operation_id.clone().unwrap_or_default();
    info!(
        cluster = %doc.id,
        operation_id = %operation_id,
        created,
        "Cluster request accepted"
    );

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    let url = operation_url(
        &path.subscription_id,
        &doc.open_shift_cluster.location,
        &operation_id,
    );
    Ok((
        status,
        [(ASYNC_OPERATION_HEADER, url)],
        Json(doc.open_shift_cluster.redacted()),
    )
        .into_response())
}

/// `GET {cluster}`
pub(super) async fn get_cluster(
    State(state): State<AppState>,
    Path(path): Path<ClusterPath>,
) -> Result<Response, ApiError> {
    check_subscription(&state.db, &path.subscription_id, false).await?;

    let key = resource_key(&path.resource_id());
    let doc = state.db.open_shift_clusters.get(&key).await?;
    Ok(Json(doc.open_shift_cluster.redacted()).into_response())
}

/// `DELETE {cluster}`
///
/// Supersedes whatever operation was driving the cluster. The superseded
/// operation is canceled once the cluster points at the delete.
pub(super) async fn delete_cluster(
    State(state): State<AppState>,
    Path(path): Path<ClusterPath>,
) -> Result<Response, ApiError> {
    check_subscription(&state.db, &path.subscription_id, true).await?;

    let db = &state.db;
    let key = resource_key(&path.resource_id());

    let current = match db.open_shift_clusters.get(&key).await {
        Ok(doc) => doc,
        Err(e) if e.is_not_found() => return Ok(StatusCode::NO_CONTENT.into_response()),
        Err(e) => return Err(e.into()),
    };
    if let Some(response) = already_deleting(&path, &current) {
        return Ok(response);
    }

    let operation_id = Uuid::new_v4().to_string();
    db.async_operations
        .create(&AsyncOperationDocument::new(
            &operation_id,
            &key,
            OperationKind::Delete,
        ))
        .await?;

    let previous = Mutex::new(None);
    let deleting = db
        .open_shift_clusters
        .patch(&key, |doc| {
            if doc.provisioning_state() == ProvisioningState::Deleting
                && doc.async_operation_id.is_some()
            {
                return Err(DatabaseError::rejected("cluster is already being deleted"));
            }
            if let Ok(mut previous) = previous.lock() {
                *previous = doc.async_operation_id.clone();
            }
            let properties = &mut doc.open_shift_cluster.properties;
            properties.provisioning_state = ProvisioningState::Deleting;
            properties.failed_provisioning_state = None;
            doc.async_operation_id = Some(operation_id.clone());
            Ok(())
        })
        .await;

    let doc = match deleting {
        Ok(doc) => doc,
        Err(e) => {
            cancel_orphan(db, &operation_id).await;
            return match e {
                DatabaseError::NotFound { .. } => Ok(StatusCode::NO_CONTENT.into_response()),
                DatabaseError::Rejected { .. } => {
                    // Lost to a concurrent delete; report that one.
                    let doc = db.open_shift_clusters.get(&key).await?;
                    already_deleting(&path, &doc).ok_or_else(ApiError::internal)
                }
                other => Err(other.into()),
            };
        }
    };

    let superseded = previous.into_inner().ok().flatten();
    if let Some(superseded) = superseded {
        cancel_orphan(db, &superseded).await;
    }

    info!(cluster = %doc.id, operation_id = %operation_id, "Cluster delete accepted");
    Ok(accepted(
        &path.subscription_id,
        &doc.open_shift_cluster.location,
        &operation_id,
    ))
}

fn already_deleting(path: &ClusterPath, doc: &OpenShiftClusterDocument) -> Option<Response> {
    if doc.provisioning_state() != ProvisioningState::Deleting {
        return None;
    }
    let operation_id = doc.async_operation_id.as_deref()?;
    Some(accepted(
        &path.subscription_id,
        &doc.open_shift_cluster.location,
        operation_id,
    ))
}

fn accepted(subscription_id: &str, location: &str, operation_id: &str) -> Response {
    let url = operation_url(subscription_id, location, operation_id);
    (
        StatusCode::ACCEPTED,
        [(ASYNC_OPERATION_HEADER, url.clone()), (LOCATION_HEADER, url)],
    )
        .into_response()
}

/// `GET .../operationsstatus/{operation_id}`
pub(super) async fn get_operation(
    State(state): State<AppState>,
    Path(path): Path<OperationPath>,
) -> Result<Response, ApiError> {
    let doc = state
        .db
        .async_operations
        .get(&path.operation_id.to_lowercase())
        .await?;

    let prefix = format!("/subscriptions/{}/", path.subscription_id.to_lowercase());
    if !doc.resource_key.starts_with(&prefix) {
        return Err(ApiError::not_found(format!(
            "Operation '{}' not found.",
            path.operation_id
        )));
    }

    Ok(Json(doc.async_operation).into_response())
}
