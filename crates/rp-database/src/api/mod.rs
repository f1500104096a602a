//! Document kinds stored by the resource provider.
//!
//! Each kind is a serde struct implementing [`crate::Document`]. Field names
//! are camelCase on the wire and in the store; the version token travels as
//! `_etag` and is never persisted as part of the body.

pub mod async_operation;
pub mod billing;
pub mod open_shift_cluster;
pub mod portal;
pub mod subscription;

pub use self::async_operation::{
    AsyncOperation, AsyncOperationDocument, OperationError, OperationKind, OperationStatus,
};
pub use self::billing::{Billing, BillingDocument};
pub use self::open_shift_cluster::{
    ClusterProperties, OpenShiftCluster, OpenShiftClusterDocument, ProvisioningState, resource_key,
};
pub use self::portal::{Portal, PortalDocument};
pub use self::subscription::{Subscription, SubscriptionDocument, SubscriptionProperties, SubscriptionState};

/// Current time as unix seconds.
pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
