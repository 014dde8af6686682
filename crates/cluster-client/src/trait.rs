//! ClusterClient trait for mocking
//!
//! This trait abstracts the handful of Kubernetes API calls the enforcement
//! engine needs, so reconciler tests can run against `MockClusterClient`.

use crate::error::ClusterError;
use crate::models::OutcomeEvent;
use k8s_openapi::api::core::v1::Service;
use std::collections::BTreeMap;

/// Trait for the cluster operations used by the source ranges controller.
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ClusterClientTrait: Send + Sync {
    /// Check that the API server is reachable with the configured credentials
    async fn validate_connectivity(&self) -> Result<(), ClusterError>;

    /// Fetch the `data` of a ConfigMap. A ConfigMap without `data` yields an empty map.
    async fn get_config_map_data(&self, namespace: &str, name: &str) -> Result<BTreeMap<String, String>, ClusterError>;

    /// Replace the whole `spec.loadBalancerSourceRanges` of `service`.
    ///
    /// The write is checked against the resourceVersion of `service`, so a stale
    /// object yields `ClusterError::Conflict`.
    async fn update_source_ranges(&self, service: &Service, ranges: &[String]) -> Result<Service, ClusterError>;

    /// Attach an event to `service`. Best-effort: failures are logged, never returned.
    async fn record_event(&self, service: &Service, event: OutcomeEvent);
}
