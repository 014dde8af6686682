//! Kubernetes API client
//!
//! Implements `ClusterClientTrait` on top of kube-rs: ConfigMap reads,
//! resourceVersion-checked Service patches, and Events through the
//! kube-runtime `Recorder`.

use crate::error::ClusterError;
use crate::models::{EventSeverity, OutcomeEvent};
use crate::cluster_trait::ClusterClientTrait;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Action recorded on every event we publish.
const EVENT_ACTION: &str = "EnforceSourceRanges";

/// Cluster client backed by a live API server connection
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
    recorder: Recorder,
}

impl KubeClusterClient {
    /// Create a new cluster client
    ///
    /// # Arguments
    /// * `client` - An authenticated kube client
    /// * `component` - Event source component (e.g., "source-ranges-controller")
    pub fn new(client: Client, component: &str) -> Self {
        let reporter = Reporter {
            controller: component.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        let recorder = Recorder::new(client.clone(), reporter);

        Self { client, recorder }
    }

    /// Service API scoped to `namespace`, or to all namespaces when `None`.
    pub fn services(&self, namespace: Option<&str>) -> Api<Service> {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

/// Merge patch that rewrites only the allow-list, guarded by `resource_version`.
///
/// An empty `ranges` is sent as `[]` rather than dropped, so clearing works.
pub(crate) fn source_ranges_patch(resource_version: Option<&str>, ranges: &[String]) -> serde_json::Value {
    let mut patch = serde_json::json!({
        "spec": {
            "loadBalancerSourceRanges": ranges,
        }
    });
    if let Some(rv) = resource_version {
        patch["metadata"] = serde_json::json!({ "resourceVersion": rv });
    }
    patch
}

#[async_trait::async_trait]
impl ClusterClientTrait for KubeClusterClient {
    async fn validate_connectivity(&self) -> Result<(), ClusterError> {
        let version = self.client.apiserver_version().await?;
        debug!("Connected to Kubernetes API server {}.{}", version.major, version.minor);
        Ok(())
    }

    async fn get_config_map_data(&self, namespace: &str, name: &str) -> Result<BTreeMap<String, String>, ClusterError> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let config_map = api.get(name).await?;
        Ok(config_map.data.unwrap_or_default())
    }

    async fn update_source_ranges(&self, service: &Service, ranges: &[String]) -> Result<Service, ClusterError> {
        let name = service.metadata.name.as_deref()
            .ok_or_else(|| ClusterError::Transport("Service has no name".to_string()))?;
        let namespace = service.metadata.namespace.as_deref().unwrap_or("default");

        let patch = source_ranges_patch(service.metadata.resource_version.as_deref(), ranges);
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let updated = api
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(updated)
    }

    async fn record_event(&self, service: &Service, event: OutcomeEvent) {
        let type_ = match event.severity {
            EventSeverity::Normal => EventType::Normal,
            EventSeverity::Warning => EventType::Warning,
        };
        let kube_event = Event {
            type_,
            reason: event.reason.as_str().to_string(),
            note: Some(event.message),
            action: EVENT_ACTION.to_string(),
            secondary: None,
        };

        if let Err(e) = self.recorder.publish(&kube_event, &service.object_ref(&())).await {
            warn!(
                "Failed to record {} event on Service {}/{}: {}",
                event.reason.as_str(),
                service.metadata.namespace.as_deref().unwrap_or("default"),
                service.metadata.name.as_deref().unwrap_or("<unknown>"),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_carries_resource_version() {
        let patch = source_ranges_patch(Some("42"), &["10.0.0.0/8".to_string()]);
        assert_eq!(patch["metadata"]["resourceVersion"], "42");
        assert_eq!(patch["spec"]["loadBalancerSourceRanges"][0], "10.0.0.0/8");
    }

    #[test]
    fn test_patch_clears_with_empty_list() {
        let patch = source_ranges_patch(None, &[]);
        assert!(patch.get("metadata").is_none());
        assert_eq!(patch["spec"]["loadBalancerSourceRanges"], serde_json::json!([]));
    }
}
