//! Enforcement of Service source ranges.
//!
//! A Service opts in by carrying the `source-ranges.alpha.girao.net/config-map`
//! annotation. For such a Service the reconciler:
//! 1. Reads the referenced ConfigMap (same namespace, never cached)
//! 2. Compares its values with `spec.loadBalancerSourceRanges` as sets
//! 3. Replaces the allow-list when they differ
//! 4. Records the outcome as an Event on the Service
//!
//! Failures are reported through a Warning event and returned to the caller.
//! Nothing is retried here; the next resync is the retry.

use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::ranges::{self, RangeDiff};
use cluster_client::{ClusterClientTrait, OutcomeEvent};
use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Annotation naming the ConfigMap that governs a Service's source ranges.
pub const SOURCE_RANGES_ANNOTATION: &str = "source-ranges.alpha.girao.net/config-map";

/// What a single enforcement did to a Service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnforceOutcome {
    /// No (or an empty) reference annotation; the Service was not touched
    Unmanaged,
    /// The allow-list already matches the ConfigMap
    InSync,
    /// The allow-list was replaced with these ranges
    Updated(Vec<String>),
}

impl EnforceOutcome {
    fn metric_label(&self) -> &'static str {
        match self {
            EnforceOutcome::Unmanaged => "unmanaged",
            EnforceOutcome::InSync => "in_sync",
            EnforceOutcome::Updated(_) => "updated",
        }
    }
}

/// Name of the ConfigMap referenced by `service`, if it opted in.
///
/// An empty annotation value is the same as no annotation.
pub fn config_map_reference(service: &Service) -> Option<&str> {
    service
        .metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(SOURCE_RANGES_ANNOTATION))
        .map(String::as_str)
        .filter(|name| !name.is_empty())
}

/// Enforces ConfigMap-declared source ranges onto Services.
pub struct Reconciler {
    pub(crate) cluster_client: Arc<dyn ClusterClientTrait>,
    metrics: Arc<Metrics>,
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(cluster_client: Arc<dyn ClusterClientTrait>, metrics: Arc<Metrics>) -> Self {
        Self {
            cluster_client,
            metrics,
        }
    }

    /// Reconciles the source ranges of one Service.
    ///
    /// Performs at most one Service write and records at most one event.
    pub async fn enforce_source_ranges(&self, service: &Service) -> Result<EnforceOutcome, ControllerError> {
        let started = Instant::now();
        let result = self.enforce(service).await;
        self.metrics.observe_enforce(started.elapsed().as_secs_f64());

        let label = match &result {
            Ok(outcome) => outcome.metric_label(),
            Err(ControllerError::ConfigMapLookup { .. }) => "lookup_failed",
            Err(_) => "update_failed",
        };
        self.metrics.count_outcome(label);
        result
    }

    async fn enforce(&self, service: &Service) -> Result<EnforceOutcome, ControllerError> {
        let Some(config_map_name) = config_map_reference(service) else {
            return Ok(EnforceOutcome::Unmanaged);
        };

        let name = service.name_any();
        let namespace = service.namespace().unwrap_or_else(|| "default".to_string());
        debug!("Enforcing source ranges on Service {}/{} from ConfigMap {}", namespace, name, config_map_name);

        let data = match self.cluster_client.get_config_map_data(&namespace, config_map_name).await {
            Ok(data) => data,
            Err(source) => {
                let err = ControllerError::ConfigMapLookup {
                    name: config_map_name.to_string(),
                    source,
                };
                warn!("Service {}/{}: {}", namespace, name, err);
                self.cluster_client
                    .record_event(service, OutcomeEvent::failed(err.to_string()))
                    .await;
                return Err(err);
            }
        };

        let current = service
            .spec
            .as_ref()
            .and_then(|spec| spec.load_balancer_source_ranges.as_deref())
            .unwrap_or_default();

        let desired = match ranges::compare(&data, current) {
            RangeDiff::InSync => {
                debug!("Service {}/{} source ranges already in sync", namespace, name);
                return Ok(EnforceOutcome::InSync);
            }
            RangeDiff::Replace(desired) => desired,
        };

        match self.cluster_client.update_source_ranges(service, &desired).await {
            Ok(_) => {
                let message = format!(
                    "Updated Service {} with LB source ranges: [{}]",
                    name,
                    desired.join(" ")
                );
                info!("{}/{}: {}", namespace, name, message);
                self.cluster_client
                    .record_event(service, OutcomeEvent::successful(message))
                    .await;
                Ok(EnforceOutcome::Updated(desired))
            }
            Err(source) => {
                let err = ControllerError::ServiceUpdate { name, source };
                warn!("Service {}/{}: {}", namespace, service.name_any(), err);
                self.cluster_client
                    .record_event(service, OutcomeEvent::failed(err.to_string()))
                    .await;
                Err(err)
            }
        }
    }
}
