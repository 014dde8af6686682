//! Mock ClusterClient for unit testing
//!
//! Stores Services and ConfigMaps in memory, emulates the API server's
//! resourceVersion check on updates, and captures published events so tests
//! can assert on them without a running cluster.

use crate::cluster_trait::ClusterClientTrait;
use crate::error::ClusterError;
use crate::models::OutcomeEvent;
use k8s_openapi::api::core::v1::{Service, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

type ObjectKey = (String, String);

fn key(namespace: &str, name: &str) -> ObjectKey {
    (namespace.to_string(), name.to_string())
}

/// An event captured by the mock, with the Service it was attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    /// Namespace of the Service the event was attached to
    pub namespace: String,
    /// Name of the Service the event was attached to
    pub name: String,
    /// The published event
    pub event: OutcomeEvent,
}

/// Mock ClusterClient for testing
#[derive(Clone, Default)]
pub struct MockClusterClient {
    pub(crate) services: Arc<Mutex<HashMap<ObjectKey, Service>>>,
    pub(crate) config_maps: Arc<Mutex<HashMap<ObjectKey, BTreeMap<String, String>>>>,
    pub(crate) events: Arc<Mutex<Vec<RecordedEvent>>>,
    // Failure injection
    pub(crate) lookup_failure: Arc<Mutex<Option<ClusterError>>>,
    pub(crate) update_failure: Arc<Mutex<Option<ClusterError>>>,
    // Call counters
    pub(crate) config_map_reads: Arc<Mutex<usize>>,
    pub(crate) service_updates: Arc<Mutex<usize>>,
    pub(crate) next_resource_version: Arc<Mutex<u64>>,
}

impl MockClusterClient {
    /// Create a new, empty mock client
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a ConfigMap's data to the mock store (for test setup)
    pub fn add_config_map<K, V>(&self, namespace: &str, name: &str, data: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let data = data.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self.config_maps.lock().unwrap().insert(key(namespace, name), data);
    }

    /// Remove a ConfigMap from the mock store
    pub fn remove_config_map(&self, namespace: &str, name: &str) {
        self.config_maps.lock().unwrap().remove(&key(namespace, name));
    }

    /// Add a Service to the mock store, assigning it a fresh resourceVersion.
    ///
    /// Returns the stored copy, which is what a watch would deliver.
    pub fn add_service(&self, mut service: Service) -> Service {
        let namespace = service.metadata.namespace.clone().unwrap_or_else(|| "default".to_string());
        let name = service.metadata.name.clone().unwrap_or_default();
        service.metadata.namespace = Some(namespace.clone());
        service.metadata.resource_version = Some(self.bump_resource_version());
        self.services.lock().unwrap().insert(key(&namespace, &name), service.clone());
        service
    }

    /// Get the stored copy of a Service
    pub fn get_service(&self, namespace: &str, name: &str) -> Option<Service> {
        self.services.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    /// Current allow-list of a stored Service (`None` when unset)
    pub fn source_ranges(&self, namespace: &str, name: &str) -> Option<Vec<String>> {
        self.get_service(namespace, name)
            .and_then(|svc| svc.spec)
            .and_then(|spec| spec.load_balancer_source_ranges)
    }

    /// Make every subsequent ConfigMap read fail with `error`
    pub fn fail_lookups_with(&self, error: ClusterError) {
        *self.lookup_failure.lock().unwrap() = Some(error);
    }

    /// Make every subsequent Service update fail with `error`
    pub fn fail_updates_with(&self, error: ClusterError) {
        *self.update_failure.lock().unwrap() = Some(error);
    }

    /// Events recorded so far
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Events recorded so far, rendered as `<Severity> <Reason> <message>`
    pub fn event_strings(&self) -> Vec<String> {
        self.events().iter().map(|e| e.event.to_string()).collect()
    }

    /// Number of ConfigMap reads performed
    pub fn config_map_reads(&self) -> usize {
        *self.config_map_reads.lock().unwrap()
    }

    /// Number of successful Service updates performed
    pub fn service_updates(&self) -> usize {
        *self.service_updates.lock().unwrap()
    }

    pub(crate) fn bump_resource_version(&self) -> String {
        let mut rv = self.next_resource_version.lock().unwrap();
        *rv += 1;
        rv.to_string()
    }
}

#[async_trait::async_trait]
impl ClusterClientTrait for MockClusterClient {
    async fn validate_connectivity(&self) -> Result<(), ClusterError> {
        Ok(())
    }

    async fn get_config_map_data(&self, namespace: &str, name: &str) -> Result<BTreeMap<String, String>, ClusterError> {
        *self.config_map_reads.lock().unwrap() += 1;
        if let Some(err) = self.lookup_failure.lock().unwrap().clone() {
            return Err(err);
        }
        self.config_maps
            .lock()
            .unwrap()
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| ClusterError::NotFound(format!("configmaps \"{}\" not found", name)))
    }

    async fn update_source_ranges(&self, service: &Service, ranges: &[String]) -> Result<Service, ClusterError> {
        if let Some(err) = self.update_failure.lock().unwrap().clone() {
            return Err(err);
        }

        let namespace = service.metadata.namespace.as_deref().unwrap_or("default");
        let name = service.metadata.name.as_deref().unwrap_or_default();
        let mut services = self.services.lock().unwrap();
        let stored = services
            .get_mut(&key(namespace, name))
            .ok_or_else(|| ClusterError::NotFound(format!("services \"{}\" not found", name)))?;

        if let Some(expected) = service.metadata.resource_version.as_deref() {
            if stored.metadata.resource_version.as_deref() != Some(expected) {
                return Err(ClusterError::Conflict(format!(
                    "Operation cannot be fulfilled on services \"{}\": the object has been modified; please apply your changes to the latest version and try again",
                    name
                )));
            }
        }

        stored.spec.get_or_insert_with(ServiceSpec::default).load_balancer_source_ranges = Some(ranges.to_vec());
        stored.metadata.resource_version = Some(self.bump_resource_version());
        *self.service_updates.lock().unwrap() += 1;
        Ok(stored.clone())
    }

    async fn record_event(&self, service: &Service, event: OutcomeEvent) {
        self.events.lock().unwrap().push(RecordedEvent {
            namespace: service.metadata.namespace.clone().unwrap_or_else(|| "default".to_string()),
            name: service.metadata.name.clone().unwrap_or_default(),
            event,
        });
    }
}

/// Build a Service with the given annotations and allow-list (for test setup)
pub fn service_fixture(
    namespace: &str,
    name: &str,
    annotations: &[(&str, &str)],
    source_ranges: Option<&[&str]>,
) -> Service {
    let annotations: BTreeMap<String, String> = annotations
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            annotations: if annotations.is_empty() { None } else { Some(annotations) },
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            load_balancer_source_ranges: source_ranges.map(|r| r.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        }),
        status: None,
    }
}
