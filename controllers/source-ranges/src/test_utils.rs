//! Test utilities for unit testing the reconciler and watcher
//!
//! This module provides helpers for creating test data and setting up test scenarios.

#[cfg(test)]
use crate::metrics::Metrics;
#[cfg(test)]
use crate::reconciler::{Reconciler, SOURCE_RANGES_ANNOTATION};
#[cfg(test)]
use cluster_client::{MockClusterClient, service_fixture};
#[cfg(test)]
use k8s_openapi::api::core::v1::Service;
#[cfg(test)]
use std::sync::Arc;

/// Namespace used by every fixture
#[cfg(test)]
pub const TEST_NAMESPACE: &str = "default";

/// Name of the ConfigMap referenced by `managed_service`
#[cfg(test)]
pub const TEST_CONFIG_MAP: &str = "test-config";

/// Helper to create a Service that references `TEST_CONFIG_MAP`
#[cfg(test)]
pub fn managed_service(name: &str, ranges: Option<&[&str]>) -> Service {
    service_fixture(
        TEST_NAMESPACE,
        name,
        &[(SOURCE_RANGES_ANNOTATION, TEST_CONFIG_MAP)],
        ranges,
    )
}

/// Helper to create a Service without the reference annotation
#[cfg(test)]
pub fn unmanaged_service(name: &str, ranges: Option<&[&str]>) -> Service {
    service_fixture(TEST_NAMESPACE, name, &[], ranges)
}

/// Helper to build a reconciler over a mock cluster
#[cfg(test)]
pub fn test_reconciler(mock: &MockClusterClient) -> (Reconciler, Arc<Metrics>) {
    let metrics = Arc::new(Metrics::new().expect("metrics registry"));
    let reconciler = Reconciler::new(Arc::new(mock.clone()), metrics.clone());
    (reconciler, metrics)
}

/// Sorted copy of a Service's allow-list, for order-insensitive assertions
#[cfg(test)]
pub fn sorted_ranges(mock: &MockClusterClient, name: &str) -> Option<Vec<String>> {
    mock.source_ranges(TEST_NAMESPACE, name).map(|mut ranges| {
        ranges.sort();
        ranges
    })
}
