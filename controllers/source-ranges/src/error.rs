//! Controller-specific error types.
//!
//! This module defines error types specific to the Source Ranges Controller
//! that are not covered by upstream library errors.

use cluster_client::ClusterError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the Source Ranges Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes client construction or configuration error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Cluster API error outside of enforcement (e.g. startup connectivity check)
    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// The ConfigMap referenced by a Service could not be read
    #[error("could not read ConfigMap {name}: {source}")]
    ConfigMapLookup {
        name: String,
        #[source]
        source: ClusterError,
    },

    /// The Service allow-list could not be written
    #[error("could not update Service {name}: {source}")]
    ServiceUpdate {
        name: String,
        #[source]
        source: ClusterError,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Metrics registration failed
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Listener or socket error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
