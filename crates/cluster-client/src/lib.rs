//! Cluster access for the source ranges controller
//!
//! A thin layer over kube-rs exposing exactly the operations the enforcement
//! engine needs:
//!
//! - **ConfigMap lookup**: fresh read of a ConfigMap's `data`, no caching
//! - **Service update**: single whole-list replace of
//!   `spec.loadBalancerSourceRanges`, guarded by the observed resourceVersion
//! - **Outcome events**: `SourceRangesEnforcementSuccessful` /
//!   `SourceRangesEnforcementFailed` Events attached to the Service
//!
//! # Example
//!
//! ```no_run
//! use cluster_client::{ClusterClientTrait, KubeClusterClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = kube::Client::try_default().await?;
//! let cluster = KubeClusterClient::new(client, "source-ranges-controller");
//!
//! cluster.validate_connectivity().await?;
//! let data = cluster.get_config_map_data("default", "office-ranges").await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod cluster_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::KubeClusterClient;
pub use error::ClusterError;
pub use models::*;
pub use cluster_trait::ClusterClientTrait;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockClusterClient, RecordedEvent, service_fixture};
