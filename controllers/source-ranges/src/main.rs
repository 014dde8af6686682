//! Source Ranges Controller
//!
//! Keeps `spec.loadBalancerSourceRanges` of annotated Services equal to the
//! values of the ConfigMap they reference:
//! - Services opt in with the `source-ranges.alpha.girao.net/config-map` annotation
//! - Every value of the referenced ConfigMap becomes one allowed range
//! - Each enforcement is reported as a Kubernetes Event on the Service
//!
//! Services are re-checked on every watch event and on a periodic resync.

mod config;
mod controller;
mod error;
mod metrics;
mod ranges;
mod reconciler;
mod watcher;
mod test_utils;

#[cfg(test)]
mod watcher_test;

use config::Config;
use controller::Controller;
use crate::error::ControllerError;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    let _ = rustls::crypto::ring::default_provider().install_default();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Source Ranges Controller");

    let config = Config::from_env()?;

    info!("Configuration:");
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Resync period: {:?}", config.resync_period);
    info!("  Development mode: {}", config.development);
    info!("  Metrics address: {}", config.metrics_addr);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
