//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the Kubernetes
//! client, the reconciler and the Service watcher together, and owns the
//! background tasks until a termination signal arrives.

use crate::config::Config;
use crate::error::ControllerError;
use crate::metrics::{self, Metrics};
use crate::reconciler::Reconciler;
use crate::watcher::Watcher;
use cluster_client::{ClusterClientTrait, KubeClusterClient};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Name reported as the source of every recorded event.
pub const COMPONENT_NAME: &str = "source-ranges-controller";

/// Main controller for Service source range enforcement.
pub struct Controller {
    service_watcher: JoinHandle<Result<(), ControllerError>>,
    metrics_server: JoinHandle<Result<(), ControllerError>>,
    shutdown: watch::Sender<bool>,
}

impl Controller {
    /// Creates a new controller instance and starts its background tasks.
    pub async fn new(config: Config) -> Result<Self, ControllerError> {
        info!("Initializing Source Ranges Controller");

        let kube_client = config.kube_client().await?;
        let cluster_client = KubeClusterClient::new(kube_client, COMPONENT_NAME);

        info!("Validating Kubernetes API connectivity...");
        cluster_client.validate_connectivity().await
            .map_err(|e| {
                error!("Failed to reach the Kubernetes API server: {}", e);
                error!("Please ensure:");
                if config.development {
                    error!("  1. {} points at a reachable cluster", config.kubeconfig.display());
                } else {
                    error!("  1. The pod's service account token is mounted");
                }
                error!("  2. The service account may list and watch Services");
                ControllerError::Cluster(e)
            })?;
        info!("Kubernetes API connectivity established");

        let metrics = Arc::new(Metrics::new()?);
        let services = cluster_client.services(config.namespace.as_deref());
        let reconciler = Arc::new(Reconciler::new(Arc::new(cluster_client), metrics.clone()));
        let watcher_instance = Arc::new(Watcher::new(reconciler, metrics.clone(), config.resync_period));

        let (shutdown, shutdown_rx) = watch::channel(false);

        let service_watcher = {
            let watcher = watcher_instance.clone();
            let shutdown_rx = shutdown_rx.clone();
            tokio::spawn(async move {
                watcher.watch_services(services, shutdown_rx).await
            })
        };

        let metrics_server = {
            let addr = config.metrics_addr;
            tokio::spawn(async move {
                metrics::serve(addr, metrics, shutdown_rx).await
            })
        };

        Ok(Self {
            service_watcher,
            metrics_server,
            shutdown,
        })
    }

    /// Runs until a termination signal arrives or a background task exits.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Source Ranges Controller running");

        tokio::select! {
            result = &mut self.service_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("Service watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("Service watcher error: {}", e)))?;
                Err(ControllerError::Watch("Service watcher exited unexpectedly".to_string()))
            }
            result = &mut self.metrics_server => {
                result.map_err(|e| ControllerError::Watch(format!("Metrics server panicked: {}", e)))??;
                Err(ControllerError::Watch("Metrics server exited unexpectedly".to_string()))
            }
            result = shutdown_signal() => {
                result?;
                info!("Signal captured, exiting...");
                // Let the in-flight enforcement finish before returning
                let _ = self.shutdown.send(true);
                self.service_watcher.await
                    .map_err(|e| ControllerError::Watch(format!("Service watcher panicked: {}", e)))??;
                if let Err(e) = self.metrics_server.await {
                    error!("Metrics server panicked: {}", e);
                }
                Ok(())
            }
        }
    }
}

/// Resolves on SIGINT, or on SIGTERM where supported.
async fn shutdown_signal() -> Result<(), ControllerError> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                info!("Received SIGINT");
                result?;
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
        }
        Ok(())
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received SIGINT");
        Ok(())
    }
}
