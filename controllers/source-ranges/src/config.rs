//! Controller configuration.
//!
//! Read once at startup from environment variables:
//! - `RESYNC_SECONDS`: resync period (default 30)
//! - `WATCH_NAMESPACE`: namespace to watch (default: all namespaces)
//! - `DEVELOPMENT`: load a kubeconfig file instead of the in-cluster config
//! - `KUBECONFIG`: kubeconfig path used in development mode (default `~/.kube/config`)
//! - `METRICS_ADDR`: metrics/health listen address (default `0.0.0.0:7777`)

use crate::error::ControllerError;
use kube::Client;
use kube::config::{KubeConfigOptions, Kubeconfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_RESYNC_SECONDS: u64 = 30;
const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:7777";

/// Runtime configuration of the controller.
#[derive(Debug, Clone)]
pub struct Config {
    pub resync_period: Duration,
    pub namespace: Option<String>,
    pub development: bool,
    pub kubeconfig: PathBuf,
    pub metrics_addr: SocketAddr,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let resync_seconds = match lookup("RESYNC_SECONDS") {
            Some(raw) => raw.trim().parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| ControllerError::InvalidConfig(format!(
                    "RESYNC_SECONDS must be a positive integer, got {:?}", raw
                )))?,
            None => DEFAULT_RESYNC_SECONDS,
        };

        let development = match lookup("DEVELOPMENT") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| ControllerError::InvalidConfig(format!(
                "DEVELOPMENT must be true or false, got {:?}", raw
            )))?,
            None => false,
        };

        let kubeconfig = lookup("KUBECONFIG")
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = lookup("HOME").unwrap_or_default();
                PathBuf::from(home).join(".kube").join("config")
            });

        let metrics_addr = lookup("METRICS_ADDR")
            .unwrap_or_else(|| DEFAULT_METRICS_ADDR.to_string());
        let metrics_addr = metrics_addr.parse::<SocketAddr>()
            .map_err(|e| ControllerError::InvalidConfig(format!(
                "METRICS_ADDR {:?} is not a socket address: {}", metrics_addr, e
            )))?;

        Ok(Self {
            resync_period: Duration::from_secs(resync_seconds),
            namespace: lookup("WATCH_NAMESPACE").filter(|ns| !ns.is_empty()),
            development,
            kubeconfig,
            metrics_addr,
        })
    }

    /// Builds a Kubernetes client for the configured connection mode.
    ///
    /// In development mode the kubeconfig file is used, otherwise the
    /// in-cluster service account.
    pub async fn kube_client(&self) -> Result<Client, ControllerError> {
        let config = if self.development {
            let kubeconfig = Kubeconfig::read_from(&self.kubeconfig)
                .map_err(|e| ControllerError::InvalidConfig(format!(
                    "could not load configuration from {}: {}", self.kubeconfig.display(), e
                )))?;
            kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| ControllerError::InvalidConfig(format!("could not load configuration: {}", e)))?
        } else {
            kube::Config::incluster().map_err(|e| ControllerError::InvalidConfig(format!(
                "error loading kubernetes configuration inside cluster, check app is running outside kubernetes cluster or run in development mode: {}",
                e
            )))?
        };

        Ok(Client::try_from(config)?)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "" | "0" | "false" | "no" => Some(false),
        _ => None,
    }
}
