//! Prometheus metrics and the metrics/health HTTP server.

use crate::error::ControllerError;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

const METRICS_PREFIX: &str = "source_ranges";

/// What caused a Service to be handed to the enforcement engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Watch,
    Resync,
}

impl Trigger {
    fn as_str(&self) -> &'static str {
        match self {
            Trigger::Watch => "watch",
            Trigger::Resync => "resync",
        }
    }
}

/// Controller metrics, registered on a private registry.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    enforcements: IntCounterVec,
    dispatches: IntCounterVec,
    enforce_duration: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, ControllerError> {
        let registry = Registry::new_custom(Some(METRICS_PREFIX.to_string()), None)?;

        let enforcements = IntCounterVec::new(
            Opts::new("enforcements_total", "Enforcement attempts by outcome"),
            &["outcome"],
        )?;
        let dispatches = IntCounterVec::new(
            Opts::new("dispatches_total", "Services dispatched to the enforcement engine"),
            &["trigger"],
        )?;
        let enforce_duration = Histogram::with_opts(HistogramOpts::new(
            "enforce_duration_seconds",
            "Time spent enforcing a single Service",
        ))?;

        registry.register(Box::new(enforcements.clone()))?;
        registry.register(Box::new(dispatches.clone()))?;
        registry.register(Box::new(enforce_duration.clone()))?;

        Ok(Self {
            registry,
            enforcements,
            dispatches,
            enforce_duration,
        })
    }

    pub fn count_outcome(&self, outcome: &str) {
        self.enforcements.with_label_values(&[outcome]).inc();
    }

    pub fn count_dispatch(&self, trigger: Trigger) {
        self.dispatches.with_label_values(&[trigger.as_str()]).inc();
    }

    pub fn observe_enforce(&self, seconds: f64) {
        self.enforce_duration.observe(seconds);
    }

    pub fn outcome_count(&self, outcome: &str) -> u64 {
        self.enforcements.with_label_values(&[outcome]).get()
    }

    pub fn dispatch_count(&self, trigger: Trigger) -> u64 {
        self.dispatches.with_label_values(&[trigger.as_str()]).get()
    }

    /// Text exposition of every registered metric
    pub fn render(&self) -> Result<String, ControllerError> {
        Ok(TextEncoder::new().encode_to_string(&self.registry.gather())?)
    }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    match metrics.render() {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn health_handler() -> Json<Health> {
    Json(Health { status: "ok" })
}

pub fn router(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(health_handler))
        .with_state(metrics)
}

/// Serves `/metrics` and `/healthz` until `shutdown` flips to true.
pub async fn serve(
    addr: SocketAddr,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ControllerError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Serving metrics at {}", addr);

    axum::serve(listener, router(metrics))
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow_and_update() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_uses_prefix() {
        let metrics = Metrics::new().unwrap();
        metrics.count_outcome("updated");
        metrics.count_dispatch(Trigger::Resync);

        let body = metrics.render().unwrap();
        assert!(body.contains("source_ranges_enforcements_total{outcome=\"updated\"} 1"));
        assert!(body.contains("source_ranges_dispatches_total{trigger=\"resync\"} 1"));
        assert_eq!(metrics.dispatch_count(Trigger::Watch), 0);
    }

    #[test]
    fn test_registry_errors_are_metrics_errors() {
        let metrics = Metrics::new().unwrap();
        let duplicate = IntCounterVec::new(
            Opts::new("enforcements_total", "Enforcement attempts by outcome"),
            &["outcome"],
        )
        .unwrap();

        let err: ControllerError = metrics.registry.register(Box::new(duplicate)).unwrap_err().into();

        assert!(matches!(err, ControllerError::Metrics(prometheus::Error::AlreadyReg)));
    }
}
