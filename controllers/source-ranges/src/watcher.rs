//! Kubernetes resource watchers.
//!
//! This module runs the Service reconciliation pump: a resilient list+watch
//! over Services feeding a local reflector store, plus a resync tick that
//! re-dispatches every known Service on a fixed period.
//!
//! Dispatch is strictly serial. One enforcement finishes before the next
//! event or tick is looked at, so two enforcements of the same Service can
//! never overlap, and a stop request is only honoured between dispatches.

use crate::error::ControllerError;
use crate::metrics::{Metrics, Trigger};
use crate::reconciler::Reconciler;
use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::Service;
use kube::{Api, ResourceExt};
use kube_runtime::{WatchStreamExt, reflector, watcher};
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Watches Services and hands them to the reconciler.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    metrics: Arc<Metrics>,
    resync_period: Duration,
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(reconciler: Arc<Reconciler>, metrics: Arc<Metrics>, resync_period: Duration) -> Self {
        Self {
            reconciler,
            metrics,
            resync_period,
        }
    }

    /// Starts watching Service resources through `api` until `shutdown` flips to true.
    ///
    /// Watch failures are retried with kube-runtime's default backoff.
    pub async fn watch_services(
        &self,
        api: Api<Service>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), ControllerError> {
        info!("Starting Service watcher (resync every {:?})", self.resync_period);
        let stream = watcher(api, watcher::Config::default()).default_backoff();
        self.run(stream, shutdown).await
    }

    /// Drives the pump over an arbitrary Service event stream.
    pub async fn run<S>(&self, stream: S, mut shutdown: watch::Receiver<bool>) -> Result<(), ControllerError>
    where
        S: Stream<Item = Result<watcher::Event<Service>, watcher::Error>>,
    {
        let (store, mut writer) = reflector::store::<Service>();
        let mut stream = pin!(stream);
        let mut resync = tokio::time::interval_at(Instant::now() + self.resync_period, self.resync_period);
        resync.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    // A dropped sender counts as a stop request
                    if changed.is_err() || *shutdown.borrow_and_update() {
                        info!("Service watcher shutting down");
                        return Ok(());
                    }
                }

                _ = resync.tick() => {
                    let services = store.state();
                    debug!("Resyncing {} Services", services.len());
                    for service in services {
                        if *shutdown.borrow() {
                            break;
                        }
                        self.dispatch(&service, Trigger::Resync).await;
                    }
                }

                next = stream.next() => {
                    let Some(result) = next else {
                        return Err(ControllerError::Watch("Service watch stream ended".to_string()));
                    };
                    let event = match result {
                        Ok(event) => event,
                        Err(e) => {
                            warn!("Service watch error (will retry): {}", e);
                            continue;
                        }
                    };
                    writer.apply_watcher_event(&event);

                    match event {
                        watcher::Event::Apply(service) | watcher::Event::InitApply(service) => {
                            self.dispatch(&service, Trigger::Watch).await;
                        }
                        watcher::Event::Delete(service) => {
                            debug!("Service deleted: {}/{}", service.namespace().unwrap_or_default(), service.name_any());
                        }
                        watcher::Event::Init => {
                            debug!("Service watcher initialized");
                        }
                        watcher::Event::InitDone => {
                            info!("Service watcher initialization complete ({} Services)", store.state().len());
                        }
                    }
                }
            }
        }
    }

    async fn dispatch(&self, service: &Service, trigger: Trigger) {
        self.metrics.count_dispatch(trigger);

        match self.reconciler.enforce_source_ranges(service).await {
            Ok(outcome) => {
                debug!(
                    "Service {}/{} enforced ({:?}): {:?}",
                    service.namespace().unwrap_or_default(),
                    service.name_any(),
                    trigger,
                    outcome
                );
            }
            Err(e) => {
                error!(
                    "Failed to enforce source ranges on Service {}/{}: {}",
                    service.namespace().unwrap_or_default(),
                    service.name_any(),
                    e
                );
            }
        }
    }
}
