//! Unit tests for the Service watcher (reconciliation pump)

#[cfg(test)]
mod tests {
    use crate::error::ControllerError;
    use crate::metrics::{Metrics, Trigger};
    use crate::reconciler::{Reconciler, SOURCE_RANGES_ANNOTATION};
    use crate::test_utils::*;
    use crate::watcher::Watcher;
    use cluster_client::{MockClusterClient, service_fixture};
    use futures::stream::{self, StreamExt};
    use k8s_openapi::api::core::v1::Service;
    use kube_runtime::watcher;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::watch;
    use tokio::task::JoinHandle;

    const RESYNC: Duration = Duration::from_secs(30);

    type Item = Result<watcher::Event<Service>, watcher::Error>;

    /// Starts a pump over `events`; the stream stays open afterwards like a real watch.
    fn start_pump(
        mock: &MockClusterClient,
        events: Vec<watcher::Event<Service>>,
    ) -> (Arc<Metrics>, watch::Sender<bool>, JoinHandle<Result<(), ControllerError>>) {
        let metrics = Arc::new(Metrics::new().unwrap());
        let reconciler = Arc::new(Reconciler::new(Arc::new(mock.clone()), metrics.clone()));
        let pump = Watcher::new(reconciler, metrics.clone(), RESYNC);
        let (tx, rx) = watch::channel(false);

        let stream = stream::iter(events.into_iter().map(Ok::<_, watcher::Error>)).chain(stream::pending::<Item>());
        let handle = tokio::spawn(async move { pump.run(stream, rx).await });
        (metrics, tx, handle)
    }

    /// A managed Service whose ranges already match the ConfigMap
    fn in_sync_service(mock: &MockClusterClient, name: &str) -> Service {
        mock.add_service(managed_service(name, Some(&["10.0.0.0/8"])))
    }

    fn setup() -> MockClusterClient {
        let mock = MockClusterClient::new();
        mock.add_config_map(TEST_NAMESPACE, TEST_CONFIG_MAP, [("k", "10.0.0.0/8")]);
        mock
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_list_dispatches_each_service_once() {
        let mock = setup();
        let a = in_sync_service(&mock, "a");
        let b = in_sync_service(&mock, "b");
        let (metrics, tx, handle) = start_pump(&mock, vec![
            watcher::Event::Init,
            watcher::Event::InitApply(a),
            watcher::Event::InitApply(b),
            watcher::Event::InitDone,
        ]);

        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(mock.config_map_reads(), 2);
        assert_eq!(metrics.dispatch_count(Trigger::Watch), 2);
        assert_eq!(metrics.dispatch_count(Trigger::Resync), 0);
        assert!(mock.events().is_empty());

        tx.send(true).unwrap();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resync_redispatches_known_services() {
        let mock = setup();
        let a = in_sync_service(&mock, "a");
        let b = in_sync_service(&mock, "b");
        let (metrics, tx, handle) = start_pump(&mock, vec![
            watcher::Event::Init,
            watcher::Event::InitApply(a),
            watcher::Event::InitApply(b),
            watcher::Event::InitDone,
        ]);

        tokio::time::sleep(RESYNC + Duration::from_secs(1)).await;
        assert_eq!(metrics.dispatch_count(Trigger::Resync), 2);
        assert_eq!(mock.config_map_reads(), 4);

        tokio::time::sleep(RESYNC).await;
        assert_eq!(metrics.dispatch_count(Trigger::Resync), 4);
        assert_eq!(metrics.outcome_count("in_sync"), 6);

        tx.send(true).unwrap();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_is_not_dispatched_and_leaves_resync() {
        let mock = setup();
        let a = in_sync_service(&mock, "a");
        let b = in_sync_service(&mock, "b");
        let (metrics, tx, handle) = start_pump(&mock, vec![
            watcher::Event::Init,
            watcher::Event::InitApply(a),
            watcher::Event::InitApply(b.clone()),
            watcher::Event::InitDone,
            watcher::Event::Delete(b),
        ]);

        tokio::time::sleep(RESYNC + Duration::from_secs(1)).await;

        assert_eq!(metrics.dispatch_count(Trigger::Watch), 2);
        assert_eq!(metrics.dispatch_count(Trigger::Resync), 1);
        assert_eq!(mock.config_map_reads(), 3);

        tx.send(true).unwrap();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_modified_service_is_dispatched() {
        let mock = setup();
        let web = mock.add_service(managed_service("web", None));
        let (metrics, tx, handle) = start_pump(&mock, vec![
            watcher::Event::Init,
            watcher::Event::InitDone,
            watcher::Event::Apply(web),
        ]);

        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(metrics.dispatch_count(Trigger::Watch), 1);
        assert_eq!(mock.source_ranges(TEST_NAMESPACE, "web"), Some(vec!["10.0.0.0/8".to_string()]));
        assert_eq!(mock.events().len(), 1);

        tx.send(true).unwrap();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_enforcement_error_does_not_stop_pump() {
        let mock = setup();
        let broken = mock.add_service(service_fixture(
            TEST_NAMESPACE,
            "broken",
            &[(SOURCE_RANGES_ANNOTATION, "missing")],
            None,
        ));
        let healthy = in_sync_service(&mock, "healthy");
        let (metrics, tx, handle) = start_pump(&mock, vec![
            watcher::Event::Init,
            watcher::Event::InitApply(broken),
            watcher::Event::InitApply(healthy.clone()),
            watcher::Event::InitDone,
            watcher::Event::Apply(healthy),
        ]);

        tokio::time::sleep(RESYNC + Duration::from_secs(1)).await;

        // 3 watch dispatches, then both Services again on resync
        assert_eq!(metrics.outcome_count("lookup_failed"), 2);
        assert_eq!(metrics.outcome_count("in_sync"), 3);
        assert_eq!(mock.events().len(), 2);
        assert!(!handle.is_finished());

        tx.send(true).unwrap();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_config_map_deleted_between_resyncs() {
        let mock = setup();
        let web = in_sync_service(&mock, "web");
        let (metrics, tx, handle) = start_pump(&mock, vec![
            watcher::Event::Init,
            watcher::Event::InitApply(web),
            watcher::Event::InitDone,
        ]);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(metrics.outcome_count("in_sync"), 1);

        mock.remove_config_map(TEST_NAMESPACE, TEST_CONFIG_MAP);
        tokio::time::sleep(RESYNC).await;

        assert_eq!(metrics.dispatch_count(Trigger::Resync), 1);
        assert_eq!(metrics.outcome_count("lookup_failed"), 1);
        assert_eq!(mock.service_updates(), 0);
        assert_eq!(mock.source_ranges(TEST_NAMESPACE, "web"), Some(vec!["10.0.0.0/8".to_string()]));
        assert_eq!(mock.event_strings(), vec![
            "Warning SourceRangesEnforcementFailed could not read ConfigMap test-config: configmaps \"test-config\" not found".to_string(),
        ]);
        assert!(!handle.is_finished());

        tx.send(true).unwrap();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_before_resync() {
        let mock = setup();
        let a = in_sync_service(&mock, "a");
        let (metrics, tx, handle) = start_pump(&mock, vec![
            watcher::Event::Init,
            watcher::Event::InitApply(a),
            watcher::Event::InitDone,
        ]);

        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.send(true).unwrap();
        assert!(handle.await.unwrap().is_ok());

        tokio::time::sleep(RESYNC * 2).await;
        assert_eq!(metrics.dispatch_count(Trigger::Resync), 0);
        assert_eq!(mock.config_map_reads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_errors_are_skipped() {
        let mock = setup();
        let a = in_sync_service(&mock, "a");
        let metrics = Arc::new(Metrics::new().unwrap());
        let reconciler = Arc::new(Reconciler::new(Arc::new(mock.clone()), metrics.clone()));
        let pump = Watcher::new(reconciler, metrics.clone(), RESYNC);
        let (_tx, rx) = watch::channel(false);

        let items: Vec<Item> = vec![
            Ok(watcher::Event::Init),
            Err(watcher::Error::NoResourceVersion),
            Ok(watcher::Event::InitApply(a)),
            Ok(watcher::Event::InitDone),
        ];
        let result = pump.run(stream::iter(items), rx).await;

        // The finite stream ends, which a real watch never does
        assert!(matches!(result, Err(ControllerError::Watch(_))));
        assert_eq!(metrics.dispatch_count(Trigger::Watch), 1);
    }
}
