use super::*;
use crate::channels::Channel;
use crate::error::Error;
use crate::platform::{MockPlatformApi, PlatformRun};
use convoy_store::{NewIncident, NewRun, RunStatus, SqliteStore};

struct Harness {
    registry: RunRegistry,
    timeline: IncidentTimeline,
    bus: EventBus,
}

async fn harness() -> Harness {
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let bus = EventBus::new(16);
    let registry = RunRegistry::new(store.clone());
    let timeline = IncidentTimeline::new(store, bus.clone());
    timeline
        .open(&NewIncident::new("Cold chain breach").with_id("inc-7"))
        .await
        .unwrap();
    registry
        .create(NewRun::new("run-42", "incident", "inc-7", "Find replacement truck"))
        .await
        .unwrap();
    Harness {
        registry,
        timeline,
        bus,
    }
}

impl Harness {
    fn reconciler(&self, platform: Option<MockPlatformApi>) -> Reconciler {
        Reconciler::new(
            self.registry.clone(),
            self.timeline.clone(),
            self.bus.clone(),
            platform.map(|p| Arc::new(p) as Arc<dyn PlatformApi>),
        )
    }
}

fn remote(status: &str) -> PlatformRun {
    PlatformRun {
        id: "run-42".to_string(),
        status: status.to_string(),
        output: None,
        error: None,
    }
}

#[tokio::test]
async fn test_unconfigured_platform_returns_run_unchanged() {
    let h = harness().await;
    let reconciler = h.reconciler(None);
    assert!(!reconciler.is_enabled());

    let run = reconciler.reconcile("run-42").await.unwrap();
    assert_eq!(run.status, RunStatus::Pending);
    assert!(run.metadata.last_sync_at.is_none());
    assert_eq!(reconciler.sweep(10).await, 0);
}

#[tokio::test]
async fn test_unknown_run() {
    let h = harness().await;
    let err = h.reconciler(None).reconcile("ghost").await.unwrap_err();
    assert!(matches!(err, Error::RunNotFound(_)));
}

#[tokio::test]
async fn test_platform_failure_degrades_to_local_state() {
    let h = harness().await;
    let mut platform = MockPlatformApi::new();
    platform
        .expect_run_status()
        .times(1)
        .returning(|_| Err(Error::UpstreamUnavailable("connection refused".into())));

    let run = h.reconciler(Some(platform)).reconcile("run-42").await.unwrap();
    assert_eq!(run.status, RunStatus::Pending);
}

#[tokio::test]
async fn test_terminal_run_is_not_polled() {
    let h = harness().await;
    h.registry
        .merge("run-42", Some(RunStatus::Completed), MetadataPatch::new())
        .await
        .unwrap();

    let mut platform = MockPlatformApi::new();
    platform.expect_run_status().times(0);

    let run = h.reconciler(Some(platform)).reconcile("run-42").await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_status_change_is_merged_narrated_and_published() {
    let h = harness().await;
    let mut sub = h.bus.subscribe(&[Channel::RunStatus]);
    let mut platform = MockPlatformApi::new();
    platform.expect_run_status().times(1).returning(|_| {
        let mut run = remote("COMPLETED");
        run.output = Some(json!({"carrier": "ACME"}));
        Ok(run)
    });

    let run = h.reconciler(Some(platform)).reconcile("run-42").await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.metadata.result, Some(json!({"carrier": "ACME"})));
    assert_eq!(run.metadata.platform_status.as_deref(), Some("COMPLETED"));
    assert!(run.metadata.last_sync_at.is_some());

    let msg = sub.recv().await.unwrap();
    assert_eq!(msg.payload["run"]["status"], "COMPLETED");
    assert_eq!(msg.payload["event"]["source"], "reconciler");

    let entries = h.timeline.entries("inc-7").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].message.contains("completed"));
}

#[tokio::test]
async fn test_unrecognized_status_only_touches_metadata() {
    let h = harness().await;
    let mut sub = h.bus.subscribe(&[Channel::RunStatus]);
    let mut platform = MockPlatformApi::new();
    platform
        .expect_run_status()
        .times(1)
        .returning(|_| Ok(remote("HIBERNATING")));

    let run = h.reconciler(Some(platform)).reconcile("run-42").await.unwrap();
    assert_eq!(run.status, RunStatus::Pending);
    assert_eq!(run.metadata.platform_status.as_deref(), Some("HIBERNATING"));

    sub.unsubscribe();
    assert!(sub.recv().await.is_none());
    assert!(h.timeline.entries("inc-7").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_new_output_without_status_change_is_published() {
    let h = harness().await;
    h.registry
        .merge("run-42", Some(RunStatus::Running), MetadataPatch::new())
        .await
        .unwrap();
    let mut sub = h.bus.subscribe(&[Channel::RunStatus]);
    let mut platform = MockPlatformApi::new();
    platform.expect_run_status().times(2).returning(|_| {
        let mut run = remote("EXECUTING");
        run.output = Some(json!({"eta": "14:00"}));
        Ok(run)
    });
    let reconciler = h.reconciler(Some(platform));

    let run = reconciler.reconcile("run-42").await.unwrap();
    assert_eq!(run.status, RunStatus::Running);
    let msg = tokio::time::timeout(Duration::from_secs(1), sub.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(msg.payload["run"]["metadata"]["result"]["eta"], "14:00");
    assert_eq!(msg.payload["event"]["platformStatus"], "EXECUTING");

    // same output again only refreshes the sync stamp
    reconciler.reconcile("run-42").await.unwrap();
    assert!(tokio::time::timeout(Duration::from_millis(50), sub.recv())
        .await
        .is_err());
    assert!(h.timeline.entries("inc-7").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sweep_refreshes_active_runs() {
    let h = harness().await;
    h.registry
        .create(NewRun::new("run-43", "shipment", "shp-1", "Track pallet"))
        .await
        .unwrap();

    let mut platform = MockPlatformApi::new();
    platform
        .expect_run_status()
        .times(2)
        .returning(|_| Ok(remote("EXECUTING")));

    let reconciler = h.reconciler(Some(platform));
    assert_eq!(reconciler.sweep(10).await, 2);
    assert_eq!(h.registry.get("run-43").await.unwrap().status, RunStatus::Running);
    assert!(h.registry.list_active(10).await.unwrap().len() == 2);
}

#[tokio::test]
async fn test_sweep_task_stops_on_shutdown() {
    let h = harness().await;
    let mut platform = MockPlatformApi::new();
    platform.expect_run_status().returning(|_| Ok(remote("RUNNING")));

    let token = CancellationToken::new();
    let handle = h
        .reconciler(Some(platform))
        .spawn_sweep(Duration::from_millis(10), 10, token.clone());
    tokio::time::sleep(Duration::from_millis(30)).await;
    token.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(h.registry.get("run-42").await.unwrap().status, RunStatus::Running);
}
