use super::*;
use crate::error::Error;
use convoy_store::{LogLevel, NewRun, RunLogRecord, RunStatus, SqliteStore};
use serde_json::json;
use std::sync::Arc;

async fn registry() -> RunRegistry {
    let store = SqliteStore::in_memory().await.unwrap();
    RunRegistry::new(Arc::new(store))
}

async fn registry_with_run(run_id: &str) -> RunRegistry {
    let registry = registry().await;
    registry
        .create(NewRun::new(run_id, "incident", "inc-7", "Reroute shipment"))
        .await
        .unwrap();
    registry
}

#[test]
fn test_normalize_status_table() {
    assert_eq!(normalize_status("QUEUED"), Some(RunStatus::Pending));
    assert_eq!(normalize_status("executing"), Some(RunStatus::Running));
    assert_eq!(normalize_status("in-progress"), Some(RunStatus::Running));
    assert_eq!(normalize_status(" Completed "), Some(RunStatus::Completed));
    assert_eq!(normalize_status("SYSTEM_FAILURE"), Some(RunStatus::Failed));
    assert_eq!(normalize_status("timed out"), Some(RunStatus::Failed));
    assert_eq!(normalize_status("CANCELLED"), Some(RunStatus::Canceled));
    assert_eq!(normalize_status("HIBERNATING"), None);
    assert_eq!(normalize_status(""), None);
}

#[tokio::test]
async fn test_create_duplicate_rejected() {
    let registry = registry_with_run("run-1").await;
    let err = registry
        .create(NewRun::new("run-1", "incident", "inc-7", "Again"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateRun(_)));
}

#[tokio::test]
async fn test_merge_unknown_run() {
    let registry = registry().await;
    let err = registry
        .merge("ghost", Some(RunStatus::Running), MetadataPatch::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RunNotFound(_)));
    assert!(registry.list(None, None, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_merge_moves_live_run() {
    let registry = registry_with_run("run-1").await;

    let outcome = registry
        .merge("run-1", Some(RunStatus::Running), MetadataPatch::new())
        .await
        .unwrap();
    assert!(outcome.status_changed);
    assert_eq!(outcome.previous_status, RunStatus::Pending);
    assert_eq!(outcome.run.status, RunStatus::Running);
    assert_eq!(registry.get("run-1").await.unwrap().status, RunStatus::Running);
}

#[tokio::test]
async fn test_terminal_status_is_sticky() {
    let registry = registry_with_run("R1").await;
    registry
        .merge(
            "R1",
            Some(RunStatus::Completed),
            MetadataPatch::new().result(Some(json!("ok"))),
        )
        .await
        .unwrap();

    let outcome = registry
        .merge(
            "R1",
            Some(RunStatus::Failed),
            MetadataPatch::new()
                .error(Some(json!("late failure")))
                .result(Some(json!("rewritten")))
                .log(RunLogRecord::new("late webhook", LogLevel::Error)),
        )
        .await
        .unwrap();

    assert!(!outcome.status_changed);
    assert!(outcome.status_ignored);
    assert_eq!(outcome.logs_appended, 1);

    let run = registry.get("R1").await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.metadata.result, Some(json!("ok")));
    // empty slot is still filled for forensics
    assert_eq!(run.metadata.error, Some(json!("late failure")));
    assert_eq!(run.metadata.logs.len(), 1);
}

#[tokio::test]
async fn test_none_status_keeps_current() {
    let registry = registry_with_run("run-1").await;
    registry
        .merge("run-1", Some(RunStatus::Running), MetadataPatch::new())
        .await
        .unwrap();

    let outcome = registry
        .merge(
            "run-1",
            None,
            MetadataPatch::new().log(RunLogRecord::new("still working", LogLevel::Info)),
        )
        .await
        .unwrap();
    assert!(!outcome.status_changed);
    assert_eq!(outcome.run.status, RunStatus::Running);
    assert!(outcome.changed);
    assert!(outcome.content_changed);
}

#[tokio::test]
async fn test_sync_bookkeeping_is_not_content() {
    let registry = registry_with_run("run-1").await;
    let synced = registry
        .merge(
            "run-1",
            None,
            MetadataPatch::new().synced(chrono::Utc::now(), "QUEUED"),
        )
        .await
        .unwrap();
    assert!(synced.changed);
    assert!(!synced.content_changed);

    let with_output = registry
        .merge(
            "run-1",
            None,
            MetadataPatch::new()
                .synced(chrono::Utc::now(), "QUEUED")
                .result(Some(json!({"eta": "14:00"}))),
        )
        .await
        .unwrap();
    assert!(!with_output.status_changed);
    assert!(with_output.content_changed);
}

#[tokio::test]
async fn test_duplicate_delivery_is_idempotent() {
    let registry = registry_with_run("run-1").await;
    let patch = MetadataPatch::new().log(
        RunLogRecord::new("dialing supplier", LogLevel::Info)
            .with_data(json!({"attempt": 1}))
            .reported_at(Some("2024-05-01T10:00:00Z".to_string())),
    );

    let first = registry
        .merge("run-1", Some(RunStatus::Running), patch.clone())
        .await
        .unwrap();
    let second = registry
        .merge("run-1", Some(RunStatus::Running), patch)
        .await
        .unwrap();

    assert!(first.changed);
    assert!(!second.changed);
    assert_eq!(second.logs_appended, 0);

    let run = registry.get("run-1").await.unwrap();
    assert_eq!(run.metadata.logs.len(), 1);
    assert_eq!(run.version, first.run.version);
}

#[tokio::test]
async fn test_concurrent_merges_lose_nothing() {
    let registry = registry_with_run("run-1").await;

    let mut handles = Vec::new();
    for i in 0..12 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            let status = (i == 5).then_some(RunStatus::Completed);
            registry
                .merge(
                    "run-1",
                    status,
                    MetadataPatch::new().log(RunLogRecord::new(format!("step {i}"), LogLevel::Info)),
                )
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let run = registry.get("run-1").await.unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.metadata.logs.len(), 12);
    assert_eq!(run.version, 12);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_burst_of_log_merges_on_file_store() {
    let db_path = std::env::temp_dir().join(format!("convoy-merge-{}.db", uuid::Uuid::new_v4()));
    let store = SqliteStore::from_path(&db_path).await.unwrap();
    let registry = RunRegistry::new(Arc::new(store));
    registry
        .create(NewRun::new("run-1", "incident", "inc-7", "Reroute shipment"))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..64 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            registry
                .merge(
                    "run-1",
                    None,
                    MetadataPatch::new().log(RunLogRecord::new(format!("step {i}"), LogLevel::Info)),
                )
                .await
        }));
    }
    let mut failed = 0;
    for handle in handles {
        if handle.await.unwrap().is_err() {
            failed += 1;
        }
    }

    let run = registry.get("run-1").await.unwrap();
    let _ = std::fs::remove_file(&db_path);
    assert_eq!(failed, 0);
    assert_eq!(run.metadata.logs.len(), 64);
    assert_eq!(run.version, 64);
}

#[tokio::test]
async fn test_list_newest_first_and_clear() {
    let registry = registry().await;
    for id in ["a", "b", "c"] {
        registry
            .create(NewRun::new(id, "shipment", "shp-1", id))
            .await
            .unwrap();
    }
    registry
        .create(NewRun::new("d", "incident", "inc-1", "d"))
        .await
        .unwrap();

    let runs = registry.list(Some("shipment"), Some("shp-1"), 50).await.unwrap();
    let ids: Vec<_> = runs.iter().map(|r| r.run_id.as_str()).collect();
    assert_eq!(ids, vec!["c", "b", "a"]);

    assert_eq!(registry.clear().await.unwrap(), 4);
    assert!(registry.list(None, None, 50).await.unwrap().is_empty());
}
