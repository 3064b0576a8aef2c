use crate::common::*;
use fleet_core::models::{JobAction, JobData};
use fleet_core::storage::{QueueProvider, StateCollection, StateStore};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[tokio::test]
async fn test_each_site_receives_every_catalog_once() {
    let harness = StagingHarness::new(vec![catalog("app", "v1"), catalog("policy", "v1")]);
    let queue = harness.manager.site_job_queue().to_string();
    harness.queues.enqueue(&queue, json!("edge-1")).await;
    harness.queues.enqueue(&queue, json!("edge-2")).await;

    let first = harness.manager.poll().await.unwrap();
    let second = harness.manager.poll().await.unwrap();
    let idle = harness.manager.poll().await.unwrap();

    assert_eq!(first.site.as_deref(), Some("edge-1"));
    assert_eq!(first.enqueued, 2);
    assert_eq!(second.site.as_deref(), Some("edge-2"));
    assert_eq!(second.enqueued, 2);
    assert_eq!(idle.site, None);
    assert_eq!(harness.queues.size("edge-1").await, 2);
    assert_eq!(harness.queues.size("edge-2").await, 2);

    harness.queues.enqueue(&queue, json!("edge-1")).await;
    let repeat = harness.manager.poll().await.unwrap();
    assert_eq!(repeat.enqueued, 0);
    assert_eq!(repeat.skipped, 2);
    assert_eq!(harness.queues.size("edge-1").await, 2);

    let snapshot = harness.metrics.snapshot();
    assert_eq!(snapshot.staging_jobs_enqueued, 4);
    assert_eq!(snapshot.staging_skipped, 2);
}

#[tokio::test]
async fn test_propagated_etag_is_cached_per_site_and_catalog() {
    let harness = StagingHarness::new(vec![catalog("app", "v7")]);
    harness
        .queues
        .enqueue(harness.manager.site_job_queue(), json!("edge-1"))
        .await;

    harness.manager.poll().await.unwrap();

    let entry = harness
        .cache
        .get(StateCollection::STAGING_CACHE, "default", "edge-1-app")
        .await
        .unwrap();
    assert_eq!(entry.body, json!("v7"));
}

#[tokio::test]
async fn test_changed_catalog_is_enqueued_as_update_job() {
    let harness = StagingHarness::new(vec![catalog("app", "v1")]);
    let queue = harness.manager.site_job_queue().to_string();
    harness.queues.enqueue(&queue, json!("edge-1")).await;
    harness.manager.poll().await.unwrap();

    harness.catalogs.set_catalogs(vec![catalog("app", "v2")]);
    harness.queues.enqueue(&queue, json!("edge-1")).await;
    let report = harness.manager.poll().await.unwrap();
    assert_eq!(report.enqueued, 1);

    let jobs = harness.manager.get_batch_for_site("edge-1", 10).await.unwrap();
    assert_eq!(jobs.len(), 2);
    assert!(jobs.iter().all(|job| job.id == "app" && job.action == JobAction::Update));
    assert_eq!(jobs[0].body["etag"], json!("v1"));
    assert_eq!(jobs[1].body["etag"], json!("v2"));
}

#[tokio::test]
async fn test_failed_fetch_retries_site_on_next_tick() {
    let harness = StagingHarness::new(vec![catalog("app", "v1")]);
    harness.catalogs.fail_with("catalog api unavailable");
    harness
        .queues
        .enqueue(harness.manager.site_job_queue(), json!("edge-1"))
        .await;

    assert!(harness.manager.poll().await.is_err());
    assert_eq!(harness.queues.size("edge-1").await, 0);

    harness.catalogs.set_catalogs(vec![catalog("app", "v1")]);
    let report = harness.manager.poll().await.unwrap();
    assert_eq!(report.site.as_deref(), Some("edge-1"));
    assert_eq!(report.enqueued, 1);
}

#[tokio::test]
async fn test_malformed_site_marker_is_dropped() {
    let harness = StagingHarness::new(vec![catalog("app", "v1")]);
    let queue = harness.manager.site_job_queue().to_string();
    harness.queues.enqueue(&queue, json!({ "site": "edge-1" })).await;

    let report = harness.manager.poll().await.unwrap();

    assert_eq!(report.site, None);
    assert_eq!(harness.queues.size(&queue).await, 0);
}

#[tokio::test]
async fn test_poller_propagates_until_shutdown() {
    let harness = StagingHarness::new(vec![catalog("app", "v1")]);
    harness
        .queues
        .enqueue(harness.manager.site_job_queue(), json!("edge-1"))
        .await;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let poller = Arc::clone(&harness.manager).spawn_poller(Duration::from_millis(5), shutdown_rx);

    tokio::time::timeout(Duration::from_secs(5), async {
        while harness.queues.size("edge-1").await == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("poller should stage the catalog");

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), poller)
        .await
        .expect("poller should stop after shutdown")
        .unwrap();

    let job: JobData = serde_json::from_value(harness.queues.peek("edge-1").await.unwrap()).unwrap();
    assert_eq!(job.id, "app");
}
