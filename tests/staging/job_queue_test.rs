use crate::common::*;
use fleet_core::events::Event;
use fleet_core::models::JobData;
use fleet_core::storage::QueueProvider;
use serde_json::json;

fn job(id: &str) -> serde_json::Value {
    serde_json::to_value(JobData::update(id, json!({ "name": id }))).unwrap()
}

#[tokio::test]
async fn test_job_event_queues_job_and_site_marker() {
    let harness = StagingHarness::new(vec![]);
    let event = Event::new(job("app")).with_metadata("site", "edge-1");

    harness.manager.handle_job_event(&event).await.unwrap();

    assert_eq!(
        harness.queues.peek(harness.manager.site_job_queue()).await,
        Some(json!("edge-1"))
    );
    let jobs = harness.manager.get_batch_for_site("edge-1", 5).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, "app");
    assert_eq!(jobs[0].body["name"], json!("app"));
}

#[tokio::test]
async fn test_batch_pull_keeps_site_in_rotation() {
    let harness = StagingHarness::new(vec![]);

    let jobs = harness.manager.get_batch_for_site("edge-1", 5).await.unwrap();

    assert!(jobs.is_empty());
    assert_eq!(
        harness.queues.size(harness.manager.site_job_queue()).await,
        1
    );
}

#[tokio::test]
async fn test_batch_respects_count() {
    let harness = StagingHarness::new(vec![]);
    for id in ["a", "b", "c"] {
        harness.queues.enqueue("edge-1", job(id)).await;
    }

    let first = harness.manager.get_batch_for_site("edge-1", 2).await.unwrap();
    let rest = harness.manager.get_batch_for_site("edge-1", 2).await.unwrap();

    let ids = |jobs: &[JobData]| jobs.iter().map(|j| j.id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&first), vec!["a", "b"]);
    assert_eq!(ids(&rest), vec!["c"]);
}

#[tokio::test]
async fn test_malformed_jobs_are_requeued_not_dropped() {
    let harness = StagingHarness::new(vec![]);
    harness.queues.enqueue("edge-1", job("a")).await;
    harness.queues.enqueue("edge-1", json!("garbage")).await;
    harness.queues.enqueue("edge-1", job("b")).await;

    let jobs = harness.manager.get_batch_for_site("edge-1", 10).await.unwrap();

    assert_eq!(jobs.len(), 2);
    assert_eq!(harness.queues.size("edge-1").await, 1);
    assert_eq!(harness.queues.peek("edge-1").await, Some(json!("garbage")));

    let again = harness.manager.get_batch_for_site("edge-1", 10).await.unwrap();
    assert!(again.is_empty());
    assert_eq!(harness.queues.size("edge-1").await, 1);
}
