use crate::common::*;
use fleet_core::models::{CampaignSpec, StageSpec, State};
use serde_json::{json, Value};

fn multi_site_campaign(config: Value) -> CampaignSpec {
    CampaignSpec::new("rollout").with_first_stage("deploy").with_stage(
        "deploy",
        StageSpec::new(SCRIPTED)
            .with_config(config)
            .with_contexts("${{$input(sites)}}"),
    )
}

fn with_sites(harness: &EngineHarness, campaign: &CampaignSpec, sites: Value) -> fleet_core::ActivationData {
    let mut data = harness.start(campaign);
    data.inputs.insert("sites".to_string(), sites);
    data
}

#[tokio::test]
async fn test_outputs_are_namespaced_per_site() {
    let harness = EngineHarness::new();
    let campaign = multi_site_campaign(json!({}));
    let data = with_sites(&harness, &campaign, json!(["hq", "edge-1", "edge-2"]));

    let (status, next) = harness.engine.handle_trigger_event(&campaign, data).await;

    assert_eq!(status.status, State::Done);
    assert!(next.is_none());
    assert_eq!(status.outputs["site"], json!("hq"));
    assert_eq!(status.outputs["edge-1.site"], json!("edge-1"));
    assert_eq!(status.outputs["edge-2.site"], json!("edge-2"));
    assert_eq!(status.outputs["edge-1.__status"], json!(200));
    assert_eq!(harness.metrics.snapshot().site_executions, 3);
}

#[tokio::test]
async fn test_single_site_failure_fails_stage_without_short_circuit() {
    let harness = EngineHarness::new();
    let campaign = multi_site_campaign(json!({ "fail": ["edge-2"] }));
    let data = with_sites(&harness, &campaign, json!(["edge-1", "edge-2", "edge-3"]));

    let (status, _) = harness.engine.handle_trigger_event(&campaign, data).await;

    assert_eq!(status.status, State::InternalError);
    assert!(status.error_message.starts_with("edge-2: "));
    assert!(status.error_message.contains("edge-2 is unreachable"));
    assert_eq!(status.outputs["edge-1.site"], json!("edge-1"));
    assert_eq!(status.outputs["edge-3.site"], json!("edge-3"));
    assert_eq!(status.outputs["edge-2.__status"], json!(500));
    assert!(status.outputs.contains_key("edge-2.__error"));
    assert_eq!(harness.metrics.snapshot().site_failures, 1);
}

#[tokio::test]
async fn test_failures_are_reported_in_site_order() {
    let harness = EngineHarness::new();
    let campaign = multi_site_campaign(json!({ "fail": ["edge-b", "edge-a"] }));
    let data = with_sites(&harness, &campaign, json!(["edge-b", "edge-a"]));

    let (status, _) = harness.engine.handle_trigger_event(&campaign, data).await;

    let sites: Vec<&str> = status
        .error_message
        .split("; ")
        .filter_map(|failure| failure.split(':').next())
        .collect();
    assert_eq!(sites, vec!["edge-a", "edge-b"]);
}

#[tokio::test]
async fn test_reported_status_is_normalized() {
    let harness = EngineHarness::new();
    let campaign = multi_site_campaign(json!({ "status": "InternalError" }));
    let data = with_sites(&harness, &campaign, json!("edge-1"));

    let (status, _) = harness.engine.handle_trigger_event(&campaign, data).await;

    assert_eq!(status.status, State::InternalError);
    assert_eq!(status.outputs["edge-1.__status"], json!(500));
}

#[tokio::test]
async fn test_empty_site_list_is_bad_request() {
    let harness = EngineHarness::new();
    let campaign = multi_site_campaign(json!({}));
    let data = with_sites(&harness, &campaign, json!([]));

    let (status, _) = harness.engine.handle_trigger_event(&campaign, data).await;

    assert_eq!(status.status, State::BadRequest);
}
