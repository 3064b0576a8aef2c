use crate::common::*;
use chrono::{Duration, Utc};
use fleet_core::constants::{feeds, providers, reserved};
use fleet_core::events::EventBus;
use fleet_core::models::{ActivationData, StageSchedule, State};
use serde_json::json;
use std::collections::HashMap;

fn direct(provider: &str) -> ActivationData {
    ActivationData {
        stage: "deploy".to_string(),
        provider: provider.to_string(),
        ..activation("direct", "deploy")
    }
}

#[tokio::test]
async fn test_direct_trigger_runs_provider_once() {
    let harness = EngineHarness::new();
    let data = ActivationData {
        inputs: HashMap::from([("foo".to_string(), json!(2))]),
        ..direct(providers::COUNTER)
    };

    let status = harness.engine.handle_direct_trigger_event(data).await;

    assert_eq!(status.status, State::Done);
    assert!(!status.is_active);
    assert_eq!(status.outputs["foo"], json!(2));
    assert_eq!(status.outputs[reserved::SITE], json!("hq"));
    assert_eq!(status.outputs[reserved::CAMPAIGN], json!("direct"));
    assert_eq!(status.outputs[reserved::STATUS], json!(9996));
}

#[tokio::test]
async fn test_direct_trigger_with_schedule_is_delayed() {
    let harness = EngineHarness::new();
    let mut scheduled = harness.bus.subscribe(feeds::SCHEDULE);
    let data = ActivationData {
        schedule: Some(StageSchedule::at(Utc::now() + Duration::minutes(5))),
        ..direct(SCRIPTED)
    };

    let status = harness.engine.handle_direct_trigger_event(data).await;

    assert_eq!(status.status, State::Delayed);
    assert_eq!(status.outputs[reserved::STATUS], json!(9997));
    let event = scheduled.try_recv().unwrap();
    assert_eq!(event.metadata["stage"], "deploy");
}

#[tokio::test]
async fn test_direct_trigger_failure_is_reported_in_outputs() {
    let harness = EngineHarness::new();
    let data = ActivationData {
        config: json!({ "fail": ["hq"] }),
        ..direct(SCRIPTED)
    };

    let status = harness.engine.handle_direct_trigger_event(data).await;

    assert_eq!(status.status, State::InternalError);
    assert_eq!(status.outputs[reserved::STATUS], json!(500));
    assert!(status.outputs[reserved::ERROR]
        .as_str()
        .is_some_and(|e| e.contains("hq is unreachable")));
    assert!(!status.error_message.is_empty());
}

#[tokio::test]
async fn test_direct_trigger_unknown_provider_is_internal_error() {
    let harness = EngineHarness::new();

    let status = harness
        .engine
        .handle_direct_trigger_event(direct("providers.stage.missing"))
        .await;

    assert_eq!(status.status, State::InternalError);
    assert_eq!(status.outputs[reserved::STATUS], json!(500));
}
