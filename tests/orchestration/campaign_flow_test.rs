use crate::common::*;
use fleet_core::constants::{providers, reserved};
use fleet_core::models::{CampaignSpec, StageSpec, State};
use serde_json::json;

#[tokio::test]
async fn test_counter_converges_upward() {
    let harness = EngineHarness::new();
    let campaign = counter_campaign(1, "${{$if($lt($output(test,foo), 5), test, '')}}");

    let status = harness.runner().run(&campaign, harness.start(&campaign)).await;

    assert_eq!(status.status, State::Done);
    assert!(!status.is_active);
    assert_eq!(status.outputs["foo"], json!(5));
    assert_eq!(harness.metrics.snapshot().stages_executed, 5);
}

#[tokio::test]
async fn test_counter_converges_downward() {
    let harness = EngineHarness::new();
    let campaign = counter_campaign(-10, "${{$if($gt($output(test,foo), -50), test, '')}}");

    let status = harness.runner().run(&campaign, harness.start(&campaign)).await;

    assert_eq!(status.status, State::Done);
    assert_eq!(status.outputs["foo"], json!(-50));
}

#[tokio::test]
async fn test_two_stage_cycle_carries_both_counters() {
    let harness = EngineHarness::new();
    let campaign = CampaignSpec::new("cycle")
        .self_driving(true)
        .with_first_stage("foo")
        .with_stage("foo", counter_stage("foo", "foo", 1, "bar"))
        .with_stage(
            "bar",
            counter_stage(
                "bar",
                "bar",
                1,
                "${{$if($lt($output(bar,bar), 5), foo, '')}}",
            ),
        );

    let mut current = harness.start(&campaign);
    let mut executed = Vec::new();
    let final_status = loop {
        executed.push(current.stage.clone());
        let (status, next) = harness.engine.handle_trigger_event(&campaign, current.clone()).await;
        match next {
            Some(next) => {
                assert_eq!(status.status, State::Running);
                assert_eq!(status.next_stage, next.stage);
                current = next;
            }
            None => break status,
        }
    };

    assert_eq!(executed.len(), 10);
    assert_eq!(executed.first().map(String::as_str), Some("foo"));
    assert_eq!(final_status.status, State::Done);
    assert_eq!(final_status.outputs["bar"], json!(5));
    assert_eq!(current.outputs["foo"]["foo"], json!(5));
    assert_eq!(current.triggering_stage, "foo");
}

#[tokio::test]
async fn test_non_self_driving_campaign_stops_after_one_stage() {
    let harness = EngineHarness::new();
    let campaign = counter_campaign(1, "test").self_driving(false);

    let (status, next) = harness
        .engine
        .handle_trigger_event(&campaign, harness.start(&campaign))
        .await;

    assert_eq!(status.status, State::Done);
    assert!(next.is_none());
    assert_eq!(status.outputs["foo"], json!(1));
}

#[tokio::test]
async fn test_failed_stage_stops_unless_next_handles_errors() {
    let failing = |handle_errors: bool| {
        CampaignSpec::new("contain")
            .self_driving(true)
            .with_first_stage("fail")
            .with_stage(
                "fail",
                StageSpec::new(SCRIPTED)
                    .with_config(json!({ "fail": ["hq"] }))
                    .with_selector("recover"),
            )
            .with_stage(
                "recover",
                StageSpec::new(SCRIPTED)
                    .with_input("value", "${{$output(fail,__status)}}")
                    .handle_errors(handle_errors),
            )
    };

    let harness = EngineHarness::new();
    let strict = failing(false);
    let status = harness.runner().run(&strict, harness.start(&strict)).await;
    assert_eq!(status.status, State::InternalError);
    assert_eq!(status.stage, "fail");
    assert!(status.error_message.contains("does not handle errors"));
    assert!(status.next_stage.is_empty());

    let tolerant = failing(true);
    let status = harness.runner().run(&tolerant, harness.start(&tolerant)).await;
    assert_eq!(status.status, State::Done);
    assert_eq!(status.stage, "recover");
    assert_eq!(status.outputs["value"], json!(500));
}

#[tokio::test]
async fn test_selector_naming_unknown_stage_is_bad_request() {
    let harness = EngineHarness::new();
    let campaign = counter_campaign(1, "nowhere");

    let status = harness.runner().run(&campaign, harness.start(&campaign)).await;

    assert_eq!(status.status, State::BadRequest);
}

#[tokio::test]
async fn test_runner_gives_up_on_endless_campaign() {
    let harness = EngineHarness::new();
    let campaign = counter_campaign(1, "test");

    let status = harness
        .runner()
        .with_max_iterations(3)
        .run(&campaign, harness.start(&campaign))
        .await;

    assert_eq!(status.status, State::InternalError);
    assert!(status.error_message.contains("exceeded 3"));
}

#[tokio::test]
async fn test_activation_event_rejects_stale_stage() {
    let harness = EngineHarness::new();
    let campaign = counter_campaign(1, "test")
        .with_stage("other", StageSpec::new(providers::COUNTER));

    let started = harness.start(&campaign);
    let (status, _) = harness.engine.handle_trigger_event(&campaign, started).await;
    assert_eq!(status.next_stage, "test");

    let stale = activation("counter", "other");
    let error = harness
        .engine
        .handle_activation_event(stale, &campaign, Some(&status))
        .unwrap_err();
    assert_eq!(error.state(), State::BadRequest);

    let expected = activation("counter", "test");
    let resolved = harness
        .engine
        .handle_activation_event(expected, &campaign, Some(&status))
        .unwrap();
    assert_eq!(resolved.provider, providers::COUNTER);
}

#[tokio::test]
async fn test_trigger_status_carries_reserved_identity() {
    let harness = EngineHarness::new();
    let campaign = counter_campaign(1, "");

    let mut data = harness.start(&campaign);
    data.namespace = String::new();
    let (done, _) = harness.engine.handle_trigger_event(&campaign, data).await;

    let mut missing = activation("counter", "missing");
    missing.namespace = "fleet".to_string();
    let (rejected, _) = harness.engine.handle_trigger_event(&campaign, missing).await;

    for (status, stage, namespace, code) in [
        (&done, "test", "default", 9996),
        (&rejected, "missing", "fleet", 400),
    ] {
        assert_eq!(status.outputs[reserved::CAMPAIGN], json!("counter"));
        assert_eq!(status.outputs[reserved::NAMESPACE], json!(namespace));
        assert_eq!(status.outputs[reserved::ACTIVATION], json!("counter-activation"));
        assert_eq!(status.outputs[reserved::ACTIVATION_GENERATION], json!("1"));
        assert_eq!(status.outputs[reserved::STAGE], json!(stage));
        assert_eq!(status.outputs[reserved::SITE], json!("hq"));
        assert_eq!(status.outputs[reserved::STATUS], json!(code));
    }
}
