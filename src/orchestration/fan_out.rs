//! # Site Fan-out
//!
//! Runs one stage on every resolved site concurrently and folds the per-site
//! results into a single output map.
//!
//! Each site gets a private copy of the traced inputs with `__site`
//! overridden, traced a second time so site-specific expressions resolve.
//! Workers run on a [`JoinSet`]; the fan-out waits for all of them before
//! aggregating, and a worker that panics is reported as that site's failure
//! instead of disappearing.
//!
//! Aggregation is order independent. The local site's keys land unprefixed;
//! every other site's keys land under `"{site}."`, with `{site}.__status`
//! defaulting to OK.

use crate::constants::{feeds, reserved};
use crate::error::{OrchestrationError, OrchestrationResult};
use crate::events::{Event, EventBus};
use crate::expression::{ContextTracer, EvaluationContext, ExpressionEvaluator};
use crate::metrics::EngineMetrics;
use crate::models::{ActivationData, State, TaskResult};
use crate::providers::StageProvider;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

/// What one site worker produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteRun {
    pub result: TaskResult,
    pub pause_requested: bool,
    /// Execution was deferred to the schedule feed instead of run locally
    pub scheduled: bool,
}

/// Merged outcome of a fan-out
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FanOutResult {
    pub outputs: HashMap<String, Value>,
    /// `"{site}: {error}"` per failed site, ordered by site
    pub failures: Vec<String>,
    /// Sites whose provider asked for asynchronous completion
    pub paused_sites: BTreeSet<String>,
    /// Sites whose execution was handed to the schedule feed
    pub scheduled_sites: BTreeSet<String>,
}

impl FanOutResult {
    pub fn failed(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Sticky: any site pausing or being scheduled pauses the stage
    pub fn pause_requested(&self) -> bool {
        !(self.paused_sites.is_empty() && self.scheduled_sites.is_empty())
    }

    pub fn error_message(&self) -> String {
        self.failures.join("; ")
    }
}

pub struct SiteFanOut {
    evaluator: Arc<dyn ExpressionEvaluator>,
    event_bus: Arc<dyn EventBus>,
    metrics: Arc<EngineMetrics>,
    local_site: String,
    max_trace_depth: usize,
}

impl SiteFanOut {
    pub fn new(
        evaluator: Arc<dyn ExpressionEvaluator>,
        event_bus: Arc<dyn EventBus>,
        metrics: Arc<EngineMetrics>,
        local_site: impl Into<String>,
        max_trace_depth: usize,
    ) -> Self {
        Self {
            evaluator,
            event_bus,
            metrics,
            local_site: local_site.into(),
            max_trace_depth,
        }
    }

    pub fn local_site(&self) -> &str {
        &self.local_site
    }

    /// Run `provider` on every site and aggregate the results
    pub async fn execute(
        &self,
        data: &ActivationData,
        sites: &[String],
        inputs: &HashMap<String, Value>,
        provider: Arc<dyn StageProvider>,
    ) -> FanOutResult {
        let mut workers = JoinSet::new();
        let mut site_by_task = HashMap::with_capacity(sites.len());

        for site in sites {
            let worker = SiteWorker {
                site: site.clone(),
                inputs: inputs.clone(),
                data: data.clone(),
                provider: provider.clone(),
                evaluator: self.evaluator.clone(),
                event_bus: self.event_bus.clone(),
                max_trace_depth: self.max_trace_depth,
            };
            let handle = workers.spawn(worker.run());
            site_by_task.insert(handle.id(), site.clone());
        }

        let mut runs = Vec::with_capacity(sites.len());
        while let Some(joined) = workers.join_next_with_id().await {
            match joined {
                Ok((_, run)) => runs.push(run),
                Err(join_error) => {
                    let site = site_by_task.get(&join_error.id()).cloned().unwrap_or_default();
                    error!(site = %site, error = %join_error, "Site worker did not complete");
                    runs.push(SiteRun {
                        result: TaskResult::failure(
                            site,
                            OrchestrationError::InternalError(format!(
                                "site worker did not complete: {join_error}"
                            )),
                        ),
                        ..Default::default()
                    });
                }
            }
        }

        self.aggregate(runs)
    }

    /// Fold site runs into one result; sorting first keeps failure messages stable
    pub fn aggregate(&self, mut runs: Vec<SiteRun>) -> FanOutResult {
        runs.sort_by(|a, b| a.result.site.cmp(&b.result.site));
        let mut merged = FanOutResult::default();

        for mut run in runs {
            let site = run.result.site.clone();
            if run.scheduled {
                merged.scheduled_sites.insert(site.clone());
            } else if run.pause_requested {
                merged.paused_sites.insert(site.clone());
            }

            let failure = run.result.effective_error();
            self.metrics.record_site_execution(failure.is_some());
            if let Some(error) = failure {
                let label = if site == self.local_site { "" } else { site.as_str() };
                let message = format!("{label}: {error}");
                warn!(site = %site, error = %error, "Site execution failed");
                run.result.mark_failed(&message);
                merged.failures.push(message);
            }

            merge_site_outputs(&mut merged.outputs, &site, &self.local_site, &run.result.outputs);
        }

        merged
    }
}

/// Copy a site's outputs into `target`: as-is for the local site, under a
/// `"{site}."` prefix (plus a defaulted `__status`) for any other site
pub(crate) fn merge_site_outputs(
    target: &mut HashMap<String, Value>,
    site: &str,
    local_site: &str,
    outputs: &HashMap<String, Value>,
) {
    if site == local_site {
        target.extend(outputs.iter().map(|(k, v)| (k.clone(), v.clone())));
        return;
    }

    for (key, value) in outputs {
        target.insert(format!("{site}.{key}"), value.clone());
    }
    target
        .entry(format!("{site}.{}", reserved::STATUS))
        .or_insert_with(|| Value::from(State::Ok));
}

struct SiteWorker {
    site: String,
    inputs: HashMap<String, Value>,
    data: ActivationData,
    provider: Arc<dyn StageProvider>,
    evaluator: Arc<dyn ExpressionEvaluator>,
    event_bus: Arc<dyn EventBus>,
    max_trace_depth: usize,
}

impl SiteWorker {
    async fn run(self) -> SiteRun {
        let site = self.site.clone();
        match self.execute().await {
            Ok(run) => run,
            Err(error) => SiteRun {
                result: TaskResult::failure(site, error),
                ..Default::default()
            },
        }
    }

    async fn execute(mut self) -> OrchestrationResult<SiteRun> {
        self.inputs
            .insert(reserved::SITE.to_string(), Value::String(self.site.clone()));
        let ctx = EvaluationContext::new(self.inputs.clone(), self.data.outputs.clone());
        let tracer = ContextTracer::new(self.evaluator.as_ref(), self.max_trace_depth);
        let inputs = tracer.trace_map(&self.inputs, &ctx)?;

        if self.data.schedule.is_some() && !self.provider.is_remote_proxy() {
            let mut deferred = self.data.clone();
            deferred.inputs = inputs;
            let event = Event::new(serde_json::to_value(&deferred)?)
                .with_metadata("site", self.site.clone())
                .with_metadata("stage", deferred.stage.clone());
            self.event_bus.publish(feeds::SCHEDULE, event).await?;
            debug!(site = %self.site, stage = %self.data.stage, "Stage execution scheduled");
            return Ok(SiteRun {
                result: TaskResult::success(self.site, HashMap::new()),
                pause_requested: true,
                scheduled: true,
            });
        }

        let outcome = self.provider.process(&inputs).await?;
        Ok(SiteRun {
            result: TaskResult::success(self.site, outcome.outputs),
            pause_requested: outcome.pause_requested,
            scheduled: false,
        })
    }
}
