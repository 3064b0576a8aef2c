//! # Stage Engine
//!
//! Decides which stage of a campaign runs next and drives one stage per call.
//!
//! ## Trigger flow
//!
//! 1. Resolve the target sites from the stage's `contexts` expression (empty
//!    means the local site only).
//! 2. Build the input map: trigger inputs, then the stage's static inputs,
//!    then the reserved `__` keys. A `__state` left by the previous stage is
//!    handed on.
//! 3. Trace every input through the expression evaluator.
//! 4. Resolve the provider (the proxy provider when the activation has one).
//! 5. Fan out to the sites and aggregate the results.
//! 6. Paused sites are persisted as a pending task; otherwise the stage
//!    selector picks the next stage, subject to error containment: a failed
//!    stage only continues into a stage that sets `handle_errors`.
//!
//! Callers loop on [`StageEngine::handle_trigger_event`] until it stops
//! returning a next [`ActivationData`]; see
//! [`ActivationRunner`](super::ActivationRunner).

use super::fan_out::{merge_site_outputs, SiteFanOut};
use super::pending_tasks::PendingTaskStore;
use crate::config::EngineConfig;
use crate::constants::{feeds, providers, reserved};
use crate::error::{OrchestrationError, OrchestrationResult};
use crate::events::{Event, EventBus};
use crate::expression::{ContextTracer, EvaluationContext, ExpressionEvaluator, TemplateEvaluator};
use crate::logging::log_stage_operation;
use crate::metrics::EngineMetrics;
use crate::models::{
    pending_task_key, ActivationData, ActivationStatus, CampaignSpec, PendingTask,
    ReservedEnvelope, StageSpec, State, TaskResult,
};
use crate::providers::{ProviderContext, ProviderRegistry, StageProvider};
use crate::storage::StateStore;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Identity keys stripped from a resume notification before its outputs are
/// merged into the stage snapshot
const IDENTITY_KEYS: [&str; 6] = [
    reserved::CAMPAIGN,
    reserved::NAMESPACE,
    reserved::ACTIVATION,
    reserved::ACTIVATION_GENERATION,
    reserved::STAGE,
    reserved::SITE,
];

pub struct StageEngine {
    config: EngineConfig,
    registry: Arc<ProviderRegistry>,
    evaluator: Arc<dyn ExpressionEvaluator>,
    event_bus: Arc<dyn EventBus>,
    pending_tasks: PendingTaskStore,
    fan_out: SiteFanOut,
    metrics: Arc<EngineMetrics>,
}

impl StageEngine {
    /// Create an engine using the default template evaluator
    pub fn new(
        config: EngineConfig,
        registry: Arc<ProviderRegistry>,
        store: Arc<dyn StateStore>,
        event_bus: Arc<dyn EventBus>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        let evaluator: Arc<dyn ExpressionEvaluator> = Arc::new(TemplateEvaluator::new());
        let fan_out = SiteFanOut::new(
            evaluator.clone(),
            event_bus.clone(),
            metrics.clone(),
            config.local_site.clone(),
            config.max_trace_depth,
        );
        Self {
            config,
            registry,
            evaluator,
            event_bus,
            pending_tasks: PendingTaskStore::new(store),
            fan_out,
            metrics,
        }
    }

    /// Swap in a different expression evaluator
    pub fn with_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.fan_out = SiteFanOut::new(
            evaluator.clone(),
            self.event_bus.clone(),
            self.metrics.clone(),
            self.config.local_site.clone(),
            self.config.max_trace_depth,
        );
        self.evaluator = evaluator;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    pub fn pending_tasks(&self) -> &PendingTaskStore {
        &self.pending_tasks
    }

    /// Run one stage of an activation.
    ///
    /// Returns the stage's status and, while the campaign keeps going, the
    /// activation for the next stage. Every failure is reported through the
    /// returned status.
    #[instrument(skip(self, campaign, data), fields(campaign = %data.campaign, activation = %data.activation, stage = %data.stage))]
    pub async fn handle_trigger_event(
        &self,
        campaign: &CampaignSpec,
        data: ActivationData,
    ) -> (ActivationStatus, Option<ActivationData>) {
        let mut status = ActivationStatus::for_stage(&data.stage);
        let identity = ActivationData {
            campaign: data.campaign.clone(),
            activation: data.activation.clone(),
            activation_generation: data.activation_generation.clone(),
            namespace: if data.namespace.is_empty() {
                self.config.default_namespace.clone()
            } else {
                data.namespace.clone()
            },
            stage: data.stage.clone(),
            ..Default::default()
        };

        let next = match self.run_stage(campaign, data, &mut status).await {
            Ok(next) => next,
            Err(error) => {
                error!(error = %error, "Stage execution failed");
                status.fail(error.state(), error.to_string());
                None
            }
        };
        status.stamp_reserved(&identity, &self.config.local_site);

        log_stage_operation(
            "trigger",
            &identity.campaign,
            &identity.activation,
            &identity.stage,
            status.status.name(),
            Some(&status.next_stage).filter(|s| !s.is_empty()).map(String::as_str),
        );
        (status, next)
    }

    async fn run_stage(
        &self,
        campaign: &CampaignSpec,
        mut data: ActivationData,
        status: &mut ActivationStatus,
    ) -> OrchestrationResult<Option<ActivationData>> {
        let stage = campaign
            .stage(&data.stage)
            .map_err(OrchestrationError::into_bad_request)?;
        if data.namespace.is_empty() {
            data.namespace = self.config.default_namespace.clone();
        }
        self.metrics.record_stage();

        let sites = self.resolve_sites(stage, &data)?;
        let inputs = self.build_inputs(stage, &data)?;
        let provider = self.resolve_provider(stage, &data)?;
        debug!(sites = ?sites, "Fanning out stage");

        let result = self.fan_out.execute(&data, &sites, &inputs, provider).await;

        let mut outputs = result.outputs.clone();
        if result.failed() {
            status.error_message = result.error_message();
            outputs.insert(reserved::STATUS.to_string(), Value::from(State::InternalError));
            outputs.insert(
                reserved::ERROR.to_string(),
                Value::String(status.error_message.clone()),
            );
        } else {
            outputs
                .entry(reserved::STATUS.to_string())
                .or_insert_with(|| Value::from(State::Ok));
        }
        data.outputs.insert(data.stage.clone(), outputs.clone());
        status.outputs = outputs;

        // Scheduled sites are awaited like paused ones; the deferred run resumes them
        let awaiting: BTreeSet<String> = result
            .paused_sites
            .union(&result.scheduled_sites)
            .cloned()
            .collect();
        if !awaiting.is_empty() {
            let task = PendingTask {
                stage: data.stage.clone(),
                sites: awaiting,
                outputs_by_stage: data.outputs.clone(),
                inputs: data.inputs.clone(),
                namespace: data.namespace.clone(),
                proxy: data.proxy.clone(),
                failures: result.failures.clone(),
            };
            self.pending_tasks
                .save(&data.pending_task_key(), &data.namespace, &task, None)
                .await?;
            if !result.paused_sites.is_empty() {
                self.metrics.record_pause();
            }
            if !result.scheduled_sites.is_empty() {
                self.metrics.record_scheduled();
            }
            info!(waiting_on = ?task.sites, "Stage paused awaiting site completions");
            status.set_status(State::Paused);
            return Ok(None);
        }

        if !campaign.self_driving {
            status.set_status(if result.failed() { State::InternalError } else { State::Done });
            return Ok(None);
        }

        let failure = Some(result.error_message()).filter(|_| result.failed());
        match self.select_next(campaign, stage, &data, failure.as_deref())? {
            Some(next) => {
                status.next_stage = next.stage.clone();
                status.set_status(State::Running);
                Ok(Some(next))
            }
            None => {
                status.set_status(if result.failed() { State::InternalError } else { State::Done });
                Ok(None)
            }
        }
    }

    /// Run a single stage once without fan-out.
    ///
    /// The stage runs for the site named by the `__site` input (a deferred
    /// fan-out run carries it), else for the local site; the returned status
    /// names that site so it can be fed to `resume_stage`. A scheduled
    /// activation is published on the schedule feed and reported as `Delayed`
    /// unless the provider is a remote proxy.
    #[instrument(skip(self, data), fields(campaign = %data.campaign, activation = %data.activation, stage = %data.stage))]
    pub async fn handle_direct_trigger_event(&self, data: ActivationData) -> ActivationStatus {
        let mut status = ActivationStatus::for_stage(&data.stage);
        let site = data
            .inputs
            .get(reserved::SITE)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.config.local_site)
            .to_string();

        if let Err(error) = self.run_direct(&data, &site, &mut status).await {
            error!(error = %error, "Direct trigger failed");
            let message = error.to_string();
            let mut result = TaskResult::failure(site.clone(), error);
            result.mark_failed(&message);
            status.outputs = result.outputs;
            status.fail(State::InternalError, message);
        }

        status.stamp_reserved(&data, &site);
        log_stage_operation(
            "direct_trigger",
            &data.campaign,
            &data.activation,
            &data.stage,
            status.status.name(),
            None,
        );
        status
    }

    async fn run_direct(
        &self,
        data: &ActivationData,
        site: &str,
        status: &mut ActivationStatus,
    ) -> OrchestrationResult<()> {
        let (provider_id, config) = match &data.proxy {
            Some(proxy) => (proxy_provider_id(&proxy.provider), &proxy.config),
            None => (data.provider.as_str(), &data.config),
        };
        let provider = self.create_provider(provider_id, config)?;

        if data.schedule.is_some() && !provider.is_remote_proxy() {
            let event = Event::new(serde_json::to_value(data)?)
                .with_metadata("site", site)
                .with_metadata("stage", data.stage.clone());
            self.event_bus.publish(feeds::SCHEDULE, event).await?;
            self.metrics.record_scheduled();
            status.set_status(State::Delayed);
            return Ok(());
        }

        let mut inputs = data.inputs.clone();
        self.inject_reserved(&mut inputs, data);
        inputs.insert(reserved::SITE.to_string(), Value::String(site.to_string()));
        let outcome = provider.process(&inputs).await?;

        let mut result = TaskResult::success(site, outcome.outputs);
        if let Some(error) = result.effective_error() {
            result.mark_failed(&error);
            status.outputs = result.outputs;
            status.fail(State::InternalError, error);
            return Ok(());
        }

        status.outputs = result.outputs;
        status.set_status(if outcome.pause_requested { State::Paused } else { State::Done });
        Ok(())
    }

    /// Apply a remote completion notification to its pending task.
    ///
    /// Returns `Ok(None)` while other sites are still outstanding, and once
    /// the last site reports, the next activation for self-driving campaigns.
    /// A second resume for an already completed task fails with `NotFound`.
    #[instrument(skip(self, status, campaign), fields(stage = %status.stage))]
    pub async fn resume_stage(
        &self,
        status: &ActivationStatus,
        campaign: &CampaignSpec,
    ) -> OrchestrationResult<Option<ActivationData>> {
        let envelope = ReservedEnvelope::decode(&status.outputs).map_err(|_| {
            OrchestrationError::BadRequest(format!("{} is not valid", reserved::STATUS))
        })?;
        let identity = envelope.resume_identity()?;
        let key = pending_task_key(
            &identity.campaign,
            &identity.activation,
            &identity.activation_generation,
        );

        let site_outputs: HashMap<String, Value> = status
            .outputs
            .iter()
            .filter(|(k, _)| !IDENTITY_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let site_failure = if status.is_error() {
            Some(if status.error_message.is_empty() {
                format!("stage reported {}", status.status)
            } else {
                status.error_message.clone()
            })
        } else {
            TaskResult::success(identity.site.clone(), site_outputs.clone()).effective_error()
        };

        let mut attempts = 0;
        let task = loop {
            attempts += 1;
            let (mut task, etag) = self.pending_tasks.load(&key, &identity.namespace).await?;

            if !task.complete_site(&identity.site) {
                warn!(site = %identity.site, key = %key, "Site is not outstanding for pending task; ignoring");
                return Ok(None);
            }
            merge_site_outputs(
                task.outputs_by_stage.entry(identity.stage.clone()).or_default(),
                &identity.site,
                &self.config.local_site,
                &site_outputs,
            );
            if let Some(failure) = &site_failure {
                let label = if identity.site == self.config.local_site {
                    ""
                } else {
                    identity.site.as_str()
                };
                task.failures.push(format!("{label}: {failure}"));
            }

            let written = if task.is_complete() {
                self.pending_tasks
                    .delete(&key, &identity.namespace, Some(&etag))
                    .await
            } else {
                self.pending_tasks
                    .save(&key, &identity.namespace, &task, Some(&etag))
                    .await
                    .map(|_| ())
            };

            match written {
                Ok(()) => break task,
                Err(OrchestrationError::Conflict(reason))
                    if attempts <= self.config.pending_task_retries =>
                {
                    debug!(attempt = attempts, reason = %reason, "Pending task changed underneath resume; retrying");
                }
                Err(error) => return Err(error),
            }
        };

        self.metrics.record_resume();
        log_stage_operation(
            "resume",
            &identity.campaign,
            &identity.activation,
            &identity.stage,
            if task.is_complete() { "complete" } else { "waiting" },
            Some(&identity.site),
        );

        if !task.is_complete() || !campaign.self_driving {
            return Ok(None);
        }

        let stage = campaign
            .stage(&identity.stage)
            .map_err(OrchestrationError::into_bad_request)?;
        let failure = Some(task.failures.join("; ")).filter(|_| task.has_failures());

        let mut outputs_by_stage = task.outputs_by_stage;
        if let Some(message) = &failure {
            let snapshot = outputs_by_stage.entry(identity.stage.clone()).or_default();
            snapshot.insert(reserved::STATUS.to_string(), Value::from(State::InternalError));
            snapshot.insert(reserved::ERROR.to_string(), Value::String(message.clone()));
        }

        let data = ActivationData {
            campaign: identity.campaign,
            activation: identity.activation,
            activation_generation: identity.activation_generation,
            namespace: identity.namespace,
            stage: identity.stage,
            inputs: task.inputs,
            outputs: outputs_by_stage,
            provider: stage.provider.clone(),
            config: stage.config.clone(),
            proxy: task.proxy,
            ..Default::default()
        };
        self.select_next(campaign, stage, &data, failure.as_deref())
    }

    /// Pick the stage an activation starts at.
    ///
    /// The requested stage wins, then the campaign's first stage. When a prior
    /// status is recorded for the activation, the requested stage must be the
    /// one that status named as next; anything else is a stale or duplicate
    /// trigger.
    #[instrument(skip(self, data, campaign, activation_state), fields(campaign = %campaign.name, activation = %data.activation))]
    pub fn handle_activation_event(
        &self,
        data: ActivationData,
        campaign: &CampaignSpec,
        activation_state: Option<&ActivationStatus>,
    ) -> OrchestrationResult<ActivationData> {
        let stage_name = if data.stage.is_empty() {
            campaign.first_stage.clone()
        } else {
            data.stage.clone()
        };
        if stage_name.is_empty() {
            return Err(OrchestrationError::BadRequest(format!(
                "campaign '{}' has no first stage and the activation names none",
                campaign.name
            )));
        }
        let stage = campaign
            .stage(&stage_name)
            .map_err(OrchestrationError::into_bad_request)?;

        if let Some(prior) = activation_state {
            if !prior.stage.is_empty() && prior.next_stage != stage_name {
                return Err(OrchestrationError::BadRequest(format!(
                    "activation '{}' expects stage '{}' next, not '{stage_name}'",
                    data.activation, prior.next_stage
                )));
            }
        }

        let namespace = if data.namespace.is_empty() {
            self.config.default_namespace.clone()
        } else {
            data.namespace
        };
        Ok(ActivationData {
            campaign: if data.campaign.is_empty() { campaign.name.clone() } else { data.campaign },
            namespace,
            stage: stage_name,
            provider: stage.provider.clone(),
            config: stage.config.clone(),
            schedule: stage.schedule.clone(),
            ..data
        })
    }

    fn resolve_sites(&self, stage: &StageSpec, data: &ActivationData) -> OrchestrationResult<Vec<String>> {
        if stage.contexts.trim().is_empty() {
            return Ok(vec![self.config.local_site.clone()]);
        }

        let ctx = EvaluationContext::new(data.inputs.clone(), data.outputs.clone());
        let resolved = self
            .evaluator
            .evaluate(&stage.contexts, &ctx)
            .map_err(OrchestrationError::into_bad_request)?;

        let invalid = |value: &Value| {
            OrchestrationError::BadRequest(format!(
                "site selector must resolve to a site or a list of sites, got {value}"
            ))
        };
        let candidates = match &resolved {
            Value::String(site) => vec![site.clone()],
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    Value::Number(n) => Ok(n.to_string()),
                    Value::Bool(b) => Ok(b.to_string()),
                    other => Err(invalid(other)),
                })
                .collect::<OrchestrationResult<Vec<_>>>()?,
            other => return Err(invalid(other)),
        };

        let mut seen = HashSet::new();
        let sites: Vec<String> = candidates
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty() && seen.insert(s.clone()))
            .collect();
        if sites.is_empty() {
            return Err(OrchestrationError::BadRequest(format!(
                "site selector '{}' resolved to no sites",
                stage.contexts
            )));
        }
        Ok(sites)
    }

    fn build_inputs(
        &self,
        stage: &StageSpec,
        data: &ActivationData,
    ) -> OrchestrationResult<HashMap<String, Value>> {
        let mut inputs = data.inputs.clone();
        inputs.extend(stage.inputs.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.inject_reserved(&mut inputs, data);

        if let Some(schedule) = &data.schedule {
            inputs.insert(
                reserved::SCHEDULE.to_string(),
                Value::String(serde_json::to_string(schedule)?),
            );
        }
        if let Some(state) = data
            .outputs
            .get(&data.triggering_stage)
            .and_then(|outputs| outputs.get(reserved::STATE))
        {
            inputs.insert(reserved::STATE.to_string(), state.clone());
        }

        let ctx = EvaluationContext::new(inputs.clone(), data.outputs.clone());
        ContextTracer::new(self.evaluator.as_ref(), self.config.max_trace_depth).trace_map(&inputs, &ctx)
    }

    fn inject_reserved(&self, inputs: &mut HashMap<String, Value>, data: &ActivationData) {
        let entries = [
            (reserved::CAMPAIGN, data.campaign.as_str()),
            (reserved::NAMESPACE, data.namespace.as_str()),
            (reserved::ACTIVATION, data.activation.as_str()),
            (reserved::STAGE, data.stage.as_str()),
            (
                reserved::ACTIVATION_GENERATION,
                data.activation_generation.as_str(),
            ),
            (reserved::PREVIOUS_STAGE, data.triggering_stage.as_str()),
            (reserved::SITE, self.config.local_site.as_str()),
        ];
        for (key, value) in entries {
            inputs.insert(key.to_string(), Value::String(value.to_string()));
        }
    }

    fn resolve_provider(
        &self,
        stage: &StageSpec,
        data: &ActivationData,
    ) -> OrchestrationResult<Arc<dyn StageProvider>> {
        let (provider_id, config) = match &data.proxy {
            Some(proxy) => (proxy_provider_id(&proxy.provider), &proxy.config),
            None if !data.provider.is_empty() => (data.provider.as_str(), &data.config),
            None => (stage.provider.as_str(), &stage.config),
        };
        self.create_provider(provider_id, config)
    }

    fn create_provider(&self, provider_id: &str, config: &Value) -> OrchestrationResult<Arc<dyn StageProvider>> {
        let context = ProviderContext {
            site_id: self.config.local_site.clone(),
            event_bus: self.event_bus.clone(),
        };
        self.registry
            .create(provider_id, config, &context)
            .map_err(OrchestrationError::into_bad_request)
    }

    /// Evaluate the stage selector and build the next activation.
    ///
    /// An empty selector result is terminal. A failed stage only continues
    /// into a stage that sets `handle_errors`.
    fn select_next(
        &self,
        campaign: &CampaignSpec,
        stage: &StageSpec,
        data: &ActivationData,
        failure: Option<&str>,
    ) -> OrchestrationResult<Option<ActivationData>> {
        if stage.stage_selector.trim().is_empty() {
            return Ok(None);
        }

        let ctx = EvaluationContext::new(data.inputs.clone(), data.outputs.clone());
        let selected = self
            .evaluator
            .evaluate(&stage.stage_selector, &ctx)
            .map_err(OrchestrationError::into_bad_request)?;
        let next_name = match selected {
            Value::String(s) => s.trim().to_string(),
            Value::Null => String::new(),
            other => {
                return Err(OrchestrationError::BadRequest(format!(
                    "stage selector must resolve to a stage name, got {other}"
                )))
            }
        };
        if next_name.is_empty() {
            return Ok(None);
        }

        let next = campaign
            .stage(&next_name)
            .map_err(OrchestrationError::into_bad_request)?;
        if let Some(failure) = failure {
            if !next.handle_errors {
                return Err(OrchestrationError::InternalError(format!(
                    "stage '{}' failed and '{next_name}' does not handle errors: {failure}",
                    data.stage
                )));
            }
            warn!(stage = %data.stage, next = %next_name, "Continuing past failed stage");
        }

        Ok(Some(ActivationData {
            campaign: data.campaign.clone(),
            activation: data.activation.clone(),
            activation_generation: data.activation_generation.clone(),
            namespace: data.namespace.clone(),
            stage: next_name,
            triggering_stage: data.stage.clone(),
            inputs: data.inputs.clone(),
            outputs: data.outputs.clone(),
            provider: next.provider.clone(),
            config: next.config.clone(),
            schedule: next.schedule.clone(),
            proxy: data.proxy.clone(),
        }))
    }
}

fn proxy_provider_id(provider: &str) -> &str {
    if provider.is_empty() {
        providers::REMOTE
    } else {
        provider
    }
}
