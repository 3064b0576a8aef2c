use super::campaign::{ProxySpec, StageSchedule};
use super::state::State;
use crate::constants::reserved;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Outputs of every stage executed so far, keyed by stage name
pub type StageOutputs = HashMap<String, HashMap<String, Value>>;

/// One unit of "run this stage for this activation"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationData {
    pub campaign: String,
    pub activation: String,
    pub activation_generation: String,
    pub namespace: String,
    pub stage: String,
    /// The stage that triggered this one (empty for the first stage)
    #[serde(default)]
    pub triggering_stage: String,
    #[serde(default)]
    pub inputs: HashMap<String, Value>,
    #[serde(default)]
    pub outputs: StageOutputs,
    pub provider: String,
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub schedule: Option<StageSchedule>,
    #[serde(default)]
    pub proxy: Option<ProxySpec>,
}

impl ActivationData {
    /// Pending task key: `{campaign}-{activation}-{generation}`
    pub fn pending_task_key(&self) -> String {
        pending_task_key(&self.campaign, &self.activation, &self.activation_generation)
    }
}

pub fn pending_task_key(campaign: &str, activation: &str, generation: &str) -> String {
    format!("{campaign}-{activation}-{generation}")
}

/// Outcome of one engine invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationStatus {
    pub stage: String,
    /// Empty when the activation has nothing further to run
    #[serde(default)]
    pub next_stage: String,
    #[serde(default)]
    pub outputs: HashMap<String, Value>,
    pub status: State,
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub is_active: bool,
}

impl ActivationStatus {
    pub fn for_stage(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            status: State::Running,
            is_active: true,
            ..Default::default()
        }
    }

    /// Set the status code, keeping `is_active` consistent with it
    pub fn set_status(&mut self, status: State) {
        self.status = status;
        self.is_active = status.is_active();
        self.outputs
            .insert(reserved::STATUS.to_string(), Value::from(status));
    }

    /// Record a terminal failure
    pub fn fail(&mut self, status: State, message: impl Into<String>) {
        self.error_message = message.into();
        self.next_stage.clear();
        self.set_status(status);
    }

    /// Stamp the reserved identification keys onto the outputs
    pub fn stamp_reserved(&mut self, data: &ActivationData, site: &str) {
        let entries = [
            (reserved::CAMPAIGN, data.campaign.as_str()),
            (reserved::NAMESPACE, data.namespace.as_str()),
            (reserved::ACTIVATION, data.activation.as_str()),
            (
                reserved::ACTIVATION_GENERATION,
                data.activation_generation.as_str(),
            ),
            (reserved::STAGE, data.stage.as_str()),
            (reserved::SITE, site),
        ];
        for (key, value) in entries {
            self.outputs
                .insert(key.to_string(), Value::String(value.to_string()));
        }
        self.outputs
            .insert(reserved::STATUS.to_string(), Value::from(self.status));
    }

    pub fn is_error(&self) -> bool {
        !(self.status.is_ok() || self.status.is_paused() || self.status == State::Untouched)
    }
}
