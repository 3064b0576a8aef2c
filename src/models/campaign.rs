use crate::error::{OrchestrationError, OrchestrationResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Static workflow definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignSpec {
    pub name: String,
    /// When false the campaign executes exactly one stage per trigger
    #[serde(default)]
    pub self_driving: bool,
    #[serde(default)]
    pub first_stage: String,
    #[serde(default)]
    pub stages: HashMap<String, StageSpec>,
}

impl CampaignSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn self_driving(mut self, self_driving: bool) -> Self {
        self.self_driving = self_driving;
        self
    }

    pub fn with_first_stage(mut self, stage: impl Into<String>) -> Self {
        self.first_stage = stage.into();
        self
    }

    pub fn with_stage(mut self, name: impl Into<String>, stage: StageSpec) -> Self {
        self.stages.insert(name.into(), stage);
        self
    }

    /// Look up a stage, failing with `NotFound` when it is not defined
    pub fn stage(&self, name: &str) -> OrchestrationResult<&StageSpec> {
        self.stages.get(name).ok_or_else(|| {
            OrchestrationError::NotFound(format!(
                "stage '{name}' is not defined in campaign '{}'",
                self.name
            ))
        })
    }
}

/// One step of a campaign
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSpec {
    pub provider: String,
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub inputs: HashMap<String, Value>,
    /// Expression resolving to a site id or a list of site ids
    #[serde(default)]
    pub contexts: String,
    /// Expression resolving to the next stage name (empty = terminal)
    #[serde(default)]
    pub stage_selector: String,
    #[serde(default)]
    pub schedule: Option<StageSchedule>,
    /// Continue into this stage even when the previous stage failed
    #[serde(default)]
    pub handle_errors: bool,
}

impl StageSpec {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            config: Value::Null,
            ..Default::default()
        }
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(key.into(), value.into());
        self
    }

    pub fn with_contexts(mut self, contexts: impl Into<String>) -> Self {
        self.contexts = contexts.into();
        self
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.stage_selector = selector.into();
        self
    }

    pub fn with_schedule(mut self, schedule: StageSchedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    pub fn handle_errors(mut self, handle_errors: bool) -> Self {
        self.handle_errors = handle_errors;
        self
    }
}

/// Deferred execution request: run the stage at `at` instead of immediately
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSchedule {
    pub at: DateTime<Utc>,
}

impl StageSchedule {
    pub fn at(at: DateTime<Utc>) -> Self {
        Self { at }
    }
}

/// Remote execution channel for a stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxySpec {
    pub provider: String,
    #[serde(default)]
    pub config: Value,
}
