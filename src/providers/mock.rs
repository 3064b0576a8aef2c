//! Configurable test double: echoes its inputs and can be told to fail or
//! to request asynchronous completion.

use super::{StageOutcome, StageProvider};
use crate::error::{OrchestrationError, OrchestrationResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MockStageConfig {
    pub fail: bool,
    pub pause: bool,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct MockStageProvider {
    config: MockStageConfig,
}

impl MockStageProvider {
    pub fn new(config: MockStageConfig) -> Self {
        Self { config }
    }

    /// Null config means "echo"; anything else must deserialize
    pub fn from_config(config: &Value) -> OrchestrationResult<Self> {
        if config.is_null() {
            return Ok(Self::default());
        }
        let config = serde_json::from_value(config.clone()).map_err(|e| {
            OrchestrationError::Configuration(format!("invalid mock provider config: {e}"))
        })?;
        Ok(Self::new(config))
    }
}

#[async_trait]
impl StageProvider for MockStageProvider {
    async fn process(&self, inputs: &HashMap<String, Value>) -> OrchestrationResult<StageOutcome> {
        if self.config.fail {
            let reason = if self.config.message.is_empty() {
                "mock failure".to_string()
            } else {
                self.config.message.clone()
            };
            return Err(OrchestrationError::Provider {
                provider: "mock".to_string(),
                reason,
            });
        }

        let outputs = inputs.clone();
        if self.config.pause {
            Ok(StageOutcome::paused(outputs))
        } else {
            Ok(StageOutcome::completed(outputs))
        }
    }
}
