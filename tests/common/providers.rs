//! Site-aware test providers.

#![allow(dead_code)]

use async_trait::async_trait;
use fleet_core::constants::reserved;
use fleet_core::error::{OrchestrationError, OrchestrationResult};
use fleet_core::providers::{ProviderRegistry, StageOutcome, StageProvider};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

pub const SCRIPTED: &str = "tests.stage.scripted";

/// Behaviour keyed by the `__site` the provider runs for
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScriptedConfig {
    /// Sites that return a provider error
    pub fail: Vec<String>,
    /// Sites that request asynchronous completion
    pub pause: Vec<String>,
    /// `__status` every site reports, verbatim
    pub status: Option<Value>,
}

/// Echoes the site it ran on (and any `value` input), failing or pausing per site
#[derive(Debug, Clone, Default)]
pub struct ScriptedProvider {
    config: ScriptedConfig,
}

#[async_trait]
impl StageProvider for ScriptedProvider {
    async fn process(&self, inputs: &HashMap<String, Value>) -> OrchestrationResult<StageOutcome> {
        let site = inputs
            .get(reserved::SITE)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if self.config.fail.contains(&site) {
            return Err(OrchestrationError::Provider {
                provider: SCRIPTED.to_string(),
                reason: format!("{site} is unreachable"),
            });
        }

        let mut outputs = HashMap::from([("site".to_string(), Value::String(site.clone()))]);
        if let Some(value) = inputs.get("value") {
            outputs.insert("value".to_string(), value.clone());
        }
        if let Some(status) = &self.config.status {
            outputs.insert(reserved::STATUS.to_string(), status.clone());
        }

        Ok(StageOutcome {
            outputs,
            pause_requested: self.config.pause.contains(&site),
        })
    }
}

pub fn register_test_providers(registry: &ProviderRegistry) {
    registry.register(SCRIPTED, |config| {
        let config = if config.is_null() {
            ScriptedConfig::default()
        } else {
            serde_json::from_value(config.clone())?
        };
        Ok(Box::new(ScriptedProvider { config }) as Box<dyn StageProvider>)
    });
}
