//! Remote proxy provider.
//!
//! Hands the stage over to a site agent by publishing the inputs on the
//! `remote` feed, then requests a pause. The agent reports completion later
//! and the engine picks it up through `resume_stage`.

use super::{ContextAware, ProviderContext, StageOutcome, StageProvider};
use crate::constants::{feeds, reserved};
use crate::error::{OrchestrationError, OrchestrationResult};
use crate::events::Event;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Default)]
pub struct RemoteStageProvider {
    config: Value,
    context: Option<ProviderContext>,
}

impl RemoteStageProvider {
    pub fn from_config(config: &Value) -> OrchestrationResult<Self> {
        Ok(Self {
            config: config.clone(),
            context: None,
        })
    }
}

#[async_trait]
impl StageProvider for RemoteStageProvider {
    async fn process(&self, inputs: &HashMap<String, Value>) -> OrchestrationResult<StageOutcome> {
        let context = self.context.as_ref().ok_or_else(|| {
            OrchestrationError::InternalError(
                "remote provider used without orchestration context".to_string(),
            )
        })?;

        let text = |key: &str| {
            inputs
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let site = match text(reserved::SITE) {
            s if s.is_empty() => context.site_id.clone(),
            s => s,
        };

        let mut body = Map::new();
        body.insert(
            "inputs".to_string(),
            Value::Object(inputs.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        );
        body.insert("config".to_string(), self.config.clone());

        let event = Event::new(Value::Object(body))
            .with_metadata("site", site.clone())
            .with_metadata("stage", text(reserved::STAGE))
            .with_metadata("campaign", text(reserved::CAMPAIGN))
            .with_metadata("activation", text(reserved::ACTIVATION));

        context.event_bus.publish(feeds::REMOTE, event).await?;
        debug!(site = %site, "Forwarded stage to remote agent");

        Ok(StageOutcome::paused(HashMap::new()))
    }

    fn is_remote_proxy(&self) -> bool {
        true
    }

    fn context_aware(&mut self) -> Option<&mut dyn ContextAware> {
        Some(self)
    }
}

impl ContextAware for RemoteStageProvider {
    fn set_context(&mut self, context: ProviderContext) {
        self.context = Some(context);
    }
}
