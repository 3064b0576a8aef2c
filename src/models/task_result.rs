//! Per-site execution results and the typed view of the reserved output keys.

use super::state::State;
use crate::constants::{reserved, DEFAULT_NAMESPACE};
use crate::error::{OrchestrationError, OrchestrationResult};
use serde_json::Value;
use std::collections::HashMap;

/// Outcome of running a stage on one site. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskResult {
    pub site: String,
    pub outputs: HashMap<String, Value>,
    pub error: Option<OrchestrationError>,
}

impl TaskResult {
    pub fn success(site: impl Into<String>, outputs: HashMap<String, Value>) -> Self {
        Self {
            site: site.into(),
            outputs,
            error: None,
        }
    }

    pub fn failure(site: impl Into<String>, error: OrchestrationError) -> Self {
        Self {
            site: site.into(),
            outputs: HashMap::new(),
            error: Some(error),
        }
    }

    /// The failure this result represents, if any.
    ///
    /// A provider error wins. Otherwise a non-OK `__status` counts as a
    /// failure, described by `__error` or a generic internal error when no
    /// message was given. An unparseable `__status` is an internal error.
    pub fn effective_error(&self) -> Option<String> {
        if let Some(error) = &self.error {
            return Some(error.to_string());
        }
        match ReservedEnvelope::decode(&self.outputs) {
            Ok(envelope) => match envelope.status {
                Some(state) if !state.is_ok() => Some(
                    envelope
                        .error
                        .unwrap_or_else(|| format!("Internal error: stage reported {state}")),
                ),
                _ => None,
            },
            Err(e) => Some(e.to_string()),
        }
    }

    /// Rewrite the outputs to carry the normalized `__status`/`__error` pair
    pub fn mark_failed(&mut self, message: &str) {
        let envelope = ReservedEnvelope {
            status: Some(State::InternalError),
            error: Some(message.to_string()),
            ..Default::default()
        };
        envelope.encode_into(&mut self.outputs);
    }
}

/// Typed overlay of the reserved `__` keys in an open output mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReservedEnvelope {
    pub campaign: Option<String>,
    pub namespace: Option<String>,
    pub activation: Option<String>,
    pub activation_generation: Option<String>,
    pub stage: Option<String>,
    pub site: Option<String>,
    pub status: Option<State>,
    pub error: Option<String>,
    pub state: Option<Value>,
}

/// Identity of a paused stage carried back by a remote completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeIdentity {
    pub campaign: String,
    pub namespace: String,
    pub activation: String,
    pub activation_generation: String,
    pub stage: String,
    pub site: String,
}

impl ReservedEnvelope {
    /// Decode the reserved keys. Malformed identity values are left as `None`;
    /// a present but unparseable `__status` is an error.
    pub fn decode(outputs: &HashMap<String, Value>) -> OrchestrationResult<Self> {
        let text = |key: &str| outputs.get(key).and_then(scalar_text);
        let status = outputs
            .get(reserved::STATUS)
            .map(State::normalize)
            .transpose()?;

        Ok(Self {
            campaign: text(reserved::CAMPAIGN),
            namespace: text(reserved::NAMESPACE),
            activation: text(reserved::ACTIVATION),
            activation_generation: text(reserved::ACTIVATION_GENERATION),
            stage: text(reserved::STAGE),
            site: text(reserved::SITE),
            status,
            error: outputs.get(reserved::ERROR).map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            state: outputs.get(reserved::STATE).cloned(),
        })
    }

    /// Write every populated field back under its reserved key
    pub fn encode_into(&self, outputs: &mut HashMap<String, Value>) {
        let texts = [
            (reserved::CAMPAIGN, &self.campaign),
            (reserved::NAMESPACE, &self.namespace),
            (reserved::ACTIVATION, &self.activation),
            (reserved::ACTIVATION_GENERATION, &self.activation_generation),
            (reserved::STAGE, &self.stage),
            (reserved::SITE, &self.site),
            (reserved::ERROR, &self.error),
        ];
        for (key, value) in texts {
            if let Some(value) = value {
                outputs.insert(key.to_string(), Value::String(value.clone()));
            }
        }
        if let Some(status) = self.status {
            outputs.insert(reserved::STATUS.to_string(), Value::from(status));
        }
        if let Some(state) = &self.state {
            outputs.insert(reserved::STATE.to_string(), state.clone());
        }
    }

    /// Validate the keys a resume notification must carry
    pub fn resume_identity(&self) -> OrchestrationResult<ResumeIdentity> {
        fn required(value: &Option<String>, key: &str) -> OrchestrationResult<String> {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| OrchestrationError::BadRequest(format!("{key} is not valid")))
        }

        Ok(ResumeIdentity {
            campaign: required(&self.campaign, reserved::CAMPAIGN)?,
            activation: required(&self.activation, reserved::ACTIVATION)?,
            activation_generation: required(
                &self.activation_generation,
                reserved::ACTIVATION_GENERATION,
            )?,
            site: required(&self.site, reserved::SITE)?,
            stage: required(&self.stage, reserved::STAGE)?,
            namespace: self
                .namespace
                .clone()
                .filter(|ns| !ns.is_empty())
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
        })
    }
}

/// Strings pass through; numbers are accepted for generation-like fields
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
