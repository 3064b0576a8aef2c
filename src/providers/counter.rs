//! Accumulating counter provider.
//!
//! For every plain numeric input `k` the output is `k.init + k`, where a
//! missing or null `k.init` counts as zero. Feeding the previous output back
//! through `k.init` turns a self-selecting stage into a loop that converges on
//! whatever bound its selector tests for.

use super::{StageOutcome, StageProvider};
use crate::constants::reserved;
use crate::error::{OrchestrationError, OrchestrationResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

const INIT_SUFFIX: &str = ".init";

#[derive(Debug, Clone, Copy, Default)]
pub struct CounterStageProvider;

impl CounterStageProvider {
    /// The counter takes no configuration; anything given is ignored
    pub fn from_config(_config: &Value) -> OrchestrationResult<Self> {
        Ok(Self)
    }
}

#[async_trait]
impl StageProvider for CounterStageProvider {
    async fn process(&self, inputs: &HashMap<String, Value>) -> OrchestrationResult<StageOutcome> {
        let mut outputs = HashMap::new();

        for (key, value) in inputs {
            if reserved::is_reserved(key) || key.ends_with(INIT_SUFFIX) {
                continue;
            }
            let delta = Number::parse(key, value)?;
            let init = match inputs.get(&format!("{key}{INIT_SUFFIX}")) {
                None | Some(Value::Null) => Number::Int(0),
                Some(init) => Number::parse(key, init)?,
            };
            outputs.insert(key.clone(), init.add(delta));
        }

        if let Some(state) = inputs.get(reserved::STATE) {
            outputs.insert(reserved::STATE.to_string(), state.clone());
        }

        Ok(StageOutcome::completed(outputs))
    }
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn parse(key: &str, value: &Value) -> OrchestrationResult<Self> {
        let parsed = match value {
            Value::Number(n) => n.as_i64().map(Self::Int).or_else(|| n.as_f64().map(Self::Float)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .map(Self::Int)
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(Self::Float))
            }
            _ => None,
        };
        parsed.ok_or_else(|| {
            OrchestrationError::BadRequest(format!("counter input '{key}' is not a number: {value}"))
        })
    }

    fn add(self, other: Self) -> Value {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a
                .checked_add(b)
                .map(Value::from)
                .unwrap_or_else(|| Value::from(a as f64 + b as f64)),
            (a, b) => Value::from(a.as_f64() + b.as_f64()),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }
}
