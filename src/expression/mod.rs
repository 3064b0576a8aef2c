//! # Expression Evaluation
//!
//! Stage inputs, site selectors and stage selectors may embed `${{ ... }}`
//! template expressions. The engine consumes evaluation through the
//! [`ExpressionEvaluator`] trait; [`TemplateEvaluator`] is the default
//! implementation and [`ContextTracer`] walks nested input values through it.
//!
//! ```rust
//! use fleet_core::expression::{EvaluationContext, ExpressionEvaluator, TemplateEvaluator};
//! use serde_json::json;
//!
//! let mut ctx = EvaluationContext::default();
//! ctx.outputs.insert("test".into(), [("foo".to_string(), json!(3))].into());
//!
//! let next = TemplateEvaluator::new()
//!     .evaluate("${{$if($lt($output(test,foo), 5), test, '')}}", &ctx)
//!     .unwrap();
//! assert_eq!(next, json!("test"));
//! ```

mod functions;
mod parser;
pub mod template;
pub mod tracer;

use crate::error::OrchestrationResult;
use crate::models::StageOutputs;
use serde_json::Value;
use std::collections::HashMap;

pub use template::TemplateEvaluator;
pub use tracer::ContextTracer;

/// Values an expression can see
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    pub inputs: HashMap<String, Value>,
    pub outputs: StageOutputs,
    /// Ambient value reachable through `$value()`
    pub value: Option<Value>,
    pub deployment_spec: Option<Value>,
}

impl EvaluationContext {
    pub fn new(inputs: HashMap<String, Value>, outputs: StageOutputs) -> Self {
        Self {
            inputs,
            outputs,
            value: None,
            deployment_spec: None,
        }
    }
}

/// Black-box expression evaluation used by the stage engine
pub trait ExpressionEvaluator: Send + Sync {
    fn evaluate(&self, expression: &str, ctx: &EvaluationContext) -> OrchestrationResult<Value>;
}

/// Whether a string carries at least one template expression
pub fn contains_expression(text: &str) -> bool {
    text.contains(template::OPEN)
}
