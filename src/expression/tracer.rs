//! Recursive evaluation of template expressions embedded in stage inputs.

use super::{contains_expression, EvaluationContext, ExpressionEvaluator};
use crate::error::{OrchestrationError, OrchestrationResult};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Walks a value and evaluates every string that carries a template.
///
/// Strings without templates, numbers, booleans and nulls pass through
/// unchanged; arrays and objects are rebuilt with traced children.
pub struct ContextTracer<'a> {
    evaluator: &'a dyn ExpressionEvaluator,
    max_depth: usize,
}

impl<'a> ContextTracer<'a> {
    pub fn new(evaluator: &'a dyn ExpressionEvaluator, max_depth: usize) -> Self {
        Self {
            evaluator,
            max_depth,
        }
    }

    pub fn trace(&self, value: &Value, ctx: &EvaluationContext) -> OrchestrationResult<Value> {
        self.visit(value, ctx, 0)
    }

    /// Trace every entry of an input mapping against the same context
    pub fn trace_map(
        &self,
        inputs: &HashMap<String, Value>,
        ctx: &EvaluationContext,
    ) -> OrchestrationResult<HashMap<String, Value>> {
        inputs
            .iter()
            .map(|(key, value)| Ok((key.clone(), self.trace(value, ctx)?)))
            .collect()
    }

    fn visit(&self, value: &Value, ctx: &EvaluationContext, depth: usize) -> OrchestrationResult<Value> {
        if depth > self.max_depth {
            return Err(OrchestrationError::Expression(format!(
                "input nesting exceeds maximum trace depth {}",
                self.max_depth
            )));
        }

        match value {
            Value::String(s) if contains_expression(s) => self.evaluator.evaluate(s, ctx),
            Value::Array(items) => items
                .iter()
                .map(|item| self.visit(item, ctx, depth + 1))
                .collect::<OrchestrationResult<Vec<_>>>()
                .map(Value::Array),
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| Ok((k.clone(), self.visit(v, ctx, depth + 1)?)))
                .collect::<OrchestrationResult<Map<String, Value>>>()
                .map(Value::Object),
            other => Ok(other.clone()),
        }
    }
}
