use super::functions::{eval, text};
use super::parser::parse;
use super::{EvaluationContext, ExpressionEvaluator};
use crate::error::{OrchestrationError, OrchestrationResult};
use serde_json::Value;

pub(crate) const OPEN: &str = "${{";
const CLOSE: &str = "}}";

/// Default evaluator for `${{ ... }}` templates.
///
/// A string that is exactly one template yields the expression's typed value;
/// text mixed with templates is interpolated into a string; a string without
/// templates is returned unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateEvaluator;

impl TemplateEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl ExpressionEvaluator for TemplateEvaluator {
    fn evaluate(&self, expression: &str, ctx: &EvaluationContext) -> OrchestrationResult<Value> {
        let blocks = split_blocks(expression)?;

        match blocks.as_slice() {
            [] => Ok(Value::String(expression.to_string())),
            [Segment::Expr(body)] => eval(&parse(body)?, ctx),
            segments => {
                let mut rendered = String::new();
                for segment in segments {
                    match segment {
                        Segment::Text(t) => rendered.push_str(t),
                        Segment::Expr(body) => rendered.push_str(&text(&eval(&parse(body)?, ctx)?)),
                    }
                }
                Ok(Value::String(rendered))
            }
        }
    }
}

#[derive(Debug, PartialEq)]
enum Segment<'a> {
    Text(&'a str),
    Expr(&'a str),
}

/// Split into text and expression bodies. Returns no segments when the
/// string has no template at all. Whitespace around a lone template is
/// ignored so `" ${{ x }} "` still yields a typed value.
fn split_blocks(source: &str) -> OrchestrationResult<Vec<Segment<'_>>> {
    if !source.contains(OPEN) {
        return Ok(Vec::new());
    }

    let mut segments = Vec::new();
    let mut rest = source;
    while let Some(start) = rest.find(OPEN) {
        if start > 0 {
            segments.push(Segment::Text(&rest[..start]));
        }
        let after_open = &rest[start + OPEN.len()..];
        let end = after_open.find(CLOSE).ok_or_else(|| {
            OrchestrationError::Expression(format!("unterminated template in '{source}'"))
        })?;
        segments.push(Segment::Expr(after_open[..end].trim()));
        rest = &after_open[end + CLOSE.len()..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Text(rest));
    }

    let expr_count = segments
        .iter()
        .filter(|s| matches!(s, Segment::Expr(_)))
        .count();
    if expr_count == 1 {
        segments.retain(|s| !matches!(s, Segment::Text(t) if t.trim().is_empty()));
    }
    Ok(segments)
}
