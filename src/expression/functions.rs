use super::parser::Expr;
use super::EvaluationContext;
use crate::error::{OrchestrationError, OrchestrationResult};
use serde_json::Value;
use std::cmp::Ordering;

pub(crate) fn eval(expr: &Expr, ctx: &EvaluationContext) -> OrchestrationResult<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Call { name, args } => call(name, args, ctx),
    }
}

fn call(name: &str, args: &[Expr], ctx: &EvaluationContext) -> OrchestrationResult<Value> {
    // `if` evaluates lazily so the untaken branch may reference missing data
    if name == "if" {
        expect_arity(name, args, 3)?;
        let condition = eval(&args[0], ctx)?;
        return eval(if truthy(&condition) { &args[1] } else { &args[2] }, ctx);
    }

    let values = args
        .iter()
        .map(|arg| eval(arg, ctx))
        .collect::<OrchestrationResult<Vec<_>>>()?;

    match name {
        "output" => {
            expect_arity(name, args, 2)?;
            let stage = text(&values[0]);
            let key = text(&values[1]);
            Ok(ctx
                .outputs
                .get(&stage)
                .and_then(|outputs| outputs.get(&key))
                .cloned()
                .unwrap_or(Value::Null))
        }
        "input" => {
            expect_arity(name, args, 1)?;
            Ok(ctx
                .inputs
                .get(&text(&values[0]))
                .cloned()
                .unwrap_or(Value::Null))
        }
        "value" => {
            expect_arity(name, args, 0)?;
            Ok(ctx.value.clone().unwrap_or(Value::Null))
        }
        "property" => {
            expect_arity(name, args, 1)?;
            let key = text(&values[0]);
            Ok(ctx
                .deployment_spec
                .as_ref()
                .and_then(|spec| spec.get(&key))
                .cloned()
                .unwrap_or(Value::Null))
        }
        "lt" | "le" | "gt" | "ge" => {
            expect_arity(name, args, 2)?;
            let ordering = compare(name, &values[0], &values[1])?;
            Ok(Value::Bool(match name {
                "lt" => ordering == Ordering::Less,
                "le" => ordering != Ordering::Greater,
                "gt" => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        "eq" | "ne" => {
            expect_arity(name, args, 2)?;
            let equal = loosely_equal(&values[0], &values[1]);
            Ok(Value::Bool(if name == "eq" { equal } else { !equal }))
        }
        "and" => Ok(Value::Bool(values.iter().all(truthy))),
        "or" => Ok(Value::Bool(values.iter().any(truthy))),
        "not" => {
            expect_arity(name, args, 1)?;
            Ok(Value::Bool(!truthy(&values[0])))
        }
        "add" | "sub" | "mul" | "div" => {
            expect_arity(name, args, 2)?;
            let a = number(name, &values[0])?;
            let b = number(name, &values[1])?;
            let result = match name {
                "add" => a + b,
                "sub" => a - b,
                "mul" => a * b,
                _ => {
                    if b == 0.0 {
                        return Err(OrchestrationError::Expression(
                            "division by zero".to_string(),
                        ));
                    }
                    a / b
                }
            };
            Ok(number_value(result))
        }
        "concat" => Ok(Value::String(values.iter().map(text).collect())),
        _ => Err(OrchestrationError::Expression(format!(
            "unknown function '{name}'"
        ))),
    }
}

fn expect_arity(name: &str, args: &[Expr], expected: usize) -> OrchestrationResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(OrchestrationError::Expression(format!(
            "{name} expects {expected} argument(s), got {}",
            args.len()
        )))
    }
}

/// Textual form used for interpolation and key lookups
pub(crate) fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s.eq_ignore_ascii_case("false")),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn number(name: &str, value: &Value) -> OrchestrationResult<f64> {
    as_number(value).ok_or_else(|| {
        OrchestrationError::Expression(format!("{name}: '{value}' is not a number"))
    })
}

fn compare(name: &str, a: &Value, b: &Value) -> OrchestrationResult<Ordering> {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).ok_or_else(|| {
            OrchestrationError::Expression(format!("{name}: cannot compare {x} and {y}"))
        }),
        _ => match (a, b) {
            (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
            _ => Err(OrchestrationError::Expression(format!(
                "{name}: cannot compare '{a}' and '{b}'"
            ))),
        },
    }
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => text(a) == text(b),
    }
}

/// Integral results stay integers so counters compare equal to JSON ints
pub(crate) fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}
