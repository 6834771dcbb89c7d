//! Coercion of raw model output into typed answers.
//!
//! [`validate`] is a pure function: it returns `Ok(None)` for null-like
//! output (`null`, `"none"`, `"null"`, `"not found"`, `""`, case-insensitive)
//! and fails with [`KtError::SchemaViolation`] only on a real type mismatch.
//! Running it again on its own output is a no-op.

use std::borrow::Cow;

use serde_json::Value;

use crate::error::{KtError, Result};
use crate::rule::{self, Rule};
use crate::shape::{AnswerShape, AnswerValue};

const NULL_SENTINELS: [&str; 4] = ["none", "not found", "null", ""];

/// Whether `value` means "no answer".
pub fn is_null_like(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => NULL_SENTINELS.contains(&s.trim().to_lowercase().as_str()),
        _ => false,
    }
}

/// Validate `raw` against `shape`, applying `must_return` and `max_length`.
///
/// Options are filtered before truncation, so a `max_length(n)` answer
/// keeps the first `n` acceptable items.
pub fn validate(shape: AnswerShape, rules: &[Rule], raw: &Value) -> Result<Option<AnswerValue>> {
    let raw = decode_embedded_list(shape, raw);
    let raw = raw.as_ref();
    if is_null_like(raw) {
        return Ok(None);
    }

    match shape {
        AnswerShape::Bool => validate_bool(unwrap_single(raw)),
        AnswerShape::Int => {
            let value = unwrap_single(raw);
            if is_null_like(value) {
                return Ok(None);
            }
            coerce_int(value).map(|n| Some(AnswerValue::Int(n)))
        }
        AnswerShape::String => validate_string(unwrap_single(raw), rules),
        AnswerShape::StringList => validate_string_list(raw, rules),
        AnswerShape::IntList => validate_int_list(raw, rules),
    }
}

/// List answers sometimes arrive as a JSON document inside a string.
fn decode_embedded_list(shape: AnswerShape, raw: &Value) -> Cow<'_, Value> {
    if shape.is_list() {
        if let Value::String(s) = raw {
            if s.trim_start().starts_with('[') {
                if let Ok(decoded @ Value::Array(_)) = serde_json::from_str::<Value>(s) {
                    return Cow::Owned(decoded);
                }
            }
        }
    }
    Cow::Borrowed(raw)
}

fn unwrap_single(raw: &Value) -> &Value {
    match raw {
        Value::Array(items) if items.len() == 1 => &items[0],
        other => other,
    }
}

fn violation(shape: AnswerShape, raw: &Value) -> KtError {
    KtError::SchemaViolation(format!("expected {shape}, got {raw}"))
}

fn validate_bool(value: &Value) -> Result<Option<AnswerValue>> {
    if is_null_like(value) {
        return Ok(None);
    }
    match value {
        Value::Bool(b) => Ok(Some(AnswerValue::Bool(*b))),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" => Ok(Some(AnswerValue::Bool(true))),
            "false" => Ok(Some(AnswerValue::Bool(false))),
            _ => Err(violation(AnswerShape::Bool, value)),
        },
        _ => Err(violation(AnswerShape::Bool, value)),
    }
}

/// Integers and decimal strings convert; floats and everything else do not.
fn coerce_int(value: &Value) -> Result<i64> {
    match value {
        Value::Number(n) => n.as_i64().ok_or_else(|| violation(AnswerShape::Int, value)),
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| violation(AnswerShape::Int, value)),
        _ => Err(violation(AnswerShape::Int, value)),
    }
}

fn validate_string(value: &Value, rules: &[Rule]) -> Result<Option<AnswerValue>> {
    if is_null_like(value) {
        return Ok(None);
    }
    let Value::String(s) = value else {
        return Err(violation(AnswerShape::String, value));
    };
    let s = s.trim();
    if let Some(options) = rule::must_return(rules) {
        if !options.iter().any(|option| option == s) {
            return Ok(None);
        }
    }
    Ok(Some(AnswerValue::String(s.to_string())))
}

fn list_items(raw: &Value) -> Cow<'_, [Value]> {
    match raw {
        Value::Array(items) => Cow::Borrowed(items.as_slice()),
        other => Cow::Owned(vec![other.clone()]),
    }
}

fn is_single_null(items: &[Value]) -> bool {
    items.len() == 1 && is_null_like(&items[0])
}

fn validate_string_list(raw: &Value, rules: &[Rule]) -> Result<Option<AnswerValue>> {
    let items = list_items(raw);
    if is_single_null(&items) {
        return Ok(None);
    }

    let mut values = items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.trim().to_string()),
            other => Err(violation(AnswerShape::StringList, other)),
        })
        .collect::<Result<Vec<String>>>()?;

    if let Some(options) = rule::must_return(rules) {
        values.retain(|value| options.contains(value));
    }
    if let Some(length) = rule::max_length(rules) {
        values.truncate(length);
    }

    if values.len() == 1 && is_null_like(&Value::String(values[0].clone())) {
        return Ok(None);
    }
    Ok(Some(AnswerValue::StringList(values)))
}

fn validate_int_list(raw: &Value, rules: &[Rule]) -> Result<Option<AnswerValue>> {
    let items = list_items(raw);
    if is_single_null(&items) {
        return Ok(None);
    }

    let mut values = items.iter().map(coerce_int).collect::<Result<Vec<i64>>>()?;
    if let Some(length) = rule::max_length(rules) {
        values.truncate(length);
    }
    Ok(Some(AnswerValue::IntList(values)))
}
