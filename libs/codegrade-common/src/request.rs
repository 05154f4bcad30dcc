//! Decoding boundary: raw request text into a [`JobRequest`], plus the
//! field-level checks the engine applies before a job may run.

use crate::types::{InputCase, JobRequest};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Validation failures. The `Display` text is the diagnostic the caller sees,
/// prefixed with its category.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("malformed request: {0}")]
    Malformed(String),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid language provided: {0}")]
    InvalidLanguage(String),
}

/// Parse the raw request body.
pub fn decode(text: &str) -> Result<JobRequest, RequestError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| RequestError::Malformed(format!("body is not valid JSON ({e})")))?;

    if !value.is_object() {
        return Err(RequestError::Malformed("body must be a JSON object".to_string()));
    }

    serde_json::from_value(value).map_err(|e| RequestError::Malformed(e.to_string()))
}

/// Required, non-blank text field.
pub fn required_text<'a>(
    value: Option<&'a str>,
    field: &'static str,
) -> Result<&'a str, RequestError> {
    match value {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(RequestError::MissingField(field)),
    }
}

/// Convert the `cases` field into ordered input cases.
///
/// Absent or `null` means "run once with no input" and yields no cases.
pub fn parse_cases(cases: Option<&Value>) -> Result<Vec<InputCase>, RequestError> {
    let items = match cases {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(RequestError::Malformed(
                "cases must be an array of arrays".to_string(),
            ))
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(idx, case)| {
            let values = case.as_array().ok_or_else(|| {
                RequestError::Malformed(format!("case {} must be an array", idx + 1))
            })?;

            values
                .iter()
                .map(|value| {
                    primitive_text(value).ok_or_else(|| {
                        RequestError::Malformed(format!(
                            "case {} contains a non-primitive value",
                            idx + 1
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(|values| InputCase { values })
        })
        .collect()
}

fn primitive_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Pick the per-case deadline. Absent, invalid, zero, or `>= max` values
/// fall back to `default`.
pub fn resolve_timeout(raw: Option<&Value>, default: Duration, max: Duration) -> Duration {
    let secs = match raw {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    match secs.map(Duration::from_secs) {
        Some(timeout) if !timeout.is_zero() && timeout < max => timeout,
        _ => default,
    }
}
