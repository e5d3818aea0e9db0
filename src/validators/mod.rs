//! Validator catalog.
//!
//! Pure functions evaluating one value against one compiled
//! [`ValidatorSpec`]. Each evaluator returns `Ok(None)` on pass,
//! `Ok(Some(Violation))` on a failed check, and `Err` only for
//! evaluation-time errors (a value whose shape the validator cannot
//! inspect). Evaluators are free of side effects and retain no state
//! between calls.

pub mod path;
pub mod schema;
pub mod string;

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, SinkGuardError};
use crate::policy::model::ValidatorSpec;

/// Machine-readable reason for a validator failure.
///
/// This taxonomy is the stable contract sink adapters build on: new values
/// may be added, existing ones are never removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    TooLong,
    TooShort,
    DisallowedChar,
    PatternMismatch,
    DeniedPattern,
    DeniedSubstring,
    PathEscape,
    SubdirectoryNotAllowed,
    SchemaViolation,
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            ReasonCode::TooLong => "too_long",
            ReasonCode::TooShort => "too_short",
            ReasonCode::DisallowedChar => "disallowed_char",
            ReasonCode::PatternMismatch => "pattern_mismatch",
            ReasonCode::DeniedPattern => "denied_pattern",
            ReasonCode::DeniedSubstring => "denied_substring",
            ReasonCode::PathEscape => "path_escape",
            ReasonCode::SubdirectoryNotAllowed => "subdirectory_not_allowed",
            ReasonCode::SchemaViolation => "schema_violation",
        };
        f.write_str(token)
    }
}

/// A failed check: the reason code plus a human-readable detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub reason: ReasonCode,
    pub detail: String,
}

impl Violation {
    pub(crate) fn new(reason: ReasonCode, detail: impl Into<String>) -> Self {
        Violation {
            reason,
            detail: detail.into(),
        }
    }
}

/// Evaluate one value against one validator.
///
/// String and path validators operate only on textual values; any other
/// shape is a [`SinkGuardError::TypeMismatch`], never a policy failure.
pub fn evaluate(id: &str, spec: &ValidatorSpec, value: &Value) -> Result<Option<Violation>> {
    match spec {
        ValidatorSpec::String(spec) => {
            let text = expect_str(id, value)?;
            Ok(string::evaluate(spec, text))
        }
        ValidatorSpec::Path(spec) => {
            let text = expect_str(id, value)?;
            Ok(path::evaluate(spec, text))
        }
        ValidatorSpec::Schema(spec) => Ok(schema::evaluate(spec, value)),
    }
}

fn expect_str<'v>(id: &str, value: &'v Value) -> Result<&'v str> {
    value.as_str().ok_or_else(|| SinkGuardError::TypeMismatch {
        validator: id.to_string(),
        expected: "string",
        actual: json_type_name(value),
    })
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
