//! Schema validator.
//!
//! A recursive walker over a generic structured value
//! ([`serde_json::Value`]) against an embedded schema document. Supported
//! keywords: `type`, `enum`, `pattern`, `minimum`/`maximum`,
//! `minLength`/`maxLength`, `required`, `properties`, `items`, with
//! arbitrary nesting. The walk is a deterministic pre-order traversal —
//! object keys in declaration order, array elements in index order — and
//! stops at the first violation, reporting its path (e.g.
//! `$.items[0].name`).
//!
//! Keywords are ignored for values of a non-matching shape (`pattern` on a
//! number, `minimum` on a string), as in the usual schema dialects; shape
//! itself is enforced with `type`.

use serde_json::Value;

use crate::policy::model::SchemaSpec;

use super::{json_type_name, ReasonCode, Violation};

pub fn evaluate(spec: &SchemaSpec, value: &Value) -> Option<Violation> {
    check(spec, &spec.schema, value, "$").err()
}

fn violation(at: &str, message: String) -> Violation {
    Violation::new(ReasonCode::SchemaViolation, format!("{}: {}", at, message))
}

fn check(
    spec: &SchemaSpec,
    schema: &Value,
    value: &Value,
    at: &str,
) -> Result<(), Violation> {
    let Some(rules) = schema.as_object() else {
        return Ok(());
    };

    if let Some(expected) = rules.get("type").and_then(Value::as_str) {
        if !type_matches(expected, value) {
            return Err(violation(
                at,
                format!("expected {}, got {}", expected, json_type_name(value)),
            ));
        }
    }

    if let Some(allowed) = rules.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            return Err(violation(at, "value not in enum".to_string()));
        }
    }

    if let (Some(pat), Some(text)) = (
        rules.get("pattern").and_then(Value::as_str),
        value.as_str(),
    ) {
        // Compiled at policy load; unanchored search semantics.
        if let Some(re) = spec.patterns.get(pat) {
            if !re.is_match(text) {
                return Err(violation(at, format!("does not match pattern {:?}", pat)));
            }
        }
    }

    if let Some(n) = value.as_f64() {
        if let Some(min) = rules.get("minimum").and_then(Value::as_f64) {
            if n < min {
                return Err(violation(at, format!("{} below minimum {}", n, min)));
            }
        }
        if let Some(max) = rules.get("maximum").and_then(Value::as_f64) {
            if n > max {
                return Err(violation(at, format!("{} above maximum {}", n, max)));
            }
        }
    }

    if let Some(text) = value.as_str() {
        let len = text.chars().count();
        if let Some(min) = rules.get("minLength").and_then(Value::as_u64) {
            if (len as u64) < min {
                return Err(violation(at, format!("length {} below minLength {}", len, min)));
            }
        }
        if let Some(max) = rules.get("maxLength").and_then(Value::as_u64) {
            if (len as u64) > max {
                return Err(violation(at, format!("length {} above maxLength {}", len, max)));
            }
        }
    }

    if let Some(obj) = value.as_object() {
        if let Some(required) = rules.get("required").and_then(Value::as_array) {
            for key in required.iter().filter_map(Value::as_str) {
                if !obj.contains_key(key) {
                    return Err(violation(at, format!("missing required property {:?}", key)));
                }
            }
        }
        if let Some(props) = rules.get("properties").and_then(Value::as_object) {
            // Declaration order: the schema map preserves insertion order.
            for (key, subschema) in props {
                if let Some(subvalue) = obj.get(key) {
                    check(spec, subschema, subvalue, &format!("{}.{}", at, key))?;
                }
            }
        }
    }

    if let (Some(items), Some(elements)) = (rules.get("items"), value.as_array()) {
        for (i, element) in elements.iter().enumerate() {
            check(spec, items, element, &format!("{}[{}]", at, i))?;
        }
    }

    Ok(())
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        "number" => value.is_number(),
        "integer" => {
            value.is_i64()
                || value.is_u64()
                || value.as_f64().is_some_and(|f| f.fract() == 0.0)
        }
        _ => false,
    }
}
