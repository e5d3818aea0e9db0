//! String validator.
//!
//! Checks run in fixed order and stop at the first failure, so the reason
//! attributed to an input violating several rules at once is always the
//! same: length bounds, then charset, then the deny-regex, then
//! deny-substrings, then the full-match regex.

use crate::policy::model::StringSpec;

use super::{ReasonCode, Violation};

pub fn evaluate(spec: &StringSpec, value: &str) -> Option<Violation> {
    let len = value.chars().count();
    if let Some(max) = spec.max_len {
        if len > max {
            return Some(Violation::new(
                ReasonCode::TooLong,
                format!("length {} exceeds limit {}", len, max),
            ));
        }
    }
    if let Some(min) = spec.min_len {
        if len < min {
            return Some(Violation::new(
                ReasonCode::TooShort,
                format!("length {} below minimum {}", len, min),
            ));
        }
    }

    if let Some(charset) = &spec.allowed_charset {
        if let Some(c) = value.chars().find(|c| !charset.contains(c)) {
            return Some(Violation::new(
                ReasonCode::DisallowedChar,
                format!("character {:?} outside allowed set", c),
            ));
        }
    }

    if let Some(re) = &spec.deny_regex {
        // Unanchored search: any occurrence fails.
        if re.is_match(value) {
            return Some(Violation::new(
                ReasonCode::DeniedPattern,
                format!("matches forbidden pattern {}", re.as_str()),
            ));
        }
    }

    // Literal, case-sensitive substring matches, checked in listed order.
    for sub in &spec.deny_substrings {
        if value.contains(sub.as_str()) {
            return Some(Violation::new(
                ReasonCode::DeniedSubstring,
                format!("contains forbidden substring {:?}", sub),
            ));
        }
    }

    if let Some(re) = &spec.regex {
        if !re.is_match(value) {
            return Some(Violation::new(
                ReasonCode::PatternMismatch,
                format!("value does not match pattern {}", re.as_str()),
            ));
        }
    }

    None
}
