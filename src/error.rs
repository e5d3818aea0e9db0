use thiserror::Error;

use crate::validators::ReasonCode;

/// Unified error type for the sinkguard library.
///
/// Load-time errors (`PolicyParse`, `UnknownValidatorReference`,
/// `InvalidValidatorSpec`, `DuplicateId`) abort policy construction: a
/// partially valid policy is never usable. `TypeMismatch` is an
/// evaluation-time integration error, distinct from a validator failing its
/// checks — those are expressed in the returned [`Decision`], never here.
///
/// [`Decision`]: crate::engine::Decision
#[derive(Debug, Error)]
pub enum SinkGuardError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Policy parse error: {0}")]
    PolicyParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Environment variable not set: {0}")]
    ConfigEnvVar(String),

    #[error("sink '{sink}' requires unknown validator '{validator}'")]
    UnknownValidatorReference { sink: String, validator: String },

    #[error("invalid validator spec '{id}': {reason}")]
    InvalidValidatorSpec { id: String, reason: String },

    #[error("duplicate {kind} id '{id}'")]
    DuplicateId { kind: &'static str, id: String },

    #[error("unknown sink '{0}'")]
    UnknownSink(String),

    #[error("validator '{validator}' expected a {expected} value, got {actual}")]
    TypeMismatch {
        validator: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("sink '{sink}' blocked by validator '{validator}': {reason} ({detail})")]
    Blocked {
        sink: String,
        validator: String,
        reason: ReasonCode,
        detail: String,
    },

    #[error("sink '{sink}': function '{function}' is forbidden by policy")]
    ForbiddenFunction { sink: String, function: String },

    #[error("template references unknown variable '{0}'")]
    UnknownTemplateVar(String),

    #[error("Audit log error: {0}")]
    Audit(String),
}

pub type Result<T> = std::result::Result<T, SinkGuardError>;
