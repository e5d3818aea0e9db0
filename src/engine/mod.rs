//! Decision engine.
//!
//! Resolves a sink invocation to its required validators, evaluates them in
//! listed order through the validator catalog, and aggregates the outcome
//! into a single [`Decision`]. Aggregation is strict AND: every required
//! validator must pass for [`Decision::Allow`], and the first failure is
//! attributed exactly.
//!
//! Evaluation is synchronous, CPU-only, and free of shared mutable state:
//! concurrent `decide` calls against the same [`PolicyModel`] need no
//! locking.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, SinkGuardError};
use crate::policy::model::{Mode, PolicyModel, SinkSpec, ValidatorSpec};
use crate::validators::{self, ReasonCode, Violation};

/// The engine's verdict for one sink invocation.
///
/// `Block` and `Warn` are first-class successful results, not errors; they
/// attribute the first validator that failed in evaluation order and carry
/// no partial state beyond it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Block {
        validator_id: String,
        reason: ReasonCode,
        detail: String,
    },
    Warn {
        validator_id: String,
        reason: ReasonCode,
        detail: String,
    },
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn is_block(&self) -> bool {
        matches!(self, Decision::Block { .. })
    }

    /// Short action token, matching the audit log's `action` column.
    pub fn action(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Block { .. } => "block",
            Decision::Warn { .. } => "warn",
        }
    }
}

/// A sink resolved against a specific policy.
///
/// Construction via [`PolicyModel::sink`] is where an unknown sink id
/// surfaces; once bound, [`decide`](BoundSink::decide) cannot fail on sink
/// lookup.
pub struct BoundSink<'p> {
    policy: &'p PolicyModel,
    id: &'p str,
    spec: &'p SinkSpec,
}

impl PolicyModel {
    /// Bind a sink for evaluation, failing with
    /// [`SinkGuardError::UnknownSink`] if the id is absent.
    pub fn sink<'p>(&'p self, id: &str) -> Result<BoundSink<'p>> {
        let (id, spec) = self
            .sink_entry(id)
            .ok_or_else(|| SinkGuardError::UnknownSink(id.to_string()))?;
        Ok(BoundSink {
            policy: self,
            id,
            spec,
        })
    }
}

impl<'p> BoundSink<'p> {
    pub fn id(&self) -> &str {
        self.id
    }

    pub fn spec(&self) -> &SinkSpec {
        self.spec
    }

    /// Evaluate the sink's required validators against one value, in listed
    /// order, stopping at the first failure.
    pub fn decide(&self, value: &Value) -> Result<Decision> {
        self.decide_with(|_| value)
    }

    /// Evaluate against a path-like argument: string validators see the
    /// file name, path (and schema) validators see the full path.
    ///
    /// This mirrors how a filename rule and a containment rule bind to the
    /// same file-write sink without validating each other's representation.
    pub fn decide_path(&self, path: &std::path::Path) -> Result<Decision> {
        let full = Value::String(path.to_string_lossy().into_owned());
        let name = Value::String(
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
        self.decide_with(|spec| match spec {
            ValidatorSpec::String(_) => &name,
            _ => &full,
        })
    }

    fn decide_with<'v>(
        &self,
        select: impl Fn(&ValidatorSpec) -> &'v Value,
    ) -> Result<Decision> {
        for vid in &self.spec.require {
            let spec = self.policy.validator(vid).ok_or_else(|| {
                // Unreachable after load-time validation; kept as a
                // propagated error rather than a panic.
                SinkGuardError::UnknownValidatorReference {
                    sink: self.id.to_string(),
                    validator: vid.clone(),
                }
            })?;

            let value = select(spec);
            match validators::evaluate(vid, spec, value)? {
                None => {
                    debug!(sink = self.id, validator = %vid, "validator passed");
                }
                Some(violation) => return Ok(self.resolve(vid, violation)),
            }
        }
        Ok(Decision::Allow)
    }

    fn resolve(&self, validator_id: &str, violation: Violation) -> Decision {
        let mode = self
            .spec
            .mode_override
            .unwrap_or_else(|| self.policy.default_mode());
        let Violation { reason, detail } = violation;
        // The sink's message override is resolved here, against the same
        // policy the decision was made under, so a concurrent reload can
        // never mix the verdict of one policy with the message of another.
        let surfaced = || self.spec.message.clone().unwrap_or_else(|| detail.clone());
        match mode {
            Mode::Block => Decision::Block {
                validator_id: validator_id.to_string(),
                reason,
                detail: surfaced(),
            },
            Mode::Warn => Decision::Warn {
                validator_id: validator_id.to_string(),
                reason,
                detail: surfaced(),
            },
            Mode::Allow => {
                // Recorded for audit; an allow-mode validator can never
                // itself cause rejection, and evaluation stops here to stay
                // deterministic.
                warn!(
                    sink = self.id,
                    validator = %validator_id,
                    %reason,
                    %detail,
                    "validator failed under allow mode"
                );
                Decision::Allow
            }
        }
    }
}

/// Evaluate one value against one sink of the given policy.
///
/// Convenience over [`PolicyModel::sink`] + [`BoundSink::decide`].
pub fn decide(policy: &PolicyModel, sink_id: &str, value: &Value) -> Result<Decision> {
    policy.sink(sink_id)?.decide(value)
}
