//! Capability adapters for dangerous operations.
//!
//! Each protected operation has a dedicated wrapper that calls the decision
//! engine *before* delegating to the real operation — an explicit adapter
//! pattern rather than runtime patching. On `Block` the adapter aborts and
//! surfaces the decision (validator id + reason) as an error; on `Warn` it
//! proceeds but logs the decision; on `Allow` it proceeds silently.
//!
//! Evaluation-time type errors propagate as errors too, so an adapter that
//! hands a validator the wrong shape aborts the operation — the
//! conservative treatment.
//!
//! The generic [`Gate`] underlies the concrete adapters:
//!
//! - [`fs::FileWriter`] — guarded filesystem writes
//! - [`command::CommandRunner`] — guarded process spawning
//! - [`sql::SqlExecutor`] — guarded SQL execution
//! - [`template::TemplateRenderer`] — guarded template rendering

pub mod command;
pub mod fs;
pub mod sql;
pub mod template;

use std::collections::BTreeSet;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::audit::{self, DbPool, DecisionRecord};
use crate::engine::Decision;
use crate::error::{Result, SinkGuardError};
use crate::policy::model::PolicyModel;
use crate::policy::reload::{self, SharedPolicy};
use crate::taint::{TaintTag, TaintedValue};

/// A value cleared by policy for a specific sink.
///
/// Can only be produced by [`Gate::approve`]; holding one is proof that the
/// wrapped value passed the sink's validators under the policy snapshot in
/// effect at approval time.
#[derive(Debug, Clone)]
pub struct Approved<T> {
    inner: T,
}

impl<T> Approved<T> {
    pub(in crate::guard) fn new(inner: T) -> Self {
        Approved { inner }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T> Deref for Approved<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Generic sink adapter: binds a sink id to the live policy and turns
/// decisions into enforced outcomes.
pub struct Gate {
    policy: SharedPolicy,
    sink: String,
    audit: Option<DbPool>,
}

impl Gate {
    /// Bind a gate to a sink id. Fails with
    /// [`SinkGuardError::UnknownSink`] here, at construction, not on first
    /// use.
    pub fn new(policy: SharedPolicy, sink: impl Into<String>) -> Result<Self> {
        let sink = sink.into();
        let model = reload::snapshot(&policy);
        if model.sink_spec(&sink).is_none() {
            return Err(SinkGuardError::UnknownSink(sink));
        }
        Ok(Gate {
            policy,
            sink,
            audit: None,
        })
    }

    /// Bind a gate to whichever sink guards the given function name.
    pub fn for_function(policy: SharedPolicy, function: &str) -> Result<Self> {
        let sink = {
            let model = reload::snapshot(&policy);
            model
                .sink_for_function(function)
                .map(|(id, _)| id.to_string())
                .ok_or_else(|| SinkGuardError::UnknownSink(function.to_string()))?
        };
        Ok(Gate {
            policy,
            sink,
            audit: None,
        })
    }

    /// Record every decision made through this gate in the audit log.
    pub fn with_audit(mut self, pool: DbPool) -> Self {
        self.audit = Some(pool);
        self
    }

    pub fn sink(&self) -> &str {
        &self.sink
    }

    fn model(&self) -> Arc<PolicyModel> {
        reload::snapshot(&self.policy)
    }

    /// Evaluate one value against the bound sink and record the decision.
    pub fn check(&self, value: &Value) -> Result<Decision> {
        let model = self.model();
        let decision = model.sink(&self.sink)?.decide(value)?;
        self.record(&decision, &BTreeSet::new());
        Ok(decision)
    }

    /// Evaluate a path-like argument (string validators see the file name,
    /// path validators the full path) and record the decision.
    pub fn check_path(&self, path: &Path) -> Result<Decision> {
        let model = self.model();
        let decision = model.sink(&self.sink)?.decide_path(path)?;
        self.record(&decision, &BTreeSet::new());
        Ok(decision)
    }

    /// Evaluate a tainted value, recording its provenance tags alongside
    /// the decision. Taint never changes the verdict; validators are fully
    /// effective whether or not tagging occurred.
    pub fn check_tainted(&self, value: &TaintedValue) -> Result<Decision> {
        let tags = value.tags();
        if !tags.is_empty() {
            debug!(sink = %self.sink, tags = %join_tags(&tags), "evaluating tainted value");
        }
        let model = self.model();
        let decision = model.sink(&self.sink)?.decide(&value.to_value())?;
        self.record(&decision, &tags);
        Ok(decision)
    }

    /// Fail if the given function name is listed in the sink's
    /// `forbid_functions`. Forbidden functions block unconditionally,
    /// before any validator runs.
    pub fn ensure_not_forbidden(&self, function: &str) -> Result<()> {
        let model = self.model();
        let spec = model
            .sink_spec(&self.sink)
            .ok_or_else(|| SinkGuardError::UnknownSink(self.sink.clone()))?;
        if spec.forbid_functions.iter().any(|f| f == function) {
            self.record_forbidden(function);
            return Err(SinkGuardError::ForbiddenFunction {
                sink: self.sink.clone(),
                function: function.to_string(),
            });
        }
        Ok(())
    }

    /// Turn a decision into an enforced outcome: `Allow` proceeds, `Warn`
    /// proceeds after logging, `Block` aborts with a structured error.
    pub fn enforce(&self, decision: Decision) -> Result<()> {
        match decision {
            Decision::Allow => Ok(()),
            Decision::Warn {
                validator_id,
                reason,
                detail,
            } => {
                warn!(
                    sink = %self.sink,
                    validator = %validator_id,
                    %reason,
                    %detail,
                    "policy warning, proceeding"
                );
                Ok(())
            }
            Decision::Block {
                validator_id,
                reason,
                detail,
            } => Err(SinkGuardError::Blocked {
                sink: self.sink.clone(),
                validator: validator_id,
                reason,
                detail,
            }),
        }
    }

    /// Check and enforce in one step, returning the value as [`Approved`].
    pub fn approve(&self, value: Value) -> Result<Approved<Value>> {
        let decision = self.check(&value)?;
        self.enforce(decision)?;
        Ok(Approved::new(value))
    }

    pub fn approve_str(&self, value: &str) -> Result<Approved<String>> {
        let decision = self.check(&Value::String(value.to_string()))?;
        self.enforce(decision)?;
        Ok(Approved::new(value.to_string()))
    }

    fn record(&self, decision: &Decision, tags: &BTreeSet<TaintTag>) {
        let Some(pool) = &self.audit else {
            return;
        };
        let record = DecisionRecord::from_decision(&self.sink, decision, tags);
        if let Err(e) = pool
            .get()
            .map_err(|e| SinkGuardError::Audit(e.to_string()))
            .and_then(|conn| audit::record_decision(&conn, &record))
        {
            // Audit failures never change the decision.
            warn!(sink = %self.sink, "failed to record decision: {}", e);
        }
    }

    fn record_forbidden(&self, function: &str) {
        let Some(pool) = &self.audit else {
            return;
        };
        let record = DecisionRecord::forbidden(&self.sink, function);
        if let Err(e) = pool
            .get()
            .map_err(|e| SinkGuardError::Audit(e.to_string()))
            .and_then(|conn| audit::record_decision(&conn, &record))
        {
            warn!(sink = %self.sink, "failed to record decision: {}", e);
        }
    }
}

fn join_tags(tags: &BTreeSet<TaintTag>) -> String {
    tags.iter()
        .map(TaintTag::as_str)
        .collect::<Vec<_>>()
        .join(",")
}
