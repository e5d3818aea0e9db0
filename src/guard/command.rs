//! Guarded process spawning.

use std::process::{Command, Output};

use serde_json::Value;

use crate::audit::DbPool;
use crate::error::Result;
use crate::policy::reload::SharedPolicy;

use super::Gate;

/// Wraps `std::process::Command` behind a sink decision.
///
/// The program name is checked against `forbid_functions` first, then the
/// program and every argument run through the sink's validators. Nothing is
/// spawned unless all of them pass.
pub struct CommandRunner {
    gate: Gate,
}

impl CommandRunner {
    pub fn new(policy: SharedPolicy, sink: impl Into<String>) -> Result<Self> {
        Ok(CommandRunner {
            gate: Gate::new(policy, sink)?,
        })
    }

    pub fn with_audit(mut self, pool: DbPool) -> Self {
        self.gate = self.gate.with_audit(pool);
        self
    }

    /// Validate the program and arguments, then spawn and wait for output.
    pub fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        self.validate(program, args)?;
        let output = Command::new(program).args(args).output()?;
        Ok(output)
    }

    /// Run every check without spawning anything.
    pub fn validate(&self, program: &str, args: &[&str]) -> Result<()> {
        self.gate.ensure_not_forbidden(program)?;
        for arg in std::iter::once(&program).chain(args.iter()) {
            let decision = self.gate.check(&Value::String((*arg).to_string()))?;
            self.gate.enforce(decision)?;
        }
        Ok(())
    }
}
