//! Guarded template rendering.

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::Value;

use crate::audit::DbPool;
use crate::error::{Result, SinkGuardError};
use crate::policy::reload::SharedPolicy;

use super::Gate;

/// Renders `${name}` placeholders behind a sink decision.
///
/// The template text and every substitution value are validated before any
/// splicing happens, so an injected value is rejected whole rather than
/// discovered after it has been embedded.
pub struct TemplateRenderer {
    gate: Gate,
}

impl TemplateRenderer {
    pub fn new(policy: SharedPolicy, sink: impl Into<String>) -> Result<Self> {
        Ok(TemplateRenderer {
            gate: Gate::new(policy, sink)?,
        })
    }

    pub fn with_audit(mut self, pool: DbPool) -> Self {
        self.gate = self.gate.with_audit(pool);
        self
    }

    /// Validate the template and all values, then substitute placeholders.
    ///
    /// A placeholder with no matching entry in `vars` fails with
    /// [`SinkGuardError::UnknownTemplateVar`]; unused entries are fine.
    pub fn render(&self, template: &str, vars: &BTreeMap<String, String>) -> Result<String> {
        self.approve(template)?;
        for value in vars.values() {
            self.approve(value)?;
        }

        let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
        let mut out = String::with_capacity(template.len());
        let mut last = 0;
        for caps in re.captures_iter(template) {
            let whole = match caps.get(0) {
                Some(m) => m,
                None => continue,
            };
            let name = &caps[1];
            let value = vars
                .get(name)
                .ok_or_else(|| SinkGuardError::UnknownTemplateVar(name.to_string()))?;
            out.push_str(&template[last..whole.start()]);
            out.push_str(value);
            last = whole.end();
        }
        out.push_str(&template[last..]);
        Ok(out)
    }

    fn approve(&self, text: &str) -> Result<()> {
        let decision = self.gate.check(&Value::String(text.to_string()))?;
        self.gate.enforce(decision)
    }
}
