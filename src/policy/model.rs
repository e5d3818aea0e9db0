//! Compiled, immutable policy model.
//!
//! [`PolicyModel::compile`] turns a parsed [`PolicyDocument`] into the form
//! the decision engine evaluates against: regexes compiled, charsets
//! expanded, allowed roots normalized, and every cross-reference checked.
//! All load-time errors from the policy error taxonomy surface here — after
//! compilation succeeds, evaluation can never hit an unknown validator id or
//! an unparsable regex.
//!
//! The model is never mutated in place. Reload replaces it wholesale (see
//! [`reload`](super::reload)).

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SinkGuardError};
use crate::validators::path::normalize;

use super::config::{PolicyDocument, ValidatorKind};

/// Enforcement action when a validator fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Reject the operation.
    Block,
    /// Let the operation proceed but surface the failure.
    Warn,
    /// Let the operation proceed silently; the failure is only logged.
    Allow,
}

/// Compiled string validator.
#[derive(Debug, Clone)]
pub struct StringSpec {
    pub max_len: Option<usize>,
    pub min_len: Option<usize>,
    /// Full-match regex (anchored at compile time).
    pub regex: Option<Regex>,
    /// Literal set of permitted characters.
    pub allowed_charset: Option<BTreeSet<char>>,
    /// Forbidden pattern (unanchored search).
    pub deny_regex: Option<Regex>,
    /// Literal substrings that must not occur, checked in order.
    pub deny_substrings: Vec<String>,
}

/// Compiled path validator.
///
/// Roots are normalized at load time so that evaluation is a pure
/// component-prefix comparison.
#[derive(Debug, Clone)]
pub struct PathSpec {
    pub allowed_roots: Vec<PathBuf>,
    pub allow_subdirectories: bool,
}

/// Compiled schema validator.
///
/// Every `pattern` entry nested anywhere in the schema document is compiled
/// at load time; evaluation looks regexes up by their pattern text and never
/// compiles.
#[derive(Debug, Clone)]
pub struct SchemaSpec {
    pub schema: Value,
    pub patterns: HashMap<String, Regex>,
}

/// A compiled validator, tagged by kind.
#[derive(Debug, Clone)]
pub enum ValidatorSpec {
    String(StringSpec),
    Path(PathSpec),
    Schema(SchemaSpec),
}

/// Compiled sink binding.
#[derive(Debug, Clone)]
pub struct SinkSpec {
    /// Qualified name of the guarded operation.
    pub function: String,
    /// Validator ids evaluated in this exact order.
    pub require: Vec<String>,
    /// Per-sink enforcement mode, overriding the policy default.
    pub mode_override: Option<Mode>,
    /// Optional message surfaced on violations instead of the generated detail.
    pub message: Option<String>,
    /// Function names always blocked at this sink.
    pub forbid_functions: Vec<String>,
}

/// The immutable policy: validators, sinks, and the default enforcement mode.
///
/// Built once at load time; concurrent `decide` calls share it read-only
/// with no locking.
#[derive(Debug)]
pub struct PolicyModel {
    version: u32,
    default_mode: Mode,
    validators: HashMap<String, ValidatorSpec>,
    sinks: HashMap<String, SinkSpec>,
}

impl PolicyModel {
    /// Compile a parsed document, performing all load-time validation.
    ///
    /// Fails with [`SinkGuardError::DuplicateId`],
    /// [`SinkGuardError::InvalidValidatorSpec`], or
    /// [`SinkGuardError::UnknownValidatorReference`]; on any error the whole
    /// policy is rejected.
    pub fn compile(doc: PolicyDocument) -> Result<Self> {
        let mut validators = HashMap::new();
        for v in doc.validators {
            let spec = compile_validator(&v.id, v.kind)?;
            if validators.insert(v.id.clone(), spec).is_some() {
                return Err(SinkGuardError::DuplicateId {
                    kind: "validator",
                    id: v.id,
                });
            }
        }

        let mut sinks = HashMap::new();
        for s in doc.sinks {
            for vid in &s.require {
                if !validators.contains_key(vid) {
                    return Err(SinkGuardError::UnknownValidatorReference {
                        sink: s.id.clone(),
                        validator: vid.clone(),
                    });
                }
            }
            let spec = SinkSpec {
                function: s.function,
                require: s.require,
                mode_override: s.mode,
                message: s.message,
                forbid_functions: s.forbid_functions,
            };
            if sinks.insert(s.id.clone(), spec).is_some() {
                return Err(SinkGuardError::DuplicateId {
                    kind: "sink",
                    id: s.id,
                });
            }
        }

        Ok(PolicyModel {
            version: doc.version,
            default_mode: doc.defaults.mode,
            validators,
            sinks,
        })
    }

    /// Load, parse, and compile a policy file.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        Self::compile(PolicyDocument::load_from_path(path)?)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn default_mode(&self) -> Mode {
        self.default_mode
    }

    pub fn validator(&self, id: &str) -> Option<&ValidatorSpec> {
        self.validators.get(id)
    }

    pub fn sink_spec(&self, id: &str) -> Option<&SinkSpec> {
        self.sinks.get(id)
    }

    pub(crate) fn sink_entry(&self, id: &str) -> Option<(&str, &SinkSpec)> {
        self.sinks.get_key_value(id).map(|(k, v)| (k.as_str(), v))
    }

    /// Look up the sink guarding a given function name.
    pub fn sink_for_function(&self, function: &str) -> Option<(&str, &SinkSpec)> {
        self.sinks
            .iter()
            .find(|(_, s)| s.function == function)
            .map(|(id, s)| (id.as_str(), s))
    }

    pub fn validator_count(&self) -> usize {
        self.validators.len()
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    pub fn sink_ids(&self) -> impl Iterator<Item = &str> {
        self.sinks.keys().map(String::as_str)
    }
}

fn compile_validator(id: &str, kind: ValidatorKind) -> Result<ValidatorSpec> {
    match kind {
        ValidatorKind::String {
            max_len,
            min_len,
            regex,
            allowed_charset,
            deny_regex,
            deny_substrings,
        } => {
            let regex = match regex {
                // Anchor so the whole value must match, not just a substring.
                Some(pat) => Some(Regex::new(&format!("^(?:{})$", pat)).map_err(|e| {
                    SinkGuardError::InvalidValidatorSpec {
                        id: id.to_string(),
                        reason: format!("unparsable regex: {}", e),
                    }
                })?),
                None => None,
            };
            let deny_regex = match deny_regex {
                // Unanchored: any occurrence anywhere in the value fails.
                Some(pat) => Some(Regex::new(&pat).map_err(|e| {
                    SinkGuardError::InvalidValidatorSpec {
                        id: id.to_string(),
                        reason: format!("unparsable deny_regex: {}", e),
                    }
                })?),
                None => None,
            };
            let allowed_charset = allowed_charset.map(|s| s.chars().collect());
            Ok(ValidatorSpec::String(StringSpec {
                max_len,
                min_len,
                regex,
                allowed_charset,
                deny_regex,
                deny_substrings,
            }))
        }
        ValidatorKind::Path {
            allowed_roots,
            allow_subdirectories,
        } => {
            if allowed_roots.is_empty() {
                return Err(SinkGuardError::InvalidValidatorSpec {
                    id: id.to_string(),
                    reason: "no allowed roots configured".to_string(),
                });
            }
            let mut roots = Vec::with_capacity(allowed_roots.len());
            for root in allowed_roots {
                if !root.is_absolute() {
                    return Err(SinkGuardError::InvalidValidatorSpec {
                        id: id.to_string(),
                        reason: format!("allowed root '{}' is not absolute", root.display()),
                    });
                }
                roots.push(normalize(&root));
            }
            Ok(ValidatorSpec::Path(PathSpec {
                allowed_roots: roots,
                allow_subdirectories,
            }))
        }
        ValidatorKind::Schema { schema } => {
            if !schema.is_object() {
                return Err(SinkGuardError::InvalidValidatorSpec {
                    id: id.to_string(),
                    reason: "schema document must be an object".to_string(),
                });
            }
            let mut patterns = HashMap::new();
            compile_schema_node(id, &schema, &mut patterns)?;
            Ok(ValidatorSpec::Schema(SchemaSpec { schema, patterns }))
        }
    }
}

const KNOWN_TYPES: &[&str] = &[
    "object", "array", "string", "number", "integer", "boolean", "null",
];

/// Walk the schema positions of a document (the node itself, `properties`
/// values, `items`), compiling every `pattern` and checking `type` names.
fn compile_schema_node(
    id: &str,
    node: &Value,
    patterns: &mut HashMap<String, Regex>,
) -> Result<()> {
    let Some(obj) = node.as_object() else {
        return Ok(());
    };

    if let Some(ty) = obj.get("type") {
        let name = ty.as_str().unwrap_or_default();
        if !KNOWN_TYPES.contains(&name) {
            return Err(SinkGuardError::InvalidValidatorSpec {
                id: id.to_string(),
                reason: format!("unknown schema type '{}'", ty),
            });
        }
    }

    if let Some(pat) = obj.get("pattern").and_then(Value::as_str) {
        // Unanchored, matching the usual schema `pattern` semantics.
        let re = Regex::new(pat).map_err(|e| SinkGuardError::InvalidValidatorSpec {
            id: id.to_string(),
            reason: format!("unparsable schema pattern '{}': {}", pat, e),
        })?;
        patterns.insert(pat.to_string(), re);
    }

    if let Some(props) = obj.get("properties").and_then(Value::as_object) {
        for sub in props.values() {
            compile_schema_node(id, sub, patterns)?;
        }
    }
    if let Some(items) = obj.get("items") {
        compile_schema_node(id, items, patterns)?;
    }
    Ok(())
}
