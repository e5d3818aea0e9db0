//! TOML policy document types for sinkguard.
//!
//! The top-level [`PolicyDocument`] is the *parsed* form of a policy file.
//! It is a plain data mirror of the TOML text; all semantic validation
//! (reference checking, regex compilation) happens when the document is
//! compiled into a [`PolicyModel`](super::model::PolicyModel).
//!
//! # Example `sinkguard.toml`
//!
//! ```toml
//! version = 1
//!
//! [defaults]
//! mode = "block"
//!
//! [[validators]]
//! id = "safe_filename"
//! type = "string"
//! max_len = 128
//! regex = "^[A-Za-z0-9._-]+$"
//! deny_substrings = ["..", "/", "\\"]
//!
//! [[sinks]]
//! id = "file_write"
//! function = "std::fs::write"
//! require = ["safe_filename"]
//! ```

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SinkGuardError};

use super::model::Mode;

/// Policy defaults (`[defaults]` section).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DefaultsConfig {
    /// Enforcement mode applied when a validator fails and the sink has no
    /// mode override.
    pub mode: Mode,
}

/// Type-specific validator fields, tagged by the `type` key.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidatorKind {
    /// Textual value checks: length bounds, charset, full-match regex,
    /// literal deny-substrings.
    String {
        #[serde(default)]
        max_len: Option<usize>,
        #[serde(default)]
        min_len: Option<usize>,
        #[serde(default)]
        regex: Option<String>,
        /// Literal set of permitted characters (not a regex class).
        #[serde(default)]
        allowed_charset: Option<String>,
        /// Forbidden pattern, matched as an unanchored search.
        #[serde(default)]
        deny_regex: Option<String>,
        #[serde(default)]
        deny_substrings: Vec<String>,
    },
    /// Lexical path containment checks against a set of allowed roots.
    Path {
        allowed_roots: Vec<PathBuf>,
        #[serde(default = "default_true")]
        allow_subdirectories: bool,
    },
    /// Structured-value checks against an embedded schema document.
    Schema { schema: serde_json::Value },
}

fn default_true() -> bool {
    true
}

/// A single named validator (`[[validators]]` entry).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidatorConfig {
    /// Unique validator id referenced from sink `require` lists.
    pub id: String,
    #[serde(flatten)]
    pub kind: ValidatorKind,
}

/// A guarded sink (`[[sinks]]` entry).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SinkConfig {
    /// Unique sink id (e.g., `"file_write"`).
    pub id: String,
    /// Qualified name of the guarded operation (e.g., `"std::fs::write"`).
    pub function: String,
    /// Ordered list of validator ids that must all pass.
    #[serde(default)]
    pub require: Vec<String>,
    /// Optional enforcement mode overriding `defaults.mode` for this sink.
    #[serde(default)]
    pub mode: Option<Mode>,
    /// Optional message surfaced instead of the generated violation detail.
    #[serde(default)]
    pub message: Option<String>,
    /// Function names that are always blocked at this sink, regardless of
    /// validators.
    #[serde(default)]
    pub forbid_functions: Vec<String>,
}

/// Top-level policy document deserialized from `sinkguard.toml`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PolicyDocument {
    #[serde(default = "default_version")]
    pub version: u32,
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub validators: Vec<ValidatorConfig>,
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

fn default_version() -> u32 {
    1
}

impl PolicyDocument {
    /// Parse a policy document from TOML text.
    ///
    /// Before parsing, `${VAR}` and `$VAR` placeholders in the text are
    /// replaced with the corresponding environment variable values. An error
    /// is returned if a referenced variable is not set.
    pub fn parse(text: &str) -> Result<Self> {
        let text = substitute_env_vars(text)?;
        let doc: PolicyDocument = toml::from_str(&text)?;
        Ok(doc)
    }

    /// Load and parse a policy document from a TOML file at the given path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }
}

/// Replace `${VAR_NAME}` and `$VAR_NAME` placeholders with environment
/// variable values.
///
/// Returns an error containing the variable name if the variable is not set.
fn substitute_env_vars(input: &str) -> Result<String> {
    // ${VAR_NAME} (braces form), then $VAR_NAME (uppercase + underscore only
    // to avoid false positives, e.g. inside regex patterns)
    let re_braces = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    let re_bare = Regex::new(r"\$([A-Z_][A-Z0-9_]*)").unwrap();

    let mut result = input.to_string();
    for re in [&re_braces, &re_bare] {
        let snapshot = result.clone();
        for cap in re.captures_iter(&snapshot) {
            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| SinkGuardError::ConfigEnvVar(var_name.to_string()))?;
            result = result.replace(&cap[0], &value);
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
version = 1

[defaults]
mode = "block"

[[validators]]
id = "safe_filename"
type = "string"
max_len = 128
regex = "^[A-Za-z0-9._-]+$"
deny_substrings = ["..", "/", "\\"]

[[validators]]
id = "path_in_uploads"
type = "path"
allowed_roots = ["/srv/uploads"]
allow_subdirectories = false

[[validators]]
id = "order_schema"
type = "schema"

[validators.schema]
type = "object"
required = ["filename", "content"]

[[sinks]]
id = "file_write"
function = "std::fs::write"
require = ["safe_filename", "path_in_uploads"]
mode = "warn"
"#;

    #[test]
    fn parse_full_document() {
        let doc = PolicyDocument::parse(DOC).unwrap();
        assert_eq!(doc.version, 1);
        assert_eq!(doc.validators.len(), 3);
        assert_eq!(doc.sinks.len(), 1);

        match &doc.validators[0].kind {
            ValidatorKind::String {
                max_len,
                deny_substrings,
                ..
            } => {
                assert_eq!(*max_len, Some(128));
                assert_eq!(deny_substrings, &vec!["..", "/", "\\"]);
            }
            other => panic!("expected string validator, got {:?}", other),
        }

        match &doc.validators[1].kind {
            ValidatorKind::Path {
                allowed_roots,
                allow_subdirectories,
            } => {
                assert_eq!(allowed_roots, &vec![PathBuf::from("/srv/uploads")]);
                assert!(!allow_subdirectories);
            }
            other => panic!("expected path validator, got {:?}", other),
        }

        let sink = &doc.sinks[0];
        assert_eq!(sink.function, "std::fs::write");
        assert_eq!(sink.require, vec!["safe_filename", "path_in_uploads"]);
        assert_eq!(sink.mode, Some(Mode::Warn));
    }

    #[test]
    fn schema_table_becomes_json_value() {
        let doc = PolicyDocument::parse(DOC).unwrap();
        match &doc.validators[2].kind {
            ValidatorKind::Schema { schema } => {
                assert_eq!(schema["type"], "object");
                assert_eq!(schema["required"][0], "filename");
            }
            other => panic!("expected schema validator, got {:?}", other),
        }
    }

    #[test]
    fn allow_subdirectories_defaults_to_true() {
        let doc = PolicyDocument::parse(
            r#"
[defaults]
mode = "block"

[[validators]]
id = "p"
type = "path"
allowed_roots = ["/tmp"]
"#,
        )
        .unwrap();
        match &doc.validators[0].kind {
            ValidatorKind::Path {
                allow_subdirectories,
                ..
            } => assert!(allow_subdirectories),
            other => panic!("expected path validator, got {:?}", other),
        }
    }

    #[test]
    fn env_var_substitution() {
        std::env::set_var("SINKGUARD_TEST_ROOT", "/srv/data");
        let doc = PolicyDocument::parse(
            r#"
[defaults]
mode = "block"

[[validators]]
id = "p"
type = "path"
allowed_roots = ["${SINKGUARD_TEST_ROOT}/uploads"]
"#,
        )
        .unwrap();
        match &doc.validators[0].kind {
            ValidatorKind::Path { allowed_roots, .. } => {
                assert_eq!(allowed_roots[0], PathBuf::from("/srv/data/uploads"));
            }
            other => panic!("expected path validator, got {:?}", other),
        }
    }

    #[test]
    fn missing_env_var_is_an_error() {
        let result = PolicyDocument::parse(
            r#"
[defaults]
mode = "block"

[[validators]]
id = "p"
type = "path"
allowed_roots = ["${SINKGUARD_DEFINITELY_UNSET_VAR}"]
"#,
        );
        assert!(matches!(result, Err(SinkGuardError::ConfigEnvVar(v)) if v.contains("UNSET")));
    }

    #[test]
    fn unknown_validator_type_is_a_parse_error() {
        let result = PolicyDocument::parse(
            r#"
[defaults]
mode = "block"

[[validators]]
id = "x"
type = "quantum"
"#,
        );
        assert!(matches!(result, Err(SinkGuardError::PolicyParse(_))));
    }
}
