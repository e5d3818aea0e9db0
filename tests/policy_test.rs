use sinkguard::error::SinkGuardError;
use sinkguard::policy::config::PolicyDocument;
use sinkguard::policy::model::{Mode, PolicyModel};
use sinkguard::policy::reload;

const FULL_POLICY: &str = r#"
version = 1

[defaults]
mode = "block"

[[validators]]
id = "safe_filename"
type = "string"
max_len = 255
regex = "[A-Za-z0-9._-]+"
deny_substrings = ["..", "/", "\\"]

[[validators]]
id = "in_uploads"
type = "path"
allowed_roots = ["/srv/uploads"]

[[validators]]
id = "upload_request"
type = "schema"
schema = { type = "object", required = ["filename"], properties = { filename = { type = "string", pattern = "^[a-z0-9._-]+$" } } }

[[sinks]]
id = "file_write"
function = "std::fs::write"
require = ["safe_filename", "in_uploads"]

[[sinks]]
id = "upload_api"
function = "api::upload"
require = ["upload_request"]
mode = "warn"
message = "upload rejected by policy"
"#;

#[test]
fn full_policy_parses_and_compiles() {
    let doc = PolicyDocument::parse(FULL_POLICY).unwrap();
    assert_eq!(doc.version, 1);
    assert_eq!(doc.validators.len(), 3);
    assert_eq!(doc.sinks.len(), 2);

    let policy = PolicyModel::compile(doc).unwrap();
    assert_eq!(policy.default_mode(), Mode::Block);
    assert_eq!(policy.validator_count(), 3);
    assert_eq!(policy.sink_count(), 2);

    let spec = policy.sink_spec("upload_api").unwrap();
    assert_eq!(spec.mode_override, Some(Mode::Warn));
    assert_eq!(spec.message.as_deref(), Some("upload rejected by policy"));
}

#[test]
fn load_from_path_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.toml");
    std::fs::write(&path, FULL_POLICY).unwrap();

    let policy = PolicyModel::load_from_path(&path).unwrap();
    assert_eq!(policy.sink_count(), 2);
}

#[test]
fn unknown_validator_reference_is_rejected() {
    let doc = PolicyDocument::parse(
        r#"
[defaults]
mode = "block"

[[sinks]]
id = "exec"
function = "f"
require = ["no_such_validator"]
"#,
    )
    .unwrap();
    let err = PolicyModel::compile(doc).unwrap_err();
    assert!(matches!(
        err,
        SinkGuardError::UnknownValidatorReference { sink, validator }
            if sink == "exec" && validator == "no_such_validator"
    ));
}

#[test]
fn duplicate_validator_id_is_rejected() {
    let doc = PolicyDocument::parse(
        r#"
[defaults]
mode = "block"

[[validators]]
id = "dup"
type = "string"
max_len = 10

[[validators]]
id = "dup"
type = "string"
max_len = 20
"#,
    )
    .unwrap();
    assert!(matches!(
        PolicyModel::compile(doc).unwrap_err(),
        SinkGuardError::DuplicateId { kind: "validator", .. }
    ));
}

#[test]
fn unparsable_regex_is_rejected_at_load() {
    let doc = PolicyDocument::parse(
        r#"
[defaults]
mode = "block"

[[validators]]
id = "broken"
type = "string"
regex = "[unclosed"
"#,
    )
    .unwrap();
    assert!(matches!(
        PolicyModel::compile(doc).unwrap_err(),
        SinkGuardError::InvalidValidatorSpec { id, .. } if id == "broken"
    ));
}

#[test]
fn unparsable_nested_schema_pattern_is_rejected_at_load() {
    let doc = PolicyDocument::parse(
        r#"
[defaults]
mode = "block"

[[validators]]
id = "schema_bad"
type = "schema"
schema = { type = "object", properties = { name = { type = "string", pattern = "(broken" } } }
"#,
    )
    .unwrap();
    assert!(matches!(
        PolicyModel::compile(doc).unwrap_err(),
        SinkGuardError::InvalidValidatorSpec { id, .. } if id == "schema_bad"
    ));
}

#[test]
fn relative_allowed_root_is_rejected() {
    let doc = PolicyDocument::parse(
        r#"
[defaults]
mode = "block"

[[validators]]
id = "rel"
type = "path"
allowed_roots = ["relative/dir"]
"#,
    )
    .unwrap();
    assert!(matches!(
        PolicyModel::compile(doc).unwrap_err(),
        SinkGuardError::InvalidValidatorSpec { id, .. } if id == "rel"
    ));
}

#[test]
fn missing_policy_file_is_an_io_error() {
    let err = PolicyModel::load_from_path("/nonexistent/sinkguard.toml".as_ref()).unwrap_err();
    assert!(matches!(err, SinkGuardError::Io(_)));
}

#[test]
fn env_var_substitution_in_policy() {
    std::env::set_var("SINKGUARD_TEST_ROOT", "/srv/data");
    let doc = PolicyDocument::parse(
        r#"
[defaults]
mode = "block"

[[validators]]
id = "in_data"
type = "path"
allowed_roots = ["${SINKGUARD_TEST_ROOT}"]

[[sinks]]
id = "file_write"
function = "f"
require = ["in_data"]
"#,
    )
    .unwrap();
    let policy = PolicyModel::compile(doc).unwrap();
    let decision = policy
        .sink("file_write")
        .unwrap()
        .decide(&serde_json::json!("/srv/data/ok.txt"))
        .unwrap();
    assert!(decision.is_allow());
}

#[test]
fn version_defaults_to_one() {
    let doc = PolicyDocument::parse("[defaults]\nmode = \"warn\"\n").unwrap();
    assert_eq!(doc.version, 1);
    let policy = PolicyModel::compile(doc).unwrap();
    assert_eq!(policy.version(), 1);
    assert_eq!(policy.default_mode(), Mode::Warn);
}

#[test]
fn shared_policy_reload_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.toml");
    std::fs::write(&path, FULL_POLICY).unwrap();

    let shared = reload::shared(PolicyModel::load_from_path(&path).unwrap());
    assert_eq!(reload::snapshot(&shared).sink_count(), 2);

    // Corrupt the file; the live policy must survive the failed reload.
    std::fs::write(&path, "not toml [[[").unwrap();
    assert!(reload::reload_policy(&shared, &path).is_err());
    assert_eq!(reload::snapshot(&shared).sink_count(), 2);
}
