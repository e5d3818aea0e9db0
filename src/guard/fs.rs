//! Guarded filesystem writes.

use std::path::Path;

use crate::audit::DbPool;
use crate::error::Result;
use crate::policy::reload::SharedPolicy;

use super::Gate;

/// Wraps `std::fs::write` behind a sink decision.
///
/// The destination path is evaluated before anything touches the
/// filesystem; a blocked decision means no file is created, truncated, or
/// modified.
pub struct FileWriter {
    gate: Gate,
}

impl FileWriter {
    pub fn new(policy: SharedPolicy, sink: impl Into<String>) -> Result<Self> {
        Ok(FileWriter {
            gate: Gate::new(policy, sink)?,
        })
    }

    pub fn with_audit(mut self, pool: DbPool) -> Self {
        self.gate = self.gate.with_audit(pool);
        self
    }

    /// Validate the destination path, then write the contents.
    pub fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let decision = self.gate.check_path(path)?;
        self.gate.enforce(decision)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkGuardError;
    use crate::policy::config::PolicyDocument;
    use crate::policy::model::PolicyModel;
    use crate::policy::reload;

    fn policy(root: &Path) -> SharedPolicy {
        let doc = PolicyDocument::parse(&format!(
            r#"
[defaults]
mode = "block"

[[validators]]
id = "safe_filename"
type = "string"
max_len = 128
regex = "[A-Za-z0-9._-]+"
deny_substrings = ["..", "/", "\\"]

[[validators]]
id = "in_root"
type = "path"
allowed_roots = ["{}"]

[[sinks]]
id = "file_write"
function = "std::fs::write"
require = ["safe_filename", "in_root"]
"#,
            root.display()
        ))
        .unwrap();
        reload::shared(PolicyModel::compile(doc).unwrap())
    }

    #[test]
    fn allowed_write_creates_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FileWriter::new(policy(dir.path()), "file_write").unwrap();

        let dest = dir.path().join("report.txt");
        writer.write(&dest, b"hello").unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "hello");
    }

    #[test]
    fn blocked_write_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FileWriter::new(policy(dir.path()), "file_write").unwrap();

        let outside = dir.path().join("up").join("..").join("..").join("escape.txt");
        let err = writer.write(&outside, b"nope").unwrap_err();
        assert!(matches!(err, SinkGuardError::Blocked { .. }));
        assert!(!outside.exists());
    }

    #[test]
    fn escape_is_attributed_to_the_containment_validator() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FileWriter::new(policy(dir.path()), "file_write").unwrap();

        let err = writer
            .write(&dir.path().join("..").join("etc_passwd"), b"x")
            .unwrap_err();
        assert!(matches!(
            err,
            SinkGuardError::Blocked { validator, .. } if validator == "in_root"
        ));
    }
}
