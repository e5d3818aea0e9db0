//! Path validator.
//!
//! Containment checks are purely lexical: [`normalize`] resolves `.`, `..`,
//! and repeated separators without touching the filesystem, and the result
//! is compared component-wise against the allowed roots. Symbolic links are
//! *not* resolved at this layer — a path that escapes its root through a
//! symlink passes the lexical check. This is a known gap carried over from
//! the system this engine guards for; close it at the adapter layer if the
//! deployment requires it.

use std::path::{Component, Path, PathBuf};

use crate::policy::model::PathSpec;

use super::{ReasonCode, Violation};

/// Lexically normalize a path: drop `.`, collapse `..` against preceding
/// components, squeeze repeated separators.
///
/// Absolute paths stay absolute (`..` at the root is a no-op); relative
/// paths keep their leading `..` components. Normalization is idempotent.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            Component::Normal(c) => out.push(c),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

pub fn evaluate(spec: &PathSpec, value: &str) -> Option<Violation> {
    let candidate = normalize(Path::new(value));

    // A relative candidate can never be prefixed by an absolute root, so it
    // fails containment without consulting the working directory.
    let root = spec
        .allowed_roots
        .iter()
        .find(|root| candidate.starts_with(root));
    let Some(root) = root else {
        return Some(Violation::new(
            ReasonCode::PathEscape,
            format!(
                "{} is not under any allowed root",
                candidate.display()
            ),
        ));
    };

    if !spec.allow_subdirectories {
        let direct_child = candidate.parent().is_some_and(|p| p == root.as_path());
        if !direct_child {
            return Some(Violation::new(
                ReasonCode::SubdirectoryNotAllowed,
                format!(
                    "{} is not a direct child of {}",
                    candidate.display(),
                    root.display()
                ),
            ));
        }
    }

    None
}
