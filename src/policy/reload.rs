//! Policy hot-reload support.
//!
//! The live policy is stored behind a [`SharedPolicy`]
//! (`Arc<RwLock<Arc<PolicyModel>>>`). Readers take a [`snapshot`] — a cheap
//! clone of the inner `Arc` — so in-flight evaluations always complete
//! against a consistent model even while a reload swaps in a new one.
//!
//! Reload is wholesale: a new [`PolicyModel`] is compiled from disk and the
//! inner `Arc` is replaced atomically. Invalid configuration is handled
//! fail-safe: the old policy is retained and a warning is logged.
//!
//! [`start_file_watcher`] uses the [`notify`] crate to trigger a reload when
//! the policy file changes.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{info, warn};

use super::model::PolicyModel;

/// Shared handle to the live policy.
pub type SharedPolicy = Arc<RwLock<Arc<PolicyModel>>>;

/// Wrap a compiled model for shared, reloadable use.
pub fn shared(model: PolicyModel) -> SharedPolicy {
    Arc::new(RwLock::new(Arc::new(model)))
}

/// Take a consistent snapshot of the current policy.
///
/// The returned `Arc` stays valid across concurrent reloads; a `decide`
/// call that holds it never observes a half-swapped policy.
pub fn snapshot(policy: &SharedPolicy) -> Arc<PolicyModel> {
    policy
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

/// Reload the policy from disk, swapping the shared handle.
///
/// On success the new model replaces the old one atomically. On failure
/// (I/O error, parse error, load-time validation error) the old policy is
/// retained and the error is returned.
pub fn reload_policy(policy: &SharedPolicy, path: &Path) -> crate::error::Result<()> {
    let model = PolicyModel::load_from_path(path)?;
    let mut slot = policy
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *slot = Arc::new(model);
    info!(
        "Policy reloaded from {} ({} validators, {} sinks)",
        path.display(),
        slot.validator_count(),
        slot.sink_count()
    );
    Ok(())
}

/// Start a file-system watcher that triggers [`reload_policy`] on changes.
///
/// Returns a [`RecommendedWatcher`] handle that must be kept alive for the
/// duration of the watch. Dropping the handle stops the watcher.
pub fn start_file_watcher(
    policy_path: PathBuf,
    policy: SharedPolicy,
) -> notify::Result<RecommendedWatcher> {
    let path = policy_path.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                info!("Policy file changed, reloading...");
                if let Err(e) = reload_policy(&policy, &path) {
                    warn!("Policy reload failed (keeping old policy): {}", e);
                }
            }
        }
        Err(e) => {
            warn!("File watcher error: {}", e);
        }
    })?;

    watcher.watch(&policy_path, RecursiveMode::NonRecursive)?;
    info!("Watching {} for changes", policy_path.display());
    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::model::Mode;

    fn make_toml(mode: &str, max_len: usize) -> String {
        format!(
            r#"
[defaults]
mode = "{}"

[[validators]]
id = "safe"
type = "string"
max_len = {}

[[sinks]]
id = "exec"
function = "f"
require = ["safe"]
"#,
            mode, max_len
        )
    }

    #[test]
    fn reload_policy_swaps_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.toml");

        std::fs::write(&path, make_toml("block", 10)).unwrap();
        let policy = shared(PolicyModel::load_from_path(&path).unwrap());
        assert_eq!(snapshot(&policy).default_mode(), Mode::Block);

        std::fs::write(&path, make_toml("warn", 20)).unwrap();
        reload_policy(&policy, &path).unwrap();
        assert_eq!(snapshot(&policy).default_mode(), Mode::Warn);
    }

    #[test]
    fn reload_policy_invalid_toml_keeps_old() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.toml");

        std::fs::write(&path, make_toml("block", 10)).unwrap();
        let policy = shared(PolicyModel::load_from_path(&path).unwrap());

        std::fs::write(&path, "this is not valid toml [[[").unwrap();
        assert!(reload_policy(&policy, &path).is_err());
        assert_eq!(snapshot(&policy).default_mode(), Mode::Block);
    }

    #[test]
    fn reload_policy_bad_reference_keeps_old() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.toml");

        std::fs::write(&path, make_toml("block", 10)).unwrap();
        let policy = shared(PolicyModel::load_from_path(&path).unwrap());

        // Parses fine but fails load-time reference validation.
        std::fs::write(
            &path,
            r#"
[defaults]
mode = "warn"

[[sinks]]
id = "exec"
function = "f"
require = ["missing"]
"#,
        )
        .unwrap();
        assert!(reload_policy(&policy, &path).is_err());
        assert_eq!(snapshot(&policy).default_mode(), Mode::Block);
    }

    #[test]
    fn reload_policy_missing_file_keeps_old() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.toml");

        std::fs::write(&path, make_toml("block", 10)).unwrap();
        let policy = shared(PolicyModel::load_from_path(&path).unwrap());

        std::fs::remove_file(&path).unwrap();
        assert!(reload_policy(&policy, &path).is_err());
        assert_eq!(snapshot(&policy).validator_count(), 1);
    }

    #[test]
    fn file_watcher_starts_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watch_test.toml");
        std::fs::write(&path, make_toml("block", 10)).unwrap();

        let policy = shared(PolicyModel::load_from_path(&path).unwrap());
        let watcher = start_file_watcher(path, policy);
        assert!(watcher.is_ok());
        // Watcher is dropped here, stopping the watch
    }

    #[test]
    fn snapshot_survives_concurrent_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("concurrent.toml");
        std::fs::write(&path, make_toml("block", 10)).unwrap();

        let policy = shared(PolicyModel::load_from_path(&path).unwrap());
        let held = snapshot(&policy);

        std::fs::write(&path, make_toml("warn", 20)).unwrap();
        reload_policy(&policy, &path).unwrap();

        // The held snapshot still sees the old model; new snapshots see the new one.
        assert_eq!(held.default_mode(), Mode::Block);
        assert_eq!(snapshot(&policy).default_mode(), Mode::Warn);
    }

    #[test]
    fn concurrent_readers_during_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readers.toml");
        std::fs::write(&path, make_toml("block", 10)).unwrap();

        let policy = shared(PolicyModel::load_from_path(&path).unwrap());
        let p1 = policy.clone();
        let p2 = policy.clone();

        let t1 = std::thread::spawn(move || {
            for _ in 0..100 {
                let _model = snapshot(&p1);
            }
        });
        let t2 = std::thread::spawn(move || {
            for _ in 0..100 {
                let _model = snapshot(&p2);
            }
        });

        std::fs::write(&path, make_toml("warn", 20)).unwrap();
        reload_policy(&policy, &path).unwrap();

        t1.join().unwrap();
        t2.join().unwrap();
        assert_eq!(snapshot(&policy).default_mode(), Mode::Warn);
    }
}
