//! # sinkguard
//!
//! **Policy validation and decision engine for dangerous operations.**
//!
//! sinkguard evaluates the arguments of dangerous operations (process
//! spawning, filesystem writes, SQL execution, template rendering, outbound
//! HTTP) against a declarative TOML policy *before* the operation runs, and
//! returns a deterministic, auditable [`Decision`](engine::Decision).
//!
//! ## Architecture
//!
//! - **[`policy`]** — TOML policy document, compiled immutable [`PolicyModel`](policy::model::PolicyModel), hot reload
//! - **[`validators`]** — string, path, and schema validators with structured reason codes
//! - **[`engine`]** — sink-to-validator binding, evaluation order, decision aggregation
//! - **[`taint`]** — provenance tags on values, propagated through composition
//! - **[`guard`]** — capability adapters wrapping real operations (file write, command, SQL, template)
//! - **[`audit`]** — SQLite-backed decision log with JSON/CSV export
//! - **[`cli`]** — command-line interface (clap)
//! - **[`error`]** — unified error types using `thiserror`
//!
//! ## Quick start
//!
//! ```no_run
//! use sinkguard::engine;
//! use sinkguard::policy::model::PolicyModel;
//! use serde_json::json;
//!
//! # fn main() -> sinkguard::error::Result<()> {
//! let policy = PolicyModel::load_from_path("sinkguard.toml".as_ref())?;
//! let decision = engine::decide(&policy, "file_write", &json!("report.txt"))?;
//! assert!(decision.is_allow());
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod cli;
pub mod engine;
pub mod error;
pub mod guard;
pub mod policy;
pub mod taint;
pub mod validators;
