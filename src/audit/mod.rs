//! SQLite-backed decision audit log.
//!
//! Every decision made through a gate is recorded with its timestamp, sink,
//! attributed validator, action (allow/warn/block/forbidden), reason code,
//! and the taint tags of the evaluated value. The database is accessed
//! through an [`r2d2`] connection pool ([`DbPool`]) for thread-safe
//! concurrent writes.
//!
//! The [`export`] submodule provides JSON and CSV export of all records.

pub mod export;

use std::collections::BTreeSet;

use chrono::Utc;
use rusqlite::Connection;

use crate::engine::Decision;
use crate::error::{Result, SinkGuardError};
use crate::taint::TaintTag;

/// SQLite connection pool type alias (r2d2 + r2d2-sqlite).
pub type DbPool = r2d2::Pool<r2d2_sqlite::SqliteConnectionManager>;

/// Open a connection pool for the given database file path.
///
/// Creates the database and `decisions` table if they don't exist.
/// The pool is configured with a maximum of 4 connections.
pub fn open_pool(path: &std::path::Path) -> Result<DbPool> {
    let manager = r2d2_sqlite::SqliteConnectionManager::file(path);
    let pool = r2d2::Pool::builder()
        .max_size(4)
        .build(manager)
        .map_err(|e| SinkGuardError::Audit(e.to_string()))?;
    let conn = pool
        .get()
        .map_err(|e| SinkGuardError::Audit(e.to_string()))?;
    init_db(&conn)?;
    Ok(pool)
}

/// Open an in-memory connection pool (for testing).
pub fn open_memory_pool() -> Result<DbPool> {
    let manager = r2d2_sqlite::SqliteConnectionManager::memory();
    let pool = r2d2::Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|e| SinkGuardError::Audit(e.to_string()))?;
    let conn = pool
        .get()
        .map_err(|e| SinkGuardError::Audit(e.to_string()))?;
    init_db(&conn)?;
    Ok(pool)
}

/// A single decision record stored in the `decisions` table.
#[derive(Debug, Clone)]
pub struct DecisionRecord {
    /// Auto-incremented row ID (`None` for new records before insert).
    pub id: Option<i64>,
    /// ISO 8601 timestamp (e.g., `"2026-08-30T10:00:00Z"`).
    pub timestamp: String,
    /// Sink id the decision was made for.
    pub sink: String,
    /// Attributed validator id; empty for `allow` and `forbidden`.
    pub validator: String,
    /// Decision taken: `"allow"`, `"warn"`, `"block"`, or `"forbidden"`.
    pub action: String,
    /// Machine-readable reason token; empty for `allow`.
    pub reason: String,
    /// Human-readable detail; the forbidden function name for `forbidden`.
    pub detail: String,
    /// Comma-joined taint tags of the evaluated value.
    pub taint_tags: String,
}

impl DecisionRecord {
    /// Build a record from an engine decision, timestamped now.
    pub fn from_decision(sink: &str, decision: &Decision, tags: &BTreeSet<TaintTag>) -> Self {
        let (validator, reason, detail) = match decision {
            Decision::Allow => (String::new(), String::new(), String::new()),
            Decision::Block {
                validator_id,
                reason,
                detail,
            }
            | Decision::Warn {
                validator_id,
                reason,
                detail,
            } => (validator_id.clone(), reason.to_string(), detail.clone()),
        };
        DecisionRecord {
            id: None,
            timestamp: Utc::now().to_rfc3339(),
            sink: sink.to_string(),
            validator,
            action: decision.action().to_string(),
            reason,
            detail,
            taint_tags: join_tags(tags),
        }
    }

    /// Build a record for a function rejected by a sink's forbid list.
    pub fn forbidden(sink: &str, function: &str) -> Self {
        DecisionRecord {
            id: None,
            timestamp: Utc::now().to_rfc3339(),
            sink: sink.to_string(),
            validator: String::new(),
            action: "forbidden".to_string(),
            reason: "forbidden_function".to_string(),
            detail: function.to_string(),
            taint_tags: String::new(),
        }
    }
}

fn join_tags(tags: &BTreeSet<TaintTag>) -> String {
    tags.iter()
        .map(TaintTag::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize the SQLite database and create the decisions table if it doesn't exist.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS decisions (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp  TEXT NOT NULL,
            sink       TEXT NOT NULL,
            validator  TEXT NOT NULL,
            action     TEXT NOT NULL,
            reason     TEXT NOT NULL,
            detail     TEXT NOT NULL,
            taint_tags TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_decisions_timestamp ON decisions(timestamp);
        CREATE INDEX IF NOT EXISTS idx_decisions_sink ON decisions(sink);",
    )?;
    Ok(())
}

/// Record a decision in the database.
pub fn record_decision(conn: &Connection, record: &DecisionRecord) -> Result<i64> {
    conn.execute(
        "INSERT INTO decisions (timestamp, sink, validator, action, reason, detail, taint_tags)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            record.timestamp,
            record.sink,
            record.validator,
            record.action,
            record.reason,
            record.detail,
            record.taint_tags,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Query the most recent N records.
pub fn query_recent(conn: &Connection, limit: usize) -> Result<Vec<DecisionRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, timestamp, sink, validator, action, reason, detail, taint_tags
         FROM decisions ORDER BY id DESC LIMIT ?1",
    )?;

    let rows = stmt.query_map(rusqlite::params![limit as i64], |row| {
        Ok(DecisionRecord {
            id: Some(row.get(0)?),
            timestamp: row.get(1)?,
            sink: row.get(2)?,
            validator: row.get(3)?,
            action: row.get(4)?,
            reason: row.get(5)?,
            detail: row.get(6)?,
            taint_tags: row.get(7)?,
        })
    })?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

/// Aggregated decision statistics from the `decisions` table.
#[derive(Debug, Clone, Default)]
pub struct DecisionStats {
    /// Total number of recorded decisions.
    pub total: usize,
    /// Operations allowed by policy.
    pub allowed: usize,
    /// Operations that proceeded with a warning.
    pub warned: usize,
    /// Operations blocked by a validator.
    pub blocked: usize,
    /// Operations rejected by a sink's forbid list.
    pub forbidden: usize,
}

/// Query aggregated decision counts grouped by action.
///
/// Uses SQL `COUNT(*) GROUP BY action` for efficient aggregation without
/// loading all rows into memory.
pub fn query_stats(conn: &Connection) -> Result<DecisionStats> {
    let mut stmt = conn.prepare("SELECT action, COUNT(*) FROM decisions GROUP BY action")?;
    let rows = stmt.query_map([], |row| {
        let action: String = row.get(0)?;
        let count: i64 = row.get(1)?;
        Ok((action, count as usize))
    })?;

    let mut stats = DecisionStats::default();
    for row in rows {
        let (action, count) = row?;
        stats.total += count;
        match action.as_str() {
            "allow" => stats.allowed = count,
            "warn" => stats.warned = count,
            "block" => stats.blocked = count,
            "forbidden" => stats.forbidden = count,
            _ => {} // unknown actions still count in total
        }
    }
    Ok(stats)
}

/// Open or create a SQLite database at the given path.
pub fn open_db(path: &std::path::Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    init_db(&conn)?;
    Ok(conn)
}

/// Open an in-memory SQLite database (for testing).
pub fn open_memory_db() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_db(&conn)?;
    Ok(conn)
}
