//! Guarded SQL execution.

use rusqlite::Connection;
use serde_json::Value;

use crate::audit::DbPool;
use crate::error::Result;
use crate::policy::reload::SharedPolicy;

use super::Gate;

/// Wraps a [`rusqlite::Connection`] behind a sink decision.
///
/// The SQL text is validated before it reaches the driver. Bind parameters
/// are passed through untouched; parameterized values are the safe channel
/// and need no validation.
pub struct SqlExecutor {
    gate: Gate,
    conn: Connection,
}

impl SqlExecutor {
    pub fn new(policy: SharedPolicy, sink: impl Into<String>, conn: Connection) -> Result<Self> {
        Ok(SqlExecutor {
            gate: Gate::new(policy, sink)?,
            conn,
        })
    }

    pub fn with_audit(mut self, pool: DbPool) -> Self {
        self.gate = self.gate.with_audit(pool);
        self
    }

    /// Validate the statement text, then execute it.
    pub fn execute<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<usize> {
        self.approve(sql)?;
        let changed = self.conn.execute(sql, params)?;
        Ok(changed)
    }

    /// Validate the query text, then run it and collect mapped rows.
    pub fn query<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<Vec<T>>
    where
        P: rusqlite::Params,
        F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    {
        self.approve(sql)?;
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, f)?
            .collect::<rusqlite::Result<Vec<T>>>()?;
        Ok(rows)
    }

    fn approve(&self, sql: &str) -> Result<()> {
        let decision = self.gate.check(&Value::String(sql.to_string()))?;
        self.gate.enforce(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkGuardError;
    use crate::policy::config::PolicyDocument;
    use crate::policy::model::PolicyModel;
    use crate::policy::reload;

    fn policy() -> SharedPolicy {
        let doc = PolicyDocument::parse(
            r#"
[defaults]
mode = "block"

[[validators]]
id = "sql_safe"
type = "string"
max_len = 1024
deny_substrings = ["--", "/*", ";"]

[[sinks]]
id = "sql_execute"
function = "rusqlite::Connection::execute"
require = ["sql_safe"]
"#,
        )
        .unwrap();
        reload::shared(PolicyModel::compile(doc).unwrap())
    }

    fn executor() -> SqlExecutor {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE users (name TEXT NOT NULL)", [])
            .unwrap();
        SqlExecutor::new(policy(), "sql_execute", conn).unwrap()
    }

    #[test]
    fn parameterized_statement_executes() {
        let exec = executor();
        let n = exec
            .execute("INSERT INTO users (name) VALUES (?1)", ["alice"])
            .unwrap();
        assert_eq!(n, 1);

        let names = exec
            .query("SELECT name FROM users", [], |row| row.get::<_, String>(0))
            .unwrap();
        assert_eq!(names, vec!["alice".to_string()]);
    }

    #[test]
    fn comment_injection_is_blocked() {
        let exec = executor();
        let err = exec
            .execute("SELECT * FROM users WHERE name = 'x' --' AND 1=1", [])
            .unwrap_err();
        assert!(matches!(err, SinkGuardError::Blocked { .. }));
    }

    #[test]
    fn stacked_statement_is_blocked() {
        let exec = executor();
        let err = exec
            .execute("DELETE FROM users; DROP TABLE users", [])
            .unwrap_err();
        assert!(matches!(err, SinkGuardError::Blocked { .. }));
        // Nothing reached the driver.
        let names = exec
            .query("SELECT name FROM users", [], |row| row.get::<_, String>(0))
            .unwrap();
        assert!(names.is_empty());
    }
}
