//! SQLite database connector.
//!
//! Wraps a single `rusqlite` connection behind a mutex and exposes the four
//! operations the tool layer needs: table listing, schema description,
//! statement validation, and bounded query execution. An optional allow-list
//! restricts which tables are visible to the agent; an empty allow-list hides
//! everything.
//!
//! All methods are blocking; callers on the async runtime wrap them in
//! `tokio::task::spawn_blocking`.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Text cell values longer than this are truncated before being fed to the
/// model, to keep observation payloads bounded.
const MAX_STRING_LEN: usize = 100;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("table not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Execution(String),
}

/// One column of a described table.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Declared SQL type, as stored in the schema (may be empty in SQLite).
    pub sql_type: String,
}

/// Result of a bounded query execution.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// True when at least one row was omitted by the row cap.
    pub truncated: bool,
}

/// A SQLite database restricted to read-only use by the agent.
pub struct Database {
    conn: Mutex<Connection>,
    include_tables: Option<BTreeSet<String>>,
}

impl Database {
    /// Open the database at `path`, optionally restricted to an allow-list
    /// of table names.
    pub fn open(
        path: &Path,
        include_tables: Option<BTreeSet<String>>,
    ) -> Result<Self, DbError> {
        let conn = Connection::open(path)
            .map_err(|e| DbError::Execution(format!("failed to open database: {}", e)))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| DbError::Execution(format!("failed to set busy timeout: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
            include_tables,
        })
    }

    /// Open an in-memory database. Used by tests.
    pub fn open_in_memory(include_tables: Option<BTreeSet<String>>) -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DbError::Execution(format!("failed to open database: {}", e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
            include_tables,
        })
    }

    /// Execute a raw statement outside the agent's read-only boundary.
    /// Used by tests to set up fixture schemas.
    #[cfg(test)]
    pub fn raw_execute(&self, sql: &str) -> Result<(), DbError> {
        let conn = self.lock();
        conn.execute_batch(sql)
            .map_err(|e| DbError::Execution(e.to_string()))
    }

    /// List user tables visible to the agent, in name order.
    pub fn list_tables(&self) -> Result<Vec<String>, DbError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
                 ORDER BY name",
            )
            .map_err(|e| DbError::Execution(e.to_string()))?;

        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| DbError::Execution(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DbError::Execution(e.to_string()))?;

        Ok(names
            .into_iter()
            .filter(|name| self.is_visible(name))
            .collect())
    }

    /// Describe the columns of a visible table.
    ///
    /// Returns `DbError::NotFound` if the table does not exist or is hidden
    /// by the allow-list. No sampled row data is ever included.
    pub fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>, DbError> {
        if !self.is_visible(table) {
            return Err(DbError::NotFound(table.to_string()));
        }

        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT name, type FROM pragma_table_info(?1)")
            .map_err(|e| DbError::Execution(e.to_string()))?;

        let columns = stmt
            .query_map([table], |row| {
                Ok(ColumnInfo {
                    name: row.get(0)?,
                    sql_type: row.get(1)?,
                })
            })
            .map_err(|e| DbError::Execution(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DbError::Execution(e.to_string()))?;

        // pragma_table_info yields nothing for unknown tables.
        if columns.is_empty() {
            return Err(DbError::NotFound(table.to_string()));
        }

        Ok(columns)
    }

    /// Check a statement for syntax and schema errors without executing it.
    pub fn validate_query(&self, sql: &str) -> Result<(), DbError> {
        let conn = self.lock();
        conn.prepare(sql)
            .map(|_| ())
            .map_err(|e| DbError::Execution(e.to_string()))
    }

    /// Execute a read-only statement, returning at most `max_rows` rows.
    ///
    /// Write statements are rejected before execution. An empty result set
    /// is a success, not an error.
    pub fn execute(&self, sql: &str, max_rows: usize) -> Result<QueryRows, DbError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| DbError::Execution(e.to_string()))?;

        if !stmt.readonly() {
            return Err(DbError::Execution(
                "only read-only statements are permitted".to_string(),
            ));
        }

        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let column_count = columns.len();

        let mut rows = stmt
            .query([])
            .map_err(|e| DbError::Execution(e.to_string()))?;

        let mut out: Vec<Vec<Value>> = Vec::new();
        let mut truncated = false;
        loop {
            let row = match rows.next() {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e) => return Err(DbError::Execution(e.to_string())),
            };
            if out.len() == max_rows {
                truncated = true;
                break;
            }
            let mut values = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                let cell = row
                    .get_ref(idx)
                    .map_err(|e| DbError::Execution(e.to_string()))?;
                values.push(cell_to_json(cell));
            }
            out.push(values);
        }

        Ok(QueryRows {
            columns,
            rows: out,
            truncated,
        })
    }

    fn is_visible(&self, table: &str) -> bool {
        match &self.include_tables {
            Some(allowed) => allowed.contains(table),
            None => true,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned mutex means a panic mid-statement; the connection
        // itself is still usable for independent statements.
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Convert one SQLite cell into a JSON value, with long text truncated.
fn cell_to_json(cell: ValueRef<'_>) -> Value {
    match cell {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            if text.chars().count() > MAX_STRING_LEN {
                let short: String = text.chars().take(MAX_STRING_LEN).collect();
                Value::from(format!("{}...", short))
            } else {
                Value::from(text.into_owned())
            }
        }
        ValueRef::Blob(bytes) => Value::from(format!("<{} byte blob>", bytes.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn fixture(include_tables: Option<BTreeSet<String>>) -> Database {
        let db = Database::open_in_memory(include_tables).unwrap();
        db.raw_execute(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, email TEXT);
             CREATE TABLE orders (id INTEGER PRIMARY KEY, user_id INTEGER, total REAL);
             INSERT INTO users (name, email) VALUES
                 ('alice', 'alice@example.com'),
                 ('bob', 'bob@example.com'),
                 ('carol', 'carol@example.com');",
        )
        .unwrap();
        db
    }

    fn allow(names: &[&str]) -> Option<BTreeSet<String>> {
        Some(names.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn lists_tables_in_name_order() {
        let db = fixture(None);
        assert_eq!(db.list_tables().unwrap(), vec!["orders", "users"]);
    }

    #[test]
    fn allow_list_filters_listing() {
        let db = fixture(allow(&["users"]));
        assert_eq!(db.list_tables().unwrap(), vec!["users"]);
    }

    #[test]
    fn empty_allow_list_hides_everything() {
        let db = fixture(allow(&[]));
        assert!(db.list_tables().unwrap().is_empty());
        assert!(matches!(
            db.describe_table("users"),
            Err(DbError::NotFound(_))
        ));
    }

    #[test]
    fn describe_returns_columns_without_rows() {
        let db = fixture(None);
        let cols = db.describe_table("users").unwrap();
        let names: Vec<_> = cols.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "email"]);
        assert_eq!(cols[0].sql_type, "INTEGER");
    }

    #[test]
    fn describe_unknown_table_is_not_found() {
        let db = fixture(None);
        assert!(matches!(
            db.describe_table("missing"),
            Err(DbError::NotFound(_))
        ));
    }

    #[test]
    fn describe_hidden_table_is_not_found() {
        let db = fixture(allow(&["orders"]));
        assert!(matches!(
            db.describe_table("users"),
            Err(DbError::NotFound(_))
        ));
    }

    #[test]
    fn validate_accepts_good_sql_and_rejects_bad() {
        let db = fixture(None);
        db.validate_query("SELECT name FROM users").unwrap();
        assert!(db.validate_query("SELEC name FRM users").is_err());
    }

    #[test]
    fn execute_caps_rows_and_flags_truncation() {
        let db = fixture(None);
        let result = db.execute("SELECT name FROM users ORDER BY name", 2).unwrap();
        assert_eq!(result.rows.len(), 2);
        assert!(result.truncated);
        assert_eq!(result.rows[0][0], Value::from("alice"));
    }

    #[test]
    fn truncation_is_idempotent() {
        let db = fixture(None);
        let capped = db.execute("SELECT name FROM users ORDER BY name", 2).unwrap();
        assert!(capped.truncated);

        // Re-running the already-capped result set through the same cap
        // changes nothing and reports no further truncation.
        let again = db
            .execute("SELECT name FROM users ORDER BY name LIMIT 2", 2)
            .unwrap();
        assert_eq!(again.columns, capped.columns);
        assert_eq!(again.rows, capped.rows);
        assert!(!again.truncated);
    }

    #[test]
    fn execute_under_cap_is_not_truncated() {
        let db = fixture(None);
        let result = db.execute("SELECT name FROM users", 10).unwrap();
        assert_eq!(result.rows.len(), 3);
        assert!(!result.truncated);
    }

    #[test]
    fn execute_empty_result_is_success() {
        let db = fixture(None);
        let result = db
            .execute("SELECT name FROM users WHERE name = 'nobody'", 5)
            .unwrap();
        assert!(result.rows.is_empty());
        assert!(!result.truncated);
        assert_eq!(result.columns, vec!["name"]);
    }

    #[test]
    fn execute_rejects_write_statements() {
        let db = fixture(None);
        let err = db
            .execute("DELETE FROM users", 5)
            .expect_err("writes must be rejected");
        assert!(err.to_string().contains("read-only"));
    }

    #[test]
    fn long_text_cells_are_shortened() {
        let db = fixture(None);
        db.raw_execute(&format!(
            "INSERT INTO users (name, email) VALUES ('{}', 'x@example.com')",
            "z".repeat(300)
        ))
        .unwrap();
        let result = db
            .execute("SELECT name FROM users WHERE name LIKE 'zz%'", 5)
            .unwrap();
        let cell = result.rows[0][0].as_str().unwrap();
        assert_eq!(cell.len(), MAX_STRING_LEN + 3);
        assert!(cell.ends_with("..."));
    }
}
