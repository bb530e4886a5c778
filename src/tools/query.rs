//! Query tools: dry-run validation and bounded execution.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Tool, ToolError};
use crate::db::Database;

/// Check a statement for errors without running it.
pub struct ValidateQuery {
    db: Arc<Database>,
}

impl ValidateQuery {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Tool for ValidateQuery {
    fn name(&self) -> &str {
        "validate_query"
    }

    fn description(&self) -> &str {
        "Check a SQL statement for syntax and schema errors without executing it. Use this before execute_query when unsure about a query. Never returns rows."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sql": {
                    "type": "string",
                    "description": "The SQL statement to check"
                }
            },
            "required": ["sql"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let sql = args["sql"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArgument("missing 'sql' argument".to_string()))?
            .to_string();

        let db = self.db.clone();
        let verdict = tokio::task::spawn_blocking(move || db.validate_query(&sql))
            .await
            .map_err(|e| ToolError::Execution(format!("database task failed: {}", e)))?;

        // An invalid statement is the check's answer, not a tool failure.
        Ok(match verdict {
            Ok(()) => json!({ "valid": true }),
            Err(e) => json!({ "valid": false, "error": e.to_string() }),
        })
    }
}

/// Execute a read-only statement with a hard row cap.
pub struct ExecuteQuery {
    db: Arc<Database>,
    max_rows: usize,
}

impl ExecuteQuery {
    pub fn new(db: Arc<Database>, max_rows: usize) -> Self {
        Self { db, max_rows }
    }
}

#[async_trait]
impl Tool for ExecuteQuery {
    fn name(&self) -> &str {
        "execute_query"
    }

    fn description(&self) -> &str {
        "Execute a read-only SQL SELECT statement and return the resulting rows. Results are capped; if the output is marked truncated, narrow the query instead of asking for more rows. Write statements are rejected."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sql": {
                    "type": "string",
                    "description": "The SELECT statement to execute"
                }
            },
            "required": ["sql"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let sql = args["sql"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArgument("missing 'sql' argument".to_string()))?
            .to_string();

        tracing::info!("Executing query: {}", sql);

        let db = self.db.clone();
        let max_rows = self.max_rows;
        let result = tokio::task::spawn_blocking(move || db.execute(&sql, max_rows))
            .await
            .map_err(|e| ToolError::Execution(format!("database task failed: {}", e)))??;

        let row_count = result.rows.len();
        Ok(json!({
            "columns": result.columns,
            "rows": result.rows,
            "row_count": row_count,
            "truncated": result.truncated,
        }))
    }
}
