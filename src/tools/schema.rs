//! Schema introspection tools: table listing and table description.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Tool, ToolError};
use crate::db::Database;

/// List the tables the agent is allowed to see.
pub struct ListTables {
    db: Arc<Database>,
}

impl ListTables {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Tool for ListTables {
    fn name(&self) -> &str {
        "list_tables"
    }

    fn description(&self) -> &str {
        "List the names of all tables in the database. Call this first to discover what data is available."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
        let db = self.db.clone();
        let tables = tokio::task::spawn_blocking(move || db.list_tables())
            .await
            .map_err(|e| ToolError::Execution(format!("database task failed: {}", e)))??;

        Ok(json!({ "tables": tables }))
    }
}

/// Describe the columns of one table.
pub struct DescribeTable {
    db: Arc<Database>,
}

impl DescribeTable {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Tool for DescribeTable {
    fn name(&self) -> &str {
        "describe_table"
    }

    fn description(&self) -> &str {
        "Get the column names and types of a table. Always check a table's schema before querying it. Returns no row data."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "table": {
                    "type": "string",
                    "description": "Name of the table to describe"
                }
            },
            "required": ["table"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let table = args["table"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArgument("missing 'table' argument".to_string()))?
            .to_string();

        let db = self.db.clone();
        let column_table = table.clone();
        let columns = tokio::task::spawn_blocking(move || db.describe_table(&column_table))
            .await
            .map_err(|e| ToolError::Execution(format!("database task failed: {}", e)))??;

        let columns: Vec<Value> = columns
            .iter()
            .map(|c| json!({ "name": c.name, "type": c.sql_type }))
            .collect();

        Ok(json!({ "table": table, "columns": columns }))
    }
}
