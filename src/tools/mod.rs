//! Database tools exposed to the reasoning loop.
//!
//! Each tool is a named, schema-described operation over the database
//! connector. The [`ToolRegistry`] holds the fixed tool set, rejects
//! duplicate names at construction, enforces a per-call timeout, and
//! converts every failure into an [`Observation`] so nothing escapes the
//! loop uncaught.

mod query;
mod schema;

pub use query::{ExecuteQuery, ValidateQuery};
pub use schema::{DescribeTable, ListTables};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

use crate::agent::Observation;
use crate::db::{Database, DbError};

/// Failures a tool can produce. All of them end up in the trail as
/// failure observations rather than aborting the session.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("table not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Execution(String),

    #[error("tool timed out after {0} seconds")]
    Timeout(u64),
}

impl From<DbError> for ToolError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(table) => ToolError::NotFound(table),
            DbError::Execution(message) => ToolError::Execution(message),
        }
    }
}

/// A single operation the agent may invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the tool's arguments.
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, args: Value) -> Result<Value, ToolError>;
}

/// Name and description of a registered tool, for prompt construction.
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// Registering two tools under the same name is a configuration error.
#[derive(Debug, Error)]
#[error("duplicate tool name registered: {0}")]
pub struct RegistryError(pub String);

/// The fixed set of tools available to one agent.
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    timeout: Duration,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ToolRegistry {
    /// Build a registry from a tool list, validating name uniqueness.
    pub fn new(tools: Vec<Arc<dyn Tool>>, timeout_secs: u64) -> Result<Self, RegistryError> {
        let mut map: BTreeMap<String, Arc<dyn Tool>> = BTreeMap::new();
        for tool in tools {
            let name = tool.name().to_string();
            if map.insert(name.clone(), tool).is_some() {
                return Err(RegistryError(name));
            }
        }
        Ok(Self {
            tools: map,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// The standard tool set for a database: list, describe, validate,
    /// execute.
    pub fn for_database(
        db: Arc<Database>,
        max_rows: usize,
        timeout_secs: u64,
    ) -> Result<Self, RegistryError> {
        Self::new(
            vec![
                Arc::new(ListTables::new(db.clone())),
                Arc::new(DescribeTable::new(db.clone())),
                Arc::new(ValidateQuery::new(db.clone())),
                Arc::new(ExecuteQuery::new(db, max_rows)),
            ],
            timeout_secs,
        )
    }

    /// List registered tools in name order.
    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.tools
            .values()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }

    /// OpenAI function schemas for every registered tool.
    pub fn get_tool_schemas(&self) -> Vec<Value> {
        self.tools
            .values()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name(),
                        "description": t.description(),
                        "parameters": t.parameters_schema(),
                    }
                })
            })
            .collect()
    }

    /// Execute a tool by name. Never raises: unknown names, bad arguments,
    /// execution failures, and timeouts all come back as failure
    /// observations.
    pub async fn execute(&self, name: &str, args: Value) -> Observation {
        let Some(tool) = self.tools.get(name) else {
            let available = self
                .tools
                .keys()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            return Observation::failure(format!(
                "unknown tool '{}'; available tools: {}",
                name, available
            ));
        };

        tracing::info!("Executing tool: {}", name);

        let result = tokio::time::timeout(self.timeout, tool.execute(args)).await;
        match result {
            Ok(Ok(data)) => Observation::success(data),
            Ok(Err(err)) => Observation::failure(err.to_string()),
            Err(_) => {
                Observation::failure(ToolError::Timeout(self.timeout.as_secs()).to_string())
            }
        }
    }
}
