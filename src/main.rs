//! SQL Agent - interactive entry point.
//!
//! Wires the configuration, database connector, tool registry, and model
//! client together and hands control to the query shell.

use std::sync::Arc;

use sql_agent::agent::Agent;
use sql_agent::config::Config;
use sql_agent::db::Database;
use sql_agent::llm::OpenAiClient;
use sql_agent::tools::ToolRegistry;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sql_agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Loaded configuration: model={}, max_steps={}, max_rows={}",
        config.model, config.max_steps, config.max_rows
    );

    // Open the database and build the tool set
    info!("Opening database at {}", config.database_path.display());
    let db = Arc::new(Database::open(
        &config.database_path,
        config.include_tables.clone(),
    )?);
    let tools = ToolRegistry::for_database(db, config.max_rows, config.query_timeout_secs)?;

    // Model backend and agent
    let llm = Arc::new(OpenAiClient::new(
        config.api_key.clone(),
        config.api_base_url.clone(),
    ));
    let agent = Agent::new(llm, tools, &config);

    println!("SQL Agent ready. Ask a question in plain language; type 'exit' to quit.");
    println!("Tip: ask 'what tables are in the database?' to get oriented.");

    sql_agent::repl::run(&agent).await
}
