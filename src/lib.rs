//! # SQL Agent
//!
//! A natural-language database agent. Questions about the contents of a
//! relational database are answered by a bounded tool-calling loop: the
//! model inspects the schema, writes SQL, observes the results, and
//! summarizes them.
//!
//! This library provides:
//! - A database connector with schema introspection and bounded, read-only
//!   query execution
//! - A fixed tool registry the model can call into
//! - The reasoning loop: step-limited, with malformed-output recovery
//! - An interactive shell for one-query-at-a-time sessions
//!
//! ## Architecture
//!
//! One user query is one session. The loop asks the model for an action,
//! executes any requested tool, records the (action, observation) pair in
//! the session's trail, and repeats until the model answers or the step
//! budget runs out. Tool failures never abort a session; they are fed back
//! as observations so the model can correct course.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sql_agent::{agent::Agent, config::Config, db::Database, llm::OpenAiClient, tools::ToolRegistry};
//!
//! let config = Config::from_env()?;
//! let db = Arc::new(Database::open(&config.database_path, config.include_tables.clone())?);
//! let tools = ToolRegistry::for_database(db, config.max_rows, config.query_timeout_secs)?;
//! let llm = Arc::new(OpenAiClient::new(config.api_key.clone(), config.api_base_url.clone()));
//! let agent = Agent::new(llm, tools, &config);
//! let result = agent.run_query("how many orders shipped last week?").await;
//! ```

pub mod agent;
pub mod config;
pub mod db;
pub mod llm;
pub mod repl;
pub mod tools;

pub use config::Config;
