//! Interactive query shell.
//!
//! Reads one question per line, runs it through the agent, and prints the
//! answer or the terminal error. Ctrl-C cancels any in-flight session and
//! exits the shell (the in-flight step completes on its own; its partial
//! results are discarded with the dropped session).

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::agent::{Agent, SessionOutcome};

/// Run the read-eval-print loop until EOF, `exit`, or Ctrl-C at the prompt.
pub async fn run(agent: &Agent) -> anyhow::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        print!("Query> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
            line = lines.next_line() => line?,
        };

        let Some(line) = line else { break };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("exit") || query.eq_ignore_ascii_case("quit") {
            break;
        }

        tracing::info!("Processing query: {}", query);

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\nOperation cancelled.");
                break;
            }
            result = agent.run_query(query) => {
                match result.outcome {
                    SessionOutcome::Answer { text } => {
                        println!("Result:\n{}", text);
                    }
                    SessionOutcome::Failed { error } => {
                        tracing::error!("Query failed after {} steps: {}", result.trail.len(), error);
                        println!("Error: {}", error);
                    }
                }
            }
        }
    }

    Ok(())
}
