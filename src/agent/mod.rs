//! Agent module - the bounded reasoning loop.
//!
//! The agent follows a "tools in a loop" pattern:
//! 1. Build context from the user query and the trail so far
//! 2. Call the model with the available tools
//! 3. If the model requests a tool call, execute it and record the result
//! 4. Repeat until the model answers or the step budget runs out
//!
//! Malformed model output and tool failures are recorded in the trail and
//! fed back for self-correction; only backend unavailability and budget
//! exhaustion terminate a session with an error.

mod agent_loop;
mod prompt;
mod trail;

pub use agent_loop::Agent;
pub use prompt::build_system_prompt;
pub use trail::{Action, Observation, SessionError, SessionOutcome, SessionResult, Step, Trail};
