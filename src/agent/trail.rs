//! Data model for one reasoning-loop run: actions, observations, the step
//! trail, and the terminal session result.

use serde_json::Value;
use thiserror::Error;

/// The model's decision for one step: invoke a tool or answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ToolCall { name: String, arguments: Value },
    FinalAnswer { text: String },
}

/// Result of executing one tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Success { data: Value },
    Failure { message: String },
}

impl Observation {
    pub fn success(data: Value) -> Self {
        Self::Success { data }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    /// Render the observation for inclusion in the model context.
    pub fn as_text(&self) -> String {
        match self {
            Self::Success { data } => data.to_string(),
            Self::Failure { message } => format!("Error: {}", message),
        }
    }
}

/// One recorded step of a session.
#[derive(Debug, Clone)]
pub enum Step {
    /// A tool invocation and what it produced.
    ToolCall {
        name: String,
        arguments: Value,
        observation: Observation,
    },
    /// Model output the loop could not interpret. The synthetic failure
    /// observation is fed back so the model can correct itself.
    Malformed {
        /// Raw assistant text, when there was any.
        raw: Option<String>,
        observation: Observation,
    },
    /// The terminal answer.
    Answer { text: String },
}

/// Ordered step history for one query. Owned by exactly one session run and
/// never shared across queries; its length never exceeds the step limit.
#[derive(Debug, Default)]
pub struct Trail {
    steps: Vec<Step>,
}

impl Trail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

/// Terminal session failures. Everything recoverable is absorbed into the
/// trail instead of surfacing here.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("step limit of {limit} reached without a final answer")]
    IterationLimitExceeded { limit: usize },

    #[error("model backend unavailable: {0}")]
    ModelBackendUnavailable(String),
}

/// Terminal outcome of one session: exactly an answer or an error.
#[derive(Debug)]
pub enum SessionOutcome {
    Answer { text: String },
    Failed { error: SessionError },
}

/// What one query produced: the outcome plus the full step trail for
/// logging and inspection.
#[derive(Debug)]
pub struct SessionResult {
    pub outcome: SessionOutcome,
    pub trail: Trail,
}

impl SessionResult {
    /// The answer text, if the session succeeded.
    pub fn answer(&self) -> Option<&str> {
        match &self.outcome {
            SessionOutcome::Answer { text } => Some(text),
            SessionOutcome::Failed { .. } => None,
        }
    }
}
