//! Model backend abstraction and chat wire types.
//!
//! The reasoning loop talks to the model through the [`LlmClient`] trait so
//! tests can substitute a scripted backend. The wire types follow the
//! OpenAI-style tool-calling chat protocol.

mod openai;

pub use openai::OpenAiClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Chat message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One message in the conversation sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCall,
}

/// The function part of a tool call. Arguments arrive as a JSON-encoded
/// string and are parsed by the reasoning loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// The model's reply to one completion request: free text, tool calls,
/// or (malformed) neither.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
}

/// Errors from the model backend.
///
/// `Unavailable` is terminal for the session; `Malformed` is recoverable
/// and consumed by the loop as an ordinary failed step.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("model backend unavailable: {0}")]
    Unavailable(String),

    #[error("malformed model response: {0}")]
    Malformed(String),
}

/// A chat-completion capable model backend.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Request one completion. `tools` carries OpenAI function schemas; at
    /// most one request is outstanding per session at any time.
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[Value]>,
    ) -> Result<ChatResponse, LlmError>;
}
