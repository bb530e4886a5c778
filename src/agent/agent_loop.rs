//! Core reasoning loop implementation.

use std::sync::Arc;

use serde_json::Value;

use crate::config::Config;
use crate::llm::{ChatMessage, ChatResponse, FunctionCall, LlmClient, LlmError, Role, ToolCall};
use crate::tools::ToolRegistry;

use super::prompt::build_system_prompt;
use super::trail::{Action, Observation, SessionError, SessionOutcome, SessionResult, Step, Trail};

/// The SQL reasoning agent: drives one query through a bounded
/// think-act-observe cycle against the model backend and tool registry.
pub struct Agent {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    model: String,
    max_steps: usize,
    max_rows: usize,
}

impl Agent {
    /// Create an agent over an injected model backend and tool registry.
    pub fn new(llm: Arc<dyn LlmClient>, tools: ToolRegistry, config: &Config) -> Self {
        Self {
            llm,
            tools,
            model: config.model.clone(),
            max_steps: config.max_steps,
            max_rows: config.max_rows,
        }
    }

    /// Run one query to a terminal state.
    ///
    /// Every query starts with a fresh, empty trail. Tool failures and
    /// uninterpretable model output are recorded as failed steps and fed
    /// back to the model; each consumes one step of the shared budget. Only
    /// two conditions end the session with an error: the backend becoming
    /// unreachable and the step budget running out.
    pub async fn run_query(&self, query: &str) -> SessionResult {
        let mut trail = Trail::new();
        let system_prompt = build_system_prompt(&self.tools, self.max_rows);
        let tool_schemas = self.tools.get_tool_schemas();

        while trail.len() < self.max_steps {
            tracing::debug!("Agent step {}", trail.len() + 1);

            let messages = build_messages(&system_prompt, query, &trail);
            let response = match self
                .llm
                .chat_completion(&self.model, &messages, Some(&tool_schemas))
                .await
            {
                Ok(response) => response,
                Err(LlmError::Unavailable(message)) => {
                    tracing::error!("Model backend unavailable: {}", message);
                    return SessionResult {
                        outcome: SessionOutcome::Failed {
                            error: SessionError::ModelBackendUnavailable(message),
                        },
                        trail,
                    };
                }
                Err(LlmError::Malformed(detail)) => {
                    tracing::debug!("Unusable model response: {}", detail);
                    trail.push(Step::Malformed {
                        raw: None,
                        observation: Observation::failure(detail),
                    });
                    continue;
                }
            };

            match interpret(response) {
                Ok(Action::ToolCall { name, arguments }) => {
                    let observation = self.tools.execute(&name, arguments.clone()).await;
                    if observation.is_failure() {
                        tracing::debug!("Tool {} failed: {}", name, observation.as_text());
                    }
                    trail.push(Step::ToolCall {
                        name,
                        arguments,
                        observation,
                    });
                }
                Ok(Action::FinalAnswer { text }) => {
                    trail.push(Step::Answer { text: text.clone() });
                    return SessionResult {
                        outcome: SessionOutcome::Answer { text },
                        trail,
                    };
                }
                Err((raw, detail)) => {
                    tracing::debug!("Unusable model output: {}", detail);
                    trail.push(Step::Malformed {
                        raw,
                        observation: Observation::failure(detail),
                    });
                }
            }
        }

        SessionResult {
            outcome: SessionOutcome::Failed {
                error: SessionError::IterationLimitExceeded {
                    limit: self.max_steps,
                },
            },
            trail,
        }
    }
}

/// Interpret one model reply as an [`Action`].
///
/// On failure returns the raw assistant text (if any) plus a description of
/// the problem, which the loop records as a malformed step. Only the first
/// tool call in a reply is used; the model sees its result next step and can
/// re-request anything else.
fn interpret(response: ChatResponse) -> Result<Action, (Option<String>, String)> {
    if let Some(call) = response.tool_calls.as_ref().and_then(|calls| calls.first()) {
        let name = call.function.name.clone();
        let raw_args = call.function.arguments.trim();

        let arguments: Value = if raw_args.is_empty() {
            Value::Object(Default::default())
        } else {
            match serde_json::from_str(raw_args) {
                Ok(value @ Value::Object(_)) => value,
                Ok(_) => {
                    return Err((
                        response.content.clone(),
                        format!("arguments for tool '{}' must be a JSON object", name),
                    ))
                }
                Err(e) => {
                    return Err((
                        response.content.clone(),
                        format!("could not parse arguments for tool '{}': {}", name, e),
                    ))
                }
            }
        };

        return Ok(Action::ToolCall { name, arguments });
    }

    match response.content {
        Some(text) if !text.trim().is_empty() => Ok(Action::FinalAnswer { text }),
        _ => Err((
            None,
            "reply contained neither a tool call nor an answer".to_string(),
        )),
    }
}

/// Rebuild the conversation for the model from the query and the trail.
fn build_messages(system_prompt: &str, query: &str, trail: &Trail) -> Vec<ChatMessage> {
    let mut messages = vec![
        ChatMessage {
            role: Role::System,
            content: Some(system_prompt.to_string()),
            tool_calls: None,
            tool_call_id: None,
        },
        ChatMessage {
            role: Role::User,
            content: Some(query.to_string()),
            tool_calls: None,
            tool_call_id: None,
        },
    ];

    for (idx, step) in trail.steps().iter().enumerate() {
        match step {
            Step::ToolCall {
                name,
                arguments,
                observation,
            } => {
                // The history is re-serialized from the trail each step, so
                // call ids only need to pair the request with its result.
                let call_id = format!("call_{}", idx);
                messages.push(ChatMessage {
                    role: Role::Assistant,
                    content: None,
                    tool_calls: Some(vec![ToolCall {
                        id: call_id.clone(),
                        kind: "function".to_string(),
                        function: FunctionCall {
                            name: name.clone(),
                            arguments: arguments.to_string(),
                        },
                    }]),
                    tool_call_id: None,
                });
                messages.push(ChatMessage {
                    role: Role::Tool,
                    content: Some(observation.as_text()),
                    tool_calls: None,
                    tool_call_id: Some(call_id),
                });
            }
            Step::Malformed { raw, observation } => {
                messages.push(ChatMessage {
                    role: Role::Assistant,
                    content: Some(raw.clone().unwrap_or_default()),
                    tool_calls: None,
                    tool_call_id: None,
                });
                messages.push(ChatMessage {
                    role: Role::User,
                    content: Some(format!(
                        "{} Reply with exactly one tool call, or with the final answer as plain text.",
                        observation.as_text()
                    )),
                    tool_calls: None,
                    tool_call_id: None,
                });
            }
            // Terminal; never replayed into a context.
            Step::Answer { .. } => {}
        }
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::db::Database;

    /// Scripted model backend: each call pops the next canned reply and
    /// records the request for inspection.
    struct ScriptedClient {
        replies: Mutex<Vec<Result<ChatResponse, LlmError>>>,
        requests: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<Result<ChatResponse, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn chat_completion(
            &self,
            _model: &str,
            messages: &[ChatMessage],
            _tools: Option<&[Value]>,
        ) -> Result<ChatResponse, LlmError> {
            self.requests.lock().unwrap().push(messages.to_vec());
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                return Err(LlmError::Unavailable("script exhausted".to_string()));
            }
            replies.remove(0)
        }
    }

    /// Backend that requests the same tool call forever.
    struct AlwaysToolCall;

    #[async_trait]
    impl LlmClient for AlwaysToolCall {
        async fn chat_completion(
            &self,
            _model: &str,
            _messages: &[ChatMessage],
            _tools: Option<&[Value]>,
        ) -> Result<ChatResponse, LlmError> {
            Ok(call_response("list_tables", "{}"))
        }
    }

    fn call_response(name: &str, raw_args: &str) -> ChatResponse {
        ChatResponse {
            content: None,
            tool_calls: Some(vec![ToolCall {
                id: "call_0".to_string(),
                kind: "function".to_string(),
                function: FunctionCall {
                    name: name.to_string(),
                    arguments: raw_args.to_string(),
                },
            }]),
        }
    }

    fn text_reply(text: &str) -> Result<ChatResponse, LlmError> {
        Ok(ChatResponse {
            content: Some(text.to_string()),
            tool_calls: None,
        })
    }

    fn call_reply(name: &str, raw_args: &str) -> Result<ChatResponse, LlmError> {
        Ok(call_response(name, raw_args))
    }

    fn test_config(max_steps: usize) -> Config {
        Config {
            api_key: String::new(),
            model: "test-model".to_string(),
            api_base_url: None,
            database_path: ":memory:".into(),
            max_steps,
            max_rows: 5,
            include_tables: None,
            query_timeout_secs: 30,
        }
    }

    fn fixture_agent(llm: Arc<dyn LlmClient>, max_steps: usize) -> Agent {
        let db = Database::open_in_memory(None).unwrap();
        db.raw_execute(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);
             INSERT INTO users (name) VALUES ('alice'), ('bob');",
        )
        .unwrap();
        let tools = ToolRegistry::for_database(Arc::new(db), 5, 30).unwrap();
        Agent::new(llm, tools, &test_config(max_steps))
    }

    #[tokio::test]
    async fn final_answer_ends_the_session_immediately() {
        let llm = ScriptedClient::new(vec![text_reply("There are two users.")]);
        let agent = fixture_agent(llm, 5);

        let result = agent.run_query("how many users are there?").await;
        assert_eq!(result.answer(), Some("There are two users."));
        assert_eq!(result.trail.len(), 1);
        assert!(matches!(result.trail.steps()[0], Step::Answer { .. }));
    }

    #[tokio::test]
    async fn malformed_reply_recovers_within_the_budget() {
        // Step 1: neither content nor tool calls. Step 2: a valid answer.
        let llm = ScriptedClient::new(vec![
            Ok(ChatResponse::default()),
            text_reply("The answer is 42."),
        ]);
        let agent = fixture_agent(llm.clone(), 5);

        let result = agent.run_query("what is the answer?").await;
        assert_eq!(result.answer(), Some("The answer is 42."));
        assert_eq!(result.trail.len(), 2);
        match &result.trail.steps()[0] {
            Step::Malformed { observation, .. } => assert!(observation.is_failure()),
            other => panic!("expected malformed step, got {:?}", other),
        }

        // The parse problem must be fed back on the second request.
        let requests = llm.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        let feedback = requests[1]
            .iter()
            .filter(|m| m.role == Role::User)
            .last()
            .and_then(|m| m.content.clone())
            .unwrap();
        assert!(feedback.contains("neither a tool call nor an answer"));
    }

    #[tokio::test]
    async fn step_budget_exhaustion_is_a_terminal_error() {
        let agent = fixture_agent(Arc::new(AlwaysToolCall), 5);

        let result = agent.run_query("loop forever").await;
        assert!(result.answer().is_none());
        match result.outcome {
            SessionOutcome::Failed {
                error: SessionError::IterationLimitExceeded { limit },
            } => assert_eq!(limit, 5),
            other => panic!("expected iteration limit error, got {:?}", other),
        }
        assert_eq!(result.trail.len(), 5);
        assert!(result
            .trail
            .steps()
            .iter()
            .all(|s| matches!(s, Step::ToolCall { .. })));
    }

    #[tokio::test]
    async fn tool_failure_does_not_abort_the_session() {
        let llm = ScriptedClient::new(vec![
            call_reply("execute_query", r#"{"sql": "SELECT * FROM missing"}"#),
            text_reply("There is no such table."),
        ]);
        let agent = fixture_agent(llm, 5);

        let result = agent.run_query("what is in the missing table?").await;
        assert_eq!(result.answer(), Some("There is no such table."));
        assert_eq!(result.trail.len(), 2);
        match &result.trail.steps()[0] {
            Step::ToolCall { observation, .. } => assert!(observation.is_failure()),
            other => panic!("expected tool call step, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unknown_tool_name_becomes_a_failure_observation() {
        let llm = ScriptedClient::new(vec![
            call_reply("drop_all_tables", "{}"),
            text_reply("I cannot do that."),
        ]);
        let agent = fixture_agent(llm, 5);

        let result = agent.run_query("drop everything").await;
        assert_eq!(result.answer(), Some("I cannot do that."));
        match &result.trail.steps()[0] {
            Step::ToolCall { observation, .. } => {
                assert!(observation.as_text().contains("unknown tool"));
            }
            other => panic!("expected tool call step, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unparsable_arguments_become_a_malformed_step() {
        let llm = ScriptedClient::new(vec![
            call_reply("execute_query", "{not json"),
            text_reply("Done."),
        ]);
        let agent = fixture_agent(llm, 5);

        let result = agent.run_query("broken arguments").await;
        assert_eq!(result.answer(), Some("Done."));
        assert!(matches!(
            result.trail.steps()[0],
            Step::Malformed { .. }
        ));
    }

    #[tokio::test]
    async fn backend_unavailable_is_terminal_and_not_retried() {
        let llm = ScriptedClient::new(vec![Err(LlmError::Unavailable(
            "connection refused".to_string(),
        ))]);
        let agent = fixture_agent(llm.clone(), 5);

        let result = agent.run_query("anything").await;
        match result.outcome {
            SessionOutcome::Failed {
                error: SessionError::ModelBackendUnavailable(message),
            } => assert!(message.contains("connection refused")),
            other => panic!("expected backend-unavailable error, got {:?}", other),
        }
        assert!(result.trail.is_empty());
        assert_eq!(llm.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn malformed_envelope_consumes_one_step_and_recovers() {
        let llm = ScriptedClient::new(vec![
            Err(LlmError::Malformed("response contained no choices".to_string())),
            text_reply("Recovered."),
        ]);
        let agent = fixture_agent(llm, 5);

        let result = agent.run_query("flaky backend").await;
        assert_eq!(result.answer(), Some("Recovered."));
        assert_eq!(result.trail.len(), 2);
    }

    #[tokio::test]
    async fn answer_on_the_last_budgeted_step_is_still_returned() {
        let llm = ScriptedClient::new(vec![
            call_reply("list_tables", "{}"),
            text_reply("Only the users table exists."),
        ]);
        let agent = fixture_agent(llm, 2);

        let result = agent.run_query("what tables are there?").await;
        assert_eq!(result.answer(), Some("Only the users table exists."));
        assert_eq!(result.trail.len(), 2);
    }

    #[tokio::test]
    async fn tool_results_are_replayed_into_the_context() {
        let llm = ScriptedClient::new(vec![
            call_reply("execute_query", r#"{"sql": "SELECT name FROM users ORDER BY name"}"#),
            text_reply("alice and bob"),
        ]);
        let agent = fixture_agent(llm.clone(), 5);

        let result = agent.run_query("who are the users?").await;
        assert_eq!(result.answer(), Some("alice and bob"));

        let requests = llm.requests.lock().unwrap();
        let tool_message = requests[1]
            .iter()
            .find(|m| m.role == Role::Tool)
            .expect("tool result must be in the replayed context");
        let payload: Value =
            serde_json::from_str(tool_message.content.as_deref().unwrap()).unwrap();
        assert_eq!(payload["rows"], json!([["alice"], ["bob"]]));
        assert_eq!(payload["truncated"], json!(false));
    }

    #[tokio::test]
    async fn extra_tool_calls_in_one_reply_are_ignored() {
        let mut reply = call_response("list_tables", "{}");
        reply.tool_calls.as_mut().unwrap().push(ToolCall {
            id: "call_1".to_string(),
            kind: "function".to_string(),
            function: FunctionCall {
                name: "execute_query".to_string(),
                arguments: r#"{"sql": "SELECT 1"}"#.to_string(),
            },
        });
        let llm = ScriptedClient::new(vec![Ok(reply), text_reply("done")]);
        let agent = fixture_agent(llm, 5);

        let result = agent.run_query("two calls at once").await;
        assert_eq!(result.trail.len(), 2);
        match &result.trail.steps()[0] {
            Step::ToolCall { name, .. } => assert_eq!(name, "list_tables"),
            other => panic!("expected tool call step, got {:?}", other),
        }
    }
}
