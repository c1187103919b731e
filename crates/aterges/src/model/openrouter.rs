//! [`ModelBackend`] over the OpenRouter chat completions API.

use super::{ModelBackend, ModelFuture, ModelTurn, Turn, truncate_result};
use crate::agent::config::OrchestratorConfig;
use crate::dispatch::CallRequest;
use crate::provider::Arguments;
use crate::{
    CallType, ChatCompletion, ChatRequest, FunctionCallData, Message, OpenRouterClient, ToolCall,
    ToolDef,
};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Sends the conversation as OpenAI-style messages and maps the reply back
/// into a [`ModelTurn`].
pub struct OpenRouterBackend {
    client: OpenRouterClient,
    model: String,
    max_tokens: u32,
    temperature: f32,
    max_result_bytes: usize,
}

impl OpenRouterBackend {
    pub fn new(client: OpenRouterClient, config: &OrchestratorConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            max_result_bytes: config.max_result_bytes,
        }
    }
}

impl ModelBackend for OpenRouterBackend {
    fn send<'a>(&'a self, conversation: &'a [Turn], tools: &'a [ToolDef]) -> ModelFuture<'a> {
        Box::pin(async move {
            let request = ChatRequest {
                model: self.model.clone(),
                messages: to_messages(conversation, self.max_result_bytes),
                max_tokens: (self.max_tokens > 0).then_some(self.max_tokens),
                temperature: Some(self.temperature),
                tools: (!tools.is_empty()).then(|| tools.to_vec()),
            };
            let completion = self.client.chat(&request).await?;
            if let Some(ref usage) = completion.usage {
                debug!(
                    "Tokens: prompt={}, completion={}",
                    usage.prompt_tokens.unwrap_or(0),
                    usage.completion_tokens.unwrap_or(0)
                );
            }
            Ok(to_model_turn(completion))
        })
    }
}

/// Convert conversation turns into wire messages.
///
/// Each call result becomes a `tool` message holding the serialized
/// envelope, truncated to `max_result_bytes`.
pub fn to_messages(conversation: &[Turn], max_result_bytes: usize) -> Vec<Message> {
    let mut messages = Vec::with_capacity(conversation.len());
    for turn in conversation {
        match turn {
            Turn::System { content } => messages.push(Message::system(content.clone())),
            Turn::User { content } => messages.push(Message::user(content.clone())),
            Turn::Model(reply) if reply.has_call_requests() => {
                let calls = reply.call_requests.iter().map(to_tool_call).collect();
                messages.push(Message::assistant_tool_calls(reply.text.clone(), calls));
            }
            Turn::Model(reply) => {
                messages.push(Message::assistant_text(reply.text.clone().unwrap_or_default()));
            }
            Turn::ToolResults { results } => {
                for r in results {
                    let body = serde_json::to_string(&r.result).unwrap_or_else(|e| {
                        format!(r#"{{"success":false,"error_message":"unserializable result: {e}"}}"#)
                    });
                    messages.push(Message::tool_result(
                        r.call_id.clone(),
                        truncate_result(body, max_result_bytes),
                    ));
                }
            }
        }
    }
    messages
}

fn to_tool_call(request: &CallRequest) -> ToolCall {
    ToolCall {
        id: request.id.clone(),
        call_type: CallType::Function,
        function: FunctionCallData {
            name: request.name.clone(),
            arguments: serde_json::Value::Object(request.arguments.clone()).to_string(),
        },
    }
}

/// Map a completion into a [`ModelTurn`].
///
/// Argument strings that are not a JSON object are replaced by an empty
/// object; the dispatcher then reports the missing parameters to the model.
/// Calls without an id get a generated one.
pub fn to_model_turn(completion: ChatCompletion) -> ModelTurn {
    let call_requests = completion
        .tool_calls
        .into_iter()
        .map(|tc| {
            let arguments = parse_arguments(&tc.function.name, &tc.function.arguments);
            let id = if tc.id.trim().is_empty() {
                next_call_id()
            } else {
                tc.id
            };
            CallRequest::new(tc.function.name, arguments).with_id(id)
        })
        .collect();
    ModelTurn {
        text: completion.content,
        call_requests,
    }
}

fn parse_arguments(name: &str, raw: &str) -> Arguments {
    if raw.trim().is_empty() {
        return Arguments::new();
    }
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(other) => {
            warn!("[model] {name}: arguments are not an object: {other}");
            Arguments::new()
        }
        Err(e) => {
            warn!("[model] {name}: unparseable arguments: {e}");
            Arguments::new()
        }
    }
}

fn next_call_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    format!("call-{:04x}", COUNTER.fetch_add(1, Ordering::Relaxed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::CallResult;
    use crate::model::{DEFAULT_MAX_RESULT_BYTES, ToolResultTurn};
    use crate::{MessageRole, parse_chat_response};
    use serde_json::json;

    #[test]
    fn completion_maps_to_call_requests() {
        let completion = parse_chat_response(
            r#"{"choices": [{"message": {"content": null, "tool_calls": [
                {"id": "call_1", "type": "function",
                 "function": {"name": "get_report", "arguments": "{\"start_date\":\"2025-06-27\",\"end_date\":\"2025-06-27\"}"}},
                {"type": "function", "function": {"name": "get_top_pages", "arguments": ""}}
            ]}, "finish_reason": "tool_calls"}]}"#,
        )
        .unwrap();

        let turn = to_model_turn(completion);
        assert!(turn.has_call_requests());
        assert_eq!(turn.call_requests[0].id, "call_1");
        assert_eq!(turn.call_requests[0].arguments["start_date"], "2025-06-27");
        assert!(turn.call_requests[1].id.starts_with("call-"));
        assert!(turn.call_requests[1].arguments.is_empty());
    }

    #[test]
    fn malformed_arguments_become_empty() {
        assert!(parse_arguments("get_report", "{not json").is_empty());
        assert!(parse_arguments("get_report", "[1, 2]").is_empty());
        assert_eq!(parse_arguments("get_report", r#"{"limit": 5}"#)["limit"], 5);
    }

    #[test]
    fn conversation_maps_to_wire_messages() {
        let call = CallRequest::from_value("get_report", json!({"start_date": "2025-06-27"}))
            .with_id("call_1");
        let conversation = vec![
            Turn::System {
                content: "framing".into(),
            },
            Turn::User {
                content: "users yesterday?".into(),
            },
            Turn::Model(ModelTurn::calls(vec![call])),
            Turn::ToolResults {
                results: vec![ToolResultTurn {
                    call_id: "call_1".into(),
                    result: CallResult::success("get_report", "analytics", json!({"activeUsers": 1234})),
                }],
            },
            Turn::Model(ModelTurn::text("1234 users")),
        ];

        let messages = to_messages(&conversation, DEFAULT_MAX_RESULT_BYTES);
        let roles: Vec<_> = messages.iter().map(|m| m.role.clone()).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::System,
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::Tool,
                MessageRole::Assistant
            ]
        );

        let calls = messages[2].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "get_report");
        let args: serde_json::Value = serde_json::from_str(&calls[0].function.arguments).unwrap();
        assert_eq!(args["start_date"], "2025-06-27");

        assert_eq!(messages[3].tool_call_id.as_deref(), Some("call_1"));
        let body: serde_json::Value =
            serde_json::from_str(messages[3].content.as_deref().unwrap()).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["activeUsers"], 1234);
    }

    #[test]
    fn oversized_results_are_truncated() {
        let conversation = vec![Turn::ToolResults {
            results: vec![ToolResultTurn {
                call_id: "c".into(),
                result: CallResult::success("op", "p", json!("x".repeat(500))),
            }],
        }];
        let messages = to_messages(&conversation, 100);
        assert!(messages[0].content.as_deref().unwrap().contains("[truncated:"));
    }
}
