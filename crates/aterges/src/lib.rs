//! Tool-calling conversation core for analytics assistants.
//!
//! `aterges` answers natural-language questions ("how many users did we have
//! yesterday?") by letting a language model call typed operations exposed by
//! pluggable data providers, then returning the model's final answer. The
//! central abstraction is the [`Orchestrator`](agent::orchestrator::Orchestrator):
//! a bounded loop that sends the conversation and tool list to a
//! [`ModelBackend`](model::ModelBackend), dispatches any requested calls
//! through the [`FunctionDispatcher`](dispatch::FunctionDispatcher), feeds the
//! results back, and repeats until the model answers in plain text or the
//! iteration ceiling is reached.
//!
//! # Getting started
//!
//! ```ignore
//! use aterges::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), String> {
//!     let api_key = std::env::var("OPENROUTER_KEY").map_err(|e| e.to_string())?;
//!     let config = OrchestratorConfig::new("google/gemini-2.5-flash").with_max_iterations(5);
//!
//!     // Providers are initialized once; failures are recorded, not raised.
//!     let registry = ProviderRegistry::new().with(FixtureProvider::from_path("fixtures.json"));
//!     let backend = OpenRouterBackend::new(OpenRouterClient::new(api_key)?, &config);
//!
//!     let orchestrator = Orchestrator::new(Arc::new(registry), Arc::new(backend), config);
//!     let answer = orchestrator
//!         .process_query("How many users yesterday?", &QueryContext::new())
//!         .await;
//!     println!("{answer}");
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Plug in a data source:** implement [`Provider`](provider::Provider) and
//!   describe each operation with an
//!   [`OperationDescriptor`](provider::OperationDescriptor). Register it with
//!   [`ProviderRegistry`](provider::ProviderRegistry).
//! - **See what the model is offered:** [`tools::build_tool_declarations`].
//! - **Relative dates and stale-date correction:** [`dates`].
//! - **Call routing and the result envelope:** [`dispatch`].
//! - **The loop itself, its config and events:** [`agent`].
//! - **Talk to a model:** [`model::ModelBackend`] and the OpenRouter adapter
//!   [`model::openrouter::OpenRouterBackend`].

pub mod agent;
pub mod dates;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod prelude;
pub mod provider;
pub mod tools;

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

pub use error::CoreError;

// ── Constants ──────────────────────────────────────────────────────

pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Default model for the conversation loop.
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";

/// Timeout for a single model round trip.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body (OpenAI function-calling format).
#[derive(Serialize, Debug, Default)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    /// Unset leaves the limit to the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDef>>,
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message on the wire.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A wire-format chat message.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Message {
    pub role: MessageRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::System, Some(content.into()))
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::User, Some(content.into()))
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Assistant, Some(content.into()))
    }

    /// Assistant turn that requested tool calls, with any text it emitted
    /// alongside them.
    pub fn assistant_tool_calls(content: Option<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(calls),
            ..Self::with_role(MessageRole::Assistant, content)
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            ..Self::with_role(MessageRole::Tool, Some(content.into()))
        }
    }

    fn with_role(role: MessageRole, content: Option<String>) -> Self {
        Self {
            role,
            content,
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

// ── Tool types ─────────────────────────────────────────────────────

/// The type of a tool definition. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ToolType {
    #[serde(rename = "function")]
    Function,
}

/// A tool declaration as sent to the model (OpenAI function-calling format).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub function: FunctionDef,
}

impl ToolDef {
    /// Create a function-calling tool declaration.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: ToolType::Function,
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// The type of a tool call. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum CallType {
    #[serde(rename = "function")]
    Function,
}

/// A tool call on the wire. `arguments` is a JSON-encoded object.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: CallType,
    pub function: FunctionCallData,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FunctionCallData {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

// ── Response types ─────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

/// Clean return type from [`OpenRouterClient::chat`].
#[derive(Debug, Default)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<UsageInfo>,
    pub finish_reason: Option<String>,
}

/// Token usage statistics.
#[derive(Deserialize, Debug, Clone)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for the OpenRouter chat completions API.
pub struct OpenRouterClient {
    client: reqwest::Client,
    api_key: String,
    url: String,
}

impl OpenRouterClient {
    /// Create a client with the default endpoint and request timeout.
    pub fn new(api_key: impl Into<String>) -> Result<Self, String> {
        Self::with_timeout(api_key, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a client whose requests fail after `timeout` instead of hanging.
    pub fn with_timeout(api_key: impl Into<String>, timeout: Duration) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("aterges/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            url: OPENROUTER_URL.to_string(),
        })
    }

    /// Point the client at a different OpenAI-compatible endpoint.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Send a chat completion request.
    pub async fn chat(&self, body: &ChatRequest) -> Result<ChatCompletion, String> {
        debug!(
            "LLM request: model={}, messages={}, tools={}, max_tokens={:?}",
            body.model,
            body.messages.len(),
            body.tools.as_ref().map_or(0, |t| t.len()),
            body.max_tokens,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| format!("failed to read response: {e}"))?;

        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(format!("model API HTTP {status}: {text}"));
        }

        parse_chat_response(&text)
    }
}

/// Parse a raw chat-completions response body.
pub fn parse_chat_response(text: &str) -> Result<ChatCompletion, String> {
    let parsed: RawChatResponse =
        serde_json::from_str(text).map_err(|e| format!("failed to parse response: {e}"))?;

    if let Some(err) = parsed.error {
        return Err(format!("model API error: {}", err.message));
    }

    let Some(choice) = parsed.choices.and_then(|c| c.into_iter().next()) else {
        debug!("LLM output: empty (no choices)");
        return Ok(ChatCompletion {
            usage: parsed.usage,
            ..Default::default()
        });
    };

    debug!(
        "LLM output: {} chars text, {} tool call(s)",
        choice.message.content.as_ref().map_or(0, |s| s.len()),
        choice.message.tool_calls.as_ref().map_or(0, |t| t.len()),
    );

    Ok(ChatCompletion {
        content: choice.message.content,
        tool_calls: choice.message.tool_calls.unwrap_or_default(),
        usage: parsed.usage,
        finish_reason: choice.finish_reason,
    })
}
