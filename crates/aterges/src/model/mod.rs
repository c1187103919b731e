//! Conversation turns and the model backend contract.
//!
//! The loop speaks to language models through [`ModelBackend`], which takes
//! the accumulated [`Turn`]s plus the tool list and returns one typed
//! [`ModelTurn`]. Whether the model wants tools called is a property of that
//! value ([`ModelTurn::has_call_requests`]), not something inferred from a
//! vendor response.

pub mod openrouter;

use crate::ToolDef;
use crate::dispatch::{CallRequest, CallResult};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;

/// Default cap on a serialized call result fed back to the model.
pub const DEFAULT_MAX_RESULT_BYTES: usize = 30_000;

/// Boxed future returned by [`ModelBackend::send`].
pub type ModelFuture<'a> = Pin<Box<dyn Future<Output = Result<ModelTurn, String>> + Send + 'a>>;

/// One model reply: optional text and zero or more call requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModelTurn {
    pub text: Option<String>,
    pub call_requests: Vec<CallRequest>,
}

impl ModelTurn {
    /// A reply with text only.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            call_requests: Vec::new(),
        }
    }

    /// A reply requesting calls, without text.
    pub fn calls(call_requests: Vec<CallRequest>) -> Self {
        Self {
            text: None,
            call_requests,
        }
    }

    pub fn has_call_requests(&self) -> bool {
        !self.call_requests.is_empty()
    }

    /// The reply text, if it contains anything besides whitespace.
    pub fn first_text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// The result of one dispatched call, paired with the request id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResultTurn {
    pub call_id: String,
    pub result: CallResult,
}

/// One entry of the conversation sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    System { content: String },
    User { content: String },
    Model(ModelTurn),
    /// All results of one dispatch cycle, in emission order.
    ToolResults { results: Vec<ToolResultTurn> },
}

/// A language model that can be offered tools.
///
/// `send` is called once per round with the whole conversation so far. An
/// `Err` is treated as a communication failure and ends the query.
///
/// # Example
///
/// ```ignore
/// struct Canned;
///
/// impl ModelBackend for Canned {
///     fn send<'a>(&'a self, _conversation: &'a [Turn], _tools: &'a [ToolDef]) -> ModelFuture<'a> {
///         Box::pin(async { Ok(ModelTurn::text("42 users")) })
///     }
/// }
/// ```
pub trait ModelBackend: Send + Sync {
    fn send<'a>(&'a self, conversation: &'a [Turn], tools: &'a [ToolDef]) -> ModelFuture<'a>;
}

/// Truncate a string to at most `max` bytes, appending a notice if trimmed.
///
/// Cuts on a char boundary.
pub fn truncate_result(s: String, max: usize) -> String {
    if s.len() <= max {
        return s;
    }
    let cut = (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0);
    format!(
        "{}...\n[truncated: {} bytes total]",
        s.get(..cut).unwrap_or_default(),
        s.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_text_is_not_first_text() {
        assert_eq!(ModelTurn::text("  \n").first_text(), None);
        assert_eq!(ModelTurn::text("42").first_text(), Some("42"));
        assert_eq!(ModelTurn::default().first_text(), None);
    }

    #[test]
    fn call_requests_drive_has_calls() {
        assert!(!ModelTurn::text("done").has_call_requests());
        let turn = ModelTurn::calls(vec![CallRequest::from_value("get_report", json!({}))]);
        assert!(turn.has_call_requests());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "ééééé".to_string(); // 10 bytes
        let out = truncate_result(s, 3);
        assert!(out.starts_with("é..."));
        assert!(out.contains("[truncated: 10 bytes total]"));
        assert_eq!(truncate_result("short".into(), 10), "short");
    }

    #[test]
    fn turns_serialize_with_role_tag() {
        let turn = Turn::User {
            content: "hi".into(),
        };
        assert_eq!(
            serde_json::to_value(&turn).unwrap(),
            json!({"role": "user", "content": "hi"})
        );
        let model = serde_json::to_value(Turn::Model(ModelTurn::text("ok"))).unwrap();
        assert_eq!(model["role"], "model");
        assert_eq!(model["text"], "ok");
    }
}
