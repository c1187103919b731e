//! Error taxonomy for dispatch and the conversation loop.
//!
//! Dispatch-level variants never leave the dispatcher as errors: they are
//! rendered into a failed [`CallResult`](crate::dispatch::CallResult) and fed
//! back to the model. Loop-level variants end a query, and the caller only
//! ever sees [`CoreError::user_message`].

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("missing call")]
    MissingCallRequest,
    #[error("unknown function: {0}")]
    UnknownOperation(String),
    #[error("provider unavailable")]
    ProviderUnavailable { provider: String },
    #[error("invalid arguments for '{operation}': {reason}")]
    InvalidArguments { operation: String, reason: String },
    #[error("{0}")]
    ProviderExecution(String),
    #[error("model communication failed: {0}")]
    ModelCommunication(String),
    #[error("iteration limit of {limit} reached")]
    IterationLimitExceeded { limit: u32 },
    #[error("model produced no final text")]
    EmptyFinalResponse,
    #[error("query exceeded its time budget of {seconds}s")]
    DeadlineExceeded { seconds: u64 },
}

/// Returned when the model backend fails mid-query.
pub const MODEL_ERROR_MESSAGE: &str = "I encountered an error while processing your query. \
     Please try again or contact support if the issue persists.";

/// Returned when the model's final turn carries no text.
pub const EMPTY_RESPONSE_MESSAGE: &str = "I apologize, but I couldn't generate a response to \
     your query. Please try rephrasing your question.";

/// Returned when the iteration ceiling is hit before the model produced any text.
pub const ITERATION_LIMIT_MESSAGE: &str = "I wasn't able to finish gathering the data for \
     your question. Please try narrowing it down.";

/// Returned when a caller-imposed time budget runs out.
pub const DEADLINE_MESSAGE: &str = "Your query took too long to answer. Please try again \
     with a simpler question.";

impl CoreError {
    /// User-safe text for errors that terminate a query.
    ///
    /// Dispatch-level errors are reported to the model, which explains them
    /// in its own words, so they share the generic model-error text here.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::EmptyFinalResponse => EMPTY_RESPONSE_MESSAGE,
            Self::IterationLimitExceeded { .. } => ITERATION_LIMIT_MESSAGE,
            Self::DeadlineExceeded { .. } => DEADLINE_MESSAGE,
            _ => MODEL_ERROR_MESSAGE,
        }
    }
}
