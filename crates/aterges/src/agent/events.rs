//! Events emitted by the [`Orchestrator`](super::orchestrator::Orchestrator)
//! and the handlers that observe them.
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or fire-and-forget queries |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures for simple callbacks |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |

use crate::dispatch::{CallRequest, CallResult};
use tracing::{debug, info, warn};

// ── Events ─────────────────────────────────────────────────────────

/// Lifecycle events of one query.
#[derive(Debug)]
pub enum LoopEvent<'a> {
    /// A query was accepted. `tools` is the number of declarations offered.
    QueryStarted {
        trace_id: &'a str,
        query: &'a str,
        tools: usize,
    },
    /// A model round trip is about to start.
    RoundStart { round: u32, max_rounds: u32 },
    /// The model returned text (possibly alongside calls).
    ModelText(&'a str),
    /// The model requested calls this round.
    CallsReceived { round: u32, count: usize },
    /// A call is about to be dispatched.
    Dispatching { request: &'a CallRequest },
    /// A call was dispatched.
    CallCompleted {
        request: &'a CallRequest,
        result: &'a CallResult,
    },
    /// The model answered without requesting calls.
    Finished { rounds: u32 },
    /// The ceiling was hit while the model still wanted calls.
    IterationLimitReached { max_rounds: u32 },
    /// The model backend failed.
    ModelError { round: u32, error: &'a str },
    /// The final reply carried no usable text.
    EmptyResponse { round: u32 },
    /// The query's time budget ran out.
    DeadlineExceeded { seconds: u64 },
}

/// Observer for [`LoopEvent`]s.
///
/// # Example
///
/// ```ignore
/// struct CountCalls(AtomicUsize);
///
/// impl EventHandler for CountCalls {
///     fn on_event(&self, event: &LoopEvent<'_>) {
///         if let LoopEvent::CallCompleted { .. } = event {
///             self.0.fetch_add(1, Ordering::Relaxed);
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &LoopEvent<'_>) {
        let _ = event;
    }
}

/// Ignores every event.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
///
/// ```ignore
/// let handler = FnEventHandler::new(|event| {
///     if let LoopEvent::ModelText(text) = event {
///         println!("{text}");
///     }
/// });
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&LoopEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&LoopEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&LoopEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &LoopEvent<'_>) {
        (self.0)(event)
    }
}

/// Delegates every event to each inner handler, in registration order.
///
/// ```ignore
/// let handler = CompositeEventHandler::new()
///     .with(LoggingHandler)
///     .with_if(verbose, transcript_printer);
/// ```
#[derive(Default)]
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &LoopEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// Logs events via `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &LoopEvent<'_>) {
        match event {
            LoopEvent::QueryStarted {
                trace_id,
                query,
                tools,
            } => {
                let preview: String = query.chars().take(120).collect();
                info!("[{trace_id}] query: {preview} ({tools} tools available)");
            }
            LoopEvent::RoundStart { round, max_rounds } => {
                debug!("[round {round}/{max_rounds}]");
            }
            LoopEvent::ModelText(text) => {
                let preview: String = text.chars().take(200).collect();
                debug!(
                    "Model text: {preview}{}",
                    if text.chars().count() > 200 { "..." } else { "" }
                );
            }
            LoopEvent::CallsReceived { round, count } => {
                info!("Processing {count} function call(s) (round {round})");
            }
            LoopEvent::Dispatching { request } => {
                debug!("Dispatching: {}", request.name);
            }
            LoopEvent::CallCompleted { request, result } => {
                if result.success {
                    debug!("Call {} succeeded", request.name);
                } else {
                    warn!(
                        "Call {} failed: {}",
                        request.name,
                        result.error_message.as_deref().unwrap_or("unknown error")
                    );
                }
            }
            LoopEvent::Finished { rounds } => {
                info!("Query completed in {rounds} round(s)");
            }
            LoopEvent::IterationLimitReached { max_rounds } => {
                warn!("Query hit the iteration limit ({max_rounds})");
            }
            LoopEvent::ModelError { round, error } => {
                warn!("Model error in round {round}: {error}");
            }
            LoopEvent::EmptyResponse { round } => {
                warn!("No response content generated (round {round})");
            }
            LoopEvent::DeadlineExceeded { seconds } => {
                warn!("Query exceeded its {seconds}s budget");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn composite_calls_every_handler() {
        let count = Arc::new(AtomicUsize::new(0));
        let a = Arc::clone(&count);
        let b = Arc::clone(&count);
        let handler = CompositeEventHandler::new()
            .with(FnEventHandler::new(move |_| {
                a.fetch_add(1, Ordering::Relaxed);
            }))
            .with(NoopHandler)
            .with(FnEventHandler::new(move |_| {
                b.fetch_add(10, Ordering::Relaxed);
            }))
            .with_if(false, LoggingHandler);

        handler.on_event(&LoopEvent::Finished { rounds: 1 });
        assert_eq!(count.load(Ordering::Relaxed), 11);
    }

    #[test]
    fn logging_handler_accepts_every_event() {
        let request = CallRequest::new("get_report", Default::default());
        let result = CallResult::success("get_report", "analytics", serde_json::json!({}));
        let events = [
            LoopEvent::QueryStarted {
                trace_id: "tr-1",
                query: "users yesterday",
                tools: 3,
            },
            LoopEvent::RoundStart {
                round: 1,
                max_rounds: 5,
            },
            LoopEvent::ModelText("hello"),
            LoopEvent::CallsReceived { round: 1, count: 1 },
            LoopEvent::Dispatching { request: &request },
            LoopEvent::CallCompleted {
                request: &request,
                result: &result,
            },
            LoopEvent::Finished { rounds: 2 },
            LoopEvent::IterationLimitReached { max_rounds: 5 },
            LoopEvent::ModelError {
                round: 1,
                error: "HTTP 500",
            },
            LoopEvent::EmptyResponse { round: 2 },
            LoopEvent::DeadlineExceeded { seconds: 30 },
        ];
        for event in &events {
            LoggingHandler.on_event(event);
        }
    }
}
