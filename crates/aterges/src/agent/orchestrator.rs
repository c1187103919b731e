//! The bounded tool-calling conversation loop.
//!
//! One [`Orchestrator`] serves many queries. Each call to
//! [`run`](Orchestrator::run) owns its own conversation state:
//!
//! ```text
//! START ─► AWAITING_MODEL ─► has calls? ─no─► DONE
//!               ▲                 │
//!               │                yes
//!               │                 ▼
//!               └────────── DISPATCHING
//! ```
//!
//! The model is contacted at most `max_iterations` times per query. Calls
//! requested on the last permitted round are not dispatched, since no model
//! turn would read their results.

use super::config::OrchestratorConfig;
use super::events::{EventHandler, LoopEvent, NoopHandler};
use super::prompt::{SystemFraming, USER_KEY};
use crate::ToolDef;
use crate::dispatch::{CallResult, FunctionDispatcher};
use crate::error::{CoreError, ITERATION_LIMIT_MESSAGE};
use crate::model::{ModelBackend, ToolResultTurn, Turn};
use crate::provider::{HealthReport, ProviderRegistry, ProviderState};
use crate::tools;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime};
use tracing::info;

/// Caller-supplied context used only for prompt framing (e.g. `"email"`).
pub type QueryContext = HashMap<String, String>;

/// Generate a unique trace ID for a query.
pub fn generate_trace_id() -> String {
    let ts = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("tr-{ts:x}-{count:04x}")
}

// ── Results ────────────────────────────────────────────────────────

/// Everything one query produced.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub trace_id: String,
    /// Text returned to the caller. Never empty.
    pub text: String,
    /// Why the loop ended early. `None` when the model answered.
    pub error: Option<CoreError>,
    /// Number of model requests made.
    pub model_round_trips: u32,
    /// Every dispatched call result, in order.
    pub call_results: Vec<CallResult>,
    /// The full conversation, starting with the system framing.
    pub conversation: Vec<Turn>,
}

impl QueryOutcome {
    pub fn answered(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-provider detail in [`OrchestratorStatus`].
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub description: String,
    pub state: ProviderState,
    pub last_error: Option<String>,
    pub operations: Vec<String>,
    pub health: HealthReport,
}

/// Read-only snapshot returned by [`Orchestrator::get_status`].
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStatus {
    pub model: String,
    pub provider_count: usize,
    pub tool_count: usize,
    pub tools_available: bool,
    pub providers: BTreeMap<String, ProviderStatus>,
}

// ── Conversation state ─────────────────────────────────────────────

struct ConversationState {
    turns: Vec<Turn>,
    rounds: u32,
    call_results: Vec<CallResult>,
    /// Most recent non-blank model text, used when the ceiling is hit.
    last_text: Option<String>,
}

// ── Orchestrator ───────────────────────────────────────────────────

/// Drives queries against a shared provider registry and model backend.
///
/// # Example
///
/// ```ignore
/// let orchestrator = Orchestrator::new(Arc::new(registry), Arc::new(backend), config)
///     .with_event_handler(Arc::new(LoggingHandler));
///
/// let mut context = QueryContext::new();
/// context.insert("email".into(), "ana@example.com".into());
/// let answer = orchestrator.process_query("How many users yesterday?", &context).await;
/// ```
pub struct Orchestrator {
    registry: Arc<ProviderRegistry>,
    backend: Arc<dyn ModelBackend>,
    config: OrchestratorConfig,
    event_handler: Arc<dyn EventHandler>,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        backend: Arc<dyn ModelBackend>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            backend,
            config,
            event_handler: Arc::new(NoopHandler),
        }
    }

    /// Attach an event handler.
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = handler;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// The tool list offered to the model.
    pub fn tool_declarations(&self) -> Vec<ToolDef> {
        tools::build_tool_declarations(&self.registry)
    }

    /// Answer a query. Always returns non-empty text.
    pub async fn process_query(&self, user_query: &str, context: &QueryContext) -> String {
        self.run(user_query, context).await.text
    }

    /// Answer a query and return the full outcome.
    pub async fn run(&self, user_query: &str, context: &QueryContext) -> QueryOutcome {
        let trace_id = generate_trace_id();
        let started = Instant::now();
        let tools = self.tool_declarations();
        let reference_date = self.config.reference_date();

        info!(
            "Query started: trace_id={trace_id}, model={}, tools={}",
            self.config.model,
            tools.len()
        );
        self.event_handler.on_event(&LoopEvent::QueryStarted {
            trace_id: &trace_id,
            query: user_query,
            tools: tools.len(),
        });

        let framing = SystemFraming::new(&self.config.assistant_name, reference_date)
            .with_user(context.get(USER_KEY).map(String::as_str))
            .with_tools(&tools)
            .build();
        let mut state = ConversationState {
            turns: vec![
                Turn::System { content: framing },
                Turn::User {
                    content: user_query.to_string(),
                },
            ],
            rounds: 0,
            call_results: Vec::new(),
            last_text: None,
        };

        let dispatcher = FunctionDispatcher::new(&self.registry, reference_date)
            .with_date_correction(self.config.date_correction)
            .with_provider_timeout(self.config.provider_timeout);

        let result = {
            let work = self.drive(&tools, &dispatcher, &mut state);
            match self.config.query_timeout {
                Some(limit) => match tokio::time::timeout(limit, work).await {
                    Ok(result) => result,
                    Err(_) => {
                        let seconds = limit.as_secs();
                        self.event_handler
                            .on_event(&LoopEvent::DeadlineExceeded { seconds });
                        Err(CoreError::DeadlineExceeded { seconds })
                    }
                },
                None => work.await,
            }
        };

        let (text, error) = match result {
            Ok(text) => (text, None),
            Err(err @ CoreError::IterationLimitExceeded { .. }) => (
                state
                    .last_text
                    .clone()
                    .unwrap_or_else(|| ITERATION_LIMIT_MESSAGE.to_string()),
                Some(err),
            ),
            Err(err) => (err.user_message().to_string(), Some(err)),
        };

        info!(
            "Query completed: trace_id={trace_id}, rounds={}, calls={}, {:.1}s{}",
            state.rounds,
            state.call_results.len(),
            started.elapsed().as_secs_f64(),
            error
                .as_ref()
                .map(|e| format!(", stopped: {e}"))
                .unwrap_or_default()
        );

        QueryOutcome {
            trace_id,
            text,
            error,
            model_round_trips: state.rounds,
            call_results: state.call_results,
            conversation: state.turns,
        }
    }

    /// Run rounds until the model answers, fails, or the ceiling is hit.
    async fn drive(
        &self,
        tools: &[ToolDef],
        dispatcher: &FunctionDispatcher<'_>,
        state: &mut ConversationState,
    ) -> Result<String, CoreError> {
        let ceiling = self.config.iteration_ceiling();

        loop {
            state.rounds += 1;
            let round = state.rounds;
            self.event_handler.on_event(&LoopEvent::RoundStart {
                round,
                max_rounds: ceiling,
            });

            let reply = match self.backend.send(&state.turns, tools).await {
                Ok(reply) => reply,
                Err(e) => {
                    self.event_handler
                        .on_event(&LoopEvent::ModelError { round, error: &e });
                    return Err(CoreError::ModelCommunication(e));
                }
            };

            let text = reply.first_text().map(str::to_string);
            if let Some(ref text) = text {
                self.event_handler.on_event(&LoopEvent::ModelText(text));
                state.last_text = Some(text.clone());
            }

            if !reply.has_call_requests() {
                state.turns.push(Turn::Model(reply));
                return match text {
                    Some(text) => {
                        self.event_handler
                            .on_event(&LoopEvent::Finished { rounds: round });
                        Ok(text)
                    }
                    None => {
                        self.event_handler
                            .on_event(&LoopEvent::EmptyResponse { round });
                        Err(CoreError::EmptyFinalResponse)
                    }
                };
            }

            self.event_handler.on_event(&LoopEvent::CallsReceived {
                round,
                count: reply.call_requests.len(),
            });

            if round >= ceiling {
                state.turns.push(Turn::Model(reply));
                self.event_handler
                    .on_event(&LoopEvent::IterationLimitReached { max_rounds: ceiling });
                return Err(CoreError::IterationLimitExceeded { limit: ceiling });
            }

            let mut results = Vec::with_capacity(reply.call_requests.len());
            for request in &reply.call_requests {
                self.event_handler
                    .on_event(&LoopEvent::Dispatching { request });
                let result = dispatcher.dispatch(Some(request)).await;
                self.event_handler.on_event(&LoopEvent::CallCompleted {
                    request,
                    result: &result,
                });
                state.call_results.push(result.clone());
                results.push(ToolResultTurn {
                    call_id: request.id.clone(),
                    result,
                });
            }

            state.turns.push(Turn::Model(reply));
            state.turns.push(Turn::ToolResults { results });
        }
    }

    /// Provider health, tool count and configuration snapshot.
    pub async fn get_status(&self) -> OrchestratorStatus {
        let health = self.registry.aggregate_health().await;
        let tool_count = self.tool_declarations().len();

        let providers = self
            .registry
            .all()
            .iter()
            .map(|p| {
                let status = ProviderStatus {
                    description: p.description().to_string(),
                    state: p.state(),
                    last_error: p.last_error().map(str::to_string),
                    operations: p.operations().iter().map(|o| o.name.clone()).collect(),
                    health: health
                        .get(p.name())
                        .cloned()
                        .unwrap_or_else(|| HealthReport::error("no health report")),
                };
                (p.name().to_string(), status)
            })
            .collect();

        OrchestratorStatus {
            model: self.config.model.clone(),
            provider_count: self.registry.len(),
            tool_count,
            tools_available: tool_count > 0,
            providers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_ids_are_unique() {
        let a = generate_trace_id();
        let b = generate_trace_id();
        assert!(a.starts_with("tr-"));
        assert_ne!(a, b);
    }

    #[test]
    fn outcome_answered_tracks_error() {
        let outcome = QueryOutcome {
            trace_id: "tr-test".into(),
            text: "ok".into(),
            error: None,
            model_round_trips: 1,
            call_results: vec![],
            conversation: vec![],
        };
        assert!(outcome.answered());
        let stopped = QueryOutcome {
            error: Some(CoreError::EmptyFinalResponse),
            ..outcome
        };
        assert!(!stopped.answered());
    }
}
