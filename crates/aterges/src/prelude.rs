//! Convenience re-exports for common `aterges` types.
//!
//! ```ignore
//! use aterges::prelude::*;
//! ```
//!
//! Covers what most embedders need: the [`Orchestrator`] and its config,
//! the provider contract and registry, the dispatch envelopes, the model
//! backend trait, and event handlers. Wire types and date helpers stay in
//! their modules.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{CoreError, OpenRouterClient, ToolDef};

// ── Query runtime ───────────────────────────────────────────────────
pub use crate::agent::{
    CompositeEventHandler, EventHandler, FnEventHandler, LoggingHandler, LoopEvent, NoopHandler,
    Orchestrator, OrchestratorConfig, OrchestratorStatus, QueryContext, QueryOutcome,
};

// ── Providers ───────────────────────────────────────────────────────
pub use crate::provider::{
    Arguments, FixtureProvider, HealthReport, HealthStatus, OperationDescriptor, OperationResult,
    ParamSpec, ParamType, Provider, ProviderFuture, ProviderRegistry, ProviderState,
};

// ── Dispatch and model ──────────────────────────────────────────────
pub use crate::dispatch::{CallRequest, CallResult, FunctionDispatcher};
pub use crate::model::openrouter::OpenRouterBackend;
pub use crate::model::{ModelBackend, ModelFuture, ModelTurn, Turn};
pub use crate::tools::build_tool_declarations;
