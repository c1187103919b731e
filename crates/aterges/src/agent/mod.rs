//! Query runtime: the [`Orchestrator`] conversation loop and its supporting
//! modules.
//!
//! - [`orchestrator::Orchestrator`]: the bounded tool-calling loop. Start here.
//! - [`config::OrchestratorConfig`]: model, iteration ceiling, timeouts, and
//!   date-correction settings.
//! - [`events`]: [`EventHandler`] trait and [`LoopEvent`] enum for observing
//!   the loop. Includes [`LoggingHandler`], [`CompositeEventHandler`], and
//!   [`FnEventHandler`].
//! - [`prompt`]: [`SystemFraming`], the first turn of every conversation.

pub mod config;
pub mod events;
pub mod orchestrator;
pub mod prompt;

pub use config::OrchestratorConfig;
pub use events::{
    CompositeEventHandler, EventHandler, FnEventHandler, LoggingHandler, LoopEvent, NoopHandler,
};
pub use orchestrator::{
    Orchestrator, OrchestratorStatus, ProviderStatus, QueryContext, QueryOutcome,
};
pub use prompt::SystemFraming;
