//! Configuration for the [`Orchestrator`](super::orchestrator::Orchestrator).
//!
//! ```ignore
//! let config = OrchestratorConfig::new("google/gemini-2.5-flash")
//!     .with_max_iterations(5)
//!     .with_provider_timeout(Some(Duration::from_secs(30)))
//!     .with_query_timeout(Some(Duration::from_secs(90)));
//! ```
//!
//! [`OrchestratorConfig::from_env`] overlays `ATERGES_*` environment
//! variables onto the defaults.

use crate::DEFAULT_MODEL;
use crate::model::DEFAULT_MAX_RESULT_BYTES;
use chrono::NaiveDate;
use std::time::Duration;
use tracing::warn;

/// Default ceiling on model round trips per query.
pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

/// Name the assistant introduces itself with.
pub const DEFAULT_ASSISTANT_NAME: &str = "Aterges AI";

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Model identifier (e.g. `"google/gemini-2.5-flash"`).
    pub model: String,
    /// Maximum model round trips per query. Values below 1 are treated as 1.
    pub max_iterations: u32,
    /// Maximum tokens per model response. `0` leaves it to the backend.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Cap on the serialized size of each call result sent to the model.
    pub max_result_bytes: usize,
    /// Per-call provider timeout. `None` relies on the provider's own.
    pub provider_timeout: Option<Duration>,
    /// Wall-clock budget for a whole query. `None` disables it.
    pub query_timeout: Option<Duration>,
    /// Name used in the system framing.
    pub assistant_name: String,
    /// Resolve relative date arguments and replace stale ones.
    pub date_correction: bool,
    /// Fixed "today" for reproducible runs. `None` uses the local date.
    pub reference_date: Option<NaiveDate>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_tokens: 4096,
            temperature: 0.2,
            max_result_bytes: DEFAULT_MAX_RESULT_BYTES,
            provider_timeout: None,
            query_timeout: None,
            assistant_name: DEFAULT_ASSISTANT_NAME.to_string(),
            date_correction: true,
            reference_date: None,
        }
    }
}

impl OrchestratorConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Defaults overlaid with `ATERGES_MODEL`, `ATERGES_MAX_ITERATIONS`,
    /// `ATERGES_TEMPERATURE` and `ATERGES_MAX_TOKENS`.
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(model) = lookup("ATERGES_MODEL").filter(|m| !m.trim().is_empty()) {
            self.model = model;
        }
        if let Some(v) = parse_var(&lookup, "ATERGES_MAX_ITERATIONS") {
            self.max_iterations = v;
        }
        if let Some(v) = parse_var(&lookup, "ATERGES_TEMPERATURE") {
            self.temperature = v;
        }
        if let Some(v) = parse_var(&lookup, "ATERGES_MAX_TOKENS") {
            self.max_tokens = v;
        }
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn with_assistant_name(mut self, name: impl Into<String>) -> Self {
        self.assistant_name = name.into();
        self
    }

    pub fn with_date_correction(mut self, enabled: bool) -> Self {
        self.date_correction = enabled;
        self
    }

    /// Pin "today" instead of reading the local clock.
    pub fn with_reference_date(mut self, date: Option<NaiveDate>) -> Self {
        self.reference_date = date;
        self
    }

    /// Effective round-trip ceiling (at least one).
    pub fn iteration_ceiling(&self) -> u32 {
        self.max_iterations.max(1)
    }

    /// The date relative phrases resolve against.
    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("ignoring invalid {key}={raw:?}");
            None
        }
    }
}
