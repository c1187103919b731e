//! Call routing and the uniform result envelope.
//!
//! [`FunctionDispatcher::dispatch`] turns one model call request into a
//! [`CallResult`], whatever goes wrong. Checks run in a fixed order:
//!
//! 1. missing call (no request, or a blank name)
//! 2. unknown operation
//! 3. provider not ready
//! 4. fill parameter defaults, then correct date-range arguments
//! 5. validate arguments against the operation's JSON Schema
//! 6. invoke inside a panic boundary, with an optional timeout
//!
//! Errors are never raised past the dispatcher; they are rendered into the
//! envelope so the model can read them and react.

use crate::dates::{self, DateRange};
use crate::error::CoreError;
use crate::provider::operation::{END_DATE, START_DATE};
use crate::provider::{Arguments, OperationDescriptor, ProviderRegistry, RegisteredProvider};
use chrono::NaiveDate;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

// ── Envelopes ──────────────────────────────────────────────────────

/// A structured call produced by the model for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    /// Backend-assigned id used to pair the result with the request.
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Arguments,
}

impl CallRequest {
    pub fn new(name: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            arguments,
        }
    }

    /// Build a request from a JSON value. Non-object values yield no arguments.
    pub fn from_value(name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Arguments::new(),
        };
        Self::new(name, arguments)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// Uniform outcome of a dispatched call.
///
/// Exactly one of `data` / `error_message` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallResult {
    pub success: bool,
    pub data: Option<Value>,
    pub error_message: Option<String>,
    pub operation: String,
    pub provider: Option<String>,
}

impl CallResult {
    pub fn success(operation: impl Into<String>, provider: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error_message: None,
            operation: operation.into(),
            provider: Some(provider.into()),
        }
    }

    pub fn failure(error: &CoreError, operation: impl Into<String>, provider: Option<&str>) -> Self {
        Self {
            success: false,
            data: None,
            error_message: Some(error.to_string()),
            operation: operation.into(),
            provider: provider.map(str::to_string),
        }
    }
}

// ── Dispatcher ─────────────────────────────────────────────────────

/// Routes call requests to the provider operation that declares them.
///
/// Borrowed per query: it holds the shared registry and the reference date
/// used for date correction.
#[derive(Debug, Clone)]
pub struct FunctionDispatcher<'a> {
    registry: &'a ProviderRegistry,
    reference_date: NaiveDate,
    date_correction: bool,
    provider_timeout: Option<Duration>,
}

impl<'a> FunctionDispatcher<'a> {
    pub fn new(registry: &'a ProviderRegistry, reference_date: NaiveDate) -> Self {
        Self {
            registry,
            reference_date,
            date_correction: true,
            provider_timeout: None,
        }
    }

    /// Enable or disable resolution and stale-date correction of
    /// `start_date` / `end_date` arguments. Enabled by default.
    pub fn with_date_correction(mut self, enabled: bool) -> Self {
        self.date_correction = enabled;
        self
    }

    /// Fail provider calls that run longer than `timeout`. `None` waits for
    /// the provider's own timeout.
    pub fn with_provider_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
    }

    /// Dispatch one call. Never fails: every error becomes a failed envelope.
    pub async fn dispatch(&self, request: Option<&CallRequest>) -> CallResult {
        let Some(request) = request.filter(|r| !r.name.trim().is_empty()) else {
            warn!("[dispatch] missing call request");
            return CallResult::failure(&CoreError::MissingCallRequest, "", None);
        };
        let name = request.name.as_str();

        let Some((entry, descriptor)) = self.registry.find_operation(name) else {
            warn!("[dispatch] unknown function: {name}");
            return CallResult::failure(&CoreError::UnknownOperation(name.to_string()), name, None);
        };
        let provider = entry.name();

        if !entry.is_ready() {
            warn!("[dispatch] {name}: provider '{provider}' is {}", entry.state());
            let err = CoreError::ProviderUnavailable {
                provider: provider.to_string(),
            };
            return CallResult::failure(&err, name, Some(provider));
        }

        let mut arguments = request.arguments.clone();
        apply_defaults(descriptor, &mut arguments);
        if self.date_correction && descriptor.has_date_range() {
            self.correct_dates(name, &mut arguments);
        }

        if let Some(reason) = validate_arguments(descriptor, &arguments) {
            warn!("[dispatch] {name}: invalid arguments: {reason}");
            let err = CoreError::InvalidArguments {
                operation: name.to_string(),
                reason,
            };
            return CallResult::failure(&err, name, Some(provider));
        }

        let args_text = Value::Object(arguments.clone()).to_string();
        log_call(name, &args_text);
        let start = Instant::now();

        let outcome = self.invoke(entry, name, &arguments).await;

        let elapsed = start.elapsed();
        match outcome {
            Ok(data) => {
                debug!(
                    "[dispatch] {name} completed in {:.0}ms",
                    elapsed.as_secs_f64() * 1000.0
                );
                let preview: String = data.to_string().chars().take(300).collect();
                trace!("[dispatch] {name} result preview: {preview}");
                CallResult::success(name, provider, data)
            }
            Err(err) => {
                warn!(
                    "[dispatch] {name} failed after {:.0}ms: {err}",
                    elapsed.as_secs_f64() * 1000.0
                );
                CallResult::failure(&err, name, Some(provider))
            }
        }
    }

    async fn invoke(
        &self,
        entry: &RegisteredProvider,
        operation: &str,
        arguments: &Arguments,
    ) -> Result<Value, CoreError> {
        let panicked = || CoreError::ProviderExecution(format!("operation '{operation}' panicked"));

        let future = std::panic::catch_unwind(AssertUnwindSafe(|| {
            entry.provider().invoke(operation, arguments)
        }))
        .map_err(|_| panicked())?;
        let call = AssertUnwindSafe(future).catch_unwind();

        let outcome = match self.provider_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    info!(
                        "[dispatch] {operation} timed out (limit: {:.0}s)",
                        limit.as_secs_f64()
                    );
                    return Err(CoreError::ProviderExecution(format!(
                        "operation '{operation}' timed out after {:.0} seconds",
                        limit.as_secs_f64()
                    )));
                }
            },
            None => call.await,
        };

        match outcome {
            Ok(Ok(data)) => Ok(data),
            Ok(Err(message)) => Err(CoreError::ProviderExecution(message)),
            Err(_) => Err(panicked()),
        }
    }

    /// Resolve relative phrases and replace stale dates in place.
    ///
    /// Leaves the arguments alone when either field is absent or not a
    /// string; validation reports those.
    fn correct_dates(&self, operation: &str, arguments: &mut Arguments) {
        let raw = |key: &str| arguments.get(key).and_then(Value::as_str).map(str::to_string);
        let (Some(raw_start), Some(raw_end)) = (raw(START_DATE), raw(END_DATE)) else {
            return;
        };

        let start = self.resolve_field(&raw_start).start;
        let end = self.resolve_field(&raw_end).end;
        let corrected = dates::sanitize(start, end, self.reference_date);

        let (new_start, new_end) = (corrected.start_str(), corrected.end_str());
        if new_start != raw_start || new_end != raw_end {
            warn!(
                "[dispatch] {operation}: corrected dates {raw_start}..{raw_end} -> {new_start}..{new_end} \
                 (reference {})",
                self.reference_date
            );
            arguments.insert(START_DATE.to_string(), Value::String(new_start));
            arguments.insert(END_DATE.to_string(), Value::String(new_end));
        }
    }

    /// An ISO date as a single-day range, anything else as a relative phrase.
    fn resolve_field(&self, value: &str) -> DateRange {
        match dates::parse_date(value) {
            Some(day) => DateRange::single(day),
            None => dates::resolve_relative(value, self.reference_date),
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Fill omitted optional arguments from their declared defaults.
fn apply_defaults(descriptor: &OperationDescriptor, arguments: &mut Arguments) {
    for param in &descriptor.parameters {
        if let Some(ref default) = param.default
            && !arguments.contains_key(&param.name)
        {
            arguments.insert(param.name.clone(), default.clone());
        }
    }
}

/// Validate arguments against the descriptor's JSON Schema.
///
/// Returns `None` if valid, or a one-line description of every violation.
pub fn validate_arguments(descriptor: &OperationDescriptor, arguments: &Arguments) -> Option<String> {
    let schema = descriptor.parameters_schema();
    let validator = match jsonschema::validator_for(&schema) {
        Ok(v) => v,
        Err(e) => {
            debug!("[dispatch] skipping validation for {}: {e}", descriptor.name);
            return None;
        }
    };

    let instance = Value::Object(arguments.clone());
    let errors: Vec<String> = validator
        .iter_errors(&instance)
        .map(|e| {
            let path = e.instance_path().to_string();
            if path.is_empty() {
                e.to_string()
            } else {
                format!("{path}: {e}")
            }
        })
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(errors.join("; "))
    }
}

/// Log a call at INFO level with a truncated preview of its arguments.
pub fn log_call(name: &str, arguments: &str) {
    let args_preview: String = arguments.chars().take(120).collect();
    info!(
        "[dispatch] {}({args_preview}{})",
        name,
        if arguments.chars().count() > 120 { "..." } else { "" }
    );
    debug!("[dispatch] {name} full args ({} bytes)", arguments.len());
    trace!("[dispatch] {name} arguments: {arguments}");
}
