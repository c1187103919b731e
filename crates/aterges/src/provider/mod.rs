//! Data providers: the capability contract, operation descriptors, and the
//! registry that owns initialized providers.
//!
//! A provider is a black box behind the [`Provider`] trait: it names a
//! capability (`"google_analytics"`), describes the operations it serves, and
//! executes them given a JSON argument object. Everything the model can call
//! is declared up front through [`OperationDescriptor`]s, so the set of
//! callable operations is closed and statically known.
//!
//! # Submodules
//!
//! - [`operation`]: [`OperationDescriptor`], [`ParamSpec`], [`ParamType`].
//! - [`registry`]: [`ProviderRegistry`] with per-provider lifecycle state.
//! - [`fixture`]: [`FixtureProvider`], a JSON-backed provider for demos and tests.

pub mod fixture;
pub mod operation;
pub mod registry;

pub use fixture::FixtureProvider;
pub use operation::{OperationDescriptor, ParamSpec, ParamType};
pub use registry::{ProviderRegistry, ProviderState, RegisteredProvider};

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Argument object passed to a provider operation.
pub type Arguments = serde_json::Map<String, serde_json::Value>;

/// Boxed future returned by [`Provider`] methods.
///
/// Keeps the trait dyn-compatible so providers can live in one registry.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome of a provider operation: a JSON payload or an error message.
pub type OperationResult = Result<serde_json::Value, String>;

// ── Health ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Error,
}

/// Result of a provider health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub message: String,
}

impl HealthReport {
    pub fn healthy(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Error,
            message: message.into(),
        }
    }
}

// ── Provider trait ──────────────────────────────────────────────────

/// A pluggable backend exposing named data-retrieval operations.
///
/// Implementors provide:
/// - An identity: [`Provider::name`] is the capability key the registry
///   indexes by, [`Provider::description`] is for humans.
/// - [`Provider::initialize`], called exactly once by the registry. Acquire
///   clients and credentials here; an `Err` marks the provider failed and
///   its operations are never offered to the model.
/// - [`Provider::operations`], the closed set of operations it serves.
/// - [`Provider::invoke`], which executes one of those operations.
///
/// # Example
///
/// ```ignore
/// struct Weather;
///
/// impl Provider for Weather {
///     fn name(&self) -> &str { "weather" }
///     fn description(&self) -> &str { "Historical weather observations" }
///
///     fn operations(&self) -> Vec<OperationDescriptor> {
///         vec![OperationDescriptor::new("get_temperature", "Daily mean temperature")
///             .with_date_range()]
///     }
///
///     fn health_check(&self) -> ProviderFuture<'_, HealthReport> {
///         Box::pin(async { HealthReport::healthy("ok") })
///     }
///
///     fn invoke(&self, operation: &str, arguments: &Arguments) -> ProviderFuture<'_, OperationResult> {
///         let start = arguments.get("start_date").cloned();
///         Box::pin(async move { Ok(serde_json::json!({ "start": start, "celsius": 21.5 })) })
///     }
/// }
/// ```
pub trait Provider: Send + Sync {
    /// Capability name, unique within a registry.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// Acquire resources. Called once, before any other operation is served.
    fn initialize(&mut self) -> Result<(), String> {
        Ok(())
    }

    /// Operations this provider serves. Read once at registration.
    fn operations(&self) -> Vec<OperationDescriptor>;

    /// Check that the provider can currently reach its data source.
    fn health_check(&self) -> ProviderFuture<'_, HealthReport>;

    /// Execute `operation` with arguments already validated against its
    /// descriptor.
    fn invoke(&self, operation: &str, arguments: &Arguments) -> ProviderFuture<'_, OperationResult>;
}
