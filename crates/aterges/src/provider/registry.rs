//! Provider registry with per-provider lifecycle state.
//!
//! The registry is built once at start-up and then shared read-only behind an
//! `Arc`. Registration initializes the provider immediately; a provider whose
//! initialization fails (or panics) is kept with state
//! [`ProviderState::Failed`] and its error, so it stays visible in status
//! output while its operations are withheld from the model. No registry
//! method returns an error.

use super::{HealthReport, OperationDescriptor, Provider};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use tracing::{debug, info, warn};

/// Lifecycle state of a registered provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderState {
    Uninitialized,
    Ready,
    Failed,
}

impl fmt::Display for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A provider together with its lifecycle state and declared operations.
pub struct RegisteredProvider {
    provider: Box<dyn Provider>,
    state: ProviderState,
    last_error: Option<String>,
    operations: Vec<OperationDescriptor>,
}

impl fmt::Debug for RegisteredProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredProvider")
            .field("name", &self.name())
            .field("state", &self.state)
            .field("last_error", &self.last_error)
            .field(
                "operations",
                &self.operations.iter().map(|o| &o.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl RegisteredProvider {
    fn new(provider: Box<dyn Provider>) -> Self {
        Self {
            provider,
            state: ProviderState::Uninitialized,
            last_error: None,
            operations: Vec::new(),
        }
    }

    /// Run the provider's initialization and read its operations.
    fn initialize(&mut self) {
        let provider = &mut self.provider;
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
            let result = provider.initialize();
            (result, provider.operations())
        }));

        match outcome {
            Ok((Ok(()), operations)) => {
                self.operations = operations;
                self.state = ProviderState::Ready;
            }
            Ok((Err(e), operations)) => {
                self.operations = operations;
                self.fail(e);
            }
            Err(_) => self.fail("initialization panicked".to_string()),
        }
    }

    fn fail(&mut self, error: String) {
        self.state = ProviderState::Failed;
        self.last_error = Some(error);
    }

    pub fn name(&self) -> &str {
        self.provider.name()
    }

    pub fn description(&self) -> &str {
        self.provider.description()
    }

    pub fn state(&self) -> ProviderState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ProviderState::Ready
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Operations declared by the provider, in declaration order.
    pub fn operations(&self) -> &[OperationDescriptor] {
        &self.operations
    }

    /// The declared operation called `name`, if any.
    pub fn operation(&self, name: &str) -> Option<&OperationDescriptor> {
        self.operations.iter().find(|o| o.name == name)
    }

    pub fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    /// Health of this provider. Failed providers report their last error
    /// without being contacted.
    pub async fn health(&self) -> HealthReport {
        match self.state {
            ProviderState::Ready => {
                let check = AssertUnwindSafe(|| self.provider.health_check());
                let outcome = match std::panic::catch_unwind(check) {
                    Ok(future) => AssertUnwindSafe(future).catch_unwind().await,
                    Err(panic) => Err(panic),
                };
                outcome.unwrap_or_else(|_| HealthReport::error("health check panicked"))
            }
            ProviderState::Failed => HealthReport::error(
                self.last_error
                    .clone()
                    .unwrap_or_else(|| "initialization failed".to_string()),
            ),
            ProviderState::Uninitialized => HealthReport::warning("not initialized"),
        }
    }
}

/// Ordered collection of providers keyed by capability name.
///
/// # Example
///
/// ```ignore
/// let registry = ProviderRegistry::new()
///     .with(FixtureProvider::from_path("analytics.json"))
///     .with_if(tags_enabled, TagManager::new(credentials));
///
/// for p in registry.ready() {
///     println!("{}: {} operations", p.name(), p.operations().len());
/// }
/// ```
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: Vec<RegisteredProvider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize and register a provider, returning its resulting state.
    ///
    /// A provider with the same capability name replaces the existing entry
    /// in place, keeping its position. A provider declaring an operation name
    /// already served by another provider is recorded as failed.
    pub fn register(&mut self, provider: impl Provider + 'static) -> ProviderState {
        self.register_boxed(Box::new(provider))
    }

    /// Like [`register`](Self::register) for an already boxed provider.
    pub fn register_boxed(&mut self, provider: Box<dyn Provider>) -> ProviderState {
        let mut entry = RegisteredProvider::new(provider);
        entry.initialize();

        let name = entry.name().to_string();
        let existing = self.providers.iter().position(|p| p.name() == name);

        if entry.is_ready()
            && let Some(conflict) = self.conflicting_operation(&entry, existing)
        {
            entry.fail(format!("duplicate operation name: {conflict}"));
        }

        match entry.state {
            ProviderState::Ready => info!(
                "[registry] provider '{name}' ready ({} operations)",
                entry.operations.len()
            ),
            _ => warn!(
                "[registry] provider '{name}' failed: {}",
                entry.last_error().unwrap_or("unknown error")
            ),
        }

        let state = entry.state;
        match existing {
            Some(idx) => {
                warn!("[registry] replacing provider '{name}'");
                self.providers[idx] = entry;
            }
            None => self.providers.push(entry),
        }
        state
    }

    /// Register a provider (builder pattern).
    pub fn with(mut self, provider: impl Provider + 'static) -> Self {
        self.register(provider);
        self
    }

    /// Conditionally register a provider (builder pattern).
    pub fn with_if(self, condition: bool, provider: impl Provider + 'static) -> Self {
        if condition { self.with(provider) } else { self }
    }

    /// First operation of `entry` whose name is already taken, either by
    /// another ready provider or earlier within `entry` itself.
    fn conflicting_operation(
        &self,
        entry: &RegisteredProvider,
        replacing: Option<usize>,
    ) -> Option<String> {
        let mut seen: Vec<&str> = Vec::new();
        for op in &entry.operations {
            let taken_elsewhere = self
                .providers
                .iter()
                .enumerate()
                .filter(|(idx, p)| Some(*idx) != replacing && p.is_ready())
                .any(|(_, p)| p.operations.iter().any(|o| o.name == op.name));
            if taken_elsewhere || seen.contains(&op.name.as_str()) {
                return Some(op.name.clone());
            }
            seen.push(&op.name);
        }
        None
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredProvider> {
        self.providers.iter().find(|p| p.name() == name)
    }

    /// All providers in registration order, including failed ones.
    pub fn all(&self) -> &[RegisteredProvider] {
        &self.providers
    }

    /// Providers in state [`ProviderState::Ready`], in registration order.
    pub fn ready(&self) -> impl Iterator<Item = &RegisteredProvider> {
        self.providers.iter().filter(|p| p.is_ready())
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Find the provider declaring `operation`, preferring ready providers
    /// and falling back to failed ones.
    pub fn find_operation<'s>(
        &'s self,
        operation: &str,
    ) -> Option<(&'s RegisteredProvider, &'s OperationDescriptor)> {
        let declared = |p: &'s RegisteredProvider| p.operation(operation).map(|o| (p, o));
        self.ready()
            .find_map(declared)
            .or_else(|| self.providers.iter().find_map(declared))
    }

    /// Health of every registered provider, keyed by capability name.
    ///
    /// Ready providers are checked concurrently.
    pub async fn aggregate_health(&self) -> BTreeMap<String, HealthReport> {
        let reports = futures::future::join_all(self.providers.iter().map(|p| p.health())).await;
        debug!("[registry] health checked for {} providers", reports.len());
        self.providers
            .iter()
            .map(|p| p.name().to_string())
            .zip(reports)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Arguments, HealthStatus, OperationResult, ProviderFuture};
    use serde_json::json;

    struct StubProvider {
        name: &'static str,
        ops: Vec<&'static str>,
        init_error: Option<&'static str>,
        panic_on_init: bool,
    }

    impl StubProvider {
        fn new(name: &'static str, ops: &[&'static str]) -> Self {
            Self {
                name,
                ops: ops.to_vec(),
                init_error: None,
                panic_on_init: false,
            }
        }
    }

    impl Provider for StubProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "stub"
        }

        fn initialize(&mut self) -> Result<(), String> {
            if self.panic_on_init {
                panic!("credentials file missing");
            }
            match self.init_error {
                Some(e) => Err(e.to_string()),
                None => Ok(()),
            }
        }

        fn operations(&self) -> Vec<OperationDescriptor> {
            self.ops
                .iter()
                .map(|op| OperationDescriptor::new(*op, "stub op"))
                .collect()
        }

        fn health_check(&self) -> ProviderFuture<'_, HealthReport> {
            Box::pin(async { HealthReport::healthy("ok") })
        }

        fn invoke(&self, _operation: &str, _arguments: &Arguments) -> ProviderFuture<'_, OperationResult> {
            Box::pin(async { Ok(json!({})) })
        }
    }

    #[test]
    fn ready_provider_exposes_operations() {
        let mut registry = ProviderRegistry::new();
        let state = registry.register(StubProvider::new("analytics", &["get_report"]));
        assert_eq!(state, ProviderState::Ready);
        assert_eq!(registry.ready().count(), 1);

        let (provider, op) = registry.find_operation("get_report").unwrap();
        assert_eq!(provider.name(), "analytics");
        assert_eq!(op.name, "get_report");
        assert!(registry.find_operation("get_weather").is_none());
    }

    #[test]
    fn failed_initialization_is_recorded_not_raised() {
        let registry = ProviderRegistry::new()
            .with(StubProvider {
                init_error: Some("missing property id"),
                ..StubProvider::new("analytics", &["get_report"])
            })
            .with(StubProvider::new("tags", &["list_tags"]));

        let failed = registry.get("analytics").unwrap();
        assert_eq!(failed.state(), ProviderState::Failed);
        assert_eq!(failed.last_error(), Some("missing property id"));
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.ready().map(|p| p.name()).collect::<Vec<_>>(),
            vec!["tags"]
        );
        // Still routable so the dispatcher can report it as unavailable.
        assert!(registry.find_operation("get_report").is_some());
    }

    #[test]
    fn panicking_initialization_is_contained() {
        let mut registry = ProviderRegistry::new();
        let state = registry.register(StubProvider {
            panic_on_init: true,
            ..StubProvider::new("analytics", &["get_report"])
        });
        assert_eq!(state, ProviderState::Failed);
        assert_eq!(
            registry.get("analytics").unwrap().last_error(),
            Some("initialization panicked")
        );
    }

    #[test]
    fn duplicate_operation_marks_newcomer_failed() {
        let registry = ProviderRegistry::new()
            .with(StubProvider::new("first", &["get_report"]))
            .with(StubProvider::new("second", &["get_report", "get_pages"]));

        assert!(registry.get("first").unwrap().is_ready());
        let second = registry.get("second").unwrap();
        assert_eq!(second.state(), ProviderState::Failed);
        assert_eq!(
            second.last_error(),
            Some("duplicate operation name: get_report")
        );
    }

    #[test]
    fn ready_provider_wins_over_failed_declarer() {
        let registry = ProviderRegistry::new()
            .with(StubProvider {
                init_error: Some("token expired"),
                ..StubProvider::new("legacy", &["get_report"])
            })
            .with(StubProvider::new("analytics", &["get_report"]));

        assert!(registry.get("analytics").unwrap().is_ready());
        let (provider, _) = registry.find_operation("get_report").unwrap();
        assert_eq!(provider.name(), "analytics");
    }

    #[test]
    fn same_name_replaces_in_place() {
        let registry = ProviderRegistry::new()
            .with(StubProvider::new("analytics", &["get_report"]))
            .with(StubProvider::new("tags", &["list_tags"]))
            .with(StubProvider::new("analytics", &["get_report", "get_pages"]));

        let names: Vec<_> = registry.all().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["analytics", "tags"]);
        assert!(registry.get("analytics").unwrap().is_ready());
        assert_eq!(registry.get("analytics").unwrap().operations().len(), 2);
    }

    #[test]
    fn with_if_skips_when_false() {
        let registry = ProviderRegistry::new()
            .with_if(false, StubProvider::new("analytics", &["get_report"]));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn aggregate_health_covers_failed_providers() {
        let registry = ProviderRegistry::new()
            .with(StubProvider::new("tags", &["list_tags"]))
            .with(StubProvider {
                init_error: Some("token expired"),
                ..StubProvider::new("analytics", &["get_report"])
            });

        let health = registry.aggregate_health().await;
        assert_eq!(health.len(), 2);
        assert_eq!(health["tags"].status, HealthStatus::Healthy);
        assert_eq!(health["analytics"].status, HealthStatus::Error);
        assert_eq!(health["analytics"].message, "token expired");
    }

    #[tokio::test]
    async fn empty_registry_has_empty_health() {
        assert!(ProviderRegistry::new().aggregate_health().await.is_empty());
    }
}
