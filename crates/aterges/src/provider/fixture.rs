//! JSON-backed provider serving canned report rows.
//!
//! A fixture file describes one provider and the rows each of its operations
//! returns:
//!
//! ```json
//! {
//!   "name": "google_analytics",
//!   "description": "Website traffic and engagement",
//!   "operations": [
//!     {
//!       "name": "get_report",
//!       "description": "Daily metrics for a date range",
//!       "date_range": true,
//!       "parameters": [
//!         {"name": "metrics", "type": "string_array", "default": ["activeUsers"]}
//!       ],
//!       "rows": [
//!         {"date": "2025-06-27", "activeUsers": 1234, "sessions": 1870}
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Invocation keeps rows whose `date` falls in the requested range (rows
//! without a date always match), groups them by the requested `dimensions`,
//! narrows numeric columns to the requested `metrics`, applies `limit`, and
//! sums every numeric column into `totals`. A dimension missing from a row
//! fails the call.
//! An operation with an `"error"` string fails with that message instead.

use super::{
    Arguments, HealthReport, OperationDescriptor, OperationResult, ParamSpec, Provider,
    ProviderFuture,
};
use crate::dates::{self, DateRange};
use crate::provider::operation::{END_DATE, START_DATE};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Parsed contents of a fixture file.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Reported by `health_check`; defaults to healthy.
    #[serde(default)]
    pub health: Option<HealthReport>,
    #[serde(default)]
    pub operations: Vec<FixtureOperation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureOperation {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Adds required `start_date` / `end_date` parameters.
    #[serde(default)]
    pub date_range: bool,
    #[serde(default)]
    pub parameters: Vec<ParamSpec>,
    #[serde(default)]
    pub rows: Vec<Map<String, Value>>,
    /// When set, every invocation fails with this message.
    #[serde(default)]
    pub error: Option<String>,
}

impl FixtureOperation {
    fn descriptor(&self) -> OperationDescriptor {
        let base = OperationDescriptor::new(self.name.clone(), self.description.clone());
        let base = if self.date_range {
            base.with_date_range()
        } else {
            base
        };
        self.parameters
            .iter()
            .cloned()
            .fold(base, OperationDescriptor::param)
    }
}

/// A [`Provider`] answering from a [`FixtureSpec`].
#[derive(Debug)]
pub struct FixtureProvider {
    name: String,
    description: String,
    path: Option<PathBuf>,
    spec: Option<FixtureSpec>,
}

impl FixtureProvider {
    /// Load from `path` during initialization.
    ///
    /// Read and parse errors surface as a failed provider at registration.
    /// Until then the provider is named after the file stem.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("fixture")
            .to_string();
        Self {
            name,
            description: String::new(),
            path: Some(path),
            spec: None,
        }
    }

    pub fn from_spec(spec: FixtureSpec) -> Self {
        Self {
            name: spec.name.clone(),
            description: spec.description.clone(),
            path: None,
            spec: Some(spec),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, String> {
        let spec: FixtureSpec =
            serde_json::from_str(json).map_err(|e| format!("invalid fixture: {e}"))?;
        Ok(Self::from_spec(spec))
    }

    fn run(&self, operation: &str, arguments: &Arguments) -> OperationResult {
        let spec = self
            .spec
            .as_ref()
            .ok_or_else(|| "fixture data not loaded".to_string())?;
        let op = spec
            .operations
            .iter()
            .find(|o| o.name == operation)
            .ok_or_else(|| format!("operation not supported: {operation}"))?;
        if let Some(ref error) = op.error {
            return Err(error.clone());
        }

        let range = requested_range(arguments);
        let metrics: Option<Vec<&str>> = arguments
            .get("metrics")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).collect());
        let limit = arguments
            .get("limit")
            .and_then(Value::as_u64)
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));

        let dimensions: Vec<&str> = arguments
            .get("dimensions")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let matching: Vec<Map<String, Value>> = op
            .rows
            .iter()
            .filter(|row| range.is_none_or(|r| row_in_range(row, r)))
            .cloned()
            .collect();
        let grouped = if dimensions.is_empty() {
            matching
        } else {
            group_by(matching, &dimensions)?
        };
        let rows: Vec<Map<String, Value>> = grouped
            .iter()
            .map(|row| project(row, metrics.as_deref()))
            .take(limit)
            .collect();

        debug!(
            "[fixture] {}.{operation}: {} of {} rows",
            self.name,
            rows.len(),
            op.rows.len()
        );

        let mut out = json!({
            "row_count": rows.len(),
            "totals": totals(&rows),
            "rows": rows,
        });
        if let Some(r) = range {
            out["date_range"] = json!({ START_DATE: r.start_str(), END_DATE: r.end_str() });
        }
        Ok(out)
    }
}

impl Provider for FixtureProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn initialize(&mut self) -> Result<(), String> {
        let Some(ref path) = self.path else {
            return Ok(());
        };
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        let spec: FixtureSpec = serde_json::from_str(&text)
            .map_err(|e| format!("invalid fixture {}: {e}", path.display()))?;
        self.name = spec.name.clone();
        self.description = spec.description.clone();
        self.spec = Some(spec);
        Ok(())
    }

    fn operations(&self) -> Vec<OperationDescriptor> {
        self.spec
            .as_ref()
            .map(|s| s.operations.iter().map(FixtureOperation::descriptor).collect())
            .unwrap_or_default()
    }

    fn health_check(&self) -> ProviderFuture<'_, HealthReport> {
        let report = match self.spec {
            Some(ref spec) => spec.health.clone().unwrap_or_else(|| {
                HealthReport::healthy(format!("{} operations loaded", spec.operations.len()))
            }),
            None => HealthReport::error("fixture data not loaded"),
        };
        Box::pin(async move { report })
    }

    fn invoke(&self, operation: &str, arguments: &Arguments) -> ProviderFuture<'_, OperationResult> {
        let result = self.run(operation, arguments);
        Box::pin(async move { result })
    }
}

fn requested_range(arguments: &Arguments) -> Option<DateRange> {
    let start = arguments
        .get(START_DATE)
        .and_then(Value::as_str)
        .and_then(dates::parse_date)?;
    let end = arguments
        .get(END_DATE)
        .and_then(Value::as_str)
        .and_then(dates::parse_date)?;
    Some(DateRange::new(start, end))
}

fn row_in_range(row: &Map<String, Value>, range: DateRange) -> bool {
    match row.get("date").and_then(Value::as_str) {
        Some(date) => dates::parse_date(date).is_some_and(|d| range.contains(d)),
        None => true,
    }
}

/// Keep non-numeric columns and the requested numeric ones.
fn project(row: &Map<String, Value>, metrics: Option<&[&str]>) -> Map<String, Value> {
    let Some(metrics) = metrics.filter(|m| !m.is_empty()) else {
        return row.clone();
    };
    row.iter()
        .filter(|(k, v)| !v.is_number() || metrics.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Collapse rows sharing the same `dimensions` values, summing their numeric
/// columns. Other text columns are dropped. Groups keep first-seen order.
fn group_by(
    rows: Vec<Map<String, Value>>,
    dimensions: &[&str],
) -> Result<Vec<Map<String, Value>>, String> {
    let mut groups: Vec<(Vec<Value>, Vec<Map<String, Value>>)> = Vec::new();
    for row in rows {
        let key = dimensions
            .iter()
            .map(|d| {
                row.get(*d)
                    .cloned()
                    .ok_or_else(|| format!("unsupported dimension: {d}"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(row),
            None => groups.push((key, vec![row])),
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, members)| {
            let mut out: Map<String, Value> =
                dimensions.iter().map(|d| d.to_string()).zip(key).collect();
            for (column, sum) in totals(&members) {
                if !out.contains_key(&column) {
                    out.insert(column, sum);
                }
            }
            out
        })
        .collect())
}

/// Sum numeric columns. Integer columns stay integers.
fn totals(rows: &[Map<String, Value>]) -> Map<String, Value> {
    let mut sums: BTreeMap<&str, (f64, bool)> = BTreeMap::new();
    for row in rows {
        for (key, value) in row {
            let Some(n) = value.as_f64() else { continue };
            let entry = sums.entry(key.as_str()).or_insert((0.0, true));
            entry.0 += n;
            entry.1 &= value.is_i64() || value.is_u64();
        }
    }
    sums.into_iter()
        .map(|(k, (sum, integral))| {
            let v = if integral {
                json!(sum.round() as i64)
            } else {
                json!(sum)
            };
            (k.to_string(), v)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::HealthStatus;
    use crate::provider::registry::{ProviderRegistry, ProviderState};
    use std::io::Write;

    const ANALYTICS: &str = r#"{
        "name": "google_analytics",
        "description": "Website traffic",
        "operations": [
            {
                "name": "get_report",
                "description": "Daily metrics",
                "date_range": true,
                "parameters": [
                    {"name": "metrics", "type": "string_array", "default": ["activeUsers"]}
                ],
                "rows": [
                    {"date": "2025-06-26", "activeUsers": 1100, "sessions": 1700, "bounceRate": 0.5},
                    {"date": "2025-06-27", "activeUsers": 1234, "sessions": 1870, "bounceRate": 0.25}
                ]
            },
            {
                "name": "get_top_pages",
                "description": "Most viewed pages",
                "parameters": [
                    {"name": "limit", "type": "integer", "default": 10}
                ],
                "rows": [
                    {"pagePath": "/", "views": 900},
                    {"pagePath": "/pricing", "views": 300},
                    {"pagePath": "/blog", "views": 120}
                ]
            },
            {
                "name": "get_traffic_sources",
                "description": "Sessions by source",
                "error": "quota exhausted"
            }
        ]
    }"#;

    fn args(value: Value) -> Arguments {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn filters_rows_to_requested_range() {
        let provider = FixtureProvider::from_json(ANALYTICS).unwrap();
        let out = provider
            .invoke(
                "get_report",
                &args(json!({"start_date": "2025-06-27", "end_date": "2025-06-27"})),
            )
            .await
            .unwrap();
        assert_eq!(out["row_count"], 1);
        assert_eq!(out["totals"]["activeUsers"], 1234);
        assert_eq!(out["date_range"]["start_date"], "2025-06-27");
    }

    #[tokio::test]
    async fn metrics_narrow_numeric_columns() {
        let provider = FixtureProvider::from_json(ANALYTICS).unwrap();
        let out = provider
            .invoke(
                "get_report",
                &args(json!({
                    "start_date": "2025-06-01",
                    "end_date": "2025-06-30",
                    "metrics": ["sessions"]
                })),
            )
            .await
            .unwrap();
        assert_eq!(out["totals"]["sessions"], 3570);
        assert!(out["totals"].get("activeUsers").is_none());
        assert_eq!(out["rows"][0]["date"], "2025-06-26");
    }

    #[tokio::test]
    async fn float_columns_sum_as_floats() {
        let provider = FixtureProvider::from_json(ANALYTICS).unwrap();
        let out = provider
            .invoke(
                "get_report",
                &args(json!({"start_date": "2025-06-26", "end_date": "2025-06-27"})),
            )
            .await
            .unwrap();
        assert_eq!(out["totals"]["bounceRate"], 0.75);
    }

    const BY_DEVICE: &str = r#"{
        "name": "devices",
        "operations": [{
            "name": "get_report",
            "date_range": true,
            "rows": [
                {"date": "2025-06-26", "deviceCategory": "mobile", "activeUsers": 700},
                {"date": "2025-06-26", "deviceCategory": "desktop", "activeUsers": 400},
                {"date": "2025-06-27", "deviceCategory": "mobile", "activeUsers": 800},
                {"date": "2025-06-27", "deviceCategory": "desktop", "activeUsers": 434}
            ]
        }]
    }"#;

    #[tokio::test]
    async fn dimensions_group_rows() {
        let provider = FixtureProvider::from_json(BY_DEVICE).unwrap();
        let out = provider
            .invoke(
                "get_report",
                &args(json!({
                    "start_date": "2025-06-26",
                    "end_date": "2025-06-27",
                    "dimensions": ["deviceCategory"]
                })),
            )
            .await
            .unwrap();
        assert_eq!(out["row_count"], 2);
        assert_eq!(
            out["rows"][0],
            json!({"deviceCategory": "mobile", "activeUsers": 1500})
        );
        assert_eq!(
            out["rows"][1],
            json!({"deviceCategory": "desktop", "activeUsers": 834})
        );
        assert_eq!(out["totals"]["activeUsers"], 2334);
    }

    #[tokio::test]
    async fn date_dimension_keeps_daily_rows() {
        let provider = FixtureProvider::from_json(BY_DEVICE).unwrap();
        let out = provider
            .invoke(
                "get_report",
                &args(json!({
                    "start_date": "2025-06-26",
                    "end_date": "2025-06-27",
                    "dimensions": ["date"]
                })),
            )
            .await
            .unwrap();
        assert_eq!(out["row_count"], 2);
        assert_eq!(out["rows"][1], json!({"date": "2025-06-27", "activeUsers": 1234}));
    }

    #[tokio::test]
    async fn unknown_dimension_fails() {
        let provider = FixtureProvider::from_json(BY_DEVICE).unwrap();
        let err = provider
            .invoke(
                "get_report",
                &args(json!({
                    "start_date": "2025-06-26",
                    "end_date": "2025-06-27",
                    "dimensions": ["country"]
                })),
            )
            .await
            .unwrap_err();
        assert_eq!(err, "unsupported dimension: country");
    }

    #[tokio::test]
    async fn limit_caps_rows() {
        let provider = FixtureProvider::from_json(ANALYTICS).unwrap();
        let out = provider
            .invoke("get_top_pages", &args(json!({"limit": 2})))
            .await
            .unwrap();
        assert_eq!(out["row_count"], 2);
        assert_eq!(out["totals"]["views"], 1200);
        assert!(out.get("date_range").is_none());
    }

    #[tokio::test]
    async fn configured_error_and_unknown_operation_fail() {
        let provider = FixtureProvider::from_json(ANALYTICS).unwrap();
        let err = provider
            .invoke("get_traffic_sources", &Arguments::new())
            .await
            .unwrap_err();
        assert_eq!(err, "quota exhausted");

        let err = provider
            .invoke("get_weather", &Arguments::new())
            .await
            .unwrap_err();
        assert!(err.contains("get_weather"));
    }

    #[test]
    fn descriptors_include_date_range_and_defaults() {
        let provider = FixtureProvider::from_json(ANALYTICS).unwrap();
        let ops = provider.operations();
        assert_eq!(ops.len(), 3);
        assert!(ops[0].has_date_range());
        assert!(!ops[1].has_date_range());
        assert_eq!(
            ops[1].parameter("limit").unwrap().default,
            Some(json!(10))
        );
    }

    #[tokio::test]
    async fn loads_from_file_on_registration() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(ANALYTICS.as_bytes()).unwrap();

        let mut registry = ProviderRegistry::new();
        let state = registry.register(FixtureProvider::from_path(file.path()));
        assert_eq!(state, ProviderState::Ready);

        let entry = registry.get("google_analytics").unwrap();
        assert_eq!(entry.operations().len(), 3);
        assert_eq!(entry.health().await.status, HealthStatus::Healthy);
    }

    #[test]
    fn unreadable_file_fails_registration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analytics.json");

        let mut registry = ProviderRegistry::new();
        assert_eq!(
            registry.register(FixtureProvider::from_path(&path)),
            ProviderState::Failed
        );
        let entry = registry.get("analytics").unwrap();
        assert!(entry.last_error().unwrap().contains("failed to read"));
        assert!(entry.operations().is_empty());
    }

    #[test]
    fn malformed_file_fails_registration() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();

        let mut registry = ProviderRegistry::new();
        assert_eq!(
            registry.register(FixtureProvider::from_path(file.path())),
            ProviderState::Failed
        );
        assert!(
            registry.all()[0]
                .last_error()
                .unwrap()
                .contains("invalid fixture")
        );
    }
}
