//! The bundled demo data set loads and answers through the dispatcher.

use aterges::dates::parse_date;
use aterges::dispatch::{CallRequest, FunctionDispatcher};
use aterges::provider::{FixtureProvider, ProviderRegistry, ProviderState};
use aterges::tools::build_tool_declarations;
use serde_json::json;

fn demo_registry() -> ProviderRegistry {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/google_analytics.json");
    ProviderRegistry::new().with(FixtureProvider::from_path(path))
}

#[test]
fn demo_fixture_registers_ready() {
    let registry = demo_registry();
    let provider = registry.get("google_analytics").unwrap();
    assert_eq!(provider.state(), ProviderState::Ready);

    let tools = build_tool_declarations(&registry);
    let names: Vec<_> = tools.iter().map(|t| t.name()).collect();
    assert_eq!(
        names,
        vec!["get_ga4_report", "get_top_pages", "get_traffic_sources"]
    );
    let params = &tools[0].function.parameters;
    assert_eq!(params["required"], json!(["start_date", "end_date"]));
}

#[tokio::test]
async fn yesterday_report_uses_default_metrics() {
    let registry = demo_registry();
    let dispatcher = FunctionDispatcher::new(&registry, parse_date("2025-06-28").unwrap());

    let request = CallRequest::from_value(
        "get_ga4_report",
        json!({"start_date": "yesterday", "end_date": "yesterday"}),
    );
    let result = dispatcher.dispatch(Some(&request)).await;

    assert!(result.success, "{:?}", result.error_message);
    let data = result.data.unwrap();
    assert_eq!(data["row_count"], 1);
    assert_eq!(data["totals"]["activeUsers"], 962);
    assert_eq!(data["totals"]["sessions"], 1443);
    assert!(data["totals"].get("newUsers").is_none());
    assert_eq!(data["rows"][0]["date"], "2025-06-27");
}

#[tokio::test]
async fn top_pages_honors_limit() {
    let registry = demo_registry();
    let dispatcher = FunctionDispatcher::new(&registry, parse_date("2025-06-28").unwrap());

    let request = CallRequest::from_value(
        "get_top_pages",
        json!({"start_date": "2025-06-01", "end_date": "2025-06-28", "limit": 2}),
    );
    let result = dispatcher.dispatch(Some(&request)).await;

    assert!(result.success);
    let data = result.data.unwrap();
    assert_eq!(data["row_count"], 2);
    assert_eq!(data["rows"][0]["pagePath"], "/");
}

#[tokio::test]
async fn unsupported_dimension_is_reported_to_the_model() {
    let registry = demo_registry();
    let dispatcher = FunctionDispatcher::new(&registry, parse_date("2025-06-28").unwrap());

    let request = CallRequest::from_value(
        "get_ga4_report",
        json!({"start_date": "yesterday", "end_date": "yesterday", "dimensions": ["country"]}),
    );
    let result = dispatcher.dispatch(Some(&request)).await;

    assert!(!result.success);
    assert_eq!(
        result.error_message.as_deref(),
        Some("unsupported dimension: country")
    );
}
