//! Answer an analytics question with a tool-calling model over fixture data.
//!
//! Reads the API key from the `OPENROUTER_KEY` environment variable. Each
//! `--fixtures` file registers one provider (see
//! `aterges::provider::fixture` for the format).
//!
//! # Examples
//!
//! ```sh
//! # Ask a question against the bundled demo data
//! aterges --fixtures crates/aterges/fixtures/google_analytics.json \
//!   --reference-date 2025-06-28 \
//!   --query "How many users did we have yesterday?"
//!
//! # Provider health and tool list, no model call
//! aterges --fixtures crates/aterges/fixtures/google_analytics.json --status
//!
//! # Pipe the question in and print the whole conversation as JSON
//! echo "Top pages last week?" | aterges --fixtures analytics.json --stdin --transcript
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use aterges::OpenRouterClient;
use aterges::agent::{
    CompositeEventHandler, LoggingHandler, Orchestrator, OrchestratorConfig, QueryContext,
};
use aterges::dates;
use aterges::model::openrouter::OpenRouterBackend;
use aterges::provider::{FixtureProvider, ProviderRegistry};
use clap::Parser;
use std::io::{self, Read};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Answer an analytics question with a tool-calling model.
///
/// Reads the API key from the OPENROUTER_KEY environment variable.
#[derive(Parser)]
#[command(name = "aterges")]
struct Cli {
    // ── Query ──────────────────────────────────────────────────
    /// Question to answer
    #[arg(long)]
    query: Option<String>,

    /// Read the question from stdin
    #[arg(long)]
    stdin: bool,

    /// End-user email used in the system framing
    #[arg(long)]
    user_email: Option<String>,

    // ── Providers ──────────────────────────────────────────────
    /// Fixture file registering one provider (repeatable)
    #[arg(long = "fixtures")]
    fixtures: Vec<String>,

    // ── Model ──────────────────────────────────────────────────
    /// Model to use (overrides ATERGES_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Maximum model round trips per query (overrides ATERGES_MAX_ITERATIONS)
    #[arg(long)]
    max_iterations: Option<u32>,

    /// Maximum tokens per response (overrides ATERGES_MAX_TOKENS)
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Sampling temperature (overrides ATERGES_TEMPERATURE)
    #[arg(long)]
    temperature: Option<f32>,

    /// OpenAI-compatible chat completions endpoint
    #[arg(long)]
    base_url: Option<String>,

    // ── Limits and dates ───────────────────────────────────────
    /// Per-call provider timeout in seconds
    #[arg(long)]
    provider_timeout: Option<u64>,

    /// Wall-clock budget for the whole query in seconds
    #[arg(long)]
    query_timeout: Option<u64>,

    /// Treat this date (YYYY-MM-DD) as today
    #[arg(long)]
    reference_date: Option<String>,

    /// Pass model-supplied dates through unchanged
    #[arg(long)]
    no_date_correction: bool,

    // ── Output mode ────────────────────────────────────────────
    /// Print provider health and the tool list instead of answering
    #[arg(long)]
    status: bool,

    /// Print the full conversation as JSON after the answer
    #[arg(long)]
    transcript: bool,
}

// ── Helpers ────────────────────────────────────────────────────────

fn read_stdin_content() -> Result<String, String> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .map_err(|e| format!("failed to read stdin: {e}"))?;
    Ok(buf)
}

fn build_query(cli: &Cli) -> Result<String, String> {
    let stdin_text = if cli.stdin {
        Some(read_stdin_content()?)
    } else {
        None
    };

    let query = match (&cli.query, stdin_text) {
        (Some(q), Some(piped)) => format!("{q}\n\n{piped}"),
        (Some(q), None) => q.clone(),
        (None, Some(piped)) => piped,
        (None, None) => return Err("provide --query, --stdin, or both".to_string()),
    };
    if query.trim().is_empty() {
        return Err("the question is empty".to_string());
    }
    Ok(query)
}

fn build_config(cli: &Cli) -> Result<OrchestratorConfig, String> {
    let mut config = OrchestratorConfig::from_env();
    if let Some(ref model) = cli.model {
        config.model = model.clone();
    }
    if let Some(n) = cli.max_iterations {
        config.max_iterations = n;
    }
    if let Some(n) = cli.max_tokens {
        config.max_tokens = n;
    }
    if let Some(t) = cli.temperature {
        config.temperature = t;
    }
    let reference_date = match cli.reference_date {
        Some(ref raw) => Some(
            dates::parse_date(raw)
                .ok_or_else(|| format!("invalid --reference-date '{raw}', expected YYYY-MM-DD"))?,
        ),
        None => None,
    };

    Ok(config
        .with_provider_timeout(cli.provider_timeout.map(Duration::from_secs))
        .with_query_timeout(cli.query_timeout.map(Duration::from_secs))
        .with_reference_date(reference_date)
        .with_date_correction(!cli.no_date_correction))
}

fn build_registry(cli: &Cli) -> ProviderRegistry {
    cli.fixtures
        .iter()
        .fold(ProviderRegistry::new(), |registry, path| {
            registry.with(FixtureProvider::from_path(path))
        })
}

async fn run(cli: &Cli) -> Result<String, String> {
    let config = build_config(cli)?;
    let registry = Arc::new(build_registry(cli));

    let api_key = match std::env::var("OPENROUTER_KEY") {
        Ok(key) => key,
        // Status output never contacts the model.
        Err(_) if cli.status => String::new(),
        Err(_) => return Err("OPENROUTER_KEY is not set".to_string()),
    };
    let mut client = OpenRouterClient::new(api_key)?;
    if let Some(ref url) = cli.base_url {
        client = client.with_url(url.clone());
    }
    let backend = Arc::new(OpenRouterBackend::new(client, &config));

    let handler = CompositeEventHandler::new().with(LoggingHandler);
    let orchestrator =
        Orchestrator::new(registry, backend, config).with_event_handler(Arc::new(handler));

    if cli.status {
        let status = orchestrator.get_status().await;
        return serde_json::to_string_pretty(&status)
            .map_err(|e| format!("failed to serialize status: {e}"));
    }

    let query = build_query(cli)?;
    let mut context = QueryContext::new();
    if let Some(ref email) = cli.user_email {
        context.insert("email".to_string(), email.clone());
    }

    let outcome = orchestrator.run(&query, &context).await;
    if !cli.transcript {
        return Ok(outcome.text);
    }
    let transcript = serde_json::to_string_pretty(&outcome.conversation)
        .map_err(|e| format!("failed to serialize transcript: {e}"))?;
    Ok(format!("{}\n\n{transcript}", outcome.text))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(&cli).await {
        Ok(output) => println!("{output}"),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
