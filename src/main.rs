use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cartprobe_core_types::Intent;
use cdp_driver::CdpDriver;
use evidence_store::{FsEvidenceRecorder, HttpReporter, NoopReporter, RunReporter};
use funnel_engine::{CheckoutEngine, EngineConfig, RunRequest};
use oracle_client::{DisabledOracle, GeminiOracle, SuggestionOracle};

/// Drive a storefront through its purchase funnel and report which
/// payment gateway it uses.
#[derive(Debug, Parser)]
#[command(name = "cartprobe", version, about)]
struct Cli {
    /// Target storefront URL.
    url: String,

    /// Action plan step, repeatable and ordered.
    #[arg(long = "action", default_values_t = ["add to cart".to_string(), "checkout".to_string()])]
    actions: Vec<String>,

    /// Run the browser without a visible window.
    #[arg(long)]
    headless: bool,

    /// Endpoint that receives the terminal result as JSON.
    #[arg(long, env = "CARTPROBE_REPORT_URL")]
    report_url: Option<String>,

    /// Directory for per-run evidence.
    #[arg(long, env = "CARTPROBE_EVIDENCE_DIR", default_value = "./evidence")]
    evidence_dir: String,

    /// Additional attempts after the first.
    #[arg(long, default_value_t = 2)]
    max_retries: u32,

    /// Wall-clock ceiling for the whole run, in milliseconds.
    #[arg(long = "budget-ms", default_value_t = 300_000)]
    budget_ms: u64,

    /// Proxy endpoint, repeatable. Also read from CARTPROBE_PROXIES
    /// (comma-separated).
    #[arg(long = "proxy")]
    proxies: Vec<String>,

    /// Treat a bot challenge as fatal instead of rotating identity.
    #[arg(long)]
    captcha_fatal: bool,

    /// Opaque JSON context echoed back in the result.
    #[arg(long = "context")]
    context: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Malformed input downgrades to a warning: the run itself still
    // happens and its outcome lands in the result like any other.
    if let Err(err) = url::Url::parse(&cli.url) {
        warn!(url = %cli.url, %err, "target does not parse as a URL, navigating anyway");
    }

    let run_context = match &cli.context {
        Some(raw) => serde_json::from_str(raw).unwrap_or_else(|err| {
            warn!(%err, "--context is not valid JSON, dropping it");
            serde_json::Value::Null
        }),
        None => serde_json::Value::Null,
    };

    let mut proxies = cli.proxies.clone();
    if let Ok(raw) = std::env::var("CARTPROBE_PROXIES") {
        proxies.extend(
            raw.split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::to_string),
        );
    }

    let config = EngineConfig {
        headless: cli.headless,
        max_retries: cli.max_retries,
        global_budget_ms: cli.budget_ms,
        evidence_dir: cli.evidence_dir.clone(),
        report_url: cli.report_url.clone(),
        proxies,
        captcha_rotates: !cli.captcha_fatal,
        ..EngineConfig::default()
    };

    let oracle: Arc<dyn SuggestionOracle> = match std::env::var("GEMINI_API_KEY") {
        Ok(key) if !key.is_empty() => {
            info!("suggestion oracle enabled");
            match std::env::var("GEMINI_MODEL") {
                Ok(model) => Arc::new(GeminiOracle::with_model(key, model)),
                Err(_) => Arc::new(GeminiOracle::new(key)),
            }
        }
        _ => {
            info!("no GEMINI_API_KEY, running on heuristics only");
            Arc::new(DisabledOracle)
        }
    };

    let reporter: Arc<dyn RunReporter> = match &config.report_url {
        Some(endpoint) => Arc::new(HttpReporter::new(endpoint.clone(), &config.evidence_dir)),
        None => Arc::new(NoopReporter),
    };

    let engine = CheckoutEngine::new(
        Arc::new(CdpDriver::new()),
        oracle,
        Arc::new(FsEvidenceRecorder::new(&config.evidence_dir)),
        reporter,
        config,
    );

    let request = RunRequest::new(&cli.url)
        .with_plan(cli.actions.iter().map(|action| Intent::new(action)).collect())
        .with_context(run_context);

    let result = engine.run(request).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
