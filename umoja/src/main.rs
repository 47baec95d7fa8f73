/*
umoja - run-once ingestion binary.
Fetches the configured feeds, scores and publishes trending stories, then exits.
*/

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use common::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};
use tracing_subscriber::{fmt, EnvFilter};

use umoja::ingestion::{FeedFetcher, FetchLimits};
use umoja::llm::{self, LlmProvider};
use umoja::pipeline::Pipeline;
use umoja::publisher::{LogPublisher, Publisher, RestPublisher};
use umoja::summarizer::{LlmSummarizer, Summarizer, TextRankSummarizer};
use umoja::translator::{LlmTranslator, PassthroughTranslator, Translator};

#[derive(Parser, Debug)]
#[command(name = "umoja", about = "Umoja trend ingestion (single run)")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log records instead of sending them to the store
    #[arg(long)]
    dry_run: bool,

    /// Exit with an error when nothing was ingested and a source failed
    #[arg(long)]
    fail_on_empty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI args
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    // A missing .env is normal in CI where secrets come from the environment
    if let Ok(path) = dotenv::dotenv() {
        info!(path = ?path, "loaded .env");
    }

    // Resolve config paths
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = args.config {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    let mut config = Config::load_with_defaults(
        if default_path.exists() { Some(default_path.as_path()) } else { None },
        override_path.as_deref(),
    )
    .await
    .inspect_err(|e| error!(error = %e, "failed to load configuration"))?;
    config.apply_process_env().context("invalid environment configuration")?;
    config.validate().context("invalid configuration")?;
    info!(
        default = ?default_path,
        override_file = ?override_path,
        sources = config.sources.len(),
        languages = ?config.languages.targets,
        "configuration loaded"
    );

    let fail_on_empty = args.fail_on_empty || config.run.fail_on_empty;
    let pipeline = build_pipeline(config, args.dry_run)?;

    let run_id = uuid::Uuid::new_v4();
    let report = pipeline
        .run(Utc::now())
        .instrument(info_span!("run", %run_id))
        .await;

    info!(
        %run_id,
        fetched = report.sources_fetched,
        failed_sources = report.sources_failed,
        articles = report.articles,
        skipped = report.clusters_skipped,
        trends = report.trends_published,
        alerts = report.alerts_published,
        failures = report.failures.len(),
        "ingestion finished"
    );

    if fail_on_empty && report.ingestion_failed() {
        anyhow::bail!(
            "no articles ingested and {} source(s) failed",
            report.sources_failed
        );
    }
    Ok(())
}

/// Wire the configured collaborators into a pipeline
fn build_pipeline(config: Config, dry_run: bool) -> Result<Pipeline> {
    let fetcher = FeedFetcher::new(
        FetchLimits::try_from(&config.ingestion)?,
        config.ingestion.fetch_timeout_seconds,
    )?;

    let summarizer: Box<dyn Summarizer> = match config.summarizer.adapter.as_str() {
        "textrank" => Box::new(TextRankSummarizer),
        "remote" => Box::new(LlmSummarizer::new(create_llm_provider(
            config.summarizer.remote.as_ref(),
            "summarizer",
        )?)),
        other => anyhow::bail!("Unknown summarizer adapter: {}", other),
    };

    let translator: Box<dyn Translator> = match config.translator.adapter.as_str() {
        "none" => Box::new(PassthroughTranslator),
        "remote" => Box::new(LlmTranslator::new(create_llm_provider(
            config.translator.remote.as_ref(),
            "translator",
        )?)),
        other => anyhow::bail!("Unknown translator adapter: {}", other),
    };

    let publisher: Box<dyn Publisher> = if dry_run {
        info!("dry run: records will be logged, not published");
        Box::new(LogPublisher)
    } else {
        Box::new(RestPublisher::from_config(&config.store)?)
    };

    Ok(Pipeline::new(config, Box::new(fetcher), summarizer, translator, publisher))
}

/// Create an LLM provider for one adapter section
fn create_llm_provider(
    remote: Option<&common::RemoteLlmConfig>,
    section: &str,
) -> Result<Arc<dyn LlmProvider>> {
    let remote = remote.with_context(|| format!("Remote adapter selected but [{}.remote] is missing", section))?;
    let provider = llm::provider_from_config(remote)?;
    info!(section, model = provider.model(), "LLM provider initialized");
    Ok(Arc::new(provider))
}
