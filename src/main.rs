use anyhow::{bail, Result};
use async_openai::{config::OpenAIConfig, Client as OpenAIClient};
use clap::{Parser, Subcommand};
use ollama_rs::Ollama;
use std::env;
use std::sync::Arc;
use tracing::info;

use meridian::classify::LlmClassifier;
use meridian::db::Database;
use meridian::environment::{get_env_var_or, get_env_var_parsed};
use meridian::logging::configure_logging;
use meridian::monitor::{MonitorConfig, PressMonitor};
use meridian::orchestrator::SearchMode;
use meridian::search::GroundedSearch;
use meridian::LLMClient;

#[derive(Parser, Debug)]
#[command(name = "meridian", about = "Multi-language press sentiment monitor")]
struct Cli {
    /// Monitored subject; falls back to MONITOR_SUBJECT.
    #[arg(long)]
    subject: Option<String>,

    /// Disable the translation sub-step before classification.
    #[arg(long)]
    no_translate: bool,

    /// Cap on articles kept per language.
    #[arg(long)]
    max_per_language: Option<usize>,

    /// Explicit search date filter, e.g. "after:2026-02-09 before:2026-02-10".
    #[arg(long)]
    date_filter: Option<String>,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Monitor an explicit list of language codes.
    Languages {
        #[arg(required = true)]
        codes: Vec<String>,
    },
    /// Monitor every language attributed to the given regions.
    Regions {
        #[arg(required = true)]
        regions: Vec<String>,
    },
    /// Monitor languages whose coverage has gone stale.
    Stale {
        #[arg(long, default_value_t = 24)]
        hours_threshold: i64,
        #[arg(long, default_value_t = 20)]
        max_units: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    configure_logging();
    info!(
        "meridian {} (built {})",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIMESTAMP")
    );

    let cli = Cli::parse();

    let database_path = get_env_var_or("DATABASE_PATH", "meridian.db");
    let db = Database::new(&database_path).await?;

    let search_endpoint = match env::var("SEARCH_API_URL") {
        Ok(url) if !url.trim().is_empty() => url,
        _ => bail!("SEARCH_API_URL environment variable required"),
    };
    let search_api_key = get_env_var_or("SEARCH_API_KEY", "");
    let search = GroundedSearch::new(search_endpoint, search_api_key);

    let llm_client = match env::var("OPENAI_API_KEY") {
        Ok(api_key) if !api_key.trim().is_empty() => {
            info!("Using OpenAI API for classification");
            let config = OpenAIConfig::new().with_api_key(api_key);
            LLMClient::OpenAI(OpenAIClient::with_config(config))
        }
        _ => {
            let host = get_env_var_or("OLLAMA_HOST", "localhost");
            let port: u16 = get_env_var_parsed("OLLAMA_PORT", 11434);
            info!("Connecting to Ollama at {}:{}", host, port);
            LLMClient::Ollama(Ollama::new(host, port))
        }
    };
    let model = get_env_var_or("ANALYSIS_MODEL", "llama3.1");
    let temperature: f32 = get_env_var_parsed("LLM_TEMPERATURE", 0.3);
    let classifier = LlmClassifier::new(llm_client, &model, temperature);

    let config = MonitorConfig {
        subject: cli
            .subject
            .unwrap_or_else(|| get_env_var_or("MONITOR_SUBJECT", "Azerbaijan")),
        translation_enabled: !cli.no_translate,
        max_articles_per_language: cli
            .max_per_language
            .unwrap_or_else(|| get_env_var_parsed("MAX_ARTICLES_PER_LANGUAGE", 20)),
        max_concurrent_searches: get_env_var_parsed("MAX_CONCURRENT_SEARCHES", 8),
        date_filter: cli.date_filter,
        ..Default::default()
    };

    let mode = match cli.mode {
        Mode::Languages { codes } => SearchMode::Languages(codes),
        Mode::Regions { regions } => SearchMode::Regions(regions),
        Mode::Stale {
            hours_threshold,
            max_units,
        } => SearchMode::StaleCoverage {
            hours_threshold,
            max_units,
        },
    };

    let monitor = PressMonitor::new(
        Arc::new(search),
        Arc::new(classifier),
        Arc::new(db),
        config,
    )?;
    let outcome = monitor.execute(mode).await?;

    println!("{}", outcome.digest.content);
    Ok(())
}
