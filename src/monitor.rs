use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::aggregator::Aggregator;
use crate::analytics::{TemporalAnalyzer, TemporalReport};
use crate::classify::ClassifyCapability;
use crate::db::Store;
use crate::digest::{self, DigestRecord};
use crate::error::ContractError;
use crate::orchestrator::{Orchestrator, RunState, SearchMode};
use crate::search::SearchCapability;
use crate::sentiment::SentimentPipeline;
use crate::TARGET_DB;

/// Run-level configuration shared by every pipeline stage.
#[derive(Clone, Debug)]
pub struct MonitorConfig {
    /// The monitored subject, e.g. a country name.
    pub subject: String,
    pub translation_enabled: bool,
    /// Language that needs no translation before classification.
    pub pivot_language: String,
    pub max_articles_per_language: usize,
    pub max_concurrent_searches: usize,
    /// Explicit date filter; defaults to the current UTC day when absent.
    pub date_filter: Option<String>,
}

impl Default for MonitorConfig {
    fn default() -> MonitorConfig {
        MonitorConfig {
            subject: "Azerbaijan".to_string(),
            translation_enabled: true,
            pivot_language: "en".to_string(),
            max_articles_per_language: 20,
            max_concurrent_searches: 8,
            date_filter: None,
        }
    }
}

/// Everything a completed monitoring pass produces.
#[derive(Clone, Debug)]
pub struct MonitorOutcome {
    pub run: RunState,
    pub report: TemporalReport,
    pub digest: DigestRecord,
}

/// Composes the full pipeline: orchestrated fan-out, aggregation, sentiment
/// classification, temporal analytics, digest assembly.
pub struct PressMonitor {
    orchestrator: Orchestrator,
    aggregator: Aggregator,
    sentiment: SentimentPipeline,
    analytics: TemporalAnalyzer,
    store: Arc<dyn Store>,
    config: Arc<MonitorConfig>,
}

impl PressMonitor {
    pub fn new(
        search: Arc<dyn SearchCapability>,
        classifier: Arc<dyn ClassifyCapability>,
        store: Arc<dyn Store>,
        config: MonitorConfig,
    ) -> Result<PressMonitor, ContractError> {
        if config.subject.trim().is_empty() {
            return Err(ContractError::MissingConfig("subject"));
        }
        if config.max_articles_per_language == 0 {
            return Err(ContractError::MissingConfig("max_articles_per_language"));
        }
        let config = Arc::new(config);

        Ok(PressMonitor {
            orchestrator: Orchestrator::new(
                Arc::clone(&search),
                Arc::clone(&classifier),
                Arc::clone(&store),
                Arc::clone(&config),
            ),
            aggregator: Aggregator::new(Arc::clone(&store)),
            sentiment: SentimentPipeline::new(
                Arc::clone(&classifier),
                Arc::clone(&store),
                Arc::clone(&config),
            ),
            analytics: TemporalAnalyzer::new(Arc::clone(&store)),
            store,
            config,
        })
    }

    /// One full monitoring pass. Always completes with the best achievable
    /// result given the failures encountered; only contract violations abort.
    pub async fn execute(&self, mode: SearchMode) -> Result<MonitorOutcome> {
        let mut run = self.orchestrator.run(mode).await?;
        self.aggregator.aggregate(&mut run).await?;
        self.sentiment.classify_run(&mut run).await;

        let now = Utc::now();
        let report = self.analytics.analyze(now).await;
        let digest = digest::render(&run, &report, &self.config.subject, now);
        run.digest = Some(digest.content.clone());

        if let Err(e) = self.store.save_digest(&digest).await {
            warn!(target: TARGET_DB, "Failed to persist digest: {}", e);
        }

        if let Ok(stats) = self.store.monitoring_statistics(7).await {
            info!(
                "7-day totals: {} articles, {} positive / {} negative / {} neutral",
                stats.total_articles, stats.positive_count, stats.negative_count, stats.neutral_count
            );
        }

        info!(
            "Monitoring pass complete: {} articles, {} languages covered",
            digest.articles_count,
            digest.languages_covered.len()
        );
        Ok(MonitorOutcome { run, report, digest })
    }
}
