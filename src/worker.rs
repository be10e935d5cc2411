use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::article::Article;
use crate::classify::{ClassifyCapability, HeadlineVerdict};
use crate::db::Store;
use crate::languages::Language;
use crate::monitor::MonitorConfig;
use crate::search::SearchCapability;
use crate::orchestrator::WorkUnit;
use crate::{TARGET_DB, TARGET_LLM_REQUEST, TARGET_WEB_REQUEST};

/// Queries per language are bounded to keep fan-out predictable.
pub const MAX_QUERIES_PER_LANGUAGE: usize = 5;

/// Runs one work unit to a terminal state: plan queries, search, normalize,
/// filter by headlines, signal coverage freshness.
pub struct LanguageWorker {
    search: Arc<dyn SearchCapability>,
    classifier: Arc<dyn ClassifyCapability>,
    store: Arc<dyn Store>,
    config: Arc<MonitorConfig>,
}

impl LanguageWorker {
    pub fn new(
        search: Arc<dyn SearchCapability>,
        classifier: Arc<dyn ClassifyCapability>,
        store: Arc<dyn Store>,
        config: Arc<MonitorConfig>,
    ) -> LanguageWorker {
        LanguageWorker {
            search,
            classifier,
            store,
            config,
        }
    }

    /// Never fails: capability errors degrade the unit (skipped query,
    /// unfiltered candidates, recorded failure) but always leave it
    /// `completed`. An empty article list is a valid outcome, not a fault.
    pub async fn run(&self, mut unit: WorkUnit) -> WorkUnit {
        let date_filter = self
            .config
            .date_filter
            .clone()
            .unwrap_or_else(|| default_date_filter(Utc::now()));

        // Queries are generated once and cached on the unit.
        if unit.queries.is_empty() {
            unit.queries = match self
                .classifier
                .plan_queries(&unit.language, &self.config.subject, MAX_QUERIES_PER_LANGUAGE)
                .await
            {
                Ok(queries) => queries,
                Err(e) => {
                    warn!(
                        target: TARGET_LLM_REQUEST,
                        "[{}] query planning failed ({}), falling back to subject query",
                        unit.language.code, e
                    );
                    vec![self.config.subject.clone()]
                }
            };
        }
        unit.queries.truncate(MAX_QUERIES_PER_LANGUAGE);

        let now = Utc::now();
        let mut candidates: Vec<Article> = Vec::new();
        let mut failed_queries = 0usize;
        let mut last_error = String::new();

        for query in &unit.queries {
            match self.search.search(query, Some(&date_filter)).await {
                Ok(response) => {
                    for doc in &response.documents {
                        match Article::discovered(
                            &doc.url,
                            &doc.title,
                            &response.text,
                            &unit.language,
                            now,
                        ) {
                            Some(article) => candidates.push(article),
                            None => {
                                debug!(target: TARGET_WEB_REQUEST, "[{}] dropping unparseable url: {}", unit.language.code, doc.url);
                            }
                        }
                    }
                }
                Err(e) => {
                    // A failed query never fails the unit.
                    warn!(target: TARGET_WEB_REQUEST, "[{}] search '{}' failed: {}", unit.language.code, query, e);
                    failed_queries += 1;
                    last_error = e.to_string();
                }
            }
        }

        if !candidates.is_empty() {
            let before = candidates.len();
            candidates = self.filter_by_headlines(candidates, &unit.language).await;
            info!(
                "[{}] kept {} of {} candidates after headline filtering",
                unit.language.code,
                candidates.len(),
                before
            );
        }
        candidates.truncate(self.config.max_articles_per_language);

        if failed_queries == unit.queries.len() && !unit.queries.is_empty() {
            unit.failure = Some(format!(
                "all {} queries failed; last error: {}",
                failed_queries, last_error
            ));
        }
        unit.articles = candidates;
        unit.completed = true;

        // Freshness signal regardless of outcome; the stale-coverage
        // selector would otherwise rescan gaps endlessly.
        if let Err(e) = self
            .store
            .mark_language_checked(&unit.language.code, unit.articles.len() as i64)
            .await
        {
            warn!(target: TARGET_DB, "[{}] failed to record coverage freshness: {}", unit.language.code, e);
        }

        unit
    }

    /// Headline-only relevance filter. Fails open: a filter-capability error
    /// returns the unfiltered candidate set rather than dropping it.
    async fn filter_by_headlines(
        &self,
        candidates: Vec<Article>,
        language: &Language,
    ) -> Vec<Article> {
        let headlines: Vec<String> = candidates
            .iter()
            .map(|a| format!("[{}] {}", a.source_name, a.title))
            .collect();

        match self
            .classifier
            .filter_headlines(&headlines, language, &self.config.subject)
            .await
        {
            Ok(HeadlineVerdict::Keep(indices)) => candidates
                .into_iter()
                .enumerate()
                .filter(|(i, _)| indices.binary_search(i).is_ok())
                .map(|(_, article)| article)
                .collect(),
            Ok(HeadlineVerdict::NoMatches) => Vec::new(),
            Err(e) => {
                warn!(
                    target: TARGET_LLM_REQUEST,
                    "[{}] headline filter unavailable ({}), keeping unfiltered candidates",
                    language.code, e
                );
                candidates
            }
        }
    }
}

/// The default date filter: published within the current UTC calendar day.
pub fn default_date_filter(now: DateTime<Utc>) -> String {
    let today = now.date_naive();
    let tomorrow = today.succ_opt().unwrap_or(today);
    format!("after:{today} before:{tomorrow}")
}
