use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::article::{Article, Sentiment};
use crate::db::Store;
use crate::error::ContractError;
use crate::orchestrator::{RunPhase, RunState};
use crate::TARGET_DB;

/// Articles split by their current sentiment label.
#[derive(Clone, Debug, Default)]
pub struct SentimentPartitions {
    pub positive: Vec<Article>,
    pub negative: Vec<Article>,
    pub neutral: Vec<Article>,
}

impl SentimentPartitions {
    pub fn partition(articles: &[Article]) -> SentimentPartitions {
        let mut partitions = SentimentPartitions::default();
        for article in articles {
            match article.sentiment {
                Sentiment::Positive => partitions.positive.push(article.clone()),
                Sentiment::Negative => partitions.negative.push(article.clone()),
                Sentiment::Neutral => partitions.neutral.push(article.clone()),
            }
        }
        partitions
    }

    pub fn counts(&self) -> (usize, usize, usize) {
        (
            self.positive.len(),
            self.negative.len(),
            self.neutral.len(),
        )
    }
}

/// Merges unit batches in dispatch order into one deduplicated collection.
///
/// Identity is the canonical URL; when the same URL appears in two batches
/// the later-seen version wins (dispatch order is the tie-break), while the
/// article keeps its first-seen position in the output ordering.
pub fn merge_articles<'a, I>(unit_batches: I) -> Vec<Article>
where
    I: IntoIterator<Item = &'a [Article]>,
{
    let mut order: Vec<String> = Vec::new();
    let mut merged: HashMap<String, Article> = HashMap::new();

    for batch in unit_batches {
        for article in batch {
            if !merged.contains_key(&article.normalized_url) {
                order.push(article.normalized_url.clone());
            }
            merged.insert(article.normalized_url.clone(), article.clone());
        }
    }

    order
        .iter()
        .filter_map(|key| merged.remove(key))
        .collect()
}

/// Joins all completed work units into the run-level result and persists the
/// batch.
pub struct Aggregator {
    store: Arc<dyn Store>,
}

impl Aggregator {
    pub fn new(store: Arc<dyn Store>) -> Aggregator {
        Aggregator { store }
    }

    /// Requires a joined run; aggregating over pending units would violate
    /// the join barrier. The sentiment partition computed here is
    /// provisional (classification has not run yet) and is recomputed by
    /// the sentiment pipeline.
    pub async fn aggregate(&self, run: &mut RunState) -> Result<(), ContractError> {
        if run.phase != RunPhase::Joined || !run.joined() {
            let pending = run
                .units
                .values()
                .find(|unit| !unit.completed)
                .map(|unit| unit.language.code.clone())
                .unwrap_or_else(|| "unknown".to_string());
            return Err(ContractError::IncompleteJoin(pending));
        }

        let batches: Vec<&[Article]> = run
            .dispatch_order
            .iter()
            .filter_map(|code| run.units.get(code))
            .map(|unit| unit.articles.as_slice())
            .collect();
        let merged = merge_articles(batches);

        info!(
            "Aggregated {} unique articles from {} units",
            merged.len(),
            run.units.len()
        );

        // Persistence is best-effort; the in-memory result always survives.
        if !merged.is_empty() {
            if let Err(e) = self.store.upsert_articles(&merged).await {
                warn!(target: TARGET_DB, "Failed to persist aggregated batch: {}", e);
            }
        }

        run.partitions = SentimentPartitions::partition(&merged);
        run.all_articles = merged;
        Ok(())
    }
}
