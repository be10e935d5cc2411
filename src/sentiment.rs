use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::aggregator::SentimentPartitions;
use crate::article::{truncate_chars, Article, Sentiment};
use crate::classify::ClassifyCapability;
use crate::db::Store;
use crate::languages::Language;
use crate::monitor::MonitorConfig;
use crate::orchestrator::RunState;
use crate::{TARGET_DB, TARGET_LLM_REQUEST};

/// Documents per classification batch; bounds single-call payload size.
pub const SENTIMENT_BATCH_SIZE: usize = 10;
/// Pacing between batches, respecting external rate limits.
const BATCH_DELAY: Duration = Duration::from_secs(2);
/// Content longer than this is not worth a translation call.
pub const TRANSLATION_CONTENT_CAP: usize = 5000;
/// Translated text is capped like classification input.
const TRANSLATION_INPUT_CAP: usize = 3000;

/// Assigns a sentiment to every document in the run, with a neutral default
/// for anything the classification capability cannot handle.
pub struct SentimentPipeline {
    classifier: Arc<dyn ClassifyCapability>,
    store: Arc<dyn Store>,
    config: Arc<MonitorConfig>,
}

impl SentimentPipeline {
    pub fn new(
        classifier: Arc<dyn ClassifyCapability>,
        store: Arc<dyn Store>,
        config: Arc<MonitorConfig>,
    ) -> SentimentPipeline {
        SentimentPipeline {
            classifier,
            store,
            config,
        }
    }

    /// Classifies the run's merged articles, recomputes the authoritative
    /// sentiment partition, and persists the updated batch.
    pub async fn classify_run(&self, run: &mut RunState) {
        if run.all_articles.is_empty() {
            info!("No articles to analyze for sentiment.");
            return;
        }

        let articles = std::mem::take(&mut run.all_articles);
        let classified = self.classify_articles(articles).await;

        if let Err(e) = self.store.upsert_articles(&classified).await {
            warn!(target: TARGET_DB, "Failed to persist classified batch: {}", e);
        }

        run.partitions = SentimentPartitions::partition(&classified);
        run.all_articles = classified;

        let (positive, negative, neutral) = run.partitions.counts();
        let total = run.all_articles.len();
        info!(
            "Sentiment analysis completed for {} articles: {} positive, {} negative, {} neutral",
            total, positive, negative, neutral
        );
    }

    /// Processes articles in fixed-size batches with a pacing delay between
    /// batches. Every document comes back classified; a failed call defaults
    /// to neutral rather than aborting the batch.
    pub async fn classify_articles(&self, mut articles: Vec<Article>) -> Vec<Article> {
        let mut rng = StdRng::seed_from_u64(rand::random());

        for (batch_index, batch) in articles.chunks_mut(SENTIMENT_BATCH_SIZE).enumerate() {
            if batch_index > 0 {
                // Small jitter keeps concurrent runs from aligning on the
                // rate limiter.
                let jitter = Duration::from_millis(rng.random_range(0..250));
                sleep(BATCH_DELAY + jitter).await;
            }

            for article in batch.iter_mut() {
                if self.should_translate(article) {
                    self.translate_article(article).await;
                }
                self.classify_article(article).await;
            }
        }
        articles
    }

    fn should_translate(&self, article: &Article) -> bool {
        self.config.translation_enabled
            && article.source_language != self.config.pivot_language
            && article.translated_content.is_none()
            && article.original_content.chars().count() < TRANSLATION_CONTENT_CAP
    }

    async fn translate_article(&self, article: &mut Article) {
        let language = Language::resolve(&article.source_language);
        let text = truncate_chars(&article.original_content, TRANSLATION_INPUT_CAP);
        match self.classifier.translate(text, &language).await {
            Ok(translation) => article.translated_content = Some(translation),
            Err(e) => {
                // Non-fatal; classification proceeds on the original content.
                debug!(target: TARGET_LLM_REQUEST, "Translation failed for {}: {}", article.url, e);
            }
        }
    }

    async fn classify_article(&self, article: &mut Article) {
        match self.classifier.classify(article, &self.config.subject).await {
            Ok(classification) => {
                article.sentiment = classification.sentiment;
                article.sentiment_score = classification.score;
                article.sentiment_explanation = classification.explanation;
                article.key_phrases.extend(classification.key_phrases);
                // Key phrases behave as a set; re-classification must not
                // accumulate duplicates.
                let mut seen = std::collections::HashSet::new();
                article.key_phrases.retain(|phrase| seen.insert(phrase.clone()));
                if article.summary.is_empty() {
                    article.summary = article.sentiment_explanation.clone();
                }
            }
            Err(e) => {
                warn!(target: TARGET_LLM_REQUEST, "Sentiment analysis failed for {}: {}", article.url, e);
                article.sentiment = Sentiment::Neutral;
                article.sentiment_score = 0.0;
                article.sentiment_explanation = "analysis failed".to_string();
            }
        }
    }
}
