//! Test doubles: scripted capabilities and an in-memory store.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration as StdDuration;

use crate::article::{Article, Sentiment};
use crate::classify::{Classification, ClassifyCapability, HeadlineVerdict};
use crate::db::{ArticleFilter, MonitoringStatistics, Store};
use crate::digest::DigestRecord;
use crate::error::CapabilityError;
use crate::languages::Language;
use crate::search::{FoundDocument, SearchCapability, SearchResponse};

/// Behavior of the stub search for one query string.
pub enum ScriptedSearch {
    Docs(Vec<(&'static str, &'static str)>),
    DelayedDocs(StdDuration, Vec<(&'static str, &'static str)>),
    Timeout,
}

/// Search stub keyed by exact query string. Unscripted queries succeed with
/// zero documents.
#[derive(Default)]
pub struct StubSearch {
    pub script: HashMap<String, ScriptedSearch>,
}

fn response_from(docs: &[(&'static str, &'static str)]) -> SearchResponse {
    SearchResponse {
        text: "search result text".to_string(),
        documents: docs
            .iter()
            .map(|(url, title)| FoundDocument {
                url: (*url).to_string(),
                title: (*title).to_string(),
            })
            .collect(),
    }
}

#[async_trait]
impl SearchCapability for StubSearch {
    async fn search(
        &self,
        query: &str,
        _date_filter: Option<&str>,
    ) -> Result<SearchResponse, CapabilityError> {
        match self.script.get(query) {
            Some(ScriptedSearch::Docs(docs)) => Ok(response_from(docs)),
            Some(ScriptedSearch::DelayedDocs(delay, docs)) => {
                tokio::time::sleep(*delay).await;
                Ok(response_from(docs))
            }
            Some(ScriptedSearch::Timeout) => {
                Err(CapabilityError::Timeout(StdDuration::from_secs(45)))
            }
            None => Ok(SearchResponse::default()),
        }
    }
}

/// Headline-filter behavior of the stub classifier.
#[derive(Default)]
pub enum FilterBehavior {
    #[default]
    KeepAll,
    Keep(Vec<usize>),
    NoMatches,
    Fail,
}

/// Classifier stub. Plans one `q-<code>` query per language so search stubs
/// can key on it.
pub struct StubClassifier {
    pub sentiment: Sentiment,
    pub score: f64,
    pub fail_classify: bool,
    pub fail_translate: bool,
    pub filter: FilterBehavior,
}

impl Default for StubClassifier {
    fn default() -> StubClassifier {
        StubClassifier {
            sentiment: Sentiment::Neutral,
            score: 0.0,
            fail_classify: false,
            fail_translate: false,
            filter: FilterBehavior::KeepAll,
        }
    }
}

#[async_trait]
impl ClassifyCapability for StubClassifier {
    async fn classify(
        &self,
        _article: &Article,
        _subject: &str,
    ) -> Result<Classification, CapabilityError> {
        if self.fail_classify {
            return Err(CapabilityError::Timeout(StdDuration::from_secs(120)));
        }
        Ok(Classification {
            sentiment: self.sentiment,
            score: self.score,
            explanation: "scripted classification".to_string(),
            key_phrases: vec!["scripted phrase".to_string()],
        })
    }

    async fn filter_headlines(
        &self,
        headlines: &[String],
        _language: &Language,
        _subject: &str,
    ) -> Result<HeadlineVerdict, CapabilityError> {
        match &self.filter {
            FilterBehavior::KeepAll => Ok(HeadlineVerdict::Keep((0..headlines.len()).collect())),
            FilterBehavior::Keep(indices) => Ok(HeadlineVerdict::Keep(indices.clone())),
            FilterBehavior::NoMatches => Ok(HeadlineVerdict::NoMatches),
            FilterBehavior::Fail => Err(CapabilityError::Malformed(
                "scripted filter failure".to_string(),
            )),
        }
    }

    async fn plan_queries(
        &self,
        language: &Language,
        _subject: &str,
        _max_queries: usize,
    ) -> Result<Vec<String>, CapabilityError> {
        Ok(vec![format!("q-{}", language.code)])
    }

    async fn translate(
        &self,
        text: &str,
        _language: &Language,
    ) -> Result<String, CapabilityError> {
        if self.fail_translate {
            return Err(CapabilityError::Transport(
                "scripted translation failure".to_string(),
            ));
        }
        Ok(format!("translated: {text}"))
    }
}

/// In-memory store keyed by canonical URL.
#[derive(Default)]
pub struct MemoryStore {
    pub articles: Mutex<HashMap<String, Article>>,
    pub checked: Mutex<Vec<(String, i64)>>,
    pub digests: Mutex<Vec<DigestRecord>>,
    /// Languages reported by `stale_languages`.
    pub stale: Vec<String>,
    pub fail_writes: bool,
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_articles(&self, articles: &[Article]) -> Result<()> {
        if self.fail_writes {
            bail!("store offline");
        }
        let mut stored = self.articles.lock().unwrap();
        for article in articles {
            stored.insert(article.normalized_url.clone(), article.clone());
        }
        Ok(())
    }

    async fn articles_since(&self, filter: &ArticleFilter) -> Result<Vec<Article>> {
        let cutoff = Utc::now() - Duration::days(filter.days_back);
        let stored = self.articles.lock().unwrap();
        let mut matching: Vec<Article> = stored
            .values()
            .filter(|a| a.effective_date() >= cutoff)
            .filter(|a| {
                filter
                    .country
                    .as_ref()
                    .map(|c| a.source_country.as_deref() == Some(c.as_str()))
                    .unwrap_or(true)
            })
            .filter(|a| {
                filter
                    .region
                    .as_ref()
                    .map(|r| a.region.as_deref() == Some(r.as_str()))
                    .unwrap_or(true)
            })
            .filter(|a| {
                filter
                    .language
                    .as_ref()
                    .map(|l| &a.source_language == l)
                    .unwrap_or(true)
            })
            .filter(|a| filter.sentiment.map(|s| a.sentiment == s).unwrap_or(true))
            .cloned()
            .collect();
        matching.sort_by_key(|a| std::cmp::Reverse(a.effective_date()));
        Ok(matching)
    }

    async fn stale_languages(&self, _hours_threshold: i64) -> Result<Vec<String>> {
        Ok(self.stale.clone())
    }

    async fn languages_for_regions(&self, regions: &[String]) -> Result<Vec<String>> {
        Ok(Language::all()
            .filter(|lang| {
                lang.region
                    .map(|r| regions.iter().any(|wanted| wanted == r))
                    .unwrap_or(false)
            })
            .map(|lang| lang.code)
            .collect())
    }

    async fn mark_language_checked(&self, language_code: &str, articles_found: i64) -> Result<()> {
        if self.fail_writes {
            bail!("store offline");
        }
        self.checked
            .lock()
            .unwrap()
            .push((language_code.to_string(), articles_found));
        Ok(())
    }

    async fn countries_with_sufficient_data(
        &self,
        min_articles: i64,
        days_back: i64,
    ) -> Result<Vec<String>> {
        let cutoff = Utc::now() - Duration::days(days_back);
        let stored = self.articles.lock().unwrap();
        let mut counts: HashMap<String, i64> = HashMap::new();
        for article in stored.values() {
            if article.effective_date() < cutoff {
                continue;
            }
            if let Some(country) = &article.source_country {
                *counts.entry(country.clone()).or_default() += 1;
            }
        }
        let mut countries: Vec<(String, i64)> = counts
            .into_iter()
            .filter(|(_, count)| *count >= min_articles)
            .collect();
        countries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(countries.into_iter().map(|(country, _)| country).collect())
    }

    async fn save_digest(&self, digest: &DigestRecord) -> Result<()> {
        if self.fail_writes {
            bail!("store offline");
        }
        self.digests.lock().unwrap().push(digest.clone());
        Ok(())
    }

    async fn monitoring_statistics(&self, _days_back: i64) -> Result<MonitoringStatistics> {
        let stored = self.articles.lock().unwrap();
        let mut stats = MonitoringStatistics {
            total_articles: stored.len() as i64,
            ..Default::default()
        };
        for article in stored.values() {
            match article.sentiment {
                Sentiment::Positive => stats.positive_count += 1,
                Sentiment::Negative => stats.negative_count += 1,
                Sentiment::Neutral => stats.neutral_count += 1,
            }
        }
        Ok(stats)
    }
}
