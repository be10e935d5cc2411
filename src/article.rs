use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use urlnorm::UrlNormalizer;

use crate::languages::Language;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }

    pub fn parse(value: &str) -> Option<Sentiment> {
        match value.trim().to_lowercase().as_str() {
            "positive" => Some(Sentiment::Positive),
            "negative" => Some(Sentiment::Negative),
            "neutral" => Some(Sentiment::Neutral),
            _ => None,
        }
    }
}

/// A discovered piece of press coverage.
///
/// Created by a language worker with empty derived fields, classified by the
/// sentiment pipeline, persisted by the aggregator. `normalized_url` is the
/// unique identity used for dedup and upsert; re-ingestion of the same URL
/// updates derived fields only.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Article {
    pub url: String,
    pub normalized_url: String,
    pub title: String,
    pub source_name: String,
    pub source_country: Option<String>,
    pub region: Option<String>,
    pub source_language: String,
    pub language_name: String,
    pub published_date: Option<DateTime<Utc>>,
    pub first_seen: DateTime<Utc>,
    pub original_content: String,
    pub translated_content: Option<String>,
    pub summary: String,
    pub sentiment: Sentiment,
    pub sentiment_score: f64,
    pub sentiment_explanation: String,
    pub key_phrases: Vec<String>,
    pub topics: Vec<String>,
}

impl Article {
    /// Builds an article from a raw search hit. Returns `None` when the URL
    /// does not parse, since without an identity the document cannot be
    /// deduplicated or persisted.
    pub fn discovered(
        raw_url: &str,
        title: &str,
        content: &str,
        language: &Language,
        now: DateTime<Utc>,
    ) -> Option<Article> {
        let parsed = Url::parse(raw_url).ok()?;
        let normalized_url = UrlNormalizer::default().compute_normalization_string(&parsed);

        Some(Article {
            url: raw_url.to_string(),
            normalized_url,
            title: if title.trim().is_empty() {
                "No title".to_string()
            } else {
                title.trim().to_string()
            },
            source_name: source_name_from_url(&parsed),
            source_country: None,
            region: language.region.map(|r| r.to_string()),
            source_language: language.code.clone(),
            language_name: language.name.clone(),
            published_date: None,
            first_seen: now,
            original_content: content.to_string(),
            translated_content: None,
            summary: String::new(),
            sentiment: Sentiment::Neutral,
            sentiment_score: 0.0,
            sentiment_explanation: String::new(),
            key_phrases: Vec::new(),
            topics: Vec::new(),
        })
    }

    /// The date this article is attributed to in time-series analysis.
    /// Falls back to discovery time when the publisher date is unknown.
    pub fn effective_date(&self) -> DateTime<Utc> {
        self.published_date.unwrap_or(self.first_seen)
    }

    /// The text handed to the classifier: translation when available,
    /// otherwise the original content.
    pub fn classification_text(&self) -> &str {
        self.translated_content
            .as_deref()
            .unwrap_or(&self.original_content)
    }
}

/// Derives a human-readable source name from a URL host: `www.` stripped,
/// first domain label, title-cased.
pub fn source_name_from_url(url: &Url) -> String {
    let host = match url.host_str() {
        Some(host) => host,
        None => return "Unknown Source".to_string(),
    };
    let host = host.strip_prefix("www.").unwrap_or(host);
    let label = host.split('.').next().unwrap_or(host);
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => "Unknown Source".to_string(),
    }
}

/// Truncates to at most `max_chars` characters, respecting char boundaries.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
