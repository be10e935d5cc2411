use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use crate::article::{truncate_chars, Article, Sentiment};
use crate::error::CapabilityError;
use crate::languages::Language;
use crate::llm::generate_llm_response;
use crate::prompts;
use crate::{LLMClient, LLMParams, WorkerDetail};

/// Content handed to the classifier is capped to bound payload size.
pub const CLASSIFICATION_CONTENT_CAP: usize = 3000;

#[derive(Clone, Debug)]
pub struct Classification {
    pub sentiment: Sentiment,
    pub score: f64,
    pub explanation: String,
    pub key_phrases: Vec<String>,
}

/// Outcome of the headline-only relevance filter: either the 0-based indices
/// of headlines to keep, or an explicit no-matches sentinel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeadlineVerdict {
    Keep(Vec<usize>),
    NoMatches,
}

/// The external classification capability. Also carries the adjacent
/// generation concerns (query planning, translation) that run over the same
/// model client.
#[async_trait]
pub trait ClassifyCapability: Send + Sync {
    async fn classify(
        &self,
        article: &Article,
        subject: &str,
    ) -> Result<Classification, CapabilityError>;

    /// Batched headline-only relevance check. `headlines` are preformatted
    /// `[source] title` lines; the verdict indexes into that slice.
    async fn filter_headlines(
        &self,
        headlines: &[String],
        language: &Language,
        subject: &str,
    ) -> Result<HeadlineVerdict, CapabilityError>;

    async fn plan_queries(
        &self,
        language: &Language,
        subject: &str,
        max_queries: usize,
    ) -> Result<Vec<String>, CapabilityError>;

    async fn translate(&self, text: &str, language: &Language)
        -> Result<String, CapabilityError>;
}

/// Production classifier over the configured LLM client.
pub struct LlmClassifier {
    params: LLMParams,
    worker_detail: WorkerDetail,
}

impl LlmClassifier {
    pub fn new(llm_client: LLMClient, model: &str, temperature: f32) -> Self {
        LlmClassifier {
            params: LLMParams {
                llm_client,
                model: model.to_string(),
                temperature,
                require_json: false,
            },
            worker_detail: WorkerDetail {
                name: "classifier".to_string(),
                id: 0,
                model: model.to_string(),
            },
        }
    }

    fn json_params(&self) -> LLMParams {
        LLMParams {
            require_json: true,
            ..self.params.clone()
        }
    }
}

#[async_trait]
impl ClassifyCapability for LlmClassifier {
    async fn classify(
        &self,
        article: &Article,
        subject: &str,
    ) -> Result<Classification, CapabilityError> {
        let content = truncate_chars(article.classification_text(), CLASSIFICATION_CONTENT_CAP);
        let prompt = prompts::sentiment_prompt(&article.title, content, subject);
        let response =
            generate_llm_response(&prompt, &self.json_params(), &self.worker_detail).await?;
        parse_classification(&response)
    }

    async fn filter_headlines(
        &self,
        headlines: &[String],
        language: &Language,
        subject: &str,
    ) -> Result<HeadlineVerdict, CapabilityError> {
        let numbered = headlines
            .iter()
            .enumerate()
            .map(|(i, line)| format!("{}. {}", i + 1, line))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = prompts::headline_filter_prompt(&numbered, &language.name, subject);
        let response = generate_llm_response(&prompt, &self.params, &self.worker_detail).await?;
        parse_headline_verdict(&response, headlines.len())
    }

    async fn plan_queries(
        &self,
        language: &Language,
        subject: &str,
        max_queries: usize,
    ) -> Result<Vec<String>, CapabilityError> {
        let current_date = Utc::now().format("%B %d, %Y").to_string();
        let prompt = prompts::query_plan_prompt(
            &language.name,
            &language.code,
            subject,
            max_queries,
            &current_date,
        );
        let response = generate_llm_response(&prompt, &self.params, &self.worker_detail).await?;

        let queries: Vec<String> = response
            .lines()
            .map(|line| line.trim().trim_start_matches(['-', '*', ' ']).to_string())
            .filter(|line| !line.is_empty())
            .take(max_queries)
            .collect();

        if queries.is_empty() {
            return Err(CapabilityError::Malformed(
                "query plan contained no queries".to_string(),
            ));
        }
        Ok(queries)
    }

    async fn translate(
        &self,
        text: &str,
        language: &Language,
    ) -> Result<String, CapabilityError> {
        let prompt = prompts::translation_prompt(text, &language.name);
        generate_llm_response(&prompt, &self.params, &self.worker_detail).await
    }
}

/// Parses a sentiment completion into a validated classification. Tolerates
/// code fences around the JSON; rejects unknown sentiment labels; clamps the
/// score into [-1, 1].
pub fn parse_classification(response: &str) -> Result<Classification, CapabilityError> {
    #[derive(Deserialize)]
    struct RawClassification {
        sentiment: String,
        #[serde(default)]
        score: f64,
        #[serde(default)]
        explanation: String,
        #[serde(default)]
        key_phrases: Vec<String>,
    }

    let raw: RawClassification = serde_json::from_str(strip_code_fences(response))
        .map_err(|e| CapabilityError::Malformed(e.to_string()))?;

    let sentiment = Sentiment::parse(&raw.sentiment).ok_or_else(|| {
        CapabilityError::Malformed(format!("unknown sentiment label '{}'", raw.sentiment))
    })?;

    Ok(Classification {
        sentiment,
        score: raw.score.clamp(-1.0, 1.0),
        explanation: raw.explanation,
        key_phrases: raw.key_phrases,
    })
}

/// Parses the headline filter's reply contract: comma-separated 1-based
/// indices, or the NONE sentinel. Anything else is a malformed response.
pub fn parse_headline_verdict(
    response: &str,
    headline_count: usize,
) -> Result<HeadlineVerdict, CapabilityError> {
    let trimmed = response.trim();
    if trimmed.eq_ignore_ascii_case("none") {
        return Ok(HeadlineVerdict::NoMatches);
    }

    let mut indices = Vec::new();
    for token in trimmed.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let number: usize = token.parse().map_err(|_| {
            CapabilityError::Malformed(format!("unparseable headline index '{token}'"))
        })?;
        if number == 0 {
            return Err(CapabilityError::Malformed(
                "headline indices are 1-based".to_string(),
            ));
        }
        if number <= headline_count {
            indices.push(number - 1);
        }
    }

    if indices.is_empty() {
        return Err(CapabilityError::Malformed(
            "no valid headline indices in response".to_string(),
        ));
    }
    indices.sort_unstable();
    indices.dedup();
    Ok(HeadlineVerdict::Keep(indices))
}

fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the fence line (which may carry a language tag) and the closing fence.
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.trim_end_matches('`').trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_parses_indices() {
        let verdict = parse_headline_verdict("1,3,7", 10).unwrap();
        assert_eq!(verdict, HeadlineVerdict::Keep(vec![0, 2, 6]));
    }

    #[test]
    fn verdict_parses_none_sentinel() {
        assert_eq!(
            parse_headline_verdict("NONE", 4).unwrap(),
            HeadlineVerdict::NoMatches
        );
        assert_eq!(
            parse_headline_verdict("  none\n", 4).unwrap(),
            HeadlineVerdict::NoMatches
        );
    }

    #[test]
    fn verdict_drops_out_of_range_indices() {
        let verdict = parse_headline_verdict("2, 9", 3).unwrap();
        assert_eq!(verdict, HeadlineVerdict::Keep(vec![1]));
    }

    #[test]
    fn verdict_rejects_prose() {
        assert!(parse_headline_verdict("articles 1 and 3 look relevant", 5).is_err());
        assert!(parse_headline_verdict("", 5).is_err());
        assert!(parse_headline_verdict("0,2", 5).is_err());
    }

    #[test]
    fn classification_parses_fenced_json() {
        let response = "```json\n{\"sentiment\": \"positive\", \"score\": 0.8, \"explanation\": \"supportive coverage\", \"key_phrases\": [\"strategic partner\"]}\n```";
        let c = parse_classification(response).unwrap();
        assert_eq!(c.sentiment, Sentiment::Positive);
        assert_eq!(c.score, 0.8);
        assert_eq!(c.key_phrases, vec!["strategic partner".to_string()]);
    }

    #[test]
    fn classification_clamps_score() {
        let response = "{\"sentiment\": \"negative\", \"score\": -3.5, \"explanation\": \"\"}";
        let c = parse_classification(response).unwrap();
        assert_eq!(c.score, -1.0);
    }

    #[test]
    fn classification_rejects_unknown_label() {
        let response = "{\"sentiment\": \"ambivalent\", \"score\": 0.0, \"explanation\": \"\"}";
        assert!(parse_classification(response).is_err());
    }
}
