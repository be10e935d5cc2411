use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::error::CapabilityError;
use crate::TARGET_WEB_REQUEST;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);
const RETRY_DELAY: Duration = Duration::from_secs(5);
const MAX_RETRIES: usize = 3;

/// A candidate document surfaced by the search capability, pre-filtering.
#[derive(Clone, Debug, Deserialize)]
pub struct FoundDocument {
    pub url: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub documents: Vec<FoundDocument>,
}

/// The external grounded-search capability. Zero documents is a successful
/// outcome; errors are typed so callers can distinguish quota exhaustion,
/// timeouts, and garbled payloads.
#[async_trait]
pub trait SearchCapability: Send + Sync {
    async fn search(
        &self,
        query: &str,
        date_filter: Option<&str>,
    ) -> Result<SearchResponse, CapabilityError>;
}

/// Production adapter: POSTs the query to a grounded-search HTTP endpoint.
pub struct GroundedSearch {
    client: Client,
    endpoint: String,
    api_key: String,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
}

impl GroundedSearch {
    pub fn new(endpoint: String, api_key: String) -> Self {
        GroundedSearch {
            client: Client::new(),
            endpoint,
            api_key,
        }
    }

    async fn attempt(&self, query: &str) -> Result<SearchResponse, CapabilityError> {
        let send = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&SearchRequest { query })
            .send();

        match timeout(REQUEST_TIMEOUT, send).await {
            Ok(Ok(response)) => {
                if response.status() == StatusCode::TOO_MANY_REQUESTS {
                    return Err(CapabilityError::Quota(format!(
                        "search endpoint returned {}",
                        response.status()
                    )));
                }
                if !response.status().is_success() {
                    return Err(CapabilityError::Transport(format!(
                        "search endpoint returned {}",
                        response.status()
                    )));
                }
                response
                    .json::<SearchResponse>()
                    .await
                    .map_err(|e| CapabilityError::Malformed(e.to_string()))
            }
            Ok(Err(e)) => Err(CapabilityError::Transport(e.to_string())),
            Err(_) => Err(CapabilityError::Timeout(REQUEST_TIMEOUT)),
        }
    }
}

#[async_trait]
impl SearchCapability for GroundedSearch {
    async fn search(
        &self,
        query: &str,
        date_filter: Option<&str>,
    ) -> Result<SearchResponse, CapabilityError> {
        let full_query = match date_filter {
            Some(filter) => format!("{query} {filter}"),
            None => query.to_string(),
        };

        let mut last_error = CapabilityError::Timeout(REQUEST_TIMEOUT);
        for attempt in 0..MAX_RETRIES {
            debug!(target: TARGET_WEB_REQUEST, "Searching ({}/{}): {}", attempt + 1, MAX_RETRIES, full_query);
            match self.attempt(&full_query).await {
                Ok(response) => {
                    debug!(target: TARGET_WEB_REQUEST, "Search returned {} documents", response.documents.len());
                    return Ok(response);
                }
                // Retrying can't help a quota or parsing failure.
                Err(e @ (CapabilityError::Quota(_) | CapabilityError::Malformed(_))) => {
                    return Err(e)
                }
                Err(e) => {
                    warn!(target: TARGET_WEB_REQUEST, "Search attempt failed: {} ({}/{})", e, attempt + 1, MAX_RETRIES);
                    last_error = e;
                }
            }
            if attempt < MAX_RETRIES - 1 {
                sleep(RETRY_DELAY).await;
            }
        }
        Err(last_error)
    }
}
