pub mod aggregator;
pub mod analytics;
pub mod article;
pub mod classify;
pub mod db;
pub mod digest;
pub mod environment;
pub mod error;
pub mod languages;
pub mod llm;
pub mod logging;
pub mod monitor;
pub mod orchestrator;
pub mod prompts;
pub mod search;
pub mod sentiment;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

use async_openai::{config::OpenAIConfig, Client as OpenAIClient};
use ollama_rs::Ollama;

pub const TARGET_WEB_REQUEST: &str = "web_request";
pub const TARGET_LLM_REQUEST: &str = "llm_request";
pub const TARGET_DB: &str = "db_query";

#[derive(Clone, Debug)]
pub enum LLMClient {
    Ollama(Ollama),
    OpenAI(OpenAIClient<OpenAIConfig>),
}

#[derive(Clone)]
pub struct LLMParams {
    pub llm_client: LLMClient,
    pub model: String,
    pub temperature: f32,
    pub require_json: bool,
}

#[derive(Clone, Debug)]
pub struct WorkerDetail {
    pub name: String,
    pub id: i16,
    pub model: String,
}
