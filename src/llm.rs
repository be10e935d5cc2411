use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ResponseFormat,
};
use async_openai::Client as OpenAIClient;
use ollama_rs::generation::completion::request::GenerationRequest;
use ollama_rs::generation::options::GenerationOptions;
use ollama_rs::Ollama;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, warn};

use crate::error::CapabilityError;
use crate::{LLMClient, LLMParams, WorkerDetail, TARGET_LLM_REQUEST};

const LLM_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_RETRIES: usize = 3;

/// Single entry point for model completions: bounded retries with
/// exponential backoff around a per-call deadline, for either client.
pub async fn generate_llm_response(
    prompt: &str,
    params: &LLMParams,
    worker_detail: &WorkerDetail,
) -> Result<String, CapabilityError> {
    let mut backoff = 2;
    let mut last_error = CapabilityError::Timeout(LLM_TIMEOUT);

    debug!(target: TARGET_LLM_REQUEST, "[{} {} {}]: starting LLM response generation.", worker_detail.name, worker_detail.id, worker_detail.model);

    for retry_count in 0..MAX_RETRIES {
        let outcome = match &params.llm_client {
            LLMClient::Ollama(ollama) => generate_ollama(ollama, prompt, params).await,
            LLMClient::OpenAI(client) => generate_openai(client, prompt, params).await,
        };

        match outcome {
            Ok(text) if !text.trim().is_empty() => {
                debug!(target: TARGET_LLM_REQUEST, "[{} {} {}]: LLM response received.", worker_detail.name, worker_detail.id, worker_detail.model);
                return Ok(text);
            }
            Ok(_) => {
                warn!(target: TARGET_LLM_REQUEST, "[{} {} {}]: empty completion ({}/{}).", worker_detail.name, worker_detail.id, worker_detail.model, retry_count + 1, MAX_RETRIES);
                last_error = CapabilityError::Malformed("empty completion".to_string());
            }
            Err(e) => {
                warn!(target: TARGET_LLM_REQUEST, "[{} {} {}]: {} ({}/{}).", worker_detail.name, worker_detail.id, worker_detail.model, e, retry_count + 1, MAX_RETRIES);
                last_error = e;
            }
        }

        if retry_count < MAX_RETRIES - 1 {
            debug!(target: TARGET_LLM_REQUEST, "[{} {} {}]: backing off for {} seconds before retry.", worker_detail.name, worker_detail.id, worker_detail.model, backoff);
            sleep(Duration::from_secs(backoff)).await;
            backoff *= 2;
        }
    }

    error!(target: TARGET_LLM_REQUEST, "[{} {} {}]: no response generated after {} retries.", worker_detail.name, worker_detail.id, worker_detail.model, MAX_RETRIES);
    Err(last_error)
}

async fn generate_ollama(
    ollama: &Ollama,
    prompt: &str,
    params: &LLMParams,
) -> Result<String, CapabilityError> {
    let mut request = GenerationRequest::new(params.model.to_string(), prompt.to_string());
    request.options = Some(GenerationOptions::default().temperature(params.temperature));

    match timeout(LLM_TIMEOUT, ollama.generate(request)).await {
        Ok(Ok(response)) => Ok(response.response),
        Ok(Err(e)) => Err(CapabilityError::Transport(e.to_string())),
        Err(_) => Err(CapabilityError::Timeout(LLM_TIMEOUT)),
    }
}

async fn generate_openai(
    client: &OpenAIClient<OpenAIConfig>,
    prompt: &str,
    params: &LLMParams,
) -> Result<String, CapabilityError> {
    let message = ChatCompletionRequestUserMessageArgs::default()
        .content(prompt)
        .build()
        .map_err(|e| CapabilityError::Transport(e.to_string()))?;

    let mut builder = CreateChatCompletionRequestArgs::default();
    builder
        .model(params.model.clone())
        .temperature(params.temperature)
        .messages([message.into()]);
    if params.require_json {
        builder.response_format(ResponseFormat::JsonObject);
    }
    let request = builder
        .build()
        .map_err(|e| CapabilityError::Transport(e.to_string()))?;

    match timeout(LLM_TIMEOUT, client.chat().create(request)).await {
        Ok(Ok(response)) => response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CapabilityError::Malformed("completion with no content".to_string())),
        Ok(Err(e)) => Err(CapabilityError::Transport(e.to_string())),
        Err(_) => Err(CapabilityError::Timeout(LLM_TIMEOUT)),
    }
}
