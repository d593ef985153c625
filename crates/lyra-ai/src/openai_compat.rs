use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};

use crate::{ChatCompletion, ChatMessage, ChatRequest, ChatUsage, LlmClient, LyraAiError};

pub const PROVIDER_API_KEY_ENV: &str = "LYRA_PROVIDER_API_KEY";
pub const PROVIDER_API_BASE_ENV: &str = "LYRA_PROVIDER_API_BASE";

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;

fn non_empty_env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[derive(Debug, Clone)]
/// Public struct `OpenAiCompatConfig` used across Lyra components.
pub struct OpenAiCompatConfig {
    pub api_base: String,
    pub api_key: String,
    pub request_timeout_ms: u64,
}

impl Default for OpenAiCompatConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: String::new(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone)]
/// Chat-completions client for any OpenAI-compatible endpoint.
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    config: OpenAiCompatConfig,
}

impl OpenAiCompatClient {
    pub fn new(config: OpenAiCompatConfig) -> Result<Self, LyraAiError> {
        if config.api_key.trim().is_empty() {
            return Err(LyraAiError::MissingApiKey);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = format!("Bearer {}", config.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&bearer)
                .map_err(|e| LyraAiError::InvalidResponse(format!("invalid API key header: {e}")))?,
        );

        // Request timeout bounds the provider call so the orchestration
        // pipeline is never left suspended on a stuck completion.
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        )
    }
}

pub(crate) fn build_chat_request_body(request: &ChatRequest) -> Value {
    let messages = request
        .messages
        .iter()
        .map(|message: &ChatMessage| {
            json!({
                "role": message.role.as_str(),
                "content": message.content,
            })
        })
        .collect::<Vec<_>>();

    let mut body = json!({
        "model": request.model,
        "messages": messages,
    });
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    if let Some(temperature) = request.temperature {
        body["temperature"] = json!(temperature);
    }
    body
}

pub(crate) fn parse_chat_response(raw: &Value) -> Result<ChatCompletion, LyraAiError> {
    let text = raw
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            LyraAiError::InvalidResponse("response is missing choices[0].message.content".into())
        })?
        .trim()
        .to_string();

    let usage = ChatUsage {
        prompt_tokens: raw
            .pointer("/usage/prompt_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        completion_tokens: raw
            .pointer("/usage/completion_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        total_tokens: raw
            .pointer("/usage/total_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0),
    };

    let model = raw
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(ChatCompletion { text, usage, model })
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion, LyraAiError> {
        let body = build_chat_request_body(&request);
        let response = self.client.post(self.endpoint()).json(&body).send().await?;
        let status = response.status();
        let raw_body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(LyraAiError::HttpStatus {
                status: status.as_u16(),
                body: raw_body,
            });
        }

        let parsed: Value = serde_json::from_str(&raw_body)?;
        let mut completion = parse_chat_response(&parsed)?;
        if completion.model.is_empty() {
            completion.model = request.model;
        }
        Ok(completion)
    }
}

/// Build a provider client from environment credentials.
///
/// Returns `None` when no API key is configured; the caller treats that as
/// "collaborator unavailable" and falls back to a mock reply instead of
/// failing the pipeline.
pub fn client_from_env() -> Option<OpenAiCompatClient> {
    let api_key = non_empty_env_var(PROVIDER_API_KEY_ENV)?;
    let api_base = non_empty_env_var(PROVIDER_API_BASE_ENV)
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
    OpenAiCompatClient::new(OpenAiCompatConfig {
        api_base,
        api_key,
        request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
    })
    .ok()
}
