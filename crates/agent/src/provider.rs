//! HTTP completion client for the providers named in `llm.provider`.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tipping_core::config::{LlmConfig, LlmProvider};
use tipping_core::ModelTier;

use crate::llm::LlmClient;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MAX_TOKENS: u32 = 1024;

pub struct HttpLlmClient {
    client: Client,
    config: LlmConfig,
}

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, config: config.clone() })
    }

    pub fn endpoint(&self) -> String {
        endpoint(&self.config)
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, prompt: &str, tier: ModelTier) -> Result<String> {
        let model = self.config.model_for(tier);
        let body = request_body(self.config.provider, model, prompt);
        let mut request = self.client.post(self.endpoint()).json(&body);

        request = match (self.config.provider, self.config.api_key.as_ref()) {
            (LlmProvider::OpenAi, Some(api_key)) => request.bearer_auth(api_key.expose_secret()),
            (LlmProvider::Anthropic, Some(api_key)) => request
                .header("x-api-key", api_key.expose_secret())
                .header("anthropic-version", ANTHROPIC_VERSION),
            (LlmProvider::Ollama, Some(api_key)) => request.bearer_auth(api_key.expose_secret()),
            (_, None) => request,
        };

        tracing::debug!(
            event_name = "llm.request.sent",
            provider = ?self.config.provider,
            model,
            tier = %tier,
            prompt_chars = prompt.len(),
            "sending completion request"
        );

        let response = request.send().await.context("model request failed")?;
        let status = response.status();
        if !status.is_success() {
            let error_text = error_body(response.text().await);
            return Err(anyhow!(
                "{:?} API error {}: {}",
                self.config.provider,
                status,
                redact(&error_text, self.config.api_key.as_ref())
            ));
        }

        let raw = response.json::<Value>().await.context("model response was not JSON")?;
        extract_completion(self.config.provider, &raw)
    }
}

fn endpoint(config: &LlmConfig) -> String {
    let base_url = config.effective_base_url();
    match config.provider {
        LlmProvider::OpenAi => format!("{base_url}/v1/chat/completions"),
        LlmProvider::Anthropic => format!("{base_url}/v1/messages"),
        LlmProvider::Ollama => format!("{base_url}/api/generate"),
    }
}

fn request_body(provider: LlmProvider, model: &str, prompt: &str) -> Value {
    match provider {
        LlmProvider::OpenAi => json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
        }),
        LlmProvider::Anthropic => json!({
            "model": model,
            "max_tokens": ANTHROPIC_MAX_TOKENS,
            "messages": [{ "role": "user", "content": prompt }],
        }),
        LlmProvider::Ollama => json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
        }),
    }
}

fn extract_completion(provider: LlmProvider, raw: &Value) -> Result<String> {
    let text = match provider {
        LlmProvider::OpenAi => raw["choices"][0]["message"]["content"].as_str(),
        LlmProvider::Anthropic => raw["content"]
            .as_array()
            .and_then(|blocks| blocks.iter().find(|block| block["type"] == "text"))
            .and_then(|block| block["text"].as_str()),
        LlmProvider::Ollama => raw["response"].as_str(),
    };
    text.map(str::to_string).ok_or_else(|| anyhow!("no completion text in {provider:?} response"))
}

fn error_body<E: std::fmt::Display>(body: Result<String, E>) -> String {
    body.unwrap_or_else(|error| format!("<unreadable body: {error}>"))
}

fn redact(text: &str, api_key: Option<&SecretString>) -> String {
    match api_key.map(|key| key.expose_secret()).filter(|key| !key.is_empty()) {
        Some(key) => text.replace(key, "<redacted>"),
        None => text.to_string(),
    }
}
