use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tipping_core::{parse_json_block, ModelTier, ParseError};

/// Raw text completion against a model provider.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str, tier: ModelTier) -> Result<String>;
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("model backend unavailable: {0}")]
    Unavailable(String),
    #[error("model backend returned malformed structured output: {0}")]
    Malformed(#[from] ParseError),
}

/// The two generation modes the tip action needs from a model backend.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Structured (JSON) generation.
    async fn generate_structured(&self, prompt: &str, tier: ModelTier)
        -> Result<Value, BackendError>;

    /// Free-text generation.
    async fn generate_text(&self, prompt: &str, tier: ModelTier) -> Result<String, BackendError>;
}

/// Adapts a plain completion client into a [`ModelBackend`]; structured
/// output is read from the JSON block of the completion.
#[derive(Clone, Debug)]
pub struct CompletionBackend<C> {
    client: C,
}

impl<C> CompletionBackend<C>
where
    C: LlmClient,
{
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    async fn complete(&self, prompt: &str, tier: ModelTier) -> Result<String, BackendError> {
        self.client
            .complete(prompt, tier)
            .await
            .map_err(|error| BackendError::Unavailable(format!("{error:#}")))
    }
}

#[async_trait]
impl<C> ModelBackend for CompletionBackend<C>
where
    C: LlmClient,
{
    async fn generate_structured(
        &self,
        prompt: &str,
        tier: ModelTier,
    ) -> Result<Value, BackendError> {
        let completion = self.complete(prompt, tier).await?;
        Ok(parse_json_block(&completion)?)
    }

    async fn generate_text(&self, prompt: &str, tier: ModelTier) -> Result<String, BackendError> {
        let completion = self.complete(prompt, tier).await?;
        Ok(completion.trim().to_string())
    }
}
