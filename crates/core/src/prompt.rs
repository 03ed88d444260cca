use tera::{Context, Tera};
use thiserror::Error;

use crate::domain::state::ConversationState;

#[derive(Debug, Error)]
#[error("prompt rendering failed: {message}")]
pub struct PromptError {
    pub message: String,
}

impl From<tera::Error> for PromptError {
    fn from(error: tera::Error) -> Self {
        // tera keeps the useful detail (unknown variable, bad syntax) in the source chain.
        let mut message = error.to_string();
        let mut source = std::error::Error::source(&error);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = std::error::Error::source(cause);
        }
        Self { message }
    }
}

/// Renders `{{placeholder}}` prompt templates against a conversation state.
#[derive(Clone, Copy, Debug, Default)]
pub struct PromptRenderer;

impl PromptRenderer {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, template: &str, state: &ConversationState) -> Result<String, PromptError> {
        let mut context = Context::new();
        for (key, value) in state.template_values() {
            context.insert(key, &value);
        }
        Ok(Tera::one_off(template, &context, false)?)
    }
}
