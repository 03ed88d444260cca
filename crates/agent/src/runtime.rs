use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tipping_core::{ConversationState, Memory, PromptRenderer};

use crate::llm::ModelBackend;

pub const DEFAULT_RECENT_WINDOW: usize = 32;

/// Services the surrounding agent runtime provides to actions.
///
/// The runtime owns conversation state; actions only ask it to compose or
/// refresh one and read it back while rendering prompts.
#[async_trait]
pub trait HostRuntime: Send + Sync {
    fn agent_name(&self) -> &str;

    fn backend(&self) -> &dyn ModelBackend;

    async fn compose_state(&self, message: &Memory) -> Result<ConversationState>;

    async fn update_state(
        &self,
        state: ConversationState,
        message: &Memory,
    ) -> Result<ConversationState>;

    fn render_prompt(&self, state: &ConversationState, template: &str) -> Result<String> {
        Ok(PromptRenderer::new().render(template, state)?)
    }
}

/// Host runtime backed by an in-memory transcript.
pub struct TranscriptRuntime<B> {
    agent_name: String,
    backend: B,
    recent_window: usize,
    transcript: RwLock<Vec<Memory>>,
}

impl<B> TranscriptRuntime<B>
where
    B: ModelBackend,
{
    pub fn new(agent_name: impl Into<String>, backend: B) -> Self {
        Self {
            agent_name: agent_name.into(),
            backend,
            recent_window: DEFAULT_RECENT_WINDOW,
            transcript: RwLock::new(Vec::new()),
        }
    }

    pub fn with_recent_window(mut self, recent_window: usize) -> Self {
        self.recent_window = recent_window.max(1);
        self
    }

    pub fn record(&self, message: Memory) -> Result<()> {
        self.transcript
            .write()
            .map_err(|_| anyhow!("transcript lock is poisoned"))?
            .push(message);
        Ok(())
    }

    pub fn last_message(&self) -> Option<Memory> {
        self.transcript.read().ok().and_then(|transcript| transcript.last().cloned())
    }

    fn format_recent(&self, message: &Memory) -> Result<String> {
        let transcript = self.transcript.read().map_err(|_| anyhow!("transcript lock is poisoned"))?;
        let start = transcript.len().saturating_sub(self.recent_window);
        let mut lines = transcript[start..]
            .iter()
            .map(|memory| format!("{}: {}", memory.user, memory.content.text))
            .collect::<Vec<_>>();

        // The triggering message may not have been recorded yet.
        if transcript.last() != Some(message) {
            lines.push(format!("{}: {}", message.user, message.content.text));
            if lines.len() > self.recent_window {
                lines.remove(0);
            }
        }
        Ok(lines.join("\n"))
    }
}

#[async_trait]
impl<B> HostRuntime for TranscriptRuntime<B>
where
    B: ModelBackend,
{
    fn agent_name(&self) -> &str {
        &self.agent_name
    }

    fn backend(&self) -> &dyn ModelBackend {
        &self.backend
    }

    async fn compose_state(&self, message: &Memory) -> Result<ConversationState> {
        Ok(ConversationState {
            agent_name: self.agent_name.clone(),
            sender_name: message.user.clone(),
            recent_messages: self.format_recent(message)?,
            values: Default::default(),
        })
    }

    async fn update_state(
        &self,
        mut state: ConversationState,
        message: &Memory,
    ) -> Result<ConversationState> {
        state.agent_name = self.agent_name.clone();
        state.sender_name = message.user.clone();
        state.recent_messages = self.format_recent(message)?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::Value;
    use tipping_core::{ConversationState, Memory, ModelTier};

    use super::{HostRuntime, TranscriptRuntime};
    use crate::llm::{BackendError, ModelBackend};

    struct Unused;

    #[async_trait]
    impl ModelBackend for Unused {
        async fn generate_structured(
            &self,
            _prompt: &str,
            _tier: ModelTier,
        ) -> Result<Value, BackendError> {
            Err(BackendError::Unavailable("not wired".to_string()))
        }

        async fn generate_text(
            &self,
            _prompt: &str,
            _tier: ModelTier,
        ) -> Result<String, BackendError> {
            Err(BackendError::Unavailable("not wired".to_string()))
        }
    }

    #[tokio::test]
    async fn compose_state_formats_recent_transcript() {
        let runtime = TranscriptRuntime::new("Eliza", Unused);
        runtime.record(Memory::new("alice", "Please tip 200 to @bob")).expect("record");
        let message = Memory::new("alice", "with $USDC!");
        runtime.record(message.clone()).expect("record");

        let state = runtime.compose_state(&message).await.expect("state composes");
        assert_eq!(state.agent_name, "Eliza");
        assert_eq!(state.sender_name, "alice");
        assert_eq!(state.recent_messages, "alice: Please tip 200 to @bob\nalice: with $USDC!");
    }

    #[tokio::test]
    async fn unrecorded_trigger_is_appended_and_window_is_bounded() {
        let runtime = TranscriptRuntime::new("Eliza", Unused).with_recent_window(2);
        runtime.record(Memory::new("alice", "one")).expect("record");
        runtime.record(Memory::new("alice", "two")).expect("record");

        let state =
            runtime.compose_state(&Memory::new("bob", "three")).await.expect("state composes");
        assert_eq!(state.recent_messages, "alice: two\nbob: three");
        assert_eq!(state.sender_name, "bob");
    }

    #[tokio::test]
    async fn update_state_keeps_caller_values() {
        let runtime = TranscriptRuntime::new("Eliza", Unused);
        let mut state = ConversationState::default();
        state.values.insert("channel".to_string(), "tips".to_string());

        let message = Memory::new("alice", "0xabcdefabcdefabcdefabcdefabcdefabcdefabcdef");
        let state = runtime.update_state(state, &message).await.expect("state refreshes");

        assert_eq!(state.values.get("channel").map(String::as_str), Some("tips"));
        assert_eq!(state.recent_messages, "alice: 0xabcdefabcdefabcdefabcdefabcdefabcdefabcdef");
        assert_eq!(
            runtime.render_prompt(&state, "{{agentName}}/{{senderName}}").expect("renders"),
            "Eliza/alice"
        );
    }
}
