use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Conversation context owned by the host runtime.
///
/// The extractor only reads it to fill prompt placeholders; composing and
/// refreshing it is the host's job.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub agent_name: String,
    pub sender_name: String,
    pub recent_messages: String,
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

impl ConversationState {
    /// Placeholder values keyed the way prompt templates reference them.
    /// Free-form `values` never shadow the three built-in keys.
    pub fn template_values(&self) -> BTreeMap<String, String> {
        let mut values = self.values.clone();
        values.insert("agentName".to_string(), self.agent_name.clone());
        values.insert("senderName".to_string(), self.sender_name.clone());
        values.insert("recentMessages".to_string(), self.recent_messages.clone());
        values
    }
}
