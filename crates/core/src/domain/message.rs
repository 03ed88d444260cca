use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single conversation message as delivered by the host runtime.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub user: String,
    pub content: Content,
}

impl Memory {
    pub fn new(user: impl Into<String>, text: impl Into<String>) -> Self {
        Self { user: user.into(), content: Content::text(text) }
    }
}

/// Message body. Keys other than `text` and `action` travel in `extra` and
/// serialize at the top level, which is how reply payloads attach metadata.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Self::default() }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}
