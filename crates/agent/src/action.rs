use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tipping_core::{Content, ConversationState, Memory};

use crate::runtime::HostRuntime;

/// One turn of a worked example shown to the host for few-shot guidance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionExample {
    pub user: String,
    pub content: Content,
}

impl ActionExample {
    pub fn new(user: &str, text: &str) -> Self {
        Self { user: user.to_string(), content: Content::text(text) }
    }

    pub fn answered_with(user: &str, text: &str, action: &str) -> Self {
        Self { user: user.to_string(), content: Content::text(text).with_action(action) }
    }
}

/// Capability descriptor the host dispatcher matches messages against.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub name: String,
    pub similes: Vec<String>,
    pub description: String,
    pub examples: Vec<Vec<ActionExample>>,
}

impl ActionDescriptor {
    pub fn answers_to(&self, name: &str) -> bool {
        let name = name.trim();
        self.name.eq_ignore_ascii_case(name)
            || self.similes.iter().any(|simile| simile.eq_ignore_ascii_case(name))
    }
}

/// Receives the reply an action produces for the conversation.
#[async_trait]
pub trait HandlerCallback: Send + Sync {
    async fn deliver(&self, content: Content) -> Result<()>;
}

#[async_trait]
impl<F> HandlerCallback for F
where
    F: Fn(Content) -> Result<()> + Send + Sync,
{
    async fn deliver(&self, content: Content) -> Result<()> {
        (self)(content)
    }
}

#[async_trait]
pub trait Action: Send + Sync {
    fn descriptor(&self) -> &ActionDescriptor;

    async fn validate(&self, runtime: &dyn HostRuntime, message: &Memory) -> bool;

    async fn handle(
        &self,
        runtime: &dyn HostRuntime,
        message: &Memory,
        state: Option<ConversationState>,
        callback: Option<&dyn HandlerCallback>,
    ) -> Result<bool>;
}

/// A named bundle of actions registered with the host.
#[derive(Clone)]
pub struct Plugin {
    pub name: String,
    pub description: String,
    pub actions: Vec<Arc<dyn Action>>,
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let actions =
            self.actions.iter().map(|action| action.descriptor().name.as_str()).collect::<Vec<_>>();
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("actions", &actions)
            .finish()
    }
}

#[derive(Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    pub fn from_plugin(plugin: &Plugin) -> Self {
        let mut registry = Self::default();
        for action in &plugin.actions {
            registry.register(Arc::clone(action));
        }
        registry
    }

    pub fn register(&mut self, action: Arc<dyn Action>) {
        self.actions.insert(action.descriptor().name.to_ascii_uppercase(), action);
    }

    /// Looks an action up by its name or any of its similes, ignoring case.
    pub fn find(&self, name: &str) -> Option<Arc<dyn Action>> {
        if let Some(action) = self.actions.get(&name.trim().to_ascii_uppercase()) {
            return Some(Arc::clone(action));
        }
        self.actions.values().find(|action| action.descriptor().answers_to(name)).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names = self
            .actions
            .values()
            .map(|action| action.descriptor().name.clone())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::Result;
    use async_trait::async_trait;
    use tipping_core::{Content, ConversationState, Memory};

    use super::{Action, ActionDescriptor, ActionRegistry, HandlerCallback, Plugin};
    use crate::runtime::HostRuntime;

    struct EchoAction {
        descriptor: ActionDescriptor,
    }

    impl EchoAction {
        fn new() -> Self {
            Self {
                descriptor: ActionDescriptor {
                    name: "ECHO".to_string(),
                    similes: vec!["REPEAT".to_string(), "SAY_AGAIN".to_string()],
                    description: "Echo the message back".to_string(),
                    examples: Vec::new(),
                },
            }
        }
    }

    #[async_trait]
    impl Action for EchoAction {
        fn descriptor(&self) -> &ActionDescriptor {
            &self.descriptor
        }

        async fn validate(&self, _runtime: &dyn HostRuntime, _message: &Memory) -> bool {
            true
        }

        async fn handle(
            &self,
            _runtime: &dyn HostRuntime,
            message: &Memory,
            _state: Option<ConversationState>,
            callback: Option<&dyn HandlerCallback>,
        ) -> Result<bool> {
            if let Some(callback) = callback {
                callback.deliver(message.content.clone()).await?;
            }
            Ok(true)
        }
    }

    fn registry() -> ActionRegistry {
        let plugin = Plugin {
            name: "echo".to_string(),
            description: "test plugin".to_string(),
            actions: vec![Arc::new(EchoAction::new())],
        };
        ActionRegistry::from_plugin(&plugin)
    }

    #[test]
    fn finds_action_by_name_and_simile_ignoring_case() {
        let registry = registry();
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());
        assert!(registry.find("echo").is_some());
        assert!(registry.find("say_again").is_some());
        assert!(registry.find(" Repeat ").is_some());
        assert!(registry.find("TIP").is_none());
        assert_eq!(registry.names(), vec!["ECHO".to_string()]);
    }

    #[tokio::test]
    async fn closures_act_as_callbacks() {
        let delivered = Mutex::new(Vec::new());
        let callback = |content: Content| -> Result<()> {
            delivered.lock().expect("delivery log lock").push(content.text);
            Ok(())
        };

        callback.deliver(Content::text("hello")).await.expect("delivery succeeds");
        assert_eq!(*delivered.lock().expect("delivery log lock"), vec!["hello".to_string()]);
    }
}
