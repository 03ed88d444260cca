//! Agent plugin that turns tipping conversations into structured intents.
//!
//! The flow for one message:
//! 1. The host composes (or refreshes) a [`tipping_core::ConversationState`].
//! 2. [`tip::TipIntentExtractor`] renders the extraction prompt and asks the
//!    [`llm::ModelBackend`] for a JSON object.
//! 3. The parsed [`tipping_core::TipIntent`] is checked against the
//!    completeness policy. Only an incomplete intent triggers a second,
//!    free-text generation asking the sender for the missing details.
//! 4. [`tip::TipAction`] hands the outcome to the host callback.
//!
//! The model is a translator only. It never decides whether a tip is
//! complete; that is the deterministic check in `tipping_core`.

pub mod action;
pub mod error;
pub mod guard;
pub mod llm;
pub mod provider;
pub mod runtime;
pub mod tip;

pub use action::{Action, ActionDescriptor, ActionExample, ActionRegistry, HandlerCallback, Plugin};
pub use error::TipError;
pub use guard::{GuardDecision, TipGuard};
pub use llm::{BackendError, CompletionBackend, LlmClient, ModelBackend};
pub use provider::HttpLlmClient;
pub use runtime::{HostRuntime, TranscriptRuntime};
pub use tip::{tipping_plugin, TipAction, TipIntentExtractor};
