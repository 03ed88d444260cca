//! Domain model and shared plumbing for the tipping action.
//!
//! Everything here is free of I/O: intent records and completeness rules,
//! the host message/state model, prompt rendering, structured-output parsing,
//! configuration loading and the error taxonomy shared with the agent and CLI.

pub mod config;
pub mod domain;
pub mod errors;
pub mod parsing;
pub mod prompt;

pub use domain::intent::{
    CompletenessPolicy, CompletionResult, MissingField, TipIntent, ABSENCE_TOKEN,
    INTENT_WIRE_KEYS,
};
pub use domain::message::{Content, Memory};
pub use domain::model::ModelTier;
pub use domain::state::ConversationState;
pub use errors::{ApplicationError, InterfaceError};
pub use parsing::{parse_json_block, ParseError};
pub use prompt::{PromptError, PromptRenderer};
