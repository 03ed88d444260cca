//! The TIP action: extract tipping intent from a conversation and either
//! confirm it or ask the sender for whatever is still missing.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tipping_core::config::ExtractionConfig;
use tipping_core::{
    CompletenessPolicy, CompletionResult, Content, ConversationState, Memory, MissingField,
    ModelTier, TipIntent,
};

use crate::action::{Action, ActionDescriptor, ActionExample, HandlerCallback, Plugin};
use crate::error::TipError;
use crate::guard::{GuardDecision, TipGuard};
use crate::llm::BackendError;
use crate::runtime::HostRuntime;

pub const TIP_ACTION_NAME: &str = "TIP";
pub const TIP_SIMILES: [&str; 3] = ["SEND_TIP", "GIVE_TIP", "TRANSFER_TIP"];
pub const TIP_DESCRIPTION: &str = "Facilitate tipping between users based on their prompts.";
pub const DONE_TEXT: &str = "DONE!";

pub const TIP_EXTRACTION_TEMPLATE: &str = r#"Respond with a JSON markdown block containing only the extracted values. Use the `null` special value (without quotes) for any values that cannot be determined.

Example response:
```json
{
    "evm_address": "0xRecipientEVMAddressHere",
    "recipient_name": "@RecipientNameHere",
    "amount": "AmountHere",
    "currency": "$CurrencyHere",
    "reason": "ReasonForTippingHere"
}
```

Given the last message of {{senderName}} use the relevant recent messages to gather the tipping information in the JSON data structure.
{{recentMessages}}

Given the recent messages from {{senderName}} who expresses the intention to tip a specific @recipient, extract the following information shared by {{senderName}} about the requested tip:
- Recipient EVM address
- Recipient name (optional)
- Amount to tip
- Currency
- Reason for tipping (optional)

Ensure that the JSON payload is specific to the tipping intent identified by the recipient's identifier, which could be the @name or the Ethereum address.

Respond with a JSON markdown block containing only the extracted values."#;

pub const MISSING_ELEMENT_TEMPLATE: &str = r#"# Messages from which we are extracting the tipping information for a given @recipient
{{recentMessages}}

# Instructions: {{senderName}} is requesting to tip a specific @recipient. Your goal is to determine the missing information required to complete the tipping process.
Identify any missing information that is required to complete the tip. This includes the recipient's EVM address, recipient's name, amount, currency, and reason.

Based on the recent messages, extract the following information about the requested tip:
- Recipient's EVM address (mandatory)
- Recipient's name (optional)
- Amount to tip (mandatory)
- Currency (mandatory)
- Reason for tipping (optional)

If any mandatory information is missing, ask the user for the specific missing information to fulfill the request in the {{agentName}} style. If any optional information is missing, ask the user if they could provide it to offer more context, also in the {{agentName}} style. Do not acknowledge this request; just ask for the missing information directly. Only respond with the text asking for the missing information in the {{agentName}} personality."#;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TipIntentExtractor {
    policy: CompletenessPolicy,
    tier: ModelTier,
}

impl TipIntentExtractor {
    pub fn new(policy: CompletenessPolicy, tier: ModelTier) -> Self {
        Self { policy, tier }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(config.completeness_policy(), config.model_tier)
    }

    /// Runs one extraction pass over the conversation.
    ///
    /// A missing `state` is composed by the host from `message`; an existing
    /// one is refreshed with it. The follow-up question is only generated
    /// when the intent is incomplete.
    pub async fn extract(
        &self,
        runtime: &dyn HostRuntime,
        state: Option<ConversationState>,
        message: &Memory,
    ) -> Result<CompletionResult, TipError> {
        let state = match state {
            None => runtime.compose_state(message).await,
            Some(state) => runtime.update_state(state, message).await,
        }
        .map_err(TipError::host)?;

        tracing::info!(
            event_name = "tip.extraction.started",
            sender = %message.user,
            tier = %self.tier,
            require_reason = self.policy.require_reason,
            "extracting tip intent"
        );

        let prompt = runtime.render_prompt(&state, TIP_EXTRACTION_TEMPLATE).map_err(TipError::host)?;
        tracing::debug!(
            event_name = "tip.extraction.prompt_rendered",
            prompt_chars = prompt.len(),
            "extraction prompt rendered"
        );

        let raw = runtime
            .backend()
            .generate_structured(&prompt, self.tier)
            .await
            .map_err(|error| {
                if let BackendError::Malformed(parse_error) = &error {
                    tracing::warn!(
                        event_name = "tip.extraction.malformed",
                        error = %parse_error,
                        "model returned unparseable tip payload"
                    );
                }
                TipError::from(error)
            })?;

        let intent = TipIntent::from_value(&raw).map_err(|error| {
            tracing::warn!(
                event_name = "tip.extraction.malformed",
                error = %error,
                "model returned unexpected tip payload"
            );
            TipError::from(error)
        })?;

        tracing::info!(
            event_name = "tip.extraction.parsed",
            has_address = intent.present(MissingField::RecipientAddress),
            has_recipient_name = intent.present(MissingField::RecipientName),
            has_amount = intent.present(MissingField::Amount),
            has_currency = intent.present(MissingField::Currency),
            has_reason = intent.present(MissingField::Reason),
            "tip intent parsed"
        );

        let missing = intent.missing_fields(self.policy);
        if missing.is_empty() {
            tracing::info!(event_name = "tip.extraction.complete", "tip intent complete");
            return Ok(CompletionResult::Complete { intent });
        }

        let follow_up_prompt =
            runtime.render_prompt(&state, MISSING_ELEMENT_TEMPLATE).map_err(TipError::host)?;
        let follow_up_text =
            runtime.backend().generate_text(&follow_up_prompt, self.tier).await?;

        tracing::info!(
            event_name = "tip.extraction.incomplete",
            missing = %missing.iter().map(MissingField::wire_key).collect::<Vec<_>>().join(","),
            "tip intent incomplete, asking for missing details"
        );

        Ok(CompletionResult::Incomplete { intent, missing, follow_up_text })
    }
}

/// Reply payload for an extraction outcome, shaped for the host's message
/// convention.
pub fn completion_content(result: &CompletionResult) -> Content {
    match result {
        CompletionResult::Complete { intent } => {
            Content::text(DONE_TEXT)
                .with_extra("tipInformation", json!({ "tip": { "tipInformation": intent } }))
        }
        CompletionResult::Incomplete { follow_up_text, .. } => {
            Content::text(follow_up_text.clone()).with_extra("content", json!({ "error": true }))
        }
    }
}

pub struct TipAction {
    descriptor: ActionDescriptor,
    extractor: TipIntentExtractor,
    guard: TipGuard,
}

impl TipAction {
    pub fn new(extractor: TipIntentExtractor, guard: TipGuard) -> Self {
        Self { descriptor: tip_descriptor(), extractor, guard }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(
            TipIntentExtractor::from_config(config),
            TipGuard::from_allowed_senders(config.allowed_senders.as_deref()),
        )
    }

    /// Extracts the intent and delivers the reply. No reply is delivered
    /// when extraction fails.
    pub async fn run(
        &self,
        runtime: &dyn HostRuntime,
        message: &Memory,
        state: Option<ConversationState>,
        callback: Option<&dyn HandlerCallback>,
    ) -> Result<CompletionResult, TipError> {
        let result = self.extractor.extract(runtime, state, message).await?;

        if let Some(callback) = callback {
            callback.deliver(completion_content(&result)).await.map_err(TipError::host)?;
        }
        Ok(result)
    }
}

impl Default for TipAction {
    fn default() -> Self {
        Self::new(TipIntentExtractor::default(), TipGuard::allow_all())
    }
}

#[async_trait]
impl Action for TipAction {
    fn descriptor(&self) -> &ActionDescriptor {
        &self.descriptor
    }

    async fn validate(&self, _runtime: &dyn HostRuntime, message: &Memory) -> bool {
        match self.guard.evaluate(&message.user) {
            GuardDecision::Allow => true,
            GuardDecision::Deny { reason_code, .. } => {
                tracing::info!(
                    event_name = "tip.validation.denied",
                    sender = %message.user,
                    reason_code,
                    "tip request rejected by guard"
                );
                false
            }
        }
    }

    async fn handle(
        &self,
        runtime: &dyn HostRuntime,
        message: &Memory,
        state: Option<ConversationState>,
        callback: Option<&dyn HandlerCallback>,
    ) -> Result<bool> {
        self.run(runtime, message, state, callback).await?;
        Ok(true)
    }
}

pub fn tip_descriptor() -> ActionDescriptor {
    ActionDescriptor {
        name: TIP_ACTION_NAME.to_string(),
        similes: TIP_SIMILES.iter().map(|simile| simile.to_string()).collect(),
        description: TIP_DESCRIPTION.to_string(),
        examples: tip_examples(),
    }
}

pub fn tip_examples() -> Vec<Vec<ActionExample>> {
    vec![
        vec![
            ActionExample::new(
                "{{user1}}",
                "Hey {{agentName}}, please tip $ETH to @vitalik for creating Ethereum and bringing it there!",
            ),
            ActionExample::new("{{user1}}", "A total of 10000 $ETH!"),
            ActionExample::new("{{user1}}", "0xd8da6bf26964af9d7eed9e03e53415d37aa96045"),
            ActionExample::answered_with("{{user2}}", "Copy that! Let's do that", TIP_ACTION_NAME),
        ],
        vec![
            ActionExample::new("{{user1}}", "Tipping 50 $DAI to @jane for her great presentation!"),
            ActionExample::new("{{user1}}", "0xabcdefabcdefabcdefabcdefabcdefabcdefabcdef"),
            ActionExample::answered_with("{{user2}}", "Tip sent!", TIP_ACTION_NAME),
        ],
        vec![
            ActionExample::new("{{user1}}", "Please tip 200 to @bob for his help with the project!"),
            ActionExample::new("{{user1}}", "with $USDC!"),
            ActionExample::new("{{user1}}", "@bob address is 0x9876543210fedcba9876543210fedcba98765432"),
            ActionExample::answered_with(
                "{{user2}}",
                "Done @bob received your tip! ",
                TIP_ACTION_NAME,
            ),
        ],
    ]
}

pub fn tipping_plugin(config: &ExtractionConfig) -> Plugin {
    Plugin {
        name: "tipping".to_string(),
        description: "Agent tipping and facilitating tipping actions".to_string(),
        actions: vec![std::sync::Arc::new(TipAction::from_config(config))],
    }
}
