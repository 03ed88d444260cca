use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::parsing::ParseError;

/// Literal the extraction prompt asks the model to emit for values it cannot determine.
pub const ABSENCE_TOKEN: &str = "null";

/// Wire keys of the extraction payload, in prompt order.
pub const INTENT_WIRE_KEYS: [&str; 5] =
    ["evm_address", "recipient_name", "amount", "currency", "reason"];

/// Tipping details extracted from a conversation.
///
/// Values are kept exactly as the model produced them. `amount` in particular
/// stays textual; validating it as a monetary value happens downstream.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TipIntent {
    #[serde(rename = "evm_address")]
    pub recipient_address: Option<String>,
    pub recipient_name: Option<String>,
    pub amount: Option<String>,
    pub currency: Option<String>,
    pub reason: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingField {
    RecipientAddress,
    RecipientName,
    Amount,
    Currency,
    Reason,
}

impl MissingField {
    pub const ALL: [MissingField; 5] = [
        MissingField::RecipientAddress,
        MissingField::RecipientName,
        MissingField::Amount,
        MissingField::Currency,
        MissingField::Reason,
    ];

    pub fn wire_key(&self) -> &'static str {
        match self {
            Self::RecipientAddress => "evm_address",
            Self::RecipientName => "recipient_name",
            Self::Amount => "amount",
            Self::Currency => "currency",
            Self::Reason => "reason",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::RecipientAddress => "recipient EVM address",
            Self::RecipientName => "recipient name",
            Self::Amount => "amount",
            Self::Currency => "currency",
            Self::Reason => "reason for tipping",
        }
    }

    /// Address, amount and currency block completion regardless of policy.
    pub fn is_mandatory(&self) -> bool {
        matches!(self, Self::RecipientAddress | Self::Amount | Self::Currency)
    }
}

/// Which fields must be present before a tip counts as complete.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletenessPolicy {
    pub require_reason: bool,
}

impl CompletenessPolicy {
    pub fn requires(&self, field: MissingField) -> bool {
        field.is_mandatory() || (self.require_reason && field == MissingField::Reason)
    }
}

impl TipIntent {
    /// Builds an intent from the model's structured response.
    ///
    /// Every wire key must be present. JSON `null` becomes `None`; numbers
    /// and booleans are kept in their textual form.
    pub fn from_value(value: &Value) -> Result<Self, ParseError> {
        let object = match value {
            Value::Object(object) => object,
            other => return Err(ParseError::NotAnObject { found: json_kind(other) }),
        };

        if let Some(key) = INTENT_WIRE_KEYS.into_iter().find(|key| !object.contains_key(*key)) {
            return Err(ParseError::MissingKey { key });
        }

        let field = |key: &'static str| -> Result<Option<String>, ParseError> {
            match object.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(text)) => Ok(Some(text.clone())),
                Some(Value::Number(number)) => Ok(Some(number.to_string())),
                Some(Value::Bool(flag)) => Ok(Some(flag.to_string())),
                Some(Value::Array(_)) | Some(Value::Object(_)) => {
                    Err(ParseError::InvalidField { key })
                }
            }
        };

        Ok(Self {
            recipient_address: field("evm_address")?,
            recipient_name: field("recipient_name")?,
            amount: field("amount")?,
            currency: field("currency")?,
            reason: field("reason")?,
        })
    }

    pub fn value(&self, field: MissingField) -> Option<&str> {
        let raw = match field {
            MissingField::RecipientAddress => &self.recipient_address,
            MissingField::RecipientName => &self.recipient_name,
            MissingField::Amount => &self.amount,
            MissingField::Currency => &self.currency,
            MissingField::Reason => &self.reason,
        };
        raw.as_deref()
    }

    /// True when the field carries a value other than the absence token.
    pub fn present(&self, field: MissingField) -> bool {
        self.value(field).map(|value| !is_absence_token(value)).unwrap_or(false)
    }

    pub fn missing_fields(&self, policy: CompletenessPolicy) -> Vec<MissingField> {
        MissingField::ALL
            .into_iter()
            .filter(|field| policy.requires(*field) && !self.present(*field))
            .collect()
    }

    pub fn is_complete(&self, policy: CompletenessPolicy) -> bool {
        self.missing_fields(policy).is_empty()
    }
}

/// Outcome of one extraction pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompletionResult {
    Complete { intent: TipIntent },
    Incomplete { intent: TipIntent, missing: Vec<MissingField>, follow_up_text: String },
}

impl CompletionResult {
    pub fn intent(&self) -> &TipIntent {
        match self {
            Self::Complete { intent } | Self::Incomplete { intent, .. } => intent,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }
}

fn is_absence_token(value: &str) -> bool {
    value.trim() == ABSENCE_TOKEN
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{CompletenessPolicy, MissingField, TipIntent};
    use crate::parsing::ParseError;

    fn full_intent() -> TipIntent {
        TipIntent::from_value(&json!({
            "evm_address": "0xd8da6bf26964af9d7eed9e03e53415d37aa96045",
            "recipient_name": "vitalik",
            "amount": "10000",
            "currency": "$ETH",
            "reason": "creating Ethereum"
        }))
        .expect("full payload parses")
    }

    #[test]
    fn full_payload_is_complete() {
        let intent = full_intent();
        assert_eq!(intent.amount.as_deref(), Some("10000"));
        assert!(intent.is_complete(CompletenessPolicy::default()));
        assert!(intent.is_complete(CompletenessPolicy { require_reason: true }));
    }

    #[test]
    fn absence_token_counts_as_missing_for_each_mandatory_field() {
        for (key, field) in [
            ("evm_address", MissingField::RecipientAddress),
            ("amount", MissingField::Amount),
            ("currency", MissingField::Currency),
        ] {
            let mut payload = serde_json::to_value(full_intent()).expect("serializes");
            payload[key] = json!("null");
            let intent = TipIntent::from_value(&payload).expect("payload parses");

            assert_eq!(intent.missing_fields(CompletenessPolicy::default()), vec![field], "{key}");
            assert_eq!(intent.value(field), Some("null"), "raw token is preserved for {key}");
        }
    }

    #[test]
    fn json_null_counts_as_absence() {
        let intent = TipIntent::from_value(&json!({
            "evm_address": null,
            "recipient_name": null,
            "amount": "200",
            "currency": "null",
            "reason": null
        }))
        .expect("payload with nulls parses");

        assert_eq!(intent.recipient_address, None);
        assert_eq!(
            intent.missing_fields(CompletenessPolicy::default()),
            vec![MissingField::RecipientAddress, MissingField::Currency]
        );
    }

    #[test]
    fn missing_key_is_a_parse_error() {
        let error = TipIntent::from_value(&json!({ "amount": "200" }))
            .expect_err("partial payload must fail");
        assert_eq!(error, ParseError::MissingKey { key: "evm_address" });

        let mut payload = serde_json::to_value(full_intent()).expect("serializes");
        payload.as_object_mut().expect("object payload").remove("currency");
        assert_eq!(
            TipIntent::from_value(&payload).expect_err("missing currency must fail"),
            ParseError::MissingKey { key: "currency" }
        );
    }

    #[test]
    fn reason_only_blocks_completion_when_required() {
        let mut intent = full_intent();
        intent.reason = Some("null".to_string());

        assert!(intent.is_complete(CompletenessPolicy::default()));
        assert_eq!(
            intent.missing_fields(CompletenessPolicy { require_reason: true }),
            vec![MissingField::Reason]
        );
    }

    #[test]
    fn recipient_name_is_never_required() {
        let mut intent = full_intent();
        intent.recipient_name = None;
        assert!(intent.is_complete(CompletenessPolicy { require_reason: true }));
    }

    #[test]
    fn numeric_amount_is_kept_as_text() {
        let mut payload = serde_json::to_value(full_intent()).expect("serializes");
        payload["amount"] = json!(200);
        let intent = TipIntent::from_value(&payload).expect("numeric amount parses");
        assert_eq!(intent.amount.as_deref(), Some("200"));
    }

    #[test]
    fn structured_values_in_fields_are_rejected() {
        let mut payload = serde_json::to_value(full_intent()).expect("serializes");
        payload["amount"] = json!({ "value": 10 });
        let error = TipIntent::from_value(&payload).expect_err("object amount must fail");
        assert_eq!(error, ParseError::InvalidField { key: "amount" });
    }

    #[test]
    fn payload_without_known_keys_is_rejected() {
        let error =
            TipIntent::from_value(&json!({ "tip": "yes" })).expect_err("unknown shape must fail");
        assert_eq!(error, ParseError::MissingKey { key: "evm_address" });

        let error = TipIntent::from_value(&json!(["evm_address"])).expect_err("array must fail");
        assert_eq!(error, ParseError::NotAnObject { found: "array" });
    }

    #[test]
    fn wire_format_uses_evm_address_key() {
        let payload = serde_json::to_value(full_intent()).expect("serializes");
        assert_eq!(payload["evm_address"], "0xd8da6bf26964af9d7eed9e03e53415d37aa96045");
        assert!(payload.get("recipient_address").is_none());
    }
}
