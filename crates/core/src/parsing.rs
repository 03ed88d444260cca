//! Structured-output parsing for model responses.
//!
//! Extraction prompts ask for "a JSON markdown block", so a response usually
//! looks like prose around a fenced ```json block. Models do not always
//! comply: some answer with a bare fence, some with raw JSON, some with an
//! object embedded in a sentence. All of these are accepted here.

use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("response did not contain valid JSON: {0}")]
    InvalidJson(String),
    #[error("expected a JSON object but found {found}")]
    NotAnObject { found: &'static str },
    #[error("field `{key}` must be a string, number, boolean or null")]
    InvalidField { key: &'static str },
    #[error("response is missing the `{key}` key")]
    MissingKey { key: &'static str },
}

/// Pulls the first JSON value out of a model response.
pub fn parse_json_block(response: &str) -> Result<Value, ParseError> {
    let candidate = fenced_block(response).unwrap_or(response).trim();

    match serde_json::from_str::<Value>(candidate) {
        Ok(value) => Ok(value),
        Err(error) => embedded_object(candidate)
            .or_else(|| embedded_object(response))
            .ok_or_else(|| ParseError::InvalidJson(error.to_string())),
    }
}

fn fenced_block(response: &str) -> Option<&str> {
    let (_, after_open) = response.split_once("```")?;
    // Skip the info string (`json`, `JSON`, ...) up to the end of the fence line.
    let body = match after_open.split_once('\n') {
        Some((info, rest)) if !info.trim_start().starts_with('{') => rest,
        _ => after_open,
    };
    let end = body.find("```").unwrap_or(body.len());
    Some(&body[..end])
}

fn embedded_object(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&text[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{parse_json_block, ParseError};

    #[test]
    fn parses_fenced_json_block_with_unquoted_null() {
        let response = "Here is the tip:\n```json\n{\n    \"evm_address\": null,\n    \"amount\": \"200\"\n}\n```\nLet me know!";
        let value = parse_json_block(response).expect("fenced block parses");
        assert_eq!(value, json!({ "evm_address": null, "amount": "200" }));
    }

    #[test]
    fn parses_bare_fence_and_raw_json() {
        let fenced = parse_json_block("```\n{\"currency\": \"$DAI\"}\n```").expect("bare fence");
        assert_eq!(fenced["currency"], "$DAI");

        let raw = parse_json_block("  {\"currency\": \"$ETH\"}  ").expect("raw json");
        assert_eq!(raw["currency"], "$ETH");
    }

    #[test]
    fn parses_object_embedded_in_prose() {
        let value = parse_json_block("Sure! {\"amount\": \"50\", \"currency\": \"$DAI\"} done")
            .expect("embedded object");
        assert_eq!(value["amount"], "50");
    }

    #[test]
    fn invalid_json_is_an_error() {
        let error = parse_json_block("I could not find any tipping details, sorry.")
            .expect_err("prose only must fail");
        assert!(matches!(error, ParseError::InvalidJson(_)));

        let error = parse_json_block("```json\n{\"amount\": \"50\",\n```")
            .expect_err("truncated block must fail");
        assert!(matches!(error, ParseError::InvalidJson(_)));
    }
}
