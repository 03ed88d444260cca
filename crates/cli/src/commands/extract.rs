use std::fs;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use serde_json::json;
use tipping_agent::action::{Action, HandlerCallback};
use tipping_agent::llm::{CompletionBackend, ModelBackend};
use tipping_agent::provider::HttpLlmClient;
use tipping_agent::runtime::TranscriptRuntime;
use tipping_agent::tip::TipAction;
use tipping_core::config::{AppConfig, LoadOptions};
use tipping_core::{ApplicationError, CompletionResult, Content, Memory, MissingField};
use uuid::Uuid;

use super::CommandResult;

const COMMAND: &str = "extract";

pub fn run(transcript_path: &Path, agent_name: &str, json_output: bool) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return failure(ApplicationError::Configuration(error.to_string())),
    };
    crate::init_logging(&config.logging);

    let client = match HttpLlmClient::from_config(&config.llm) {
        Ok(client) => client,
        Err(error) => {
            return failure(ApplicationError::Integration(format!("{error:#}")));
        }
    };

    execute(&config, CompletionBackend::new(client), transcript_path, agent_name, json_output)
}

/// Runs the TIP action over a transcript file with the given backend.
pub fn execute<B>(
    config: &AppConfig,
    backend: B,
    transcript_path: &Path,
    agent_name: &str,
    json_output: bool,
) -> CommandResult
where
    B: ModelBackend,
{
    let raw = match fs::read_to_string(transcript_path) {
        Ok(raw) => raw,
        Err(error) => {
            return failure(ApplicationError::InvalidInput(format!(
                "could not read transcript `{}`: {error}",
                transcript_path.display()
            )));
        }
    };
    let messages = match parse_transcript(&raw) {
        Ok(messages) => messages,
        Err(error) => return failure(error),
    };

    let runtime = TranscriptRuntime::new(agent_name, backend);
    let mut trigger = None;
    for message in messages {
        if let Err(error) = runtime.record(message.clone()) {
            return failure(ApplicationError::Host(format!("{error:#}")));
        }
        trigger = Some(message);
    }
    let Some(trigger) = trigger else {
        return failure(ApplicationError::InvalidInput("transcript has no messages".to_string()));
    };

    let async_runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(async_runtime) => async_runtime,
        Err(error) => {
            return failure(ApplicationError::Host(format!(
                "failed to initialize async runtime: {error}"
            )));
        }
    };

    let action = TipAction::from_config(&config.extraction);
    let delivered = Mutex::new(None);
    let outcome = async_runtime.block_on(async {
        if !action.validate(&runtime, &trigger).await {
            return Err(ApplicationError::InvalidInput(format!(
                "{} is not allowed to start a tip",
                trigger.user
            )));
        }
        let record = |content: Content| -> Result<()> {
            if let Ok(mut slot) = delivered.lock() {
                *slot = Some(content);
            }
            Ok(())
        };
        let callback: &dyn HandlerCallback = &record;
        action
            .run(&runtime, &trigger, None, Some(callback))
            .await
            .map_err(ApplicationError::from)
    });

    let result = match outcome {
        Ok(result) => result,
        Err(error) => return failure(error),
    };
    let reply = delivered.into_inner().ok().flatten().unwrap_or_default();

    let message = summarize(&result, &reply);
    let payload = json_output.then(|| json!({ "result": result, "reply": reply }));
    CommandResult::success_with_payload(COMMAND, message, payload)
}

/// Reads `user: text` lines. Blank lines and `#` comments are skipped.
pub fn parse_transcript(raw: &str) -> Result<Vec<Memory>, ApplicationError> {
    let mut messages = Vec::new();
    for (index, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parsed = line
            .split_once(':')
            .map(|(user, text)| (user.trim(), text.trim()))
            .filter(|(user, text)| !user.is_empty() && !text.is_empty());
        let Some((user, text)) = parsed else {
            return Err(ApplicationError::InvalidInput(format!(
                "transcript line {} is not `user: text`",
                index + 1
            )));
        };
        messages.push(Memory::new(user, text));
    }

    if messages.is_empty() {
        return Err(ApplicationError::InvalidInput("transcript has no messages".to_string()));
    }
    Ok(messages)
}

fn summarize(result: &CompletionResult, reply: &Content) -> String {
    match result {
        CompletionResult::Complete { intent } => format!(
            "{}: tip of {} {} to {}",
            reply.text,
            intent.amount.as_deref().unwrap_or_default(),
            intent.currency.as_deref().unwrap_or_default(),
            intent.recipient_address.as_deref().unwrap_or_default()
        ),
        CompletionResult::Incomplete { missing, .. } => format!(
            "tip incomplete (missing {}): {}",
            missing.iter().map(MissingField::label).collect::<Vec<_>>().join(", "),
            reply.text
        ),
    }
}

fn failure(error: ApplicationError) -> CommandResult {
    let error_class = error.error_class();
    let exit_code = exit_code_for(&error);
    let detail = error.to_string();
    let interface = error.into_interface(correlation_id());

    tracing::warn!(
        event_name = "cli.extract.failed",
        error_class,
        correlation_id = interface.correlation_id(),
        error = %detail,
        "extract command failed"
    );

    CommandResult::failure(
        COMMAND,
        error_class,
        format!(
            "{} ({detail}; correlation_id: {})",
            interface.user_message(),
            interface.correlation_id()
        ),
        exit_code,
    )
}

fn exit_code_for(error: &ApplicationError) -> u8 {
    match error {
        ApplicationError::Configuration(_) => 2,
        ApplicationError::Integration(_) => 3,
        ApplicationError::Extraction(_) | ApplicationError::Host(_) => 4,
        ApplicationError::InvalidInput(_) => 5,
    }
}

fn correlation_id() -> String {
    format!("extract-{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use tipping_core::{ApplicationError, ParseError};

    use super::{correlation_id, exit_code_for, parse_transcript};

    #[test]
    fn transcript_lines_split_on_first_colon() {
        let messages = parse_transcript(
            "# tipping chat\nalice: tip 200 to @bob\n\nalice:   send it to 0xabc: thanks  \n",
        )
        .expect("transcript parses");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].user, "alice");
        assert_eq!(messages[1].content.text, "send it to 0xabc: thanks");
    }

    #[test]
    fn correlation_ids_are_unique_per_failure() {
        let first = correlation_id();
        let second = correlation_id();
        assert!(first.starts_with("extract-"));
        assert_eq!(first.len(), "extract-".len() + 32);
        assert_ne!(first, second);
    }

    #[test]
    fn exit_codes_follow_error_layer() {
        assert_eq!(exit_code_for(&ApplicationError::Configuration("bad".to_string())), 2);
        assert_eq!(exit_code_for(&ApplicationError::Integration("down".to_string())), 3);
        assert_eq!(
            exit_code_for(&ApplicationError::Extraction(ParseError::MissingKey { key: "amount" })),
            4
        );
        assert_eq!(exit_code_for(&ApplicationError::InvalidInput("empty".to_string())), 5);
    }

    #[test]
    fn malformed_lines_are_invalid_input() {
        let error = parse_transcript("alice: hi\njust text").expect_err("line 2 has no user");
        assert!(matches!(
            error,
            ApplicationError::InvalidInput(ref message) if message.contains("line 2")
        ));

        assert!(matches!(
            parse_transcript("\n# only comments\n"),
            Err(ApplicationError::InvalidInput(_))
        ));
    }
}
