use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use tipping_core::config::{AppConfig, LoadOptions};
use toml::Value;

struct ConfigField {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in effective_fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn effective_fields(config: &AppConfig) -> Vec<ConfigField> {
    let llm = &config.llm;
    let extraction = &config.extraction;
    let api_key = match &llm.api_key {
        Some(key) => redact_key(key.expose_secret()),
        None => "<unset>".to_string(),
    };
    let allowed_senders = match &extraction.allowed_senders {
        Some(senders) => format!("[{}]", senders.join(", ")),
        None => "<any>".to_string(),
    };

    vec![
        ConfigField {
            key: "llm.provider",
            value: format!("{:?}", llm.provider),
            env_keys: &["TIPPING_LLM_PROVIDER"],
        },
        ConfigField { key: "llm.api_key", value: api_key, env_keys: &["TIPPING_LLM_API_KEY"] },
        ConfigField {
            key: "llm.base_url",
            value: format!(
                "{} (effective: {})",
                llm.base_url.as_deref().unwrap_or("<unset>"),
                llm.effective_base_url()
            ),
            env_keys: &["TIPPING_LLM_BASE_URL"],
        },
        ConfigField { key: "llm.model", value: llm.model.clone(), env_keys: &["TIPPING_LLM_MODEL"] },
        ConfigField {
            key: "llm.small_model",
            value: llm.small_model.clone().unwrap_or_else(|| "<unset>".to_string()),
            env_keys: &["TIPPING_LLM_SMALL_MODEL"],
        },
        ConfigField {
            key: "llm.large_model",
            value: llm.large_model.clone().unwrap_or_else(|| "<unset>".to_string()),
            env_keys: &["TIPPING_LLM_LARGE_MODEL"],
        },
        ConfigField {
            key: "llm.timeout_secs",
            value: llm.timeout_secs.to_string(),
            env_keys: &["TIPPING_LLM_TIMEOUT_SECS"],
        },
        ConfigField {
            key: "extraction.require_reason",
            value: extraction.require_reason.to_string(),
            env_keys: &["TIPPING_EXTRACTION_REQUIRE_REASON"],
        },
        ConfigField {
            key: "extraction.model_tier",
            value: extraction.model_tier.to_string(),
            env_keys: &["TIPPING_EXTRACTION_MODEL_TIER"],
        },
        ConfigField {
            key: "extraction.allowed_senders",
            value: allowed_senders,
            env_keys: &["TIPPING_EXTRACTION_ALLOWED_SENDERS"],
        },
        ConfigField {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["TIPPING_LOGGING_LEVEL", "TIPPING_LOG_LEVEL"],
        },
        ConfigField {
            key: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["TIPPING_LOGGING_FORMAT", "TIPPING_LOG_FORMAT"],
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    ["tipping.toml", "config/tipping.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
