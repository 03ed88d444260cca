use serde::Serialize;
use tipping_agent::action::ActionRegistry;
use tipping_agent::provider::HttpLlmClient;
use tipping_agent::tip::{tipping_plugin, TIP_ACTION_NAME, TIP_SIMILES};
use tipping_core::config::{AppConfig, LlmProvider, LoadOptions};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_provider_readiness(&config));
            checks.push(check_plugin_registration(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["provider_readiness", "plugin_registration"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_provider_readiness(config: &AppConfig) -> DoctorCheck {
    let credentials = match (config.llm.provider, config.llm.api_key.is_some()) {
        (LlmProvider::Ollama, false) => "no api key (not required)",
        (_, true) => "api key present",
        (provider, false) => {
            return DoctorCheck {
                name: "provider_readiness",
                status: CheckStatus::Fail,
                details: format!("{provider:?} requires an api key"),
            };
        }
    };

    match HttpLlmClient::from_config(&config.llm) {
        Ok(client) => DoctorCheck {
            name: "provider_readiness",
            status: CheckStatus::Pass,
            details: format!(
                "{:?} client ready for `{}` at {}, {credentials}",
                config.llm.provider,
                config.llm.model_for(config.extraction.model_tier),
                client.endpoint()
            ),
        },
        Err(error) => DoctorCheck {
            name: "provider_readiness",
            status: CheckStatus::Fail,
            details: format!("{error:#}"),
        },
    }
}

fn check_plugin_registration(config: &AppConfig) -> DoctorCheck {
    let plugin = tipping_plugin(&config.extraction);
    let registry = ActionRegistry::from_plugin(&plugin);

    let unresolved = std::iter::once(TIP_ACTION_NAME)
        .chain(TIP_SIMILES)
        .filter(|name| registry.find(name).is_none())
        .collect::<Vec<_>>();

    if unresolved.is_empty() {
        DoctorCheck {
            name: "plugin_registration",
            status: CheckStatus::Pass,
            details: format!("plugin `{}` registers {}", plugin.name, registry.names().join(", ")),
        }
    } else {
        DoctorCheck {
            name: "plugin_registration",
            status: CheckStatus::Fail,
            details: format!("unresolved action names: {}", unresolved.join(", ")),
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
