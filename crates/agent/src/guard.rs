use std::collections::BTreeSet;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Deny { reason_code: &'static str, user_message: String },
}

/// Decides whether a sender may start a tip.
///
/// Without an allow-list every sender is accepted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TipGuard {
    allowed_senders: Option<BTreeSet<String>>,
}

impl TipGuard {
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn allow_only<I, S>(senders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed_senders =
            senders.into_iter().map(|sender| normalize_sender(sender.as_ref())).collect();
        Self { allowed_senders: Some(allowed_senders) }
    }

    pub fn from_allowed_senders(senders: Option<&[String]>) -> Self {
        match senders {
            Some(senders) => Self::allow_only(senders),
            None => Self::allow_all(),
        }
    }

    pub fn evaluate(&self, sender: &str) -> GuardDecision {
        let Some(allowed_senders) = &self.allowed_senders else {
            return GuardDecision::Allow;
        };

        let normalized = normalize_sender(sender);
        if normalized.is_empty() {
            return GuardDecision::Deny {
                reason_code: "tip_sender_unknown",
                user_message: "I can't tell who is asking to tip, so I can't start one.".to_string(),
            };
        }
        if allowed_senders.contains(&normalized) {
            return GuardDecision::Allow;
        }

        GuardDecision::Deny {
            reason_code: "tip_sender_not_allowed",
            user_message: format!("{sender} is not allowed to send tips through this agent."),
        }
    }
}

fn normalize_sender(sender: &str) -> String {
    sender.trim().trim_start_matches('@').to_ascii_lowercase()
}
