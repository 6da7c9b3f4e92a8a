use serde::{Deserialize, Serialize};
use std::fmt;

/// A transition the login flow should take next.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// Authentication is complete and a session exists.
    Success,
    /// The user must complete this provider.
    Multifactor { provider: String },
    /// A required provider is down and may not be skipped.
    MultifactorUnavailable { provider: String },
    AuthenticationFailure { reason: String },
    /// A service ticket was granted; its id is in the request context.
    GenerateServiceTicket,
    Error { reason: String },
}

impl Event {
    /// Short transition name.
    #[must_use]
    pub fn id(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Multifactor { .. } => "multifactor",
            Self::MultifactorUnavailable { .. } => "multifactor_unavailable",
            Self::AuthenticationFailure { .. } => "authentication_failure",
            Self::GenerateServiceTicket => "generate_service_ticket",
            Self::Error { .. } => "error",
        }
    }

    #[must_use]
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::Multifactor { provider } | Self::MultifactorUnavailable { provider } => {
                Some(provider)
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::AuthenticationFailure { reason } | Self::Error { reason } => Some(reason),
            _ => None,
        }
    }

    /// Events that stop the flow without granting anything.
    #[must_use]
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            Self::MultifactorUnavailable { .. }
                | Self::AuthenticationFailure { .. }
                | Self::Error { .. }
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.provider().or_else(|| self.reason()) {
            Some(detail) => write!(f, "{} ({detail})", self.id()),
            None => f.write_str(self.id()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_a_tag() {
        let event = Event::Multifactor {
            provider: "mfa-otp".to_string(),
        };
        let json = serde_json::to_value(&event).expect("json");
        assert_eq!(json["event"], "multifactor");
        assert_eq!(json["provider"], "mfa-otp");
        assert_eq!(event.to_string(), "multifactor (mfa-otp)");
        assert_eq!(Event::Success.to_string(), "success");
    }

    #[test]
    fn denials() {
        assert!(Event::MultifactorUnavailable {
            provider: "mfa-otp".to_string()
        }
        .is_denial());
        assert!(!Event::Success.is_denial());
        assert!(!Event::GenerateServiceTicket.is_denial());
    }
}
