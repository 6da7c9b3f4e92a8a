use super::{determine_failure_mode, FailureMode, MultifactorAuthenticationProvider};
use crate::{authentication::Authentication, services::RegisteredService};
use tracing::{debug, info, warn};

/// What a triggered provider means for the current request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TriggerOutcome {
    /// The user must complete this provider.
    Required(String),
    /// The provider is down and its failure mode denies.
    Unavailable(String),
    /// A bypass rule applies.
    Bypassed(String),
    /// The provider is down and is treated as satisfied.
    Assumed(String),
    /// The provider is down and is skipped.
    FailedOpen(String),
}

impl TriggerOutcome {
    #[must_use]
    pub fn provider_id(&self) -> &str {
        match self {
            Self::Required(id)
            | Self::Unavailable(id)
            | Self::Bypassed(id)
            | Self::Assumed(id)
            | Self::FailedOpen(id) => id,
        }
    }
}

/// Availability first, then bypass.
pub fn evaluate_provider(
    provider: &dyn MultifactorAuthenticationProvider,
    authentication: &Authentication,
    service: Option<&RegisteredService>,
) -> TriggerOutcome {
    let id = provider.id().to_string();

    if !provider.is_available(service) {
        let failure_mode = determine_failure_mode(service, provider);
        return match failure_mode {
            FailureMode::Closed => {
                warn!(provider = %id, %failure_mode, "multifactor provider is unavailable");
                TriggerOutcome::Unavailable(id)
            }
            FailureMode::Open => {
                info!(
                    provider = %id,
                    %failure_mode,
                    "multifactor provider is unavailable, skipping it"
                );
                TriggerOutcome::FailedOpen(id)
            }
            FailureMode::Phantom => {
                info!(
                    provider = %id,
                    %failure_mode,
                    "multifactor provider is unavailable, assuming it"
                );
                TriggerOutcome::Assumed(id)
            }
        };
    }

    if provider
        .bypass_evaluator()
        .should_execute(authentication, service, &id)
    {
        debug!(provider = %id, "multifactor provider required");
        TriggerOutcome::Required(id)
    } else {
        TriggerOutcome::Bypassed(id)
    }
}
