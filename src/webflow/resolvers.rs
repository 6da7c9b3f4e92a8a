//! Candidate resolvers. Each looks at one source of multifactor triggers and
//! proposes at most one event.

use super::{Event, RequestContext};
use crate::{
    authentication::Authentication,
    mfa::{evaluate_provider, MultifactorProviderRegistry, TriggerOutcome},
    services::RegisteredService,
};
use tracing::{debug, warn};

pub const DEFAULT_AUTHN_METHOD_PARAMETER: &str = "authn_method";
pub const PRINCIPAL_ATTRIBUTE_RESOLVER: &str = "principal-attribute";

/// One resolver's answer, plus the providers it skipped on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Proposal {
    event: Option<Event>,
    bypassed: Vec<String>,
    assumed: Vec<String>,
}

impl Proposal {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn of(event: Event) -> Self {
        Self {
            event: Some(event),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn event(&self) -> Option<&Event> {
        self.event.as_ref()
    }

    /// Providers a bypass rule skipped; recorded on the authentication.
    #[must_use]
    pub fn bypassed(&self) -> &[String] {
        &self.bypassed
    }

    /// Unavailable providers treated as satisfied.
    #[must_use]
    pub fn assumed(&self) -> &[String] {
        &self.assumed
    }

    pub(crate) fn into_parts(self) -> (Option<Event>, Vec<String>, Vec<String>) {
        (self.event, self.bypassed, self.assumed)
    }
}

pub trait CandidateEventResolver: Send + Sync {
    fn name(&self) -> &str;

    /// Must not mutate anything; resolvers may run in any order.
    fn propose(&self, context: &RequestContext) -> Proposal;
}

/// Evaluate a list of provider ids. A denial wins, otherwise the best ranked
/// required provider. With `strict`, an id that names no registered provider
/// is a denial, since the service cannot be satisfied.
fn propose_providers<'a>(
    ids: impl IntoIterator<Item = &'a str>,
    providers: &MultifactorProviderRegistry,
    authentication: &Authentication,
    service: Option<&RegisteredService>,
    strict: bool,
) -> Proposal {
    let mut proposal = Proposal::none();
    let mut denied = None;
    let mut required: Option<((i32, usize), String)> = None;

    for id in ids {
        let Some(provider) = providers.get(id) else {
            if strict {
                warn!(provider = id, "required multifactor provider is not registered");
                denied.get_or_insert_with(|| id.to_string());
            } else {
                debug!(provider = id, "ignoring unknown multifactor provider");
            }
            continue;
        };

        match evaluate_provider(provider.as_ref(), authentication, service) {
            TriggerOutcome::Required(id) => {
                let rank = providers.rank(&id).unwrap_or((i32::MAX, usize::MAX));
                if required.as_ref().map_or(true, |(best, _)| rank < *best) {
                    required = Some((rank, id));
                }
            }
            TriggerOutcome::Unavailable(id) => {
                denied.get_or_insert(id);
            }
            TriggerOutcome::Bypassed(id) => proposal.bypassed.push(id),
            TriggerOutcome::Assumed(id) => proposal.assumed.push(id),
            TriggerOutcome::FailedOpen(_) => {}
        }
    }

    proposal.event = match (denied, required) {
        (Some(provider), _) => Some(Event::MultifactorUnavailable { provider }),
        (None, Some((_, provider))) => Some(Event::Multifactor { provider }),
        (None, None) => None,
    };
    proposal
}

/// Provider requested explicitly by the caller, e.g. `authn_method=mfa-otp`.
pub struct RequestParameterResolver {
    parameter: String,
    providers: MultifactorProviderRegistry,
}

impl RequestParameterResolver {
    pub fn new(providers: MultifactorProviderRegistry) -> Self {
        Self {
            parameter: DEFAULT_AUTHN_METHOD_PARAMETER.to_string(),
            providers,
        }
    }

    #[must_use]
    pub fn with_parameter(mut self, parameter: &str) -> Self {
        self.parameter = parameter.to_string();
        self
    }
}

impl CandidateEventResolver for RequestParameterResolver {
    fn name(&self) -> &str {
        "request-parameter"
    }

    fn propose(&self, context: &RequestContext) -> Proposal {
        let (Some(requested), Some(authentication)) =
            (context.parameter(&self.parameter), context.authentication())
        else {
            return Proposal::none();
        };
        propose_providers(
            requested.split(',').map(str::trim).filter(|s| !s.is_empty()),
            &self.providers,
            authentication,
            context.registered_service(),
            false,
        )
    }
}

/// The service's providers, when its principal attribute trigger matches.
pub struct RegisteredServicePrincipalAttributeResolver {
    providers: MultifactorProviderRegistry,
}

impl RegisteredServicePrincipalAttributeResolver {
    pub fn new(providers: MultifactorProviderRegistry) -> Self {
        Self { providers }
    }
}

impl CandidateEventResolver for RegisteredServicePrincipalAttributeResolver {
    fn name(&self) -> &str {
        "registered-service-principal-attribute"
    }

    fn propose(&self, context: &RequestContext) -> Proposal {
        let (Some(service), Some(authentication)) =
            (context.registered_service(), context.authentication())
        else {
            return Proposal::none();
        };
        let policy = service.multifactor_policy();
        let Some((name, pattern)) = policy.principal_attribute_trigger() else {
            return Proposal::none();
        };

        let triggered = authentication
            .principal()
            .attribute(name)
            .is_some_and(|values| values.iter().any(|v| pattern.is_match(v)));
        if !triggered {
            debug!(
                attribute = name,
                service = service.name(),
                "principal attribute trigger did not match"
            );
            return Proposal::none();
        }
        propose_providers(
            policy.provider_ids().iter().map(String::as_str),
            &self.providers,
            authentication,
            Some(service),
            true,
        )
    }
}

/// Principal attributes whose values name a provider, for every service.
pub struct PrincipalAttributeResolver {
    attribute_names: Vec<String>,
    providers: MultifactorProviderRegistry,
}

impl PrincipalAttributeResolver {
    pub fn new<I, S>(attribute_names: I, providers: MultifactorProviderRegistry) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attribute_names: attribute_names.into_iter().map(Into::into).collect(),
            providers,
        }
    }
}

impl CandidateEventResolver for PrincipalAttributeResolver {
    fn name(&self) -> &str {
        PRINCIPAL_ATTRIBUTE_RESOLVER
    }

    fn propose(&self, context: &RequestContext) -> Proposal {
        let Some(authentication) = context.authentication() else {
            return Proposal::none();
        };
        let principal = authentication.principal();
        let values = self
            .attribute_names
            .iter()
            .filter_map(|name| principal.attribute(name))
            .flatten()
            .map(String::as_str);
        propose_providers(
            values,
            &self.providers,
            authentication,
            context.registered_service(),
            false,
        )
    }
}

/// The providers a service always requires. Services with a principal
/// attribute trigger are left to
/// [`RegisteredServicePrincipalAttributeResolver`].
pub struct RegisteredServiceResolver {
    providers: MultifactorProviderRegistry,
}

impl RegisteredServiceResolver {
    pub fn new(providers: MultifactorProviderRegistry) -> Self {
        Self { providers }
    }
}

impl CandidateEventResolver for RegisteredServiceResolver {
    fn name(&self) -> &str {
        "registered-service"
    }

    fn propose(&self, context: &RequestContext) -> Proposal {
        let (Some(service), Some(authentication)) =
            (context.registered_service(), context.authentication())
        else {
            return Proposal::none();
        };
        let policy = service.multifactor_policy();
        if policy.provider_ids().is_empty() || policy.principal_attribute_trigger().is_some() {
            return Proposal::none();
        }
        propose_providers(
            policy.provider_ids().iter().map(String::as_str),
            &self.providers,
            authentication,
            Some(service),
            true,
        )
    }
}
