use super::{
    resolvers::{
        CandidateEventResolver, PrincipalAttributeResolver,
        RegisteredServicePrincipalAttributeResolver, RegisteredServiceResolver,
        RequestParameterResolver, PRINCIPAL_ATTRIBUTE_RESOLVER,
    },
    CasWebflowEventResolver, Event, RequestContext, SelectiveEventResolver,
};
use crate::{
    authentication::{Authentication, AuthenticationSystemSupport, AUTHENTICATION_CONTEXT_ATTRIBUTE},
    cas::CentralAuthenticationService,
    error::{Error, Result},
    mfa::{
        AuthenticationContextValidator, BypassEvaluator, ContextValidation,
        MultifactorProviderRegistry,
    },
    services::{ensure_service_access_is_allowed, Service, ServicesManager},
};
use std::{collections::HashSet, sync::Arc};
use tracing::{debug, error, info, instrument, warn};

const UNAUTHORIZED: u16 = 401;

/// Entry point of event resolution: authenticate the presented credential,
/// ask every candidate resolver, then either act on the selected event or
/// start the session.
pub struct InitialAuthenticationAttemptResolver {
    support: Arc<AuthenticationSystemSupport>,
    services: Arc<dyn ServicesManager>,
    cas: Arc<CentralAuthenticationService>,
    providers: MultifactorProviderRegistry,
    candidates: Vec<Arc<dyn CandidateEventResolver>>,
    selective: SelectiveEventResolver,
    validator: AuthenticationContextValidator,
}

impl InitialAuthenticationAttemptResolver {
    /// Candidates run in this order: request parameter, registered service
    /// principal attribute, principal attribute (no attribute names until
    /// [`Self::with_principal_attribute_names`]) and registered service.
    pub fn new(
        support: Arc<AuthenticationSystemSupport>,
        cas: Arc<CentralAuthenticationService>,
        providers: MultifactorProviderRegistry,
    ) -> Self {
        let services = cas.services().clone();
        let candidates: Vec<Arc<dyn CandidateEventResolver>> = vec![
            Arc::new(RequestParameterResolver::new(providers.clone())),
            Arc::new(RegisteredServicePrincipalAttributeResolver::new(providers.clone())),
            Arc::new(PrincipalAttributeResolver::new(
                Vec::<String>::new(),
                providers.clone(),
            )),
            Arc::new(RegisteredServiceResolver::new(providers.clone())),
        ];
        Self {
            support,
            services,
            cas,
            candidates,
            selective: SelectiveEventResolver::new(providers.clone()),
            validator: AuthenticationContextValidator::new(providers.clone()),
            providers,
        }
    }

    /// Principal attributes whose values name a provider for every service.
    #[must_use]
    pub fn with_principal_attribute_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let resolver: Arc<dyn CandidateEventResolver> =
            Arc::new(PrincipalAttributeResolver::new(names, self.providers.clone()));
        match self
            .candidates
            .iter()
            .position(|candidate| candidate.name() == PRINCIPAL_ATTRIBUTE_RESOLVER)
        {
            Some(index) => self.candidates[index] = resolver,
            None => self.candidates.push(resolver),
        }
        self
    }

    #[must_use]
    pub fn with_candidate(mut self, candidate: Arc<dyn CandidateEventResolver>) -> Self {
        self.candidates.push(candidate);
        self
    }

    #[must_use]
    pub fn with_candidates(mut self, candidates: Vec<Arc<dyn CandidateEventResolver>>) -> Self {
        self.candidates = candidates;
        self
    }

    #[must_use]
    pub fn candidate_names(&self) -> Vec<&str> {
        self.candidates.iter().map(|candidate| candidate.name()).collect()
    }

    fn attempt(&self, context: &mut RequestContext) -> Result<Event> {
        let service = context.service().cloned();

        if let Some(credential) = context.credential().cloned() {
            let mut builder = context.take_authentication_result_builder().unwrap_or_default();
            let outcome = self.support.handle_authentication_transaction(
                service.clone(),
                &mut builder,
                vec![credential],
            );
            context.put_authentication_result_builder(builder);
            outcome?;
        }

        let builder = context.authentication_result_builder().cloned().unwrap_or_default();
        let result = builder.build(service.clone())?;
        context.put_authentication(result.authentication().clone());

        if let Some(service) = &service {
            let registered = self.services.find_service_by(service);
            ensure_service_access_is_allowed(service, registered.as_deref())?;
            context.put_registered_service(registered);
        }

        let mut events = HashSet::new();
        let mut bypassed = Vec::new();
        let mut assumed = Vec::new();
        for candidate in &self.candidates {
            let (event, skipped, phantom) = candidate.propose(context).into_parts();
            if let Some(event) = event {
                debug!(resolver = candidate.name(), %event, "candidate event");
                events.insert(event);
            }
            bypassed.extend(skipped);
            assumed.extend(phantom);
        }
        events.retain(|event| match event {
            Event::Multifactor { provider } => {
                let satisfied = self.validator.validate(result.authentication(), provider)
                    == ContextValidation::Satisfied;
                if satisfied {
                    debug!(provider = %provider, "provider already satisfied in this flow");
                }
                !satisfied
            }
            _ => true,
        });
        Self::record_skipped_providers(context, &bypassed, &assumed);
        context.put_resolved_events(events.iter().cloned().collect());

        if let Some(event) = self.selective.select(&events) {
            return Ok(event);
        }
        self.grant_ticket_granting_ticket(context, service)
    }

    /// Record bypassed and assumed providers on the primary authentication
    /// so they are not evaluated again for this session.
    fn record_skipped_providers(
        context: &mut RequestContext,
        bypassed: &[String],
        assumed: &[String],
    ) {
        if bypassed.is_empty() && assumed.is_empty() {
            return;
        }
        let Some(builder) = context.authentication_result_builder_mut() else {
            return;
        };
        let Some(initial) = builder.initial_authentication().cloned() else {
            return;
        };

        let mut updated = bypassed
            .iter()
            .fold(initial.clone(), |authentication, provider| {
                BypassEvaluator::remember_bypass(&authentication, provider)
            })
            .to_builder();
        for provider in assumed {
            updated.merge_attribute(AUTHENTICATION_CONTEXT_ATTRIBUTE, provider);
        }
        builder.replace(&initial, updated.into_authentication());
    }

    /// Nothing else is required: finalize the result and make sure the
    /// request holds a session. An existing session is kept when no new
    /// credentials were presented and it belongs to the same principal;
    /// otherwise it is replaced and its logout requests are handed on.
    fn grant_ticket_granting_ticket(
        &self,
        context: &mut RequestContext,
        service: Option<Service>,
    ) -> Result<Event> {
        let builder = context.authentication_result_builder().cloned().unwrap_or_default();
        let result = self
            .support
            .finalize_all_authentication_transactions(&builder, service)?;

        let existing = context.ticket_granting_ticket_id().and_then(|id| {
            let authentication = self.cas.get_authentication(id).ok()?;
            Some((id.to_string(), authentication))
        });

        let ticket_granting_ticket_id = match existing {
            Some((id, authentication))
                if !result.is_credential_provided()
                    && authentication.principal().id()
                        == result.authentication().principal().id() =>
            {
                debug!(ticket = %id, "reusing single sign-on session");
                if let Some(initial) = builder.initial_authentication() {
                    self.remember_session_authentication(&id, &authentication, initial)?;
                }
                id
            }
            Some((previous, _)) => {
                let id = self.cas.create_ticket_granting_ticket(&result)?.id().to_string();
                self.replace_session(context, &previous);
                id
            }
            None => self.cas.create_ticket_granting_ticket(&result)?.id().to_string(),
        };
        context.put_ticket_granting_ticket_id(Some(ticket_granting_ticket_id));
        context.put_authentication(result.authentication().clone());
        context.put_authentication_result(result);
        Ok(Event::Success)
    }

    /// Bypassed or assumed providers recorded during this request are kept
    /// on the session so the next request does not evaluate them again.
    fn remember_session_authentication(
        &self,
        ticket_granting_ticket_id: &str,
        stored: &Authentication,
        current: &Authentication,
    ) -> Result<()> {
        if stored == current {
            return Ok(());
        }
        self.cas
            .update_authentication(ticket_granting_ticket_id, current.clone())
    }

    /// The new session supersedes `previous`; its services are owed a
    /// logout.
    fn replace_session(&self, context: &mut RequestContext, previous: &str) {
        match self.cas.destroy_ticket_granting_ticket(previous) {
            Ok(requests) => {
                info!(
                    ticket = previous,
                    logout_requests = requests.len(),
                    "replaced single sign-on session"
                );
                context.put_logout_requests(requests);
            }
            Err(error) => warn!(ticket = previous, %error, "failed to destroy replaced session"),
        }
    }

    fn handle_error(context: &mut RequestContext, error: Error) -> Event {
        let reason = error.to_string();
        context.put_error(reason.clone());
        if error.is_authentication_failure() {
            warn!(%error, "authentication failed");
            context.set_response_status(UNAUTHORIZED);
            Event::AuthenticationFailure { reason }
        } else if error.is_access_denied() {
            warn!(%error, "access denied");
            context.set_response_status(UNAUTHORIZED);
            Event::Error { reason }
        } else {
            error!(%error, "event resolution failed");
            Event::Error { reason }
        }
    }
}

impl CasWebflowEventResolver for InitialAuthenticationAttemptResolver {
    fn name(&self) -> &str {
        "initial-authentication-attempt"
    }

    #[instrument(skip_all, fields(service = context.service().map(Service::id)))]
    fn resolve(&self, context: &mut RequestContext) -> HashSet<Event> {
        let event = match self.attempt(context) {
            Ok(event) => event,
            Err(error) => Self::handle_error(context, error),
        };
        info!(%event, "resolved event");
        HashSet::from([event])
    }
}
