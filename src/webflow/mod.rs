//! Login flow event resolution.
//!
//! After primary authentication an ordered set of candidate resolvers each
//! propose at most one event; the selective resolver picks one. When nothing
//! is proposed the session is started (or reused) and, for a service, a
//! ticket is granted.

pub mod context;
pub mod event;
pub mod initial;
pub mod ranked;
pub mod resolvers;
pub mod selective;
pub mod service_ticket;

pub use context::RequestContext;
pub use event::Event;
pub use initial::InitialAuthenticationAttemptResolver;
pub use ranked::RankedAuthenticationProviderResolver;
pub use resolvers::{CandidateEventResolver, Proposal};
pub use selective::SelectiveEventResolver;
pub use service_ticket::ServiceTicketRequestResolver;

use crate::{
    authentication::AuthenticationSystemSupport,
    cas::CentralAuthenticationService,
    mfa::{AuthenticationContextValidator, MultifactorProviderRegistry},
};
use std::{collections::HashSet, sync::Arc};
use tracing::{debug, instrument};

pub trait CasWebflowEventResolver: Send + Sync {
    fn name(&self) -> &str;

    /// Every event this resolver would take.
    fn resolve(&self, context: &mut RequestContext) -> HashSet<Event>;

    fn resolve_single(&self, context: &mut RequestContext) -> Option<Event> {
        self.resolve(context).into_iter().next()
    }
}

/// The whole login step: session re-evaluation, authentication, event
/// selection and, when a service is waiting, the service ticket.
pub struct LoginFlow {
    ranked: RankedAuthenticationProviderResolver,
    service_ticket: ServiceTicketRequestResolver,
}

impl LoginFlow {
    pub fn new(
        support: Arc<AuthenticationSystemSupport>,
        cas: Arc<CentralAuthenticationService>,
        providers: MultifactorProviderRegistry,
    ) -> Self {
        let initial = Arc::new(InitialAuthenticationAttemptResolver::new(
            support,
            cas.clone(),
            providers.clone(),
        ));
        Self::with_initial(initial, cas, providers)
    }

    pub fn with_initial(
        initial: Arc<InitialAuthenticationAttemptResolver>,
        cas: Arc<CentralAuthenticationService>,
        providers: MultifactorProviderRegistry,
    ) -> Self {
        Self {
            ranked: RankedAuthenticationProviderResolver::new(
                initial,
                cas.clone(),
                AuthenticationContextValidator::new(providers),
            ),
            service_ticket: ServiceTicketRequestResolver::new(cas),
        }
    }

    #[instrument(skip_all)]
    pub fn resolve(&self, context: &mut RequestContext) -> Event {
        if context.is_renew_requested() && context.credential().is_none() {
            debug!("renew requested without credentials");
            context.set_response_status(401);
            return Event::AuthenticationFailure {
                reason: "credentials are required to renew".to_string(),
            };
        }

        let event = self.ranked.resolve_single(context).unwrap_or(Event::Success);
        if event != Event::Success || context.service().is_none() {
            return event;
        }
        self.service_ticket.grant_service_ticket(context)
    }
}
