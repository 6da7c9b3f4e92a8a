use super::{CasWebflowEventResolver, Event, RequestContext};
use crate::{cas::CentralAuthenticationService, services::Service};
use std::{collections::HashSet, sync::Arc};
use tracing::{info, instrument, warn};

/// Grants a service ticket straight from the single sign-on session when a
/// request carries a session and a service and asks for nothing else.
pub struct ServiceTicketRequestResolver {
    cas: Arc<CentralAuthenticationService>,
}

impl ServiceTicketRequestResolver {
    pub fn new(cas: Arc<CentralAuthenticationService>) -> Self {
        Self { cas }
    }

    #[must_use]
    pub fn is_asking_for_service_ticket(context: &RequestContext) -> bool {
        context.ticket_granting_ticket_id().is_some()
            && context.service().is_some()
            && context.credential().is_none()
            && !context.is_renew_requested()
    }

    /// Grant a ticket for the context's service from its session. Fresh
    /// credentials collected in this request are passed along.
    pub fn grant_service_ticket(&self, context: &mut RequestContext) -> Event {
        let (Some(ticket_granting_ticket_id), Some(service)) = (
            context.ticket_granting_ticket_id().map(str::to_string),
            context.service().cloned(),
        ) else {
            return Event::Error {
                reason: "a session and a service are required".to_string(),
            };
        };

        let result = context
            .authentication_result()
            .filter(|result| result.is_credential_provided())
            .cloned();

        match self
            .cas
            .grant_service_ticket(&ticket_granting_ticket_id, &service, result.as_ref())
        {
            Ok(ticket) => {
                info!(ticket = ticket.id(), "service ticket issued");
                context.put_service_ticket_id(ticket.id());
                Event::GenerateServiceTicket
            }
            Err(error) => {
                warn!(%error, "could not grant service ticket");
                let reason = error.to_string();
                context.put_error(reason.clone());
                if error.is_authentication_failure() || error.is_access_denied() {
                    context.set_response_status(401);
                }
                if error.is_authentication_failure() {
                    Event::AuthenticationFailure { reason }
                } else {
                    Event::Error { reason }
                }
            }
        }
    }
}

impl CasWebflowEventResolver for ServiceTicketRequestResolver {
    fn name(&self) -> &str {
        "service-ticket-request"
    }

    #[instrument(skip_all, fields(service = context.service().map(Service::id)))]
    fn resolve(&self, context: &mut RequestContext) -> HashSet<Event> {
        if !Self::is_asking_for_service_ticket(context) {
            return HashSet::new();
        }
        HashSet::from([self.grant_service_ticket(context)])
    }
}
