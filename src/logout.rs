//! Single logout: one notification per service a session was used for.

use crate::{
    error::Result,
    services::Service,
    ticket::{Ticket, TicketGrantingTicket, TicketRegistry},
};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, sync::Arc};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutRequestStatus {
    NotAttempted,
    Success,
    Failure,
}

/// Notification owed to a service when the session behind it ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutRequest {
    id: Uuid,
    service: Service,
    ticket_id: String,
    status: LogoutRequestStatus,
}

impl LogoutRequest {
    fn new(ticket_id: &str, service: &Service) -> Self {
        Self {
            id: Uuid::new_v4(),
            service: service.clone(),
            ticket_id: ticket_id.to_string(),
            status: LogoutRequestStatus::NotAttempted,
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn service(&self) -> &Service {
        &self.service
    }

    /// The service ticket the service was last given.
    #[must_use]
    pub fn ticket_id(&self) -> &str {
        &self.ticket_id
    }

    #[must_use]
    pub fn status(&self) -> LogoutRequestStatus {
        self.status
    }

    pub fn set_status(&mut self, status: LogoutRequestStatus) {
        self.status = status;
    }
}

#[derive(Clone)]
pub struct LogoutManager {
    registry: Arc<dyn TicketRegistry>,
    single_logout_disabled: bool,
}

impl LogoutManager {
    pub fn new(registry: Arc<dyn TicketRegistry>) -> Self {
        Self {
            registry,
            single_logout_disabled: false,
        }
    }

    #[must_use]
    pub fn with_single_logout_disabled(mut self, disabled: bool) -> Self {
        self.single_logout_disabled = disabled;
        self
    }

    /// Build the logout requests for a session, including services reached
    /// through its proxy-granting tickets. Each distinct service appears
    /// once.
    ///
    /// # Errors
    /// Returns an error if a proxy-granting ticket cannot be read.
    pub fn perform_logout(&self, ticket: &TicketGrantingTicket) -> Result<Vec<LogoutRequest>> {
        if self.single_logout_disabled {
            debug!(ticket = ticket.id(), "single logout is disabled");
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let mut requests = Vec::new();
        self.collect(ticket, &mut seen, &mut requests)?;
        info!(
            ticket = ticket.id(),
            principal = ticket.root_authentication().principal().id(),
            requests = requests.len(),
            "logging out session"
        );
        Ok(requests)
    }

    fn collect(
        &self,
        ticket: &TicketGrantingTicket,
        seen: &mut HashSet<String>,
        requests: &mut Vec<LogoutRequest>,
    ) -> Result<()> {
        for (ticket_id, service) in ticket.services() {
            if seen.insert(service.id().to_string()) {
                requests.push(LogoutRequest::new(ticket_id, service));
            }
        }

        for proxy_granting_id in ticket.proxy_granting_tickets().keys() {
            if let Some(Ticket::Granting(proxy_granting)) =
                self.registry.find_ticket(proxy_granting_id)?
            {
                self.collect(&proxy_granting, seen, requests)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        authentication::{AuthenticationBuilder, Principal},
        ticket::{registry::DefaultTicketRegistry, ExpirationPolicy},
    };

    fn tgt() -> TicketGrantingTicket {
        let mut builder = AuthenticationBuilder::new();
        builder.set_principal(Principal::new("casuser"));
        TicketGrantingTicket::new(
            "TGT-1".to_string(),
            builder.build(),
            ExpirationPolicy::NeverExpires,
        )
    }

    #[test]
    fn one_request_per_distinct_service() {
        let mut ticket = tgt();
        for (id, service) in [
            ("ST-1", "https://a.example.org"),
            ("ST-2", "https://b.example.org"),
            ("ST-3", "https://a.example.org"),
        ] {
            ticket.grant_service_ticket(
                id.to_string(),
                Service::new(service),
                ExpirationPolicy::NeverExpires,
                false,
                false,
            );
        }

        let manager = LogoutManager::new(Arc::new(DefaultTicketRegistry::new()));
        let requests = manager.perform_logout(&ticket).expect("logout");
        assert_eq!(requests.len(), 2);
        assert!(requests
            .iter()
            .all(|r| r.status() == LogoutRequestStatus::NotAttempted));
        assert_ne!(requests[0].id(), requests[1].id());
    }

    #[test]
    fn disabled_single_logout_sends_nothing() {
        let mut ticket = tgt();
        ticket.grant_service_ticket(
            "ST-1".to_string(),
            Service::new("https://a.example.org"),
            ExpirationPolicy::NeverExpires,
            false,
            false,
        );
        let manager = LogoutManager::new(Arc::new(DefaultTicketRegistry::new()))
            .with_single_logout_disabled(true);
        assert!(manager.perform_logout(&ticket).expect("logout").is_empty());
    }
}
