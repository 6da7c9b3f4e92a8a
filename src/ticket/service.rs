use super::{
    expiration::{ExpirationPolicy, TicketState},
    granting::TicketGrantingTicket,
    TicketCore, TicketKind,
};
use crate::{
    authentication::Authentication,
    error::{Error, InvalidTicketReason, Result},
    services::Service,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One application access granted from a session. A proxy ticket when it
/// was granted from a proxy-granting ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTicket {
    core: TicketCore,
    ticket_granting_ticket_id: String,
    service: Service,
    from_new_login: bool,
    granted_proxy_granting_ticket: bool,
    proxy: bool,
}

impl ServiceTicket {
    pub(crate) fn new(
        id: String,
        ticket_granting_ticket_id: String,
        service: Service,
        from_new_login: bool,
        policy: ExpirationPolicy,
        proxy: bool,
    ) -> Self {
        Self {
            core: TicketCore::new(id, policy),
            ticket_granting_ticket_id,
            service,
            from_new_login,
            granted_proxy_granting_ticket: false,
            proxy,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        self.core.id()
    }

    #[must_use]
    pub fn kind(&self) -> TicketKind {
        if self.proxy {
            TicketKind::Proxy
        } else {
            TicketKind::Service
        }
    }

    #[must_use]
    pub fn ticket_granting_ticket_id(&self) -> &str {
        &self.ticket_granting_ticket_id
    }

    #[must_use]
    pub fn service(&self) -> &Service {
        &self.service
    }

    #[must_use]
    pub fn is_from_new_login(&self) -> bool {
        self.from_new_login
    }

    #[must_use]
    pub fn has_granted_proxy_granting_ticket(&self) -> bool {
        self.granted_proxy_granting_ticket
    }

    #[must_use]
    pub fn creation_time(&self) -> DateTime<Utc> {
        self.core.creation_time()
    }

    #[must_use]
    pub fn count_of_uses(&self) -> u32 {
        self.core.count_of_uses()
    }

    #[must_use]
    pub fn expiration_policy(&self) -> &ExpirationPolicy {
        self.core.expiration_policy()
    }

    /// Expiry of the ticket itself. The granting chain is checked by the
    /// registry.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.core.is_marked_expired() || self.core.expiration_policy().is_expired(Some(self))
    }

    pub fn mark_expired(&mut self) {
        self.core.mark_expired();
    }

    /// Counts as a use whether or not the service matches.
    pub fn is_valid_for(&mut self, service: &Service) -> bool {
        self.core.update();
        self.service.matches(service)
    }

    /// Grant the single proxy-granting ticket this ticket may ever produce.
    ///
    /// # Errors
    /// Fails if a proxy-granting ticket was already granted.
    pub(crate) fn grant_proxy_granting_ticket(
        &mut self,
        id: String,
        authentication: Authentication,
        policy: ExpirationPolicy,
        parent: &TicketGrantingTicket,
    ) -> Result<TicketGrantingTicket> {
        if self.granted_proxy_granting_ticket {
            return Err(Error::invalid_ticket(
                self.id(),
                InvalidTicketReason::ProxyGrantingTicketAlreadyGranted,
            ));
        }
        self.granted_proxy_granting_ticket = true;

        Ok(TicketGrantingTicket::new_proxy_granting(
            id,
            parent.id().to_string(),
            parent.chained_authentications(),
            self.service.clone(),
            authentication,
            policy,
        ))
    }
}

impl TicketState for ServiceTicket {
    fn creation_time(&self) -> DateTime<Utc> {
        self.core.creation_time()
    }

    fn last_time_used(&self) -> DateTime<Utc> {
        self.core.last_time_used()
    }

    fn count_of_uses(&self) -> u32 {
        self.core.count_of_uses()
    }

    fn authentication(&self) -> Option<&Authentication> {
        None
    }
}
