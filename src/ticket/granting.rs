use super::{
    expiration::{ExpirationPolicy, TicketState},
    service::ServiceTicket,
    TicketCore, TicketKind,
};
use crate::{authentication::Authentication, services::Service};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single sign-on session, or a proxy-granting ticket when it has a
/// parent.
///
/// Descendants are tracked by id only; the registry owns the tickets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketGrantingTicket {
    core: TicketCore,
    authentication: Authentication,
    /// Authentications of the tickets above this one, root first.
    ancestors: Vec<Authentication>,
    parent_id: Option<String>,
    proxied_by: Option<Service>,
    services: BTreeMap<String, Service>,
    proxy_granting_tickets: BTreeMap<String, Service>,
}

impl TicketGrantingTicket {
    #[must_use]
    pub fn new(id: String, authentication: Authentication, policy: ExpirationPolicy) -> Self {
        Self {
            core: TicketCore::new(id, policy),
            authentication,
            ancestors: Vec::new(),
            parent_id: None,
            proxied_by: None,
            services: BTreeMap::new(),
            proxy_granting_tickets: BTreeMap::new(),
        }
    }

    pub(crate) fn new_proxy_granting(
        id: String,
        parent_id: String,
        parent_chain: Vec<Authentication>,
        proxied_by: Service,
        authentication: Authentication,
        policy: ExpirationPolicy,
    ) -> Self {
        Self {
            core: TicketCore::new(id, policy),
            authentication,
            ancestors: parent_chain,
            parent_id: Some(parent_id),
            proxied_by: Some(proxied_by),
            services: BTreeMap::new(),
            proxy_granting_tickets: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        self.core.id()
    }

    #[must_use]
    pub fn kind(&self) -> TicketKind {
        if self.parent_id.is_some() {
            TicketKind::ProxyGranting
        } else {
            TicketKind::TicketGranting
        }
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// This ticket's own authentication.
    #[must_use]
    pub fn authentication(&self) -> &Authentication {
        &self.authentication
    }

    pub(crate) fn set_authentication(&mut self, authentication: Authentication) {
        self.authentication = authentication;
    }

    #[must_use]
    pub fn root_authentication(&self) -> &Authentication {
        self.ancestors.first().unwrap_or(&self.authentication)
    }

    /// Every authentication from the root session down to this ticket.
    #[must_use]
    pub fn chained_authentications(&self) -> Vec<Authentication> {
        self.ancestors
            .iter()
            .chain(std::iter::once(&self.authentication))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    /// The service that obtained this proxy-granting ticket.
    #[must_use]
    pub fn proxied_by(&self) -> Option<&Service> {
        self.proxied_by.as_ref()
    }

    /// Service tickets granted from this session, by ticket id.
    #[must_use]
    pub fn services(&self) -> &BTreeMap<String, Service> {
        &self.services
    }

    #[must_use]
    pub fn proxy_granting_tickets(&self) -> &BTreeMap<String, Service> {
        &self.proxy_granting_tickets
    }

    #[must_use]
    pub fn creation_time(&self) -> DateTime<Utc> {
        self.core.creation_time()
    }

    #[must_use]
    pub fn last_time_used(&self) -> DateTime<Utc> {
        self.core.last_time_used()
    }

    #[must_use]
    pub fn previous_time_used(&self) -> Option<DateTime<Utc>> {
        self.core.previous_time_used()
    }

    #[must_use]
    pub fn count_of_uses(&self) -> u32 {
        self.core.count_of_uses()
    }

    #[must_use]
    pub fn expiration_policy(&self) -> &ExpirationPolicy {
        self.core.expiration_policy()
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.core.is_marked_expired() || self.core.expiration_policy().is_expired(Some(self))
    }

    pub fn mark_expired(&mut self) {
        self.core.mark_expired();
    }

    /// Grant a service ticket and record it against this session.
    ///
    /// The ticket comes from a new login when credentials were presented or
    /// when it is the first ticket of the session. With
    /// `only_track_most_recent_session`, earlier entries for the same
    /// service are forgotten.
    pub(crate) fn grant_service_ticket(
        &mut self,
        id: String,
        service: Service,
        policy: ExpirationPolicy,
        credential_provided: bool,
        only_track_most_recent_session: bool,
    ) -> ServiceTicket {
        let from_new_login = credential_provided || self.core.count_of_uses() == 0;
        let proxy = self.parent_id.is_some();
        let ticket = ServiceTicket::new(
            id.clone(),
            self.id().to_string(),
            service.clone(),
            from_new_login,
            policy,
            proxy,
        );

        self.core.update();
        if only_track_most_recent_session {
            self.services.retain(|_, existing| !existing.matches(&service));
        }
        self.services.insert(id, service);
        ticket
    }

    pub(crate) fn register_proxy_granting_ticket(&mut self, id: String, proxied_by: Service) {
        self.proxy_granting_tickets.insert(id, proxied_by);
    }
}

impl TicketState for TicketGrantingTicket {
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
        Some(self.root_authentication())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authentication::{AuthenticationBuilder, Principal};

    fn authentication(id: &str) -> Authentication {
        let mut builder = AuthenticationBuilder::new();
        builder.set_principal(Principal::new(id));
        builder.build()
    }

    fn tgt(policy: ExpirationPolicy) -> TicketGrantingTicket {
        TicketGrantingTicket::new("TGT-1".to_string(), authentication("casuser"), policy)
    }

    #[test]
    fn first_ticket_is_from_new_login() {
        let mut tgt = tgt(ExpirationPolicy::NeverExpires);
        let service = Service::new("https://app.example.org");

        let first = tgt.grant_service_ticket(
            "ST-1".to_string(),
            service.clone(),
            ExpirationPolicy::NeverExpires,
            false,
            false,
        );
        let second = tgt.grant_service_ticket(
            "ST-2".to_string(),
            service.clone(),
            ExpirationPolicy::NeverExpires,
            false,
            false,
        );
        let renewed = tgt.grant_service_ticket(
            "ST-3".to_string(),
            service,
            ExpirationPolicy::NeverExpires,
            true,
            false,
        );

        assert!(first.is_from_new_login());
        assert!(!second.is_from_new_login());
        assert!(renewed.is_from_new_login());
        assert_eq!(tgt.count_of_uses(), 3);
        assert_eq!(tgt.services().len(), 3);
        assert_eq!(first.ticket_granting_ticket_id(), "TGT-1");
    }

    #[test]
    fn most_recent_session_replaces_same_service() {
        let mut tgt = tgt(ExpirationPolicy::NeverExpires);
        let app = Service::new("https://app.example.org");
        let other = Service::new("https://other.example.org");

        for (id, service) in [("ST-1", &app), ("ST-2", &other), ("ST-3", &app)] {
            tgt.grant_service_ticket(
                id.to_string(),
                service.clone(),
                ExpirationPolicy::NeverExpires,
                false,
                true,
            );
        }

        let ids: Vec<&str> = tgt.services().keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["ST-2", "ST-3"]);
    }

    #[test]
    fn granting_counts_against_the_session_policy() {
        let mut tgt = tgt(ExpirationPolicy::multi_time_use_or_timeout(1, 5_000));
        assert!(!tgt.is_expired());
        tgt.grant_service_ticket(
            "ST-1".to_string(),
            Service::new("https://app.example.org"),
            ExpirationPolicy::NeverExpires,
            false,
            false,
        );
        assert!(tgt.is_expired());
    }

    #[test]
    fn proxy_granting_ticket_chains_authentications() {
        let pgt = TicketGrantingTicket::new_proxy_granting(
            "PGT-1".to_string(),
            "TGT-1".to_string(),
            vec![authentication("casuser")],
            Service::new("https://proxy.example.org"),
            authentication("https://proxy.example.org/cb"),
            ExpirationPolicy::NeverExpires,
        );

        assert_eq!(pgt.kind(), TicketKind::ProxyGranting);
        assert!(!pgt.is_root());
        assert_eq!(pgt.chained_authentications().len(), 2);
        assert_eq!(pgt.root_authentication().principal().id(), "casuser");
        assert_eq!(
            pgt.authentication().principal().id(),
            "https://proxy.example.org/cb"
        );
        assert_eq!(
            pgt.proxied_by().map(Service::id),
            Some("https://proxy.example.org")
        );
    }

    #[test]
    fn marked_expired_is_sticky() {
        let mut tgt = tgt(ExpirationPolicy::NeverExpires);
        tgt.mark_expired();
        assert!(tgt.is_expired());
    }
}
