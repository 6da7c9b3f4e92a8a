//! Ticket model, expiration policies, id generation and storage.

pub mod expiration;
pub mod granting;
pub mod id;
pub mod registry;
pub mod service;

pub use expiration::{ExpirationPolicy, TicketState};
pub use granting::TicketGrantingTicket;
pub use id::{DefaultUniqueTicketIdGenerator, UniqueTicketIdGenerator};
pub use registry::TicketRegistry;
pub use service::ServiceTicket;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketKind {
    TicketGranting,
    ProxyGranting,
    Service,
    Proxy,
}

impl TicketKind {
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::TicketGranting => "TGT",
            Self::ProxyGranting => "PGT",
            Self::Service => "ST",
            Self::Proxy => "PT",
        }
    }

    /// Kind encoded in an id prefix, if the prefix is known.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        let (prefix, _) = id.split_once('-')?;
        match prefix {
            "TGT" => Some(Self::TicketGranting),
            "PGT" => Some(Self::ProxyGranting),
            "ST" => Some(Self::Service),
            "PT" => Some(Self::Proxy),
            _ => None,
        }
    }

    /// A proxy-granting ticket can stand in for a ticket-granting ticket,
    /// and a proxy ticket for a service ticket.
    #[must_use]
    pub fn satisfies(self, expected: Self) -> bool {
        self == expected
            || matches!(
                (self, expected),
                (Self::ProxyGranting, Self::TicketGranting) | (Self::Proxy, Self::Service)
            )
    }
}

impl fmt::Display for TicketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TicketGranting => "ticket-granting ticket",
            Self::ProxyGranting => "proxy-granting ticket",
            Self::Service => "service ticket",
            Self::Proxy => "proxy ticket",
        };
        f.write_str(name)
    }
}

/// Id, usage counters and policy shared by every ticket kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct TicketCore {
    id: String,
    creation_time: DateTime<Utc>,
    last_time_used: DateTime<Utc>,
    previous_time_used: Option<DateTime<Utc>>,
    count_of_uses: u32,
    expired: bool,
    expiration_policy: ExpirationPolicy,
}

impl TicketCore {
    pub(crate) fn new(id: String, expiration_policy: ExpirationPolicy) -> Self {
        let now = Utc::now();
        Self {
            id,
            creation_time: now,
            last_time_used: now,
            previous_time_used: None,
            count_of_uses: 0,
            expired: false,
            expiration_policy,
        }
    }

    pub(crate) fn update(&mut self) {
        self.previous_time_used = Some(self.last_time_used);
        self.last_time_used = Utc::now();
        self.count_of_uses = self.count_of_uses.saturating_add(1);
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    pub(crate) fn last_time_used(&self) -> DateTime<Utc> {
        self.last_time_used
    }

    pub(crate) fn previous_time_used(&self) -> Option<DateTime<Utc>> {
        self.previous_time_used
    }

    pub(crate) fn count_of_uses(&self) -> u32 {
        self.count_of_uses
    }

    pub(crate) fn is_marked_expired(&self) -> bool {
        self.expired
    }

    pub(crate) fn mark_expired(&mut self) {
        self.expired = true;
    }

    pub(crate) fn expiration_policy(&self) -> &ExpirationPolicy {
        &self.expiration_policy
    }
}

/// Any stored ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Ticket {
    Granting(TicketGrantingTicket),
    Service(ServiceTicket),
}

impl Ticket {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Granting(ticket) => ticket.id(),
            Self::Service(ticket) => ticket.id(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> TicketKind {
        match self {
            Self::Granting(ticket) => ticket.kind(),
            Self::Service(ticket) => ticket.kind(),
        }
    }

    /// Expiry of this ticket alone. Ancestors are checked by the registry.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        match self {
            Self::Granting(ticket) => ticket.is_expired(),
            Self::Service(ticket) => ticket.is_expired(),
        }
    }

    pub fn mark_expired(&mut self) {
        match self {
            Self::Granting(ticket) => ticket.mark_expired(),
            Self::Service(ticket) => ticket.mark_expired(),
        }
    }

    #[must_use]
    pub fn expiration_policy(&self) -> &ExpirationPolicy {
        match self {
            Self::Granting(ticket) => ticket.expiration_policy(),
            Self::Service(ticket) => ticket.expiration_policy(),
        }
    }

    #[must_use]
    pub fn count_of_uses(&self) -> u32 {
        match self {
            Self::Granting(ticket) => ticket.count_of_uses(),
            Self::Service(ticket) => ticket.count_of_uses(),
        }
    }

    /// Id of the ticket this one was granted from.
    #[must_use]
    pub fn granting_ticket_id(&self) -> Option<&str> {
        match self {
            Self::Granting(ticket) => ticket.parent_id(),
            Self::Service(ticket) => Some(ticket.ticket_granting_ticket_id()),
        }
    }

    #[must_use]
    pub fn as_ticket_granting(&self) -> Option<&TicketGrantingTicket> {
        match self {
            Self::Granting(ticket) => Some(ticket),
            Self::Service(_) => None,
        }
    }

    pub fn as_ticket_granting_mut(&mut self) -> Option<&mut TicketGrantingTicket> {
        match self {
            Self::Granting(ticket) => Some(ticket),
            Self::Service(_) => None,
        }
    }

    #[must_use]
    pub fn as_service(&self) -> Option<&ServiceTicket> {
        match self {
            Self::Service(ticket) => Some(ticket),
            Self::Granting(_) => None,
        }
    }

    pub fn as_service_mut(&mut self) -> Option<&mut ServiceTicket> {
        match self {
            Self::Service(ticket) => Some(ticket),
            Self::Granting(_) => None,
        }
    }

    #[must_use]
    pub fn into_ticket_granting(self) -> Option<TicketGrantingTicket> {
        match self {
            Self::Granting(ticket) => Some(ticket),
            Self::Service(_) => None,
        }
    }

    #[must_use]
    pub fn into_service(self) -> Option<ServiceTicket> {
        match self {
            Self::Service(ticket) => Some(ticket),
            Self::Granting(_) => None,
        }
    }
}

impl From<TicketGrantingTicket> for Ticket {
    fn from(ticket: TicketGrantingTicket) -> Self {
        Self::Granting(ticket)
    }
}

impl From<ServiceTicket> for Ticket {
    fn from(ticket: ServiceTicket) -> Self {
        Self::Service(ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_prefix() {
        assert_eq!(TicketKind::from_id("TGT-1-abc"), Some(TicketKind::TicketGranting));
        assert_eq!(TicketKind::from_id("PGT-1-abc"), Some(TicketKind::ProxyGranting));
        assert_eq!(TicketKind::from_id("ST-1-abc"), Some(TicketKind::Service));
        assert_eq!(TicketKind::from_id("PT-1-abc"), Some(TicketKind::Proxy));
        assert_eq!(TicketKind::from_id("XYZ-1"), None);
        assert_eq!(TicketKind::from_id("TGT"), None);
    }

    #[test]
    fn proxy_kinds_satisfy_their_base_kind() {
        assert!(TicketKind::ProxyGranting.satisfies(TicketKind::TicketGranting));
        assert!(TicketKind::Proxy.satisfies(TicketKind::Service));
        assert!(!TicketKind::TicketGranting.satisfies(TicketKind::ProxyGranting));
        assert!(!TicketKind::Service.satisfies(TicketKind::TicketGranting));
    }

    #[test]
    fn update_bumps_counters() {
        let mut core = TicketCore::new("ST-1".to_string(), ExpirationPolicy::NeverExpires);
        let created = core.creation_time();
        core.update();
        core.update();
        assert_eq!(core.count_of_uses(), 2);
        assert!(core.previous_time_used().is_some());
        assert!(core.last_time_used() >= created);
        assert_eq!(core.creation_time(), created);
    }
}
