use super::{poisoned, TicketRegistry};
use crate::{
    error::{Error, InvalidTicketReason, Result},
    ticket::Ticket,
};
use std::{
    collections::{hash_map::Entry, HashMap},
    sync::RwLock,
};

/// Process-local registry. Payloads are kept as values, never encrypted.
#[derive(Debug, Default)]
pub struct DefaultTicketRegistry {
    tickets: RwLock<HashMap<String, Ticket>>,
}

impl DefaultTicketRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TicketRegistry for DefaultTicketRegistry {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn add_ticket(&self, ticket: Ticket) -> Result<()> {
        let mut tickets = self.tickets.write().map_err(poisoned)?;
        match tickets.entry(ticket.id().to_string()) {
            Entry::Occupied(entry) => Err(Error::DuplicateTicket(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(ticket);
                Ok(())
            }
        }
    }

    fn find_ticket(&self, id: &str) -> Result<Option<Ticket>> {
        Ok(self.tickets.read().map_err(poisoned)?.get(id).cloned())
    }

    fn update_ticket(&self, ticket: Ticket) -> Result<()> {
        let mut tickets = self.tickets.write().map_err(poisoned)?;
        let slot = tickets
            .get_mut(ticket.id())
            .ok_or_else(|| Error::invalid_ticket(ticket.id(), InvalidTicketReason::NotFound))?;
        *slot = ticket;
        Ok(())
    }

    fn atomic_update(
        &self,
        id: &str,
        mutate: &mut dyn FnMut(&mut Ticket) -> Result<()>,
    ) -> Result<Ticket> {
        let mut tickets = self.tickets.write().map_err(poisoned)?;
        let slot = tickets
            .get_mut(id)
            .ok_or_else(|| Error::invalid_ticket(id, InvalidTicketReason::NotFound))?;

        let mut working = slot.clone();
        mutate(&mut working)?;
        *slot = working.clone();
        Ok(working)
    }

    fn delete_single_ticket(&self, id: &str) -> Result<bool> {
        Ok(self.tickets.write().map_err(poisoned)?.remove(id).is_some())
    }

    fn get_tickets(&self) -> Result<Vec<Ticket>> {
        Ok(self.tickets.read().map_err(poisoned)?.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        authentication::{AuthenticationBuilder, Principal},
        services::Service,
        ticket::{ExpirationPolicy, TicketGrantingTicket, TicketKind},
    };

    fn tgt(id: &str, policy: ExpirationPolicy) -> TicketGrantingTicket {
        let mut builder = AuthenticationBuilder::new();
        builder.set_principal(Principal::new("casuser"));
        TicketGrantingTicket::new(id.to_string(), builder.build(), policy)
    }

    #[test]
    fn duplicate_add_fails() {
        let registry = DefaultTicketRegistry::new();
        registry
            .add_ticket(tgt("TGT-1", ExpirationPolicy::NeverExpires).into())
            .expect("added");
        assert!(matches!(
            registry.add_ticket(tgt("TGT-1", ExpirationPolicy::NeverExpires).into()),
            Err(Error::DuplicateTicket(id)) if id == "TGT-1"
        ));
    }

    #[test]
    fn get_ticket_checks_kind_and_expiry() {
        let registry = DefaultTicketRegistry::new();
        registry
            .add_ticket(tgt("TGT-1", ExpirationPolicy::NeverExpires).into())
            .expect("added");
        registry
            .add_ticket(tgt("TGT-2", ExpirationPolicy::timeout(-100)).into())
            .expect("added");

        assert!(registry.get_ticket("TGT-1", TicketKind::TicketGranting).is_ok());
        assert_eq!(
            registry
                .get_ticket("TGT-1", TicketKind::Service)
                .err()
                .and_then(|e| e.invalid_ticket_reason()),
            Some(InvalidTicketReason::UnexpectedKind {
                expected: TicketKind::Service,
                actual: TicketKind::TicketGranting,
            })
        );

        assert_eq!(
            registry
                .get_ticket("TGT-2", TicketKind::TicketGranting)
                .err()
                .and_then(|e| e.invalid_ticket_reason()),
            Some(InvalidTicketReason::Expired)
        );
        // Expired tickets are removed on lookup.
        assert!(registry.find_ticket("TGT-2").expect("lookup").is_none());
    }

    #[test]
    fn delete_cascades_and_is_idempotent() {
        let registry = DefaultTicketRegistry::new();
        let mut granting = tgt("TGT-1", ExpirationPolicy::NeverExpires);
        let first = granting.grant_service_ticket(
            "ST-1".to_string(),
            Service::new("https://a.example.org"),
            ExpirationPolicy::NeverExpires,
            false,
            false,
        );
        let second = granting.grant_service_ticket(
            "ST-2".to_string(),
            Service::new("https://b.example.org"),
            ExpirationPolicy::NeverExpires,
            false,
            false,
        );
        registry.add_ticket(granting.into()).expect("added");
        registry.add_ticket(first.into()).expect("added");
        registry.add_ticket(second.into()).expect("added");

        assert_eq!(registry.delete_ticket("TGT-1").expect("deleted"), 3);
        assert_eq!(registry.delete_ticket("TGT-1").expect("deleted"), 0);
        assert!(registry.get_tickets().expect("tickets").is_empty());
    }

    #[test]
    fn failed_mutation_writes_nothing() {
        let registry = DefaultTicketRegistry::new();
        registry
            .add_ticket(tgt("TGT-1", ExpirationPolicy::NeverExpires).into())
            .expect("added");

        let result = registry.atomic_update("TGT-1", &mut |ticket| {
            ticket.mark_expired();
            Err(Error::Storage("refused".to_string()))
        });
        assert!(result.is_err());

        let stored = registry.find_ticket("TGT-1").expect("lookup").expect("present");
        assert!(!stored.is_expired());
    }

    #[test]
    fn update_requires_existing_ticket() {
        let registry = DefaultTicketRegistry::new();
        assert!(registry
            .update_ticket(tgt("TGT-9", ExpirationPolicy::NeverExpires).into())
            .is_err());
    }
}
