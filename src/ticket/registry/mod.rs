//! Ticket storage.
//!
//! Backends implement the primitive operations; lookup with expiry checks
//! and cascading deletion are shared.

pub mod cleaner;
pub mod codec;
pub mod kv;
pub mod memory;

pub use cleaner::RegistryCleaner;
pub use codec::TicketCodec;
pub use kv::{InMemoryKeyValueStore, KeyValueStore, KeyValueTicketRegistry};
pub use memory::DefaultTicketRegistry;

use super::{Ticket, TicketKind};
use crate::error::{Error, InvalidTicketReason, Result};
use std::sync::PoisonError;
use tracing::{debug, warn};

/// Upper bound on granting-chain depth, guards against corrupt cycles.
const MAX_CHAIN_DEPTH: usize = 32;

pub trait TicketRegistry: Send + Sync {
    fn name(&self) -> &'static str;

    /// # Errors
    /// Returns [`Error::DuplicateTicket`] if the id is already stored.
    fn add_ticket(&self, ticket: Ticket) -> Result<()>;

    /// Raw lookup, no expiry or kind checks.
    ///
    /// # Errors
    /// Returns an error if the backend or the payload codec fails.
    fn find_ticket(&self, id: &str) -> Result<Option<Ticket>>;

    /// Overwrite a stored ticket.
    ///
    /// # Errors
    /// Returns [`Error::InvalidTicket`] if the ticket is not stored.
    fn update_ticket(&self, ticket: Ticket) -> Result<()>;

    /// Apply `mutate` to the stored ticket so that concurrent updates to the
    /// same id are never lost. `mutate` may run more than once; when it
    /// fails nothing is written.
    ///
    /// # Errors
    /// Returns the error from `mutate`, or [`Error::InvalidTicket`] if the
    /// ticket is not stored.
    fn atomic_update(
        &self,
        id: &str,
        mutate: &mut dyn FnMut(&mut Ticket) -> Result<()>,
    ) -> Result<Ticket>;

    /// Remove one entry without touching descendants.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    fn delete_single_ticket(&self, id: &str) -> Result<bool>;

    /// # Errors
    /// Returns [`Error::Unsupported`] if the backend cannot enumerate.
    fn get_tickets(&self) -> Result<Vec<Ticket>>;

    /// Lookup that enforces the expected kind and expiry of the whole
    /// granting chain. Expired tickets are removed on the way out.
    ///
    /// # Errors
    /// Returns [`Error::InvalidTicket`] when the ticket is missing, of the
    /// wrong kind or expired.
    fn get_ticket(&self, id: &str, expected: TicketKind) -> Result<Ticket> {
        let Some(ticket) = self.find_ticket(id)? else {
            return Err(Error::invalid_ticket(id, InvalidTicketReason::NotFound));
        };

        let actual = ticket.kind();
        if !actual.satisfies(expected) {
            return Err(Error::invalid_ticket(
                id,
                InvalidTicketReason::UnexpectedKind { expected, actual },
            ));
        }

        if self.is_expired_in_chain(&ticket)? {
            debug!(ticket = id, "ticket is expired, removing it");
            if let Err(error) = self.delete_ticket(id) {
                warn!(ticket = id, %error, "failed to remove expired ticket");
            }
            return Err(Error::invalid_ticket(id, InvalidTicketReason::Expired));
        }

        Ok(ticket)
    }

    /// True when the ticket or any ancestor is expired or gone.
    ///
    /// # Errors
    /// Returns an error if an ancestor cannot be read.
    fn is_expired_in_chain(&self, ticket: &Ticket) -> Result<bool> {
        if ticket.is_expired() {
            return Ok(true);
        }

        let mut parent_id = ticket.granting_ticket_id().map(str::to_string);
        let mut depth = 0;
        while let Some(id) = parent_id {
            depth += 1;
            if depth > MAX_CHAIN_DEPTH {
                return Ok(true);
            }
            match self.find_ticket(&id)? {
                Some(parent) if !parent.is_expired() => {
                    parent_id = parent.granting_ticket_id().map(str::to_string);
                }
                _ => return Ok(true),
            }
        }
        Ok(false)
    }

    /// Delete a ticket and, for granting tickets, every descendant.
    /// Returns the number of entries removed; missing tickets count zero.
    ///
    /// # Errors
    /// Returns an error if the backend fails.
    fn delete_ticket(&self, id: &str) -> Result<usize> {
        let Some(ticket) = self.find_ticket(id)? else {
            return Ok(0);
        };

        let mut count = 0;
        if let Ticket::Granting(granting) = &ticket {
            for service_ticket_id in granting.services().keys() {
                if self.delete_single_ticket(service_ticket_id)? {
                    count += 1;
                }
            }
            for proxy_granting_id in granting.proxy_granting_tickets().keys() {
                count += self.delete_ticket(proxy_granting_id)?;
            }
        }

        if self.delete_single_ticket(id)? {
            count += 1;
        }
        debug!(ticket = id, removed = count, "deleted ticket");
        Ok(count)
    }

    /// Live ticket-granting tickets.
    ///
    /// # Errors
    /// Returns [`Error::Unsupported`] if the backend cannot enumerate.
    fn session_count(&self) -> Result<usize> {
        Ok(self
            .get_tickets()?
            .iter()
            .filter(|t| t.kind() == TicketKind::TicketGranting && !t.is_expired())
            .count())
    }

    /// Live service and proxy tickets.
    ///
    /// # Errors
    /// Returns [`Error::Unsupported`] if the backend cannot enumerate.
    fn service_ticket_count(&self) -> Result<usize> {
        Ok(self
            .get_tickets()?
            .iter()
            .filter(|t| t.kind().satisfies(TicketKind::Service) && !t.is_expired())
            .count())
    }
}

pub(crate) fn poisoned<T>(_: PoisonError<T>) -> Error {
    Error::Storage("ticket registry lock poisoned".to_string())
}
