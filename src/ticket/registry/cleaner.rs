use super::TicketRegistry;
use crate::{
    error::{Error, Result},
    logout::{LogoutManager, LogoutRequest},
    ticket::Ticket,
};
use std::{sync::Arc, time::Duration};
use tokio::{sync::mpsc, task::JoinHandle, time};
use tracing::{debug, error, info, instrument, warn};

/// Periodically removes expired tickets, logging sessions out first.
pub struct RegistryCleaner {
    registry: Arc<dyn TicketRegistry>,
    logout: LogoutManager,
    logout_requests: Option<mpsc::UnboundedSender<Vec<LogoutRequest>>>,
}

impl RegistryCleaner {
    pub fn new(registry: Arc<dyn TicketRegistry>, logout: LogoutManager) -> Self {
        Self {
            registry,
            logout,
            logout_requests: None,
        }
    }

    /// Forward the logout requests of expired sessions to `sender`.
    #[must_use]
    pub fn with_logout_channel(
        mut self,
        sender: mpsc::UnboundedSender<Vec<LogoutRequest>>,
    ) -> Self {
        self.logout_requests = Some(sender);
        self
    }

    /// One sweep. Returns the number of entries removed.
    ///
    /// # Errors
    /// Returns [`Error::Unsupported`] if the registry cannot enumerate.
    #[instrument(skip(self), fields(registry = self.registry.name()))]
    pub fn clean(&self) -> Result<usize> {
        let mut expired = Vec::new();
        for ticket in self.registry.get_tickets()? {
            // also catches tickets orphaned by a session that is gone
            if self.registry.is_expired_in_chain(&ticket)? {
                expired.push(ticket);
            }
        }
        // sessions first so their logout still sees every descendant
        expired.sort_by_key(|ticket| match ticket {
            Ticket::Granting(granting) if granting.is_root() => 0,
            Ticket::Granting(_) => 1,
            _ => 2,
        });

        let mut removed = 0;
        for ticket in &expired {
            if let Ticket::Granting(granting) = ticket {
                let requests = self.logout.perform_logout(granting)?;
                if let Some(sender) = &self.logout_requests {
                    if !requests.is_empty() && sender.send(requests).is_err() {
                        warn!("logout request receiver is gone");
                    }
                }
            }
            removed += self.registry.delete_ticket(ticket.id())?;
        }

        if removed > 0 {
            info!(removed, "removed expired tickets");
        } else {
            debug!("no expired tickets");
        }
        Ok(removed)
    }

    /// Run [`Self::clean`] every `period` on the current runtime. Stops if
    /// the registry cannot enumerate.
    #[must_use]
    pub fn spawn(self, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                match self.clean() {
                    Ok(_) => {}
                    Err(err @ Error::Unsupported { .. }) => {
                        error!("registry cleaner stopped: {err}");
                        return;
                    }
                    Err(err) => error!("registry cleaning failed: {err}"),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        authentication::{AuthenticationBuilder, Principal},
        services::Service,
        ticket::{
            registry::{
                DefaultTicketRegistry, InMemoryKeyValueStore, KeyValueTicketRegistry, TicketCodec,
            },
            ExpirationPolicy, TicketGrantingTicket,
        },
    };

    fn tgt(id: &str, policy: ExpirationPolicy) -> TicketGrantingTicket {
        let mut builder = AuthenticationBuilder::new();
        builder.set_principal(Principal::new("casuser"));
        TicketGrantingTicket::new(id.to_string(), builder.build(), policy)
    }

    #[test]
    fn removes_expired_sessions_and_their_tickets() {
        let registry: Arc<dyn TicketRegistry> = Arc::new(DefaultTicketRegistry::new());
        let mut expired = tgt("TGT-old", ExpirationPolicy::timeout(-100));
        let st = expired.grant_service_ticket(
            "ST-old".to_string(),
            Service::new("https://a.example.org"),
            ExpirationPolicy::NeverExpires,
            false,
            false,
        );
        registry.add_ticket(expired.into()).expect("added");
        registry.add_ticket(st.into()).expect("added");
        registry
            .add_ticket(tgt("TGT-live", ExpirationPolicy::NeverExpires).into())
            .expect("added");

        let (sender, mut receiver) = mpsc::unbounded_channel();
        let cleaner =
            RegistryCleaner::new(registry.clone(), LogoutManager::new(registry.clone()))
                .with_logout_channel(sender);

        assert_eq!(cleaner.clean().expect("cleaned"), 2);
        assert_eq!(registry.get_tickets().expect("tickets").len(), 1);

        let requests = receiver.try_recv().expect("logout requests");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].ticket_id(), "ST-old");
    }

    #[test]
    fn removes_tickets_whose_session_is_gone() {
        let registry: Arc<dyn TicketRegistry> = Arc::new(DefaultTicketRegistry::new());
        let mut gone = tgt("TGT-gone", ExpirationPolicy::NeverExpires);
        let orphan = gone.grant_service_ticket(
            "ST-orphan".to_string(),
            Service::new("https://a.example.org"),
            ExpirationPolicy::NeverExpires,
            false,
            false,
        );
        registry.add_ticket(orphan.into()).expect("added");

        let mut live = tgt("TGT-live", ExpirationPolicy::NeverExpires);
        let kept = live.grant_service_ticket(
            "ST-kept".to_string(),
            Service::new("https://b.example.org"),
            ExpirationPolicy::NeverExpires,
            false,
            false,
        );
        registry.add_ticket(live.into()).expect("added");
        registry.add_ticket(kept.into()).expect("added");

        let cleaner = RegistryCleaner::new(registry.clone(), LogoutManager::new(registry.clone()));
        assert_eq!(cleaner.clean().expect("cleaned"), 1);
        assert!(registry.find_ticket("ST-orphan").expect("lookup").is_none());
        assert!(registry.find_ticket("ST-kept").expect("lookup").is_some());
        assert_eq!(registry.get_tickets().expect("tickets").len(), 2);
    }

    #[test]
    fn scanless_registry_is_unsupported() {
        let registry: Arc<dyn TicketRegistry> = Arc::new(KeyValueTicketRegistry::new(
            InMemoryKeyValueStore::new(),
            TicketCodec::default(),
        ));
        let cleaner = RegistryCleaner::new(registry.clone(), LogoutManager::new(registry));
        assert!(matches!(cleaner.clean(), Err(Error::Unsupported { .. })));
    }

    #[tokio::test]
    async fn spawned_cleaner_stops_on_unsupported_registry() {
        let registry: Arc<dyn TicketRegistry> = Arc::new(KeyValueTicketRegistry::new(
            InMemoryKeyValueStore::new(),
            TicketCodec::default(),
        ));
        let handle = RegistryCleaner::new(registry.clone(), LogoutManager::new(registry))
            .spawn(Duration::from_millis(10));
        time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("cleaner stopped")
            .expect("task completed");
    }
}
