//! Ticket lifetimes and the collaborators used to mint and store tickets.

use crate::{
    cipher::CipherExecutor,
    services::{Service, ServiceKind},
    ticket::{DefaultUniqueTicketIdGenerator, ExpirationPolicy, UniqueTicketIdGenerator},
};
use std::{collections::HashMap, sync::Arc, time::Duration};

/// Session hard limit, in seconds.
pub const DEFAULT_TGT_MAX_TIME_TO_LIVE: i64 = 28_800;
/// Session idle limit, in seconds.
pub const DEFAULT_TGT_TIME_TO_KILL: i64 = 7_200;
pub const DEFAULT_ST_NUMBER_OF_USES: u32 = 1;
pub const DEFAULT_ST_TIME_TO_KILL_MILLIS: i64 = 10_000;
pub const DEFAULT_CLEANER_INTERVAL: Duration = Duration::from_secs(120);

/// Defaults: sessions last 8h or 2h idle, service and proxy tickets are
/// single use within 10s, proxy-granting tickets follow the session policy,
/// no cipher and the default id generator.
#[derive(Debug, Clone)]
pub struct TicketConfig {
    ticket_granting_ticket_expiration: ExpirationPolicy,
    service_ticket_expiration: ExpirationPolicy,
    proxy_granting_ticket_expiration: ExpirationPolicy,
    proxy_ticket_expiration: ExpirationPolicy,
    only_track_most_recent_session: bool,
    cipher: Option<Arc<dyn CipherExecutor>>,
    id_generator: Option<Arc<dyn UniqueTicketIdGenerator>>,
    service_id_generators: HashMap<ServiceKind, Arc<dyn UniqueTicketIdGenerator>>,
    cleaner_interval: Option<Duration>,
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TicketConfig {
    #[must_use]
    pub fn new() -> Self {
        let session = ExpirationPolicy::ticket_granting_ticket(
            DEFAULT_TGT_MAX_TIME_TO_LIVE,
            DEFAULT_TGT_TIME_TO_KILL,
        );
        let single_use = ExpirationPolicy::multi_time_use_or_timeout(
            DEFAULT_ST_NUMBER_OF_USES,
            DEFAULT_ST_TIME_TO_KILL_MILLIS,
        );
        Self {
            ticket_granting_ticket_expiration: session.clone(),
            service_ticket_expiration: single_use.clone(),
            proxy_granting_ticket_expiration: session,
            proxy_ticket_expiration: single_use,
            only_track_most_recent_session: true,
            cipher: None,
            id_generator: None,
            service_id_generators: HashMap::new(),
            cleaner_interval: Some(DEFAULT_CLEANER_INTERVAL),
        }
    }

    #[must_use]
    pub fn with_ticket_granting_ticket_expiration(mut self, policy: ExpirationPolicy) -> Self {
        self.ticket_granting_ticket_expiration = policy;
        self
    }

    #[must_use]
    pub fn with_service_ticket_expiration(mut self, policy: ExpirationPolicy) -> Self {
        self.service_ticket_expiration = policy;
        self
    }

    #[must_use]
    pub fn with_proxy_granting_ticket_expiration(mut self, policy: ExpirationPolicy) -> Self {
        self.proxy_granting_ticket_expiration = policy;
        self
    }

    #[must_use]
    pub fn with_proxy_ticket_expiration(mut self, policy: ExpirationPolicy) -> Self {
        self.proxy_ticket_expiration = policy;
        self
    }

    #[must_use]
    pub fn with_only_track_most_recent_session(mut self, enabled: bool) -> Self {
        self.only_track_most_recent_session = enabled;
        self
    }

    #[must_use]
    pub fn with_cipher(mut self, cipher: Option<Arc<dyn CipherExecutor>>) -> Self {
        self.cipher = cipher;
        self
    }

    #[must_use]
    pub fn with_id_generator(mut self, generator: Arc<dyn UniqueTicketIdGenerator>) -> Self {
        self.id_generator = Some(generator);
        self
    }

    #[must_use]
    pub fn with_service_id_generator(
        mut self,
        kind: ServiceKind,
        generator: Arc<dyn UniqueTicketIdGenerator>,
    ) -> Self {
        self.service_id_generators.insert(kind, generator);
        self
    }

    /// `None` disables the periodic cleaner.
    #[must_use]
    pub fn with_cleaner_interval(mut self, interval: Option<Duration>) -> Self {
        self.cleaner_interval = interval.filter(|i| !i.is_zero());
        self
    }

    #[must_use]
    pub fn ticket_granting_ticket_expiration(&self) -> &ExpirationPolicy {
        &self.ticket_granting_ticket_expiration
    }

    #[must_use]
    pub fn service_ticket_expiration(&self) -> &ExpirationPolicy {
        &self.service_ticket_expiration
    }

    #[must_use]
    pub fn proxy_granting_ticket_expiration(&self) -> &ExpirationPolicy {
        &self.proxy_granting_ticket_expiration
    }

    #[must_use]
    pub fn proxy_ticket_expiration(&self) -> &ExpirationPolicy {
        &self.proxy_ticket_expiration
    }

    #[must_use]
    pub fn only_track_most_recent_session(&self) -> bool {
        self.only_track_most_recent_session
    }

    #[must_use]
    pub fn cipher(&self) -> Option<Arc<dyn CipherExecutor>> {
        self.cipher.clone()
    }

    #[must_use]
    pub fn cleaner_interval(&self) -> Option<Duration> {
        self.cleaner_interval
    }

    /// Generator for a service's kind, falling back to the default one.
    #[must_use]
    pub fn id_generator_for(&self, service: Option<&Service>) -> Arc<dyn UniqueTicketIdGenerator> {
        service
            .and_then(|service| self.service_id_generators.get(&service.kind()))
            .or(self.id_generator.as_ref())
            .cloned()
            .unwrap_or_else(|| {
                let generator: Arc<dyn UniqueTicketIdGenerator> =
                    Arc::new(DefaultUniqueTicketIdGenerator::default());
                generator
            })
    }
}
