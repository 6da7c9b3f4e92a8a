//! Ticket lifecycle facade: sessions, service and proxy tickets,
//! validation and revocation.

use crate::{
    authentication::{Authentication, AuthenticationResult},
    config::TicketConfig,
    error::{Error, InvalidTicketReason, Result},
    logout::{LogoutManager, LogoutRequest},
    services::{
        ensure_principal_access_is_allowed, ensure_service_access_is_allowed,
        ensure_service_sso_access_is_allowed, RegisteredService, Service, ServicesManager,
    },
    ticket::{ServiceTicket, Ticket, TicketGrantingTicket, TicketKind, TicketRegistry},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// What a service learns when it validates a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assertion {
    primary_authentication: Authentication,
    chained_authentications: Vec<Authentication>,
    service: Service,
    from_new_login: bool,
}

impl Assertion {
    #[must_use]
    pub fn primary_authentication(&self) -> &Authentication {
        &self.primary_authentication
    }

    /// Root session first, then one entry per proxy hop.
    #[must_use]
    pub fn chained_authentications(&self) -> &[Authentication] {
        &self.chained_authentications
    }

    #[must_use]
    pub fn service(&self) -> &Service {
        &self.service
    }

    #[must_use]
    pub fn is_from_new_login(&self) -> bool {
        self.from_new_login
    }
}

fn into_granting(ticket: Ticket, id: &str) -> Result<TicketGrantingTicket> {
    let actual = ticket.kind();
    ticket.into_ticket_granting().ok_or_else(|| {
        Error::invalid_ticket(
            id,
            InvalidTicketReason::UnexpectedKind {
                expected: TicketKind::TicketGranting,
                actual,
            },
        )
    })
}

fn into_service(ticket: Ticket, id: &str) -> Result<ServiceTicket> {
    let actual = ticket.kind();
    ticket.into_service().ok_or_else(|| {
        Error::invalid_ticket(
            id,
            InvalidTicketReason::UnexpectedKind {
                expected: TicketKind::Service,
                actual,
            },
        )
    })
}

pub struct CentralAuthenticationService {
    registry: Arc<dyn TicketRegistry>,
    services: Arc<dyn ServicesManager>,
    logout: LogoutManager,
    config: TicketConfig,
}

impl CentralAuthenticationService {
    pub fn new(
        registry: Arc<dyn TicketRegistry>,
        services: Arc<dyn ServicesManager>,
        config: TicketConfig,
    ) -> Self {
        let logout = LogoutManager::new(registry.clone());
        Self {
            registry,
            services,
            logout,
            config,
        }
    }

    #[must_use]
    pub fn with_logout_manager(mut self, logout: LogoutManager) -> Self {
        self.logout = logout;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<dyn TicketRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn services(&self) -> &Arc<dyn ServicesManager> {
        &self.services
    }

    #[must_use]
    pub fn logout_manager(&self) -> &LogoutManager {
        &self.logout
    }

    #[must_use]
    pub fn config(&self) -> &TicketConfig {
        &self.config
    }

    /// Start a single sign-on session for a finished authentication.
    ///
    /// # Errors
    /// Fails when the target service refuses the principal or the ticket
    /// cannot be stored.
    #[instrument(skip_all, fields(principal = result.authentication().principal().id()))]
    pub fn create_ticket_granting_ticket(
        &self,
        result: &AuthenticationResult,
    ) -> Result<TicketGrantingTicket> {
        let authentication = result.authentication();
        if let Some(service) = result.service() {
            let registered = self.services.find_service_by(service);
            ensure_principal_access_is_allowed(
                service,
                registered.as_deref(),
                authentication.principal(),
            )?;
        }

        let id = self
            .config
            .id_generator_for(None)
            .new_ticket_id(TicketKind::TicketGranting.prefix());
        let ticket = TicketGrantingTicket::new(
            id,
            authentication.clone(),
            self.config.ticket_granting_ticket_expiration().clone(),
        );
        self.registry.add_ticket(ticket.clone().into())?;

        info!(ticket = ticket.id(), "created ticket-granting ticket");
        Ok(ticket)
    }

    /// Grant a service ticket from a session. With `result`, fresh
    /// credentials were presented and must belong to the session principal.
    ///
    /// # Errors
    /// Fails when the session is invalid, the service is not allowed or
    /// the principals differ.
    #[instrument(skip(self, result), fields(service = service.id()))]
    pub fn grant_service_ticket(
        &self,
        ticket_granting_ticket_id: &str,
        service: &Service,
        result: Option<&AuthenticationResult>,
    ) -> Result<ServiceTicket> {
        self.grant(
            ticket_granting_ticket_id,
            TicketKind::TicketGranting,
            service,
            result,
        )
    }

    /// Grant a proxy ticket from a proxy-granting ticket.
    ///
    /// # Errors
    /// Fails when the proxy-granting ticket is invalid or the service is not
    /// allowed.
    #[instrument(skip(self), fields(service = service.id()))]
    pub fn grant_proxy_ticket(
        &self,
        proxy_granting_ticket_id: &str,
        service: &Service,
    ) -> Result<ServiceTicket> {
        self.grant(
            proxy_granting_ticket_id,
            TicketKind::ProxyGranting,
            service,
            None,
        )
    }

    fn grant(
        &self,
        granting_id: &str,
        expected: TicketKind,
        service: &Service,
        result: Option<&AuthenticationResult>,
    ) -> Result<ServiceTicket> {
        let granting = into_granting(
            self.registry.get_ticket(granting_id, expected)?,
            granting_id,
        )?;
        let registered = self.services.find_service_by(service);
        let credential_provided = result.is_some_and(AuthenticationResult::is_credential_provided);

        if expected == TicketKind::TicketGranting && !credential_provided {
            ensure_service_sso_access_is_allowed(service, registered.as_deref())?;
        }

        let session_principal = granting.root_authentication().principal();
        let principal = match result {
            Some(result) => {
                let presented = result.authentication().principal();
                if presented.id() != session_principal.id() {
                    warn!(
                        expected = session_principal.id(),
                        actual = presented.id(),
                        "credentials belong to a different principal"
                    );
                    return Err(Error::MixedPrincipals {
                        expected: session_principal.id().to_string(),
                        actual: presented.id().to_string(),
                    });
                }
                presented
            }
            None => session_principal,
        };
        ensure_principal_access_is_allowed(service, registered.as_deref(), principal)?;

        let (prefix, policy) = if granting.is_root() {
            (
                TicketKind::Service.prefix(),
                self.config.service_ticket_expiration().clone(),
            )
        } else {
            (
                TicketKind::Proxy.prefix(),
                self.config.proxy_ticket_expiration().clone(),
            )
        };
        let id = self
            .config
            .id_generator_for(Some(service))
            .new_ticket_id(prefix);
        let track = self.config.only_track_most_recent_session();

        let mut granted = None;
        self.registry.atomic_update(granting_id, &mut |ticket| {
            let granting = ticket.as_ticket_granting_mut().ok_or_else(|| {
                Error::invalid_ticket(granting_id, InvalidTicketReason::NotFound)
            })?;
            if granting.is_expired() {
                return Err(Error::invalid_ticket(granting_id, InvalidTicketReason::Expired));
            }
            granted = Some(granting.grant_service_ticket(
                id.clone(),
                service.clone(),
                policy.clone(),
                credential_provided,
                track,
            ));
            Ok(())
        })?;

        let ticket = granted
            .ok_or_else(|| Error::Storage(format!("no ticket granted from {granting_id}")))?;
        self.registry.add_ticket(ticket.clone().into())?;

        info!(
            ticket = ticket.id(),
            granted_by = granting_id,
            from_new_login = ticket.is_from_new_login(),
            "granted ticket"
        );
        Ok(ticket)
    }

    /// Grant the proxy-granting ticket a service may obtain once per service
    /// ticket, after its callback was authenticated.
    ///
    /// # Errors
    /// Fails when the service ticket is invalid, already produced a
    /// proxy-granting ticket, or its service may not proxy.
    #[instrument(skip(self, result))]
    pub fn grant_proxy_granting_ticket(
        &self,
        service_ticket_id: &str,
        result: &AuthenticationResult,
    ) -> Result<TicketGrantingTicket> {
        let service_ticket = into_service(
            self.registry
                .get_ticket(service_ticket_id, TicketKind::Service)?,
            service_ticket_id,
        )?;
        let proxied_by = service_ticket.service().clone();

        let registered = self.services.find_service_by(&proxied_by);
        ensure_service_access_is_allowed(&proxied_by, registered.as_deref())?;
        if !registered
            .as_deref()
            .is_some_and(RegisteredService::is_proxy_allowed)
        {
            warn!(service = %proxied_by, "service is not allowed to proxy");
            return Err(Error::UnauthorizedProxying {
                service: proxied_by.id().to_string(),
            });
        }

        let parent_id = service_ticket.ticket_granting_ticket_id().to_string();
        let parent = into_granting(
            self.registry.get_ticket(&parent_id, TicketKind::TicketGranting)?,
            &parent_id,
        )?;

        let id = self
            .config
            .id_generator_for(None)
            .new_ticket_id(TicketKind::ProxyGranting.prefix());
        let policy = self.config.proxy_granting_ticket_expiration().clone();

        let mut granted = None;
        self.registry.atomic_update(service_ticket_id, &mut |ticket| {
            let service_ticket = ticket.as_service_mut().ok_or_else(|| {
                Error::invalid_ticket(service_ticket_id, InvalidTicketReason::NotFound)
            })?;
            granted = Some(service_ticket.grant_proxy_granting_ticket(
                id.clone(),
                result.authentication().clone(),
                policy.clone(),
                &parent,
            )?);
            Ok(())
        })?;

        let proxy_granting = granted
            .ok_or_else(|| Error::Storage(format!("no ticket granted from {service_ticket_id}")))?;
        self.registry.add_ticket(proxy_granting.clone().into())?;
        self.registry.atomic_update(&parent_id, &mut |ticket| {
            if let Some(parent) = ticket.as_ticket_granting_mut() {
                parent.register_proxy_granting_ticket(
                    proxy_granting.id().to_string(),
                    proxied_by.clone(),
                );
            }
            Ok(())
        })?;

        info!(
            ticket = proxy_granting.id(),
            service_ticket = service_ticket_id,
            "granted proxy-granting ticket"
        );
        Ok(proxy_granting)
    }

    /// Validate a service or proxy ticket for `service`. Every attempt
    /// consumes a use, whether or not the service matches.
    ///
    /// # Errors
    /// Fails when the ticket is invalid, expired anywhere in its chain or
    /// issued for another service.
    #[instrument(skip(self), fields(service = service.id()))]
    pub fn validate_service_ticket(
        &self,
        service_ticket_id: &str,
        service: &Service,
    ) -> Result<Assertion> {
        self.registry
            .get_ticket(service_ticket_id, TicketKind::Service)?;
        let registered = self.services.find_service_by(service);
        ensure_service_access_is_allowed(service, registered.as_deref())?;

        let mut valid = false;
        let consumed = self.registry.atomic_update(service_ticket_id, &mut |ticket| {
            let service_ticket = ticket.as_service_mut().ok_or_else(|| {
                Error::invalid_ticket(service_ticket_id, InvalidTicketReason::NotFound)
            })?;
            if service_ticket.is_expired() {
                return Err(Error::invalid_ticket(
                    service_ticket_id,
                    InvalidTicketReason::Expired,
                ));
            }
            valid = service_ticket.is_valid_for(service);
            Ok(())
        })?;
        let service_ticket = into_service(consumed, service_ticket_id)?;

        if service_ticket.is_expired() {
            debug!(ticket = service_ticket_id, "service ticket used up, removing it");
            self.registry.delete_ticket(service_ticket_id)?;
        }

        if !valid {
            warn!(
                ticket = service_ticket_id,
                issued_for = %service_ticket.service(),
                "ticket presented by a different service"
            );
            return Err(Error::invalid_ticket(
                service_ticket_id,
                InvalidTicketReason::ServiceMismatch,
            ));
        }

        let granting_id = service_ticket.ticket_granting_ticket_id();
        let granting = self
            .registry
            .find_ticket(granting_id)?
            .ok_or_else(|| Error::invalid_ticket(granting_id, InvalidTicketReason::NotFound))
            .and_then(|ticket| into_granting(ticket, granting_id))?;

        ensure_principal_access_is_allowed(
            service,
            registered.as_deref(),
            granting.root_authentication().principal(),
        )?;

        info!(ticket = service_ticket_id, "validated ticket");
        Ok(Assertion {
            primary_authentication: granting.root_authentication().clone(),
            chained_authentications: granting.chained_authentications(),
            service: service_ticket.service().clone(),
            from_new_login: service_ticket.is_from_new_login(),
        })
    }

    /// End a session: collect logout requests, then remove the session and
    /// everything granted from it.
    ///
    /// # Errors
    /// Returns [`Error::InvalidTicket`] if the ticket does not exist.
    #[instrument(skip(self))]
    pub fn destroy_ticket_granting_ticket(
        &self,
        ticket_granting_ticket_id: &str,
    ) -> Result<Vec<LogoutRequest>> {
        let ticket = self
            .registry
            .find_ticket(ticket_granting_ticket_id)?
            .ok_or_else(|| {
                Error::invalid_ticket(ticket_granting_ticket_id, InvalidTicketReason::NotFound)
            })?;
        let granting = into_granting(ticket, ticket_granting_ticket_id)?;

        let requests = self.logout.perform_logout(&granting)?;
        let removed = self.registry.delete_ticket(ticket_granting_ticket_id)?;
        info!(
            ticket = ticket_granting_ticket_id,
            removed,
            logout_requests = requests.len(),
            "destroyed ticket-granting ticket"
        );
        Ok(requests)
    }

    /// Replace the authentication a live session carries, e.g. to remember
    /// a multifactor bypass decided on a single sign-on request.
    ///
    /// # Errors
    /// Returns [`Error::InvalidTicket`] if the session is missing, expired or
    /// not a ticket-granting ticket.
    #[instrument(skip(self, authentication))]
    pub fn update_authentication(
        &self,
        ticket_granting_ticket_id: &str,
        authentication: Authentication,
    ) -> Result<()> {
        self.registry
            .get_ticket(ticket_granting_ticket_id, TicketKind::TicketGranting)?;
        self.registry
            .atomic_update(ticket_granting_ticket_id, &mut |ticket| {
                let granting = ticket.as_ticket_granting_mut().ok_or_else(|| {
                    Error::invalid_ticket(ticket_granting_ticket_id, InvalidTicketReason::NotFound)
                })?;
                granting.set_authentication(authentication.clone());
                Ok(())
            })?;
        debug!(ticket = ticket_granting_ticket_id, "updated session authentication");
        Ok(())
    }

    /// # Errors
    /// Returns [`Error::InvalidTicket`] if the session is missing or expired.
    pub fn get_authentication(&self, ticket_granting_ticket_id: &str) -> Result<Authentication> {
        let ticket = self
            .registry
            .get_ticket(ticket_granting_ticket_id, TicketKind::TicketGranting)?;
        Ok(into_granting(ticket, ticket_granting_ticket_id)?
            .authentication()
            .clone())
    }

    /// # Errors
    /// Returns [`Error::InvalidTicket`] if the ticket is missing, of the
    /// wrong kind or expired.
    pub fn get_ticket(&self, id: &str, expected: TicketKind) -> Result<Ticket> {
        self.registry.get_ticket(id, expected)
    }
}
