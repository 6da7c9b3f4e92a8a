use super::manager::{AuthenticationTransaction, HandlerBinding};
use crate::services::ServicesManager;
use std::sync::Arc;
use tracing::debug;

/// Picks the handlers allowed to take part in a transaction.
pub trait AuthenticationHandlerResolver: Send + Sync {
    fn resolve<'a>(
        &self,
        candidates: &'a [HandlerBinding],
        transaction: &AuthenticationTransaction,
    ) -> Vec<&'a HandlerBinding>;
}

/// Every configured handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultAuthenticationHandlerResolver;

impl AuthenticationHandlerResolver for DefaultAuthenticationHandlerResolver {
    fn resolve<'a>(
        &self,
        candidates: &'a [HandlerBinding],
        _transaction: &AuthenticationTransaction,
    ) -> Vec<&'a HandlerBinding> {
        candidates.iter().collect()
    }
}

/// Narrows handlers to the ones a registered service requires.
///
/// Services without a requirement, or requests without a service, get
/// every handler.
pub struct RegisteredServiceAuthenticationHandlerResolver {
    services: Arc<dyn ServicesManager>,
}

impl RegisteredServiceAuthenticationHandlerResolver {
    pub fn new(services: Arc<dyn ServicesManager>) -> Self {
        Self { services }
    }
}

impl AuthenticationHandlerResolver for RegisteredServiceAuthenticationHandlerResolver {
    fn resolve<'a>(
        &self,
        candidates: &'a [HandlerBinding],
        transaction: &AuthenticationTransaction,
    ) -> Vec<&'a HandlerBinding> {
        let required = transaction
            .service()
            .and_then(|service| self.services.find_service_by(service))
            .map(|registered| registered.required_handlers().clone())
            .unwrap_or_default();

        if required.is_empty() {
            return candidates.iter().collect();
        }

        debug!(?required, "restricting handlers to the service requirement");
        candidates
            .iter()
            .filter(|binding| required.contains(binding.handler().name()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        authentication::{
            handler::{AcceptUsersAuthenticationHandler, RejectUsersAuthenticationHandler},
            Credential,
        },
        services::{InMemoryServicesManager, RegisteredService, Service},
    };

    fn bindings() -> Vec<HandlerBinding> {
        vec![
            HandlerBinding::new(Arc::new(AcceptUsersAuthenticationHandler::new("accept"))),
            HandlerBinding::new(Arc::new(RejectUsersAuthenticationHandler::new(
                "reject",
                Vec::<String>::new(),
            ))),
        ]
    }

    #[test]
    fn registered_service_restricts_handlers() {
        let services = InMemoryServicesManager::new();
        services.save(
            RegisteredService::new(1, "portal", "^https://portal\\.example\\.org/.*")
                .expect("valid pattern")
                .with_required_handler("reject"),
        );
        let resolver = RegisteredServiceAuthenticationHandlerResolver::new(Arc::new(services));
        let candidates = bindings();

        let transaction = AuthenticationTransaction::new(
            Some(Service::new("https://portal.example.org/home")),
            vec![Credential::username_password("casuser", "Mellon")],
        );
        let resolved = resolver.resolve(&candidates, &transaction);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].handler().name(), "reject");

        let anonymous =
            AuthenticationTransaction::of(Credential::username_password("casuser", "Mellon"));
        assert_eq!(resolver.resolve(&candidates, &anonymous).len(), 2);
    }
}
