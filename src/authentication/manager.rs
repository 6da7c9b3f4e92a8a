use super::{
    builder::AuthenticationBuilder,
    credential::Credential,
    handler::{AuthenticationHandler, CredentialFailure},
    handler_resolver::{AuthenticationHandlerResolver, DefaultAuthenticationHandlerResolver},
    metadata::AuthenticationMetaDataPopulator,
    policy::AuthenticationPolicy,
    principal::Principal,
    resolver::PrincipalResolver,
    Authentication, AuthenticationError,
};
use crate::{error::Result, services::Service};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Credentials presented together, optionally on behalf of a service.
#[derive(Debug, Clone)]
pub struct AuthenticationTransaction {
    service: Option<Service>,
    credentials: Vec<Credential>,
}

impl AuthenticationTransaction {
    #[must_use]
    pub fn new(service: Option<Service>, credentials: Vec<Credential>) -> Self {
        Self {
            service,
            credentials,
        }
    }

    #[must_use]
    pub fn of(credential: Credential) -> Self {
        Self::new(None, vec![credential])
    }

    #[must_use]
    pub fn service(&self) -> Option<&Service> {
        self.service.as_ref()
    }

    #[must_use]
    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }
}

/// A handler and the principal resolver paired with it.
#[derive(Clone)]
pub struct HandlerBinding {
    handler: Arc<dyn AuthenticationHandler>,
    resolver: Option<Arc<dyn PrincipalResolver>>,
}

impl HandlerBinding {
    pub fn new(handler: Arc<dyn AuthenticationHandler>) -> Self {
        Self {
            handler,
            resolver: None,
        }
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn PrincipalResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    #[must_use]
    pub fn handler(&self) -> &dyn AuthenticationHandler {
        self.handler.as_ref()
    }
}

pub trait AuthenticationManager: Send + Sync {
    /// # Errors
    /// Returns [`crate::Error::Authentication`] when no handler succeeded or
    /// the policy was not satisfied.
    fn authenticate(&self, transaction: &AuthenticationTransaction) -> Result<Authentication>;
}

/// Runs every credential through the resolved handlers until the policy is
/// satisfied.
pub struct PolicyBasedAuthenticationManager {
    handlers: Vec<HandlerBinding>,
    handler_resolver: Arc<dyn AuthenticationHandlerResolver>,
    policy: Arc<dyn AuthenticationPolicy>,
    populators: Vec<Arc<dyn AuthenticationMetaDataPopulator>>,
    principal_resolution_fatal: bool,
}

impl PolicyBasedAuthenticationManager {
    pub fn new(policy: Arc<dyn AuthenticationPolicy>) -> Self {
        Self {
            handlers: Vec::new(),
            handler_resolver: Arc::new(DefaultAuthenticationHandlerResolver),
            policy,
            populators: Vec::new(),
            principal_resolution_fatal: false,
        }
    }

    #[must_use]
    pub fn with_handler(mut self, binding: HandlerBinding) -> Self {
        self.handlers.push(binding);
        self
    }

    #[must_use]
    pub fn with_handler_resolver(
        mut self,
        resolver: Arc<dyn AuthenticationHandlerResolver>,
    ) -> Self {
        self.handler_resolver = resolver;
        self
    }

    #[must_use]
    pub fn with_populator(mut self, populator: Arc<dyn AuthenticationMetaDataPopulator>) -> Self {
        self.populators.push(populator);
        self
    }

    /// Treat a resolver returning no principal as a handler failure.
    #[must_use]
    pub fn with_principal_resolution_fatal(mut self, fatal: bool) -> Self {
        self.principal_resolution_fatal = fatal;
        self
    }

    fn authenticate_internal(
        &self,
        transaction: &AuthenticationTransaction,
    ) -> Result<AuthenticationBuilder> {
        let mut builder = AuthenticationBuilder::new();
        for credential in transaction.credentials() {
            builder.add_credential(credential.metadata());
        }

        let handlers = self.handler_resolver.resolve(&self.handlers, transaction);

        for credential in transaction.credentials() {
            let mut attempted = false;
            for binding in handlers.iter().filter(|b| b.handler.supports(credential)) {
                attempted = true;
                let name = binding.handler.name();
                match self.authenticate_and_resolve_principal(&mut builder, credential, binding) {
                    Ok(()) => {
                        if self.policy.is_satisfied_by(&builder.build()) {
                            debug!(handler = name, "authentication policy satisfied");
                            return Ok(builder);
                        }
                    }
                    Err(failure) => {
                        info!(
                            handler = name,
                            credential = credential.id(),
                            %failure,
                            "handler failed to authenticate"
                        );
                        builder.add_failure(name, failure);
                    }
                }
            }
            if !attempted {
                warn!(
                    credential = credential.id(),
                    kind = %credential.kind(),
                    "no handler supports the credential"
                );
            }
        }

        self.evaluate_produced_authentication_context(&builder)?;
        Ok(builder)
    }

    fn authenticate_and_resolve_principal(
        &self,
        builder: &mut AuthenticationBuilder,
        credential: &Credential,
        binding: &HandlerBinding,
    ) -> Result<(), CredentialFailure> {
        let result = binding.handler.authenticate(credential)?;
        let principal = self.resolve_principal(binding, credential, result.principal())?;
        builder
            .set_principal(principal)
            .add_success(binding.handler.name(), result);
        Ok(())
    }

    fn resolve_principal(
        &self,
        binding: &HandlerBinding,
        credential: &Credential,
        principal: Option<&Principal>,
    ) -> Result<Principal, CredentialFailure> {
        let fallback = || {
            principal
                .cloned()
                .unwrap_or_else(|| Principal::new(credential.id()))
        };

        let Some(resolver) = binding
            .resolver
            .as_ref()
            .filter(|resolver| resolver.supports(credential))
        else {
            return Ok(fallback());
        };

        match resolver.resolve(credential, principal) {
            Some(resolved) => Ok(resolved),
            None if self.principal_resolution_fatal => {
                warn!(
                    resolver = resolver.name(),
                    credential = credential.id(),
                    "principal resolution failed"
                );
                Err(CredentialFailure::UnresolvedPrincipal)
            }
            None => {
                debug!(
                    resolver = resolver.name(),
                    "no principal resolved, using the handler principal"
                );
                Ok(fallback())
            }
        }
    }

    /// Two checks, in order: at least one success, then the policy.
    fn evaluate_produced_authentication_context(
        &self,
        builder: &AuthenticationBuilder,
    ) -> Result<()> {
        if builder.successes().is_empty() {
            return Err(AuthenticationError::new(
                builder.failures().clone(),
                builder.successes().clone(),
            )
            .into());
        }

        if !self.policy.is_satisfied_by(&builder.build()) {
            return Err(AuthenticationError::new(
                builder.failures().clone(),
                builder.successes().clone(),
            )
            .into());
        }
        Ok(())
    }
}

impl AuthenticationManager for PolicyBasedAuthenticationManager {
    #[instrument(skip_all, fields(credentials = transaction.credentials().len()))]
    fn authenticate(&self, transaction: &AuthenticationTransaction) -> Result<Authentication> {
        let mut builder = self.authenticate_internal(transaction)?;

        for credential in transaction.credentials() {
            for populator in self.populators.iter().filter(|p| p.supports(credential)) {
                populator.populate(&mut builder, credential);
            }
        }

        let authentication = builder.into_authentication();
        info!(
            principal = authentication.principal().id(),
            handlers = authentication.successes().len(),
            "authenticated"
        );
        Ok(authentication)
    }
}
