use super::{
    credential::Credential,
    manager::{AuthenticationManager, AuthenticationTransaction},
    result::{AuthenticationResult, AuthenticationResultBuilder},
};
use crate::{error::Result, services::Service};
use std::sync::Arc;

/// Entry point used by the login flow to run authentication rounds and
/// collect them into a single result.
pub struct AuthenticationSystemSupport {
    manager: Arc<dyn AuthenticationManager>,
}

impl AuthenticationSystemSupport {
    pub fn new(manager: Arc<dyn AuthenticationManager>) -> Self {
        Self { manager }
    }

    /// # Errors
    /// Propagates the authentication failure.
    pub fn handle_initial_authentication_transaction(
        &self,
        service: Option<Service>,
        credentials: Vec<Credential>,
    ) -> Result<AuthenticationResultBuilder> {
        let mut builder = AuthenticationResultBuilder::new();
        self.handle_authentication_transaction(service, &mut builder, credentials)?;
        Ok(builder)
    }

    /// Authenticate another round into `builder`. No credentials is a no-op.
    ///
    /// # Errors
    /// Propagates the authentication failure.
    pub fn handle_authentication_transaction(
        &self,
        service: Option<Service>,
        builder: &mut AuthenticationResultBuilder,
        credentials: Vec<Credential>,
    ) -> Result<()> {
        if credentials.is_empty() {
            return Ok(());
        }
        let transaction = AuthenticationTransaction::new(service, credentials);
        let authentication = self.manager.authenticate(&transaction)?;
        builder.collect(authentication).set_credential_provided(true);
        Ok(())
    }

    /// # Errors
    /// Fails when no round succeeded or rounds disagree on the principal.
    pub fn finalize_all_authentication_transactions(
        &self,
        builder: &AuthenticationResultBuilder,
        service: Option<Service>,
    ) -> Result<AuthenticationResult> {
        builder.build(service)
    }

    /// # Errors
    /// Propagates the authentication failure.
    pub fn handle_and_finalize_single_authentication_transaction(
        &self,
        service: Option<Service>,
        credentials: Vec<Credential>,
    ) -> Result<AuthenticationResult> {
        let builder = self.handle_initial_authentication_transaction(service.clone(), credentials)?;
        self.finalize_all_authentication_transactions(&builder, service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authentication::{
        handler::AcceptUsersAuthenticationHandler, policy::AnyAuthenticationPolicy, Attributes,
        HandlerBinding, PolicyBasedAuthenticationManager,
    };

    fn support() -> AuthenticationSystemSupport {
        let policy = Arc::new(AnyAuthenticationPolicy::default());
        let manager = PolicyBasedAuthenticationManager::new(policy)
            .with_handler(HandlerBinding::new(Arc::new(
                AcceptUsersAuthenticationHandler::new("accept").with_user(
                    "casuser",
                    "Mellon",
                    Attributes::new(),
                ),
            )));
        AuthenticationSystemSupport::new(Arc::new(manager))
    }

    #[test]
    fn single_transaction_is_finalized() {
        let result = support()
            .handle_and_finalize_single_authentication_transaction(
                None,
                vec![Credential::username_password("casuser", "Mellon")],
            )
            .expect("authenticated");
        assert_eq!(result.authentication().principal().id(), "casuser");
        assert!(result.is_credential_provided());
    }

    #[test]
    fn empty_round_is_a_no_op() {
        let mut builder = AuthenticationResultBuilder::new();
        support()
            .handle_authentication_transaction(None, &mut builder, Vec::new())
            .expect("no-op");
        assert!(builder.authentications().is_empty());
    }

    #[test]
    fn failed_round_propagates() {
        assert!(support()
            .handle_initial_authentication_transaction(
                None,
                vec![Credential::username_password("casuser", "wrong")],
            )
            .is_err());
    }
}
