use super::{
    builder::AuthenticationBuilder,
    principal::{merge_attributes, Principal},
    Authentication, AuthenticationError,
};
use crate::{
    error::{Error, Result},
    services::Service,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Final outcome of a login, possibly spanning several authentication
/// rounds (primary plus additional factors).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationResult {
    authentication: Authentication,
    service: Option<Service>,
    credential_provided: bool,
}

impl AuthenticationResult {
    #[must_use]
    pub fn new(authentication: Authentication, service: Option<Service>) -> Self {
        Self {
            authentication,
            service,
            credential_provided: true,
        }
    }

    #[must_use]
    pub fn authentication(&self) -> &Authentication {
        &self.authentication
    }

    #[must_use]
    pub fn service(&self) -> Option<&Service> {
        self.service.as_ref()
    }

    /// Whether fresh credentials were presented, as opposed to reusing a
    /// single sign-on session.
    #[must_use]
    pub fn is_credential_provided(&self) -> bool {
        self.credential_provided
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuthenticationResultBuilder {
    authentications: Vec<Authentication>,
    credential_provided: bool,
}

impl AuthenticationResultBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collect(&mut self, authentication: Authentication) -> &mut Self {
        self.authentications.push(authentication);
        self
    }

    pub fn set_credential_provided(&mut self, provided: bool) -> &mut Self {
        self.credential_provided = provided;
        self
    }

    #[must_use]
    pub fn initial_authentication(&self) -> Option<&Authentication> {
        self.authentications.first()
    }

    #[must_use]
    pub fn authentications(&self) -> &[Authentication] {
        &self.authentications
    }

    /// Swap a collected authentication for an updated copy of it.
    pub fn replace(&mut self, previous: &Authentication, updated: Authentication) -> bool {
        match self.authentications.iter_mut().find(|a| &**a == previous) {
            Some(slot) => {
                *slot = updated;
                true
            }
            None => false,
        }
    }

    /// Merge every collected authentication into one result.
    ///
    /// # Errors
    /// Fails when nothing was collected or the rounds disagree on the
    /// principal.
    pub fn build(&self, service: Option<Service>) -> Result<AuthenticationResult> {
        let Some((initial, rest)) = self.authentications.split_first() else {
            return Err(AuthenticationError::new(BTreeMap::new(), BTreeMap::new()).into());
        };

        let mut builder = AuthenticationBuilder::from(initial);
        let mut principal_attributes = initial.principal().attributes().clone();

        for authentication in rest {
            if authentication.principal().id() != initial.principal().id() {
                return Err(Error::MixedPrincipals {
                    expected: initial.principal().id().to_string(),
                    actual: authentication.principal().id().to_string(),
                });
            }
            merge_attributes(&mut principal_attributes, authentication.principal().attributes());
            for credential in authentication.credentials() {
                builder.add_credential(credential.clone());
            }
            for (name, values) in authentication.attributes() {
                for value in values {
                    builder.merge_attribute(name, value);
                }
            }
            for (name, success) in authentication.successes() {
                builder.add_success(name, success.clone());
            }
            for (name, failure) in authentication.failures() {
                builder.add_failure(name, failure.clone());
            }
        }

        builder.set_principal(Principal::with_attributes(
            initial.principal().id(),
            principal_attributes,
        ));

        Ok(AuthenticationResult {
            authentication: builder.into_authentication(),
            service,
            credential_provided: self.credential_provided,
        })
    }
}
