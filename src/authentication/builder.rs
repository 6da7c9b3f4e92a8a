use super::{
    credential::CredentialMetadata,
    handler::{CredentialFailure, HandlerResult},
    principal::{Attributes, Principal},
    Authentication,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Mutable accumulator used while an authentication is in progress.
#[derive(Debug, Clone)]
pub struct AuthenticationBuilder {
    principal: Option<Principal>,
    authentication_date: DateTime<Utc>,
    credentials: Vec<CredentialMetadata>,
    attributes: Attributes,
    successes: BTreeMap<String, HandlerResult>,
    failures: BTreeMap<String, CredentialFailure>,
}

impl Default for AuthenticationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthenticationBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            principal: None,
            authentication_date: Utc::now(),
            credentials: Vec::new(),
            attributes: Attributes::new(),
            successes: BTreeMap::new(),
            failures: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn set_principal(&mut self, principal: Principal) -> &mut Self {
        self.principal = Some(principal);
        self
    }

    pub fn add_credential(&mut self, credential: CredentialMetadata) -> &mut Self {
        self.credentials.push(credential);
        self
    }

    pub fn add_success(&mut self, handler: &str, result: HandlerResult) -> &mut Self {
        self.successes.insert(handler.to_string(), result);
        self
    }

    pub fn add_failure(&mut self, handler: &str, failure: CredentialFailure) -> &mut Self {
        self.failures.insert(handler.to_string(), failure);
        self
    }

    /// Replace an attribute.
    pub fn add_attribute(&mut self, name: &str, values: Vec<String>) -> &mut Self {
        self.attributes.insert(name.to_string(), values);
        self
    }

    /// Append a value to an attribute, skipping duplicates.
    pub fn merge_attribute(&mut self, name: &str, value: &str) -> &mut Self {
        let values = self.attributes.entry(name.to_string()).or_default();
        if !values.iter().any(|v| v == value) {
            values.push(value.to_string());
        }
        self
    }

    pub fn remove_attribute(&mut self, name: &str) -> &mut Self {
        self.attributes.remove(name);
        self
    }

    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    #[must_use]
    pub fn successes(&self) -> &BTreeMap<String, HandlerResult> {
        &self.successes
    }

    #[must_use]
    pub fn failures(&self) -> &BTreeMap<String, CredentialFailure> {
        &self.failures
    }

    /// Snapshot the current state without consuming the builder.
    #[must_use]
    pub fn build(&self) -> Authentication {
        self.clone().into_authentication()
    }

    #[must_use]
    pub fn into_authentication(self) -> Authentication {
        Authentication {
            principal: self.principal.unwrap_or_else(Principal::null),
            authentication_date: self.authentication_date,
            credentials: self.credentials,
            attributes: self.attributes,
            successes: self.successes,
            failures: self.failures,
        }
    }
}

impl From<&Authentication> for AuthenticationBuilder {
    fn from(authentication: &Authentication) -> Self {
        Self {
            principal: Some(authentication.principal.clone()),
            authentication_date: authentication.authentication_date,
            credentials: authentication.credentials.clone(),
            attributes: authentication.attributes.clone(),
            successes: authentication.successes.clone(),
            failures: authentication.failures.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authentication::Credential;

    #[test]
    fn build_without_principal_yields_null_principal() {
        let authentication = AuthenticationBuilder::new().build();
        assert!(authentication.principal().is_null());
        assert!(authentication.successes().is_empty());
    }

    #[test]
    fn merge_attribute_skips_duplicates() {
        let mut builder = AuthenticationBuilder::new();
        builder
            .merge_attribute("authenticationContext", "mfa-duo")
            .merge_attribute("authenticationContext", "mfa-duo")
            .merge_attribute("authenticationContext", "mfa-otp");
        let authentication = builder.build();
        assert_eq!(
            authentication.attribute("authenticationContext"),
            Some(&["mfa-duo".to_string(), "mfa-otp".to_string()][..])
        );
    }

    #[test]
    fn to_builder_round_trips() {
        let credential = Credential::username_password("casuser", "Mellon");
        let mut builder = AuthenticationBuilder::new();
        builder
            .set_principal(Principal::new("casuser"))
            .add_credential(credential.metadata())
            .add_success(
                "accept",
                HandlerResult::new("accept", credential.metadata(), None),
            );
        let authentication = builder.build();

        assert_eq!(authentication.to_builder().build(), authentication);
    }
}
