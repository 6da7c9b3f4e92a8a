//! Primary authentication: credentials, handlers, principal resolution and
//! the policy-based manager that combines them.

pub mod builder;
pub mod credential;
pub mod handler;
pub mod handler_resolver;
pub mod manager;
pub mod metadata;
pub mod policy;
pub mod principal;
pub mod resolver;
pub mod result;
pub mod support;

pub use builder::AuthenticationBuilder;
pub use credential::{Credential, CredentialKind, CredentialMetadata};
pub use handler::{AuthenticationHandler, CredentialFailure, HandlerResult};
pub use manager::{
    AuthenticationManager, AuthenticationTransaction, HandlerBinding,
    PolicyBasedAuthenticationManager,
};
pub use principal::{Attributes, Principal};
pub use result::{AuthenticationResult, AuthenticationResultBuilder};
pub use support::AuthenticationSystemSupport;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub const REMEMBER_ME_ATTRIBUTE: &str = "rememberMe";
pub const SUCCESSFUL_HANDLERS_ATTRIBUTE: &str = "successfulAuthenticationHandlers";
pub const AUTHENTICATION_CONTEXT_ATTRIBUTE: &str = "authenticationContext";

/// Immutable record of a completed authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authentication {
    principal: Principal,
    authentication_date: DateTime<Utc>,
    credentials: Vec<CredentialMetadata>,
    attributes: Attributes,
    successes: BTreeMap<String, HandlerResult>,
    failures: BTreeMap<String, CredentialFailure>,
}

impl Authentication {
    #[must_use]
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    #[must_use]
    pub fn authentication_date(&self) -> DateTime<Utc> {
        self.authentication_date
    }

    #[must_use]
    pub fn credentials(&self) -> &[CredentialMetadata] {
        &self.credentials
    }

    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&[String]> {
        self.attributes.get(name).map(Vec::as_slice)
    }

    #[must_use]
    pub fn successes(&self) -> &BTreeMap<String, HandlerResult> {
        &self.successes
    }

    #[must_use]
    pub fn failures(&self) -> &BTreeMap<String, CredentialFailure> {
        &self.failures
    }

    #[must_use]
    pub fn is_remember_me(&self) -> bool {
        self.attribute(REMEMBER_ME_ATTRIBUTE)
            .is_some_and(|values| values.iter().any(|v| v == "true"))
    }

    /// Start a builder seeded with this record, to derive an updated copy.
    #[must_use]
    pub fn to_builder(&self) -> AuthenticationBuilder {
        AuthenticationBuilder::from(self)
    }
}

/// Aggregate failure raised when no handler succeeded or the policy was not
/// met. Carries every per-handler outcome of the attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "authentication failed with {} handler failure(s) and {} success(es)",
    .failures.len(),
    .successes.len()
)]
pub struct AuthenticationError {
    failures: BTreeMap<String, CredentialFailure>,
    successes: BTreeMap<String, HandlerResult>,
}

impl AuthenticationError {
    #[must_use]
    pub fn new(
        failures: BTreeMap<String, CredentialFailure>,
        successes: BTreeMap<String, HandlerResult>,
    ) -> Self {
        Self {
            failures,
            successes,
        }
    }

    #[must_use]
    pub fn failures(&self) -> &BTreeMap<String, CredentialFailure> {
        &self.failures
    }

    #[must_use]
    pub fn successes(&self) -> &BTreeMap<String, HandlerResult> {
        &self.successes
    }
}
