use super::{
    credential::{Credential, CredentialMetadata},
    principal::{Attributes, Principal},
};
use crate::error::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use url::Url;

/// Why a single handler refused a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CredentialFailure {
    #[error("account not found")]
    AccountNotFound,
    #[error("invalid credentials")]
    FailedLogin,
    #[error("account disabled")]
    AccountDisabled,
    #[error("unsupported credential")]
    UnsupportedCredential,
    #[error("principal could not be resolved")]
    UnresolvedPrincipal,
    #[error("authentication prevented: {reason}")]
    Prevented { reason: String },
}

/// Outcome of a successful handler attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerResult {
    handler_name: String,
    credential: CredentialMetadata,
    principal: Option<Principal>,
    #[serde(default)]
    warnings: Vec<String>,
}

impl HandlerResult {
    pub fn new(
        handler_name: impl Into<String>,
        credential: CredentialMetadata,
        principal: Option<Principal>,
    ) -> Self {
        Self {
            handler_name: handler_name.into(),
            credential,
            principal,
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    #[must_use]
    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }

    #[must_use]
    pub fn credential(&self) -> &CredentialMetadata {
        &self.credential
    }

    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

pub trait AuthenticationHandler: Send + Sync {
    /// Unique name, used as the key for successes and failures.
    fn name(&self) -> &str;

    fn supports(&self, credential: &Credential) -> bool;

    /// # Errors
    /// Returns the reason the credential was refused.
    fn authenticate(&self, credential: &Credential) -> Result<HandlerResult, CredentialFailure>;
}

struct AcceptedUser {
    password: SecretString,
    attributes: Attributes,
}

/// Accepts a fixed set of username/password pairs.
pub struct AcceptUsersAuthenticationHandler {
    name: String,
    users: HashMap<String, AcceptedUser>,
}

impl AcceptUsersAuthenticationHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            users: HashMap::new(),
        }
    }

    /// Parse a comma separated `user::password` list.
    ///
    /// # Errors
    /// Returns an error if an entry is not in `user::password` form.
    pub fn from_users(name: impl Into<String>, users: &str) -> Result<Self> {
        let mut handler = Self::new(name);
        for entry in users.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (username, password) = entry
                .split_once("::")
                .filter(|(u, p)| !u.is_empty() && !p.is_empty())
                .ok_or_else(|| {
                    Error::Configuration(format!(
                        "accepted user entry must be user::password, got {entry}"
                    ))
                })?;
            handler = handler.with_user(username, password, Attributes::new());
        }
        Ok(handler)
    }

    #[must_use]
    pub fn with_user(mut self, username: &str, password: &str, attributes: Attributes) -> Self {
        self.users.insert(
            username.to_string(),
            AcceptedUser {
                password: SecretString::from(password.to_string()),
                attributes,
            },
        );
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl AuthenticationHandler for AcceptUsersAuthenticationHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, credential: &Credential) -> bool {
        matches!(credential, Credential::UsernamePassword { .. })
    }

    fn authenticate(&self, credential: &Credential) -> Result<HandlerResult, CredentialFailure> {
        let Credential::UsernamePassword {
            username, password, ..
        } = credential
        else {
            return Err(CredentialFailure::UnsupportedCredential);
        };

        let user = self
            .users
            .get(username)
            .ok_or(CredentialFailure::AccountNotFound)?;

        if user.password.expose_secret() != password.expose_secret() {
            return Err(CredentialFailure::FailedLogin);
        }

        Ok(HandlerResult::new(
            &self.name,
            credential.metadata(),
            Some(Principal::with_attributes(
                username.clone(),
                user.attributes.clone(),
            )),
        ))
    }
}

/// Rejects the listed usernames and accepts everyone else.
pub struct RejectUsersAuthenticationHandler {
    name: String,
    users: HashSet<String>,
}

impl RejectUsersAuthenticationHandler {
    pub fn new<I, S>(name: impl Into<String>, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            users: users.into_iter().map(Into::into).collect(),
        }
    }
}

impl AuthenticationHandler for RejectUsersAuthenticationHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, credential: &Credential) -> bool {
        matches!(credential, Credential::UsernamePassword { .. })
    }

    fn authenticate(&self, credential: &Credential) -> Result<HandlerResult, CredentialFailure> {
        let Credential::UsernamePassword { username, .. } = credential else {
            return Err(CredentialFailure::UnsupportedCredential);
        };

        if self.users.contains(username) {
            return Err(CredentialFailure::FailedLogin);
        }

        Ok(HandlerResult::new(
            &self.name,
            credential.metadata(),
            Some(Principal::new(username.clone())),
        ))
    }
}

/// Authenticates a proxying service by its callback URL.
///
/// Only `https` callbacks are accepted unless `require_secure` is off.
pub struct HttpBasedServiceCredentialsAuthenticationHandler {
    name: String,
    require_secure: bool,
}

impl HttpBasedServiceCredentialsAuthenticationHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            require_secure: true,
        }
    }

    #[must_use]
    pub fn with_require_secure(mut self, require_secure: bool) -> Self {
        self.require_secure = require_secure;
        self
    }
}

impl AuthenticationHandler for HttpBasedServiceCredentialsAuthenticationHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, credential: &Credential) -> bool {
        matches!(credential, Credential::HttpBasedService { .. })
    }

    fn authenticate(&self, credential: &Credential) -> Result<HandlerResult, CredentialFailure> {
        let Credential::HttpBasedService { callback_url } = credential else {
            return Err(CredentialFailure::UnsupportedCredential);
        };

        let url = Url::parse(callback_url).map_err(|_| CredentialFailure::FailedLogin)?;
        if url.host_str().is_none() {
            return Err(CredentialFailure::FailedLogin);
        }
        if self.require_secure && url.scheme() != "https" {
            return Err(CredentialFailure::Prevented {
                reason: format!("callback {callback_url} is not secure"),
            });
        }

        Ok(HandlerResult::new(
            &self.name,
            credential.metadata(),
            Some(Principal::new(callback_url.clone())),
        ))
    }
}

/// Verifies one-time passwords against a static token table.
pub struct OneTimePasswordAuthenticationHandler {
    name: String,
    tokens: HashMap<String, SecretString>,
}

impl OneTimePasswordAuthenticationHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tokens: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_token(mut self, id: &str, token: &str) -> Self {
        self.tokens
            .insert(id.to_string(), SecretString::from(token.to_string()));
        self
    }
}

impl AuthenticationHandler for OneTimePasswordAuthenticationHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, credential: &Credential) -> bool {
        matches!(credential, Credential::OneTimePassword { .. })
    }

    fn authenticate(&self, credential: &Credential) -> Result<HandlerResult, CredentialFailure> {
        let Credential::OneTimePassword { id, token } = credential else {
            return Err(CredentialFailure::UnsupportedCredential);
        };

        match self.tokens.get(id) {
            Some(expected) if expected.expose_secret() == token.expose_secret() => {
                let principal = Principal::new(id.clone());
                Ok(HandlerResult::new(&self.name, credential.metadata(), Some(principal)))
            }
            Some(_) => Err(CredentialFailure::FailedLogin),
            None => Err(CredentialFailure::AccountNotFound),
        }
    }
}
