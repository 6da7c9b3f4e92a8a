use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    UsernamePassword,
    OneTimePassword,
    HttpBasedService,
    Token,
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::UsernamePassword => "username_password",
            Self::OneTimePassword => "one_time_password",
            Self::HttpBasedService => "http_based_service",
            Self::Token => "token",
        };
        f.write_str(name)
    }
}

/// Proof of identity presented by a user or a proxying service.
///
/// Secrets are wrapped so they never leak through `Debug` or logs.
#[derive(Debug, Clone)]
pub enum Credential {
    UsernamePassword {
        username: String,
        password: SecretString,
        remember_me: bool,
    },
    OneTimePassword {
        id: String,
        token: SecretString,
    },
    /// Callback URL of a service asking for a proxy-granting ticket.
    HttpBasedService { callback_url: String },
    Token { token: SecretString },
}

impl Credential {
    pub fn username_password(username: impl Into<String>, password: &str) -> Self {
        Self::UsernamePassword {
            username: username.into(),
            password: SecretString::from(password.to_string()),
            remember_me: false,
        }
    }

    pub fn one_time_password(id: impl Into<String>, token: &str) -> Self {
        Self::OneTimePassword {
            id: id.into(),
            token: SecretString::from(token.to_string()),
        }
    }

    pub fn http_based_service(callback_url: impl Into<String>) -> Self {
        Self::HttpBasedService {
            callback_url: callback_url.into(),
        }
    }

    #[must_use]
    pub fn with_remember_me(mut self, enabled: bool) -> Self {
        if let Self::UsernamePassword { remember_me, .. } = &mut self {
            *remember_me = enabled;
        }
        self
    }

    #[must_use]
    pub fn kind(&self) -> CredentialKind {
        match self {
            Self::UsernamePassword { .. } => CredentialKind::UsernamePassword,
            Self::OneTimePassword { .. } => CredentialKind::OneTimePassword,
            Self::HttpBasedService { .. } => CredentialKind::HttpBasedService,
            Self::Token { .. } => CredentialKind::Token,
        }
    }

    /// Identifier claimed by the credential, never the secret.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::UsernamePassword { username, .. } => username,
            Self::OneTimePassword { id, .. } => id,
            Self::HttpBasedService { callback_url } => callback_url,
            Self::Token { .. } => "[token]",
        }
    }

    #[must_use]
    pub fn is_remember_me(&self) -> bool {
        matches!(
            self,
            Self::UsernamePassword {
                remember_me: true,
                ..
            }
        )
    }

    #[must_use]
    pub fn metadata(&self) -> CredentialMetadata {
        CredentialMetadata {
            id: self.id().to_string(),
            kind: self.kind(),
        }
    }
}

/// The non-secret part of a credential, kept on the authentication record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialMetadata {
    pub id: String,
    pub kind: CredentialKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_secrets() {
        let credential = Credential::username_password("casuser", "Mellon");
        let debug = format!("{credential:?}");
        assert!(debug.contains("casuser"));
        assert!(!debug.contains("Mellon"));
    }

    #[test]
    fn remember_me_only_applies_to_passwords() {
        let credential = Credential::username_password("casuser", "Mellon").with_remember_me(true);
        assert!(credential.is_remember_me());

        let otp = Credential::one_time_password("casuser", "123456").with_remember_me(true);
        assert!(!otp.is_remember_me());
    }

    #[test]
    fn metadata_carries_id_and_kind() {
        let metadata = Credential::http_based_service("https://proxy.example.org/cb").metadata();
        assert_eq!(metadata.id, "https://proxy.example.org/cb");
        assert_eq!(metadata.kind, CredentialKind::HttpBasedService);
        assert_eq!(metadata.kind.to_string(), "http_based_service");
    }
}
