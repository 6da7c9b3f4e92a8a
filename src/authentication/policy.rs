use super::{handler::CredentialFailure, Authentication};

/// Decides whether an authentication in progress is good enough.
///
/// The manager asks after every successful handler attempt, so a policy
/// that is satisfied early stops further handlers from running.
pub trait AuthenticationPolicy: Send + Sync {
    fn is_satisfied_by(&self, authentication: &Authentication) -> bool;
}

fn all_credentials_attempted(authentication: &Authentication) -> bool {
    authentication.credentials().len()
        <= authentication.successes().len() + authentication.failures().len()
}

/// Satisfied by any successful handler.
///
/// With `try_all`, every credential must have been attempted first.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnyAuthenticationPolicy {
    try_all: bool,
}

impl AnyAuthenticationPolicy {
    #[must_use]
    pub fn new(try_all: bool) -> Self {
        Self { try_all }
    }
}

impl AuthenticationPolicy for AnyAuthenticationPolicy {
    fn is_satisfied_by(&self, authentication: &Authentication) -> bool {
        if authentication.successes().is_empty() {
            return false;
        }
        !self.try_all || all_credentials_attempted(authentication)
    }
}

/// Satisfied only when every credential was authenticated.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllAuthenticationPolicy;

impl AuthenticationPolicy for AllAuthenticationPolicy {
    fn is_satisfied_by(&self, authentication: &Authentication) -> bool {
        !authentication.successes().is_empty()
            && authentication.successes().len() >= authentication.credentials().len()
    }
}

/// Satisfied when a named handler succeeded.
#[derive(Debug, Clone)]
pub struct RequiredHandlerAuthenticationPolicy {
    handler_name: String,
    try_all: bool,
}

impl RequiredHandlerAuthenticationPolicy {
    pub fn new(handler_name: impl Into<String>) -> Self {
        Self {
            handler_name: handler_name.into(),
            try_all: false,
        }
    }

    #[must_use]
    pub fn with_try_all(mut self, try_all: bool) -> Self {
        self.try_all = try_all;
        self
    }
}

impl AuthenticationPolicy for RequiredHandlerAuthenticationPolicy {
    fn is_satisfied_by(&self, authentication: &Authentication) -> bool {
        if self.try_all && !all_credentials_attempted(authentication) {
            return false;
        }
        authentication.successes().contains_key(&self.handler_name)
    }
}

/// Like [`AnyAuthenticationPolicy`], but any handler reporting a prevented
/// account vetoes the whole attempt.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotPreventedAuthenticationPolicy;

impl AuthenticationPolicy for NotPreventedAuthenticationPolicy {
    fn is_satisfied_by(&self, authentication: &Authentication) -> bool {
        let prevented = authentication
            .failures()
            .values()
            .any(|failure| matches!(failure, CredentialFailure::Prevented { .. }));
        !prevented && AnyAuthenticationPolicy::default().is_satisfied_by(authentication)
    }
}
