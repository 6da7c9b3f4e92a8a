use super::{BypassEvaluator, MultifactorProviderRegistry};
use crate::authentication::{Authentication, AUTHENTICATION_CONTEXT_ATTRIBUTE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextValidation {
    Satisfied,
    Unsatisfied,
    /// No provider is registered under the requested id.
    Unrecognized,
}

/// Decides whether an existing authentication already carries a requested
/// provider, so a single sign-on request need not repeat it.
#[derive(Debug, Clone)]
pub struct AuthenticationContextValidator {
    attribute: String,
    providers: MultifactorProviderRegistry,
}

impl AuthenticationContextValidator {
    pub fn new(providers: MultifactorProviderRegistry) -> Self {
        Self {
            attribute: AUTHENTICATION_CONTEXT_ATTRIBUTE.to_string(),
            providers,
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, attribute: &str) -> Self {
        self.attribute = attribute.to_string();
        self
    }

    #[must_use]
    pub fn validate(&self, authentication: &Authentication, requested: &str) -> ContextValidation {
        if self.providers.get(requested).is_none() {
            return ContextValidation::Unrecognized;
        }

        let completed = authentication
            .attribute(&self.attribute)
            .is_some_and(|contexts| contexts.iter().any(|c| c == requested));
        if completed || BypassEvaluator::is_bypassed(authentication, requested) {
            ContextValidation::Satisfied
        } else {
            ContextValidation::Unsatisfied
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        authentication::{AuthenticationBuilder, Principal},
        mfa::ConfiguredMultifactorProvider,
    };
    use std::sync::Arc;

    fn validator() -> AuthenticationContextValidator {
        let mut providers = MultifactorProviderRegistry::new();
        providers
            .register(Arc::new(ConfiguredMultifactorProvider::new("mfa-otp")))
            .expect("registered");
        AuthenticationContextValidator::new(providers)
    }

    #[test]
    fn completed_context_satisfies() {
        let mut builder = AuthenticationBuilder::new();
        builder.set_principal(Principal::new("casuser"));
        let plain = builder.build();
        assert_eq!(validator().validate(&plain, "mfa-otp"), ContextValidation::Unsatisfied);

        builder.merge_attribute(AUTHENTICATION_CONTEXT_ATTRIBUTE, "mfa-otp");
        assert_eq!(
            validator().validate(&builder.build(), "mfa-otp"),
            ContextValidation::Satisfied
        );
    }

    #[test]
    fn bypass_satisfies() {
        let mut builder = AuthenticationBuilder::new();
        builder.set_principal(Principal::new("casuser"));
        let bypassed = BypassEvaluator::remember_bypass(&builder.build(), "mfa-otp");
        assert_eq!(validator().validate(&bypassed, "mfa-otp"), ContextValidation::Satisfied);
    }

    #[test]
    fn unknown_provider_is_unrecognized() {
        let authentication = AuthenticationBuilder::new().build();
        assert_eq!(
            validator().validate(&authentication, "mfa-duo"),
            ContextValidation::Unrecognized
        );
    }
}
