use crate::{
    authentication::{Attributes, Authentication},
    error::{Error, Result},
    services::RegisteredService,
};
use regex::Regex;
use std::collections::BTreeSet;
use tracing::debug;

/// Authentication attribute listing the providers already bypassed.
pub const BYPASS_PROVIDER_ATTRIBUTE: &str = "bypassMultifactorAuthenticationProviderId";

/// A condition under which a provider is skipped.
#[derive(Debug, Clone)]
pub enum BypassRule {
    PrincipalAttribute { name: String, value_pattern: Regex },
    AuthenticationAttribute { name: String, value_pattern: Regex },
    /// Any of these handlers took part in the authentication.
    AuthenticationHandler { names: BTreeSet<String> },
    /// The service's multifactor policy has bypass enabled.
    RegisteredService,
}

fn pattern(value: &str) -> Result<Regex> {
    Regex::new(value)
        .map_err(|e| Error::Configuration(format!("invalid bypass pattern {value}: {e}")))
}

fn any_value_matches(attributes: &Attributes, name: &str, pattern: &Regex) -> bool {
    attributes
        .get(name)
        .is_some_and(|values| values.iter().any(|v| pattern.is_match(v)))
}

impl BypassRule {
    /// # Errors
    /// Returns an error if `value_pattern` is not a valid regular expression.
    pub fn principal_attribute(name: &str, value_pattern: &str) -> Result<Self> {
        Ok(Self::PrincipalAttribute {
            name: name.to_string(),
            value_pattern: pattern(value_pattern)?,
        })
    }

    /// # Errors
    /// Returns an error if `value_pattern` is not a valid regular expression.
    pub fn authentication_attribute(name: &str, value_pattern: &str) -> Result<Self> {
        Ok(Self::AuthenticationAttribute {
            name: name.to_string(),
            value_pattern: pattern(value_pattern)?,
        })
    }

    pub fn authentication_handler<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AuthenticationHandler {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    fn matches(
        &self,
        authentication: &Authentication,
        service: Option<&RegisteredService>,
    ) -> bool {
        match self {
            Self::PrincipalAttribute {
                name,
                value_pattern,
            } => any_value_matches(authentication.principal().attributes(), name, value_pattern),
            Self::AuthenticationAttribute {
                name,
                value_pattern,
            } => any_value_matches(authentication.attributes(), name, value_pattern),
            Self::AuthenticationHandler { names } => authentication
                .successes()
                .keys()
                .any(|handler| names.contains(handler)),
            Self::RegisteredService => {
                service.is_some_and(|s| s.multifactor_policy().is_bypass_enabled())
            }
        }
    }
}

/// Ordered bypass rules for one provider. The first matching rule wins.
#[derive(Debug, Clone, Default)]
pub struct BypassEvaluator {
    rules: Vec<BypassRule>,
}

impl BypassEvaluator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_rule(mut self, rule: BypassRule) -> Self {
        self.rules.push(rule);
        self
    }

    #[must_use]
    pub fn rules(&self) -> &[BypassRule] {
        &self.rules
    }

    /// False when the provider must be skipped, either because a bypass was
    /// recorded earlier or because a rule matches now.
    #[must_use]
    pub fn should_execute(
        &self,
        authentication: &Authentication,
        service: Option<&RegisteredService>,
        provider_id: &str,
    ) -> bool {
        if Self::is_bypassed(authentication, provider_id) {
            debug!(provider = provider_id, "bypass already recorded");
            return false;
        }
        match self
            .rules
            .iter()
            .position(|rule| rule.matches(authentication, service))
        {
            Some(rule) => {
                debug!(provider = provider_id, rule, "bypass rule matched");
                false
            }
            None => true,
        }
    }

    #[must_use]
    pub fn is_bypassed(authentication: &Authentication, provider_id: &str) -> bool {
        authentication
            .attribute(BYPASS_PROVIDER_ATTRIBUTE)
            .is_some_and(|providers| providers.iter().any(|p| p == provider_id))
    }

    /// Copy of `authentication` recording the bypass, so later requests in
    /// the same session skip the provider without re-evaluating.
    #[must_use]
    pub fn remember_bypass(authentication: &Authentication, provider_id: &str) -> Authentication {
        let mut builder = authentication.to_builder();
        builder.merge_attribute(BYPASS_PROVIDER_ATTRIBUTE, provider_id);
        builder.into_authentication()
    }
}
