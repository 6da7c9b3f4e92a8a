use super::{RegisteredService, Service};
use crate::{
    authentication::{Attributes, Principal},
    error::{Error, Result},
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// What a registered service is allowed to do.
#[derive(Debug, Clone)]
pub struct AccessStrategy {
    enabled: bool,
    sso_enabled: bool,
    required_attributes: BTreeMap<String, BTreeSet<String>>,
}

impl Default for AccessStrategy {
    fn default() -> Self {
        Self {
            enabled: true,
            sso_enabled: true,
            required_attributes: BTreeMap::new(),
        }
    }
}

impl AccessStrategy {
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_sso_enabled(mut self, enabled: bool) -> Self {
        self.sso_enabled = enabled;
        self
    }

    /// The principal must carry `name` with at least one of `values`.
    #[must_use]
    pub fn with_required_attribute(mut self, name: &str, values: &[&str]) -> Self {
        self.required_attributes.insert(
            name.to_string(),
            values.iter().map(ToString::to_string).collect(),
        );
        self
    }

    #[must_use]
    pub fn is_service_access_allowed(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn is_service_access_allowed_for_sso(&self) -> bool {
        self.sso_enabled
    }

    #[must_use]
    pub fn does_principal_have_required_attributes(&self, attributes: &Attributes) -> bool {
        self.required_attributes.iter().all(|(name, accepted)| {
            attributes
                .get(name)
                .is_some_and(|values| values.iter().any(|v| accepted.contains(v)))
        })
    }
}

/// # Errors
/// Fails when the service is unknown or disabled.
pub fn ensure_service_access_is_allowed(
    service: &Service,
    registered: Option<&RegisteredService>,
) -> Result<()> {
    match registered {
        Some(registered) if registered.access_strategy().is_service_access_allowed() => Ok(()),
        Some(registered) => {
            warn!(service = %service, name = registered.name(), "service access is disabled");
            Err(Error::UnauthorizedService {
                service: service.id().to_string(),
            })
        }
        None => {
            warn!(service = %service, "service is not registered");
            Err(Error::UnauthorizedService {
                service: service.id().to_string(),
            })
        }
    }
}

/// Access check for tickets granted from an existing session rather than
/// fresh credentials.
///
/// # Errors
/// Fails when the service may not be used or may not join single sign-on.
pub fn ensure_service_sso_access_is_allowed(
    service: &Service,
    registered: Option<&RegisteredService>,
) -> Result<()> {
    ensure_service_access_is_allowed(service, registered)?;
    match registered {
        Some(registered) if !registered.access_strategy().is_service_access_allowed_for_sso() => {
            Err(Error::UnauthorizedSsoService {
                service: service.id().to_string(),
            })
        }
        _ => Ok(()),
    }
}

/// # Errors
/// Fails when the service is not allowed or the principal lacks the
/// attributes the service requires.
pub fn ensure_principal_access_is_allowed(
    service: &Service,
    registered: Option<&RegisteredService>,
    principal: &Principal,
) -> Result<()> {
    ensure_service_access_is_allowed(service, registered)?;
    match registered {
        Some(registered)
            if !registered
                .access_strategy()
                .does_principal_have_required_attributes(principal.attributes()) =>
        {
            Err(Error::UnauthorizedPrincipal {
                principal: principal.id().to_string(),
                service: service.id().to_string(),
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered(strategy: AccessStrategy) -> RegisteredService {
        RegisteredService::new(1, "app", "^https://app\\.example\\.org.*")
            .expect("pattern")
            .with_access_strategy(strategy)
    }

    #[test]
    fn unknown_or_disabled_services_are_refused() {
        let service = Service::new("https://app.example.org");
        assert!(matches!(
            ensure_service_access_is_allowed(&service, None),
            Err(Error::UnauthorizedService { .. })
        ));

        let disabled = registered(AccessStrategy::default().with_enabled(false));
        assert!(ensure_service_access_is_allowed(&service, Some(&disabled)).is_err());

        let enabled = registered(AccessStrategy::default());
        assert!(ensure_service_access_is_allowed(&service, Some(&enabled)).is_ok());
    }

    #[test]
    fn sso_can_be_disabled_per_service() {
        let service = Service::new("https://app.example.org");
        let no_sso = registered(AccessStrategy::default().with_sso_enabled(false));
        assert!(matches!(
            ensure_service_sso_access_is_allowed(&service, Some(&no_sso)),
            Err(Error::UnauthorizedSsoService { .. })
        ));
    }

    #[test]
    fn principal_needs_required_attributes() {
        let service = Service::new("https://app.example.org");
        let strict = registered(
            AccessStrategy::default().with_required_attribute("memberOf", &["admins", "staff"]),
        );

        let outsider = Principal::new("casuser");
        assert!(matches!(
            ensure_principal_access_is_allowed(&service, Some(&strict), &outsider),
            Err(Error::UnauthorizedPrincipal { .. })
        ));

        let staff = Principal::with_attributes(
            "casuser",
            Attributes::from([("memberOf".to_string(), vec!["staff".to_string()])]),
        );
        assert!(ensure_principal_access_is_allowed(&service, Some(&strict), &staff).is_ok());
    }
}
