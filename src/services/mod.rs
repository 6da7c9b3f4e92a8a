//! Services asking for tickets and the registry of services allowed to.

pub mod access;

pub use access::{
    ensure_principal_access_is_allowed, ensure_service_access_is_allowed,
    ensure_service_sso_access_is_allowed, AccessStrategy,
};

use crate::{
    authentication::Attributes,
    error::{Error, Result},
    mfa::FailureMode,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

/// Protocol family of a requesting service. Ticket ids can be generated
/// differently per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    #[default]
    WebApplication,
    OAuth,
    Saml,
    OpenIdConnect,
}

/// An application asking for access on behalf of the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    id: String,
    #[serde(default)]
    kind: ServiceKind,
    #[serde(default)]
    attributes: Attributes,
}

impl Service {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ServiceKind::default(),
            attributes: Attributes::new(),
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: ServiceKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    #[must_use]
    pub fn matches(&self, other: &Service) -> bool {
        self.id == other.id
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Per-service multifactor settings.
#[derive(Debug, Clone, Default)]
pub struct MultifactorPolicy {
    provider_ids: Vec<String>,
    failure_mode: Option<FailureMode>,
    principal_attribute_name_trigger: Option<String>,
    principal_attribute_value_to_match: Option<Regex>,
    bypass_enabled: bool,
}

impl MultifactorPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_provider(mut self, provider_id: &str) -> Self {
        self.provider_ids.push(provider_id.to_string());
        self
    }

    /// Overrides the provider's own failure mode for this service.
    #[must_use]
    pub fn with_failure_mode(mut self, failure_mode: FailureMode) -> Self {
        self.failure_mode = Some(failure_mode);
        self
    }

    /// Only require the providers when the principal carries a matching
    /// attribute value.
    ///
    /// # Errors
    /// Returns an error if `pattern` is not a valid regular expression.
    pub fn with_principal_attribute_trigger(mut self, name: &str, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| {
            Error::Configuration(format!("invalid attribute pattern {pattern}: {e}"))
        })?;
        self.principal_attribute_name_trigger = Some(name.to_string());
        self.principal_attribute_value_to_match = Some(regex);
        Ok(self)
    }

    /// Skip multifactor entirely for this service.
    #[must_use]
    pub fn with_bypass_enabled(mut self, enabled: bool) -> Self {
        self.bypass_enabled = enabled;
        self
    }

    #[must_use]
    pub fn provider_ids(&self) -> &[String] {
        &self.provider_ids
    }

    #[must_use]
    pub fn failure_mode(&self) -> Option<FailureMode> {
        self.failure_mode
    }

    #[must_use]
    pub fn principal_attribute_trigger(&self) -> Option<(&str, &Regex)> {
        self.principal_attribute_name_trigger
            .as_deref()
            .zip(self.principal_attribute_value_to_match.as_ref())
    }

    #[must_use]
    pub fn is_bypass_enabled(&self) -> bool {
        self.bypass_enabled
    }
}

/// A service definition: which service ids it covers and what they may do.
#[derive(Debug, Clone)]
pub struct RegisteredService {
    id: u64,
    name: String,
    service_id: Regex,
    evaluation_order: i32,
    access_strategy: AccessStrategy,
    multifactor_policy: MultifactorPolicy,
    required_handlers: BTreeSet<String>,
    proxy_allowed: bool,
}

impl RegisteredService {
    /// # Errors
    /// Returns an error if `pattern` is not a valid regular expression.
    pub fn new(id: u64, name: &str, pattern: &str) -> Result<Self> {
        let service_id = Regex::new(pattern)
            .map_err(|e| Error::Configuration(format!("invalid service pattern {pattern}: {e}")))?;
        Ok(Self {
            id,
            name: name.to_string(),
            service_id,
            evaluation_order: 0,
            access_strategy: AccessStrategy::default(),
            multifactor_policy: MultifactorPolicy::default(),
            required_handlers: BTreeSet::new(),
            proxy_allowed: false,
        })
    }

    #[must_use]
    pub fn with_evaluation_order(mut self, order: i32) -> Self {
        self.evaluation_order = order;
        self
    }

    #[must_use]
    pub fn with_access_strategy(mut self, strategy: AccessStrategy) -> Self {
        self.access_strategy = strategy;
        self
    }

    #[must_use]
    pub fn with_multifactor_policy(mut self, policy: MultifactorPolicy) -> Self {
        self.multifactor_policy = policy;
        self
    }

    #[must_use]
    pub fn with_required_handler(mut self, handler: &str) -> Self {
        self.required_handlers.insert(handler.to_string());
        self
    }

    #[must_use]
    pub fn with_proxy_allowed(mut self, allowed: bool) -> Self {
        self.proxy_allowed = allowed;
        self
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn service_id(&self) -> &str {
        self.service_id.as_str()
    }

    #[must_use]
    pub fn evaluation_order(&self) -> i32 {
        self.evaluation_order
    }

    #[must_use]
    pub fn access_strategy(&self) -> &AccessStrategy {
        &self.access_strategy
    }

    #[must_use]
    pub fn multifactor_policy(&self) -> &MultifactorPolicy {
        &self.multifactor_policy
    }

    #[must_use]
    pub fn required_handlers(&self) -> &BTreeSet<String> {
        &self.required_handlers
    }

    #[must_use]
    pub fn is_proxy_allowed(&self) -> bool {
        self.proxy_allowed
    }

    #[must_use]
    pub fn matches(&self, service: &Service) -> bool {
        self.service_id.is_match(service.id())
    }
}

pub trait ServicesManager: Send + Sync {
    /// First registered service, by evaluation order, matching `service`.
    fn find_service_by(&self, service: &Service) -> Option<Arc<RegisteredService>>;

    fn find_service_by_id(&self, id: u64) -> Option<Arc<RegisteredService>>;

    fn all_services(&self) -> Vec<Arc<RegisteredService>>;
}

#[derive(Debug, Default)]
pub struct InMemoryServicesManager {
    services: RwLock<Vec<Arc<RegisteredService>>>,
}

impl InMemoryServicesManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by id.
    pub fn save(&self, service: RegisteredService) -> Arc<RegisteredService> {
        let service = Arc::new(service);
        let mut services = self.services.write().unwrap_or_else(PoisonError::into_inner);
        services.retain(|existing| existing.id() != service.id());
        services.push(service.clone());
        services.sort_by_key(|s| (s.evaluation_order(), s.id()));
        service
    }

    pub fn delete(&self, id: u64) -> Option<Arc<RegisteredService>> {
        let mut services = self.services.write().unwrap_or_else(PoisonError::into_inner);
        let position = services.iter().position(|s| s.id() == id)?;
        Some(services.remove(position))
    }
}

impl ServicesManager for InMemoryServicesManager {
    fn find_service_by(&self, service: &Service) -> Option<Arc<RegisteredService>> {
        self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|registered| registered.matches(service))
            .cloned()
    }

    fn find_service_by_id(&self, id: u64) -> Option<Arc<RegisteredService>> {
        self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|registered| registered.id() == id)
            .cloned()
    }

    fn all_services(&self) -> Vec<Arc<RegisteredService>> {
        self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pattern_is_a_configuration_error() {
        assert!(matches!(
            RegisteredService::new(1, "broken", "(unclosed"),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn lookup_honors_evaluation_order() {
        let manager = InMemoryServicesManager::new();
        manager.save(
            RegisteredService::new(1, "catch-all", ".*")
                .expect("pattern")
                .with_evaluation_order(100),
        );
        manager.save(
            RegisteredService::new(2, "portal", "^https://portal\\.example\\.org/.*")
                .expect("pattern")
                .with_evaluation_order(1),
        );

        let portal = manager
            .find_service_by(&Service::new("https://portal.example.org/home"))
            .expect("registered");
        assert_eq!(portal.name(), "portal");

        let other = manager
            .find_service_by(&Service::new("https://other.example.org"))
            .expect("registered");
        assert_eq!(other.name(), "catch-all");
    }

    #[test]
    fn save_replaces_and_delete_removes() {
        let manager = InMemoryServicesManager::new();
        manager.save(RegisteredService::new(1, "first", ".*").expect("pattern"));
        manager.save(RegisteredService::new(1, "renamed", ".*").expect("pattern"));
        assert_eq!(manager.all_services().len(), 1);
        assert_eq!(
            manager.find_service_by_id(1).map(|s| s.name().to_string()),
            Some("renamed".to_string())
        );

        assert!(manager.delete(1).is_some());
        assert!(manager.delete(1).is_none());
        assert!(manager.find_service_by(&Service::new("https://app")).is_none());
    }

    #[test]
    fn services_match_by_id() {
        let service = Service::new("https://app.example.org").with_kind(ServiceKind::Saml);
        assert!(service.matches(&Service::new("https://app.example.org")));
        assert!(!service.matches(&Service::new("https://app.example.org/other")));
        assert_eq!(service.kind(), ServiceKind::Saml);
    }
}
