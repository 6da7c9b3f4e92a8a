//! Multifactor providers: availability, bypass and failure modes.

pub mod bypass;
pub mod context;
pub mod registry;
pub mod trigger;

pub use bypass::{BypassEvaluator, BypassRule, BYPASS_PROVIDER_ATTRIBUTE};
pub use context::{AuthenticationContextValidator, ContextValidation};
pub use registry::MultifactorProviderRegistry;
pub use trigger::{evaluate_provider, TriggerOutcome};

use crate::{error::Error, services::RegisteredService};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    str::FromStr,
    sync::atomic::{AtomicBool, Ordering},
};

/// What to do when a provider cannot be reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FailureMode {
    /// Carry on without the factor.
    Open,
    /// Deny.
    #[default]
    Closed,
    /// Carry on and treat the factor as satisfied.
    Phantom,
}

impl FailureMode {
    /// Whether the flow may continue when the provider is down.
    #[must_use]
    pub fn allows_fallback(self) -> bool {
        !matches!(self, Self::Closed)
    }
}

impl fmt::Display for FailureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Closed => write!(f, "CLOSED"),
            Self::Phantom => write!(f, "PHANTOM"),
        }
    }
}

impl FromStr for FailureMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OPEN" => Ok(Self::Open),
            "CLOSED" => Ok(Self::Closed),
            "PHANTOM" => Ok(Self::Phantom),
            other => Err(Error::Configuration(format!("unknown failure mode {other}"))),
        }
    }
}

pub trait MultifactorAuthenticationProvider: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    /// Lower orders win when several providers are triggered.
    fn order(&self) -> i32 {
        0
    }

    fn matches(&self, identifier: &str) -> bool {
        self.id() == identifier
    }

    fn is_available(&self, service: Option<&RegisteredService>) -> bool;

    fn bypass_evaluator(&self) -> &BypassEvaluator;

    fn failure_mode(&self) -> FailureMode;
}

/// A provider whose availability is toggled by its owner, typically from a
/// health check.
#[derive(Debug)]
pub struct ConfiguredMultifactorProvider {
    id: String,
    order: i32,
    available: AtomicBool,
    bypass: BypassEvaluator,
    failure_mode: FailureMode,
}

impl ConfiguredMultifactorProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            order: 0,
            available: AtomicBool::new(true),
            bypass: BypassEvaluator::default(),
            failure_mode: FailureMode::default(),
        }
    }

    #[must_use]
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    #[must_use]
    pub fn with_bypass(mut self, bypass: BypassEvaluator) -> Self {
        self.bypass = bypass;
        self
    }

    #[must_use]
    pub fn with_failure_mode(mut self, failure_mode: FailureMode) -> Self {
        self.failure_mode = failure_mode;
        self
    }

    #[must_use]
    pub fn with_available(self, available: bool) -> Self {
        self.set_available(available);
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }
}

impl MultifactorAuthenticationProvider for ConfiguredMultifactorProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn is_available(&self, _service: Option<&RegisteredService>) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    fn bypass_evaluator(&self) -> &BypassEvaluator {
        &self.bypass
    }

    fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }
}

/// The service's own failure mode overrides the provider's.
#[must_use]
pub fn determine_failure_mode(
    service: Option<&RegisteredService>,
    provider: &dyn MultifactorAuthenticationProvider,
) -> FailureMode {
    service
        .and_then(|service| service.multifactor_policy().failure_mode())
        .unwrap_or_else(|| provider.failure_mode())
}
