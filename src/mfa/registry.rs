use super::MultifactorAuthenticationProvider;
use crate::error::{Error, Result};
use std::sync::Arc;

/// Providers in registration order.
#[derive(Debug, Clone, Default)]
pub struct MultifactorProviderRegistry {
    providers: Vec<Arc<dyn MultifactorAuthenticationProvider>>,
}

impl MultifactorProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// Returns [`Error::Configuration`] if the id is already registered.
    pub fn register(&mut self, provider: Arc<dyn MultifactorAuthenticationProvider>) -> Result<()> {
        if self.get(provider.id()).is_some() {
            return Err(Error::Configuration(format!(
                "multifactor provider {} is already registered",
                provider.id()
            )));
        }
        self.providers.push(provider);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<dyn MultifactorAuthenticationProvider>> {
        self.providers.iter().find(|p| p.matches(id)).cloned()
    }

    /// Sort key for choosing between providers: order, then registration.
    #[must_use]
    pub fn rank(&self, id: &str) -> Option<(i32, usize)> {
        self.providers
            .iter()
            .position(|p| p.matches(id))
            .map(|index| (self.providers[index].order(), index))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn MultifactorAuthenticationProvider>> {
        self.providers.iter()
    }
}
