use super::Event;
use crate::mfa::MultifactorProviderRegistry;
use std::collections::HashSet;
use tracing::debug;

/// Picks the one event to act on from the candidates.
///
/// Denials come first, so an unavailable provider under a closed failure
/// mode can never be outvoted. Among equals, the provider with the lowest
/// order wins, then the one registered first.
#[derive(Debug, Clone)]
pub struct SelectiveEventResolver {
    providers: MultifactorProviderRegistry,
}

impl SelectiveEventResolver {
    pub fn new(providers: MultifactorProviderRegistry) -> Self {
        Self { providers }
    }

    fn rank(&self, event: &Event) -> ((i32, usize), String) {
        let provider = event.provider().unwrap_or_default();
        (
            self.providers.rank(provider).unwrap_or((i32::MAX, usize::MAX)),
            provider.to_string(),
        )
    }

    #[must_use]
    pub fn select(&self, events: &HashSet<Event>) -> Option<Event> {
        let best = |denials: bool| {
            events
                .iter()
                .filter(|event| event.provider().is_some() && event.is_denial() == denials)
                .min_by_key(|event| self.rank(event))
        };

        let selected = best(true).or_else(|| best(false)).cloned();
        if let Some(event) = &selected {
            debug!(%event, candidates = events.len(), "selected event");
        }
        selected
    }
}
