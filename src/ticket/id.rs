use rand::{distributions::Alphanumeric, Rng};
use std::fmt::Debug;
use ulid::Ulid;

/// Length of the random tail appended after the ULID.
pub const DEFAULT_RANDOM_LENGTH: usize = 32;

pub trait UniqueTicketIdGenerator: Send + Sync + Debug {
    /// A new id starting with `prefix-`.
    fn new_ticket_id(&self, prefix: &str) -> String;
}

/// `PREFIX-<ulid>-<random>[-<suffix>]`.
///
/// The ULID keeps ids roughly time ordered; the random tail makes them
/// unguessable. The optional suffix identifies the issuing node.
#[derive(Debug, Clone)]
pub struct DefaultUniqueTicketIdGenerator {
    random_length: usize,
    suffix: Option<String>,
}

impl Default for DefaultUniqueTicketIdGenerator {
    fn default() -> Self {
        Self {
            random_length: DEFAULT_RANDOM_LENGTH,
            suffix: None,
        }
    }
}

impl DefaultUniqueTicketIdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_random_length(mut self, length: usize) -> Self {
        self.random_length = length;
        self
    }

    #[must_use]
    pub fn with_suffix(mut self, suffix: Option<String>) -> Self {
        self.suffix = suffix.filter(|s| !s.is_empty());
        self
    }
}

impl UniqueTicketIdGenerator for DefaultUniqueTicketIdGenerator {
    fn new_ticket_id(&self, prefix: &str) -> String {
        let random: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.random_length)
            .map(char::from)
            .collect();

        match &self.suffix {
            Some(suffix) => format!("{prefix}-{}-{random}-{suffix}", Ulid::new()),
            None => format!("{prefix}-{}-{random}", Ulid::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_carry_prefix_and_suffix() {
        let generator =
            DefaultUniqueTicketIdGenerator::new().with_suffix(Some("node1".to_string()));
        let id = generator.new_ticket_id("TGT");
        assert!(id.starts_with("TGT-"), "{id}");
        assert!(id.ends_with("-node1"), "{id}");
        assert_eq!(id.split('-').count(), 4);
    }

    #[test]
    fn empty_suffix_is_ignored() {
        let generator = DefaultUniqueTicketIdGenerator::new().with_suffix(Some(String::new()));
        assert_eq!(generator.new_ticket_id("ST").split('-').count(), 3);
    }

    #[test]
    fn ids_do_not_repeat() {
        let generator = DefaultUniqueTicketIdGenerator::new().with_random_length(8);
        let ids: HashSet<String> = (0..1_000).map(|_| generator.new_ticket_id("ST")).collect();
        assert_eq!(ids.len(), 1_000);
    }
}
