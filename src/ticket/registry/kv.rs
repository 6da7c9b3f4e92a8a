use super::{codec::TicketCodec, poisoned, TicketRegistry};
use crate::{
    error::{Error, InvalidTicketReason, Result},
    ticket::Ticket,
};
use std::{
    collections::HashMap,
    fmt::Debug,
    sync::Mutex,
    time::{Duration, Instant},
};
use tracing::debug;

/// Compare-and-set attempts before an update is given up.
pub const DEFAULT_MAX_UPDATE_ATTEMPTS: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub value: Vec<u8>,
    pub version: u64,
}

/// Minimal contract of a distributed key-value cache.
pub trait KeyValueStore: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    /// # Errors
    /// Returns an error if the store fails.
    fn get(&self, key: &str) -> Result<Option<Versioned>>;

    /// Store only if absent. Returns false when the key exists.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    fn add(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool>;

    /// Overwrite only an existing key. Returns false when absent.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool>;

    /// Overwrite only if the stored version is still `expected`.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    fn replace(&self, key: &str, value: Vec<u8>, expected: u64, ttl: Option<Duration>)
        -> Result<bool>;

    /// # Errors
    /// Returns an error if the store fails.
    fn delete(&self, key: &str) -> Result<bool>;

    fn supports_scan(&self) -> bool {
        false
    }

    /// Every live value.
    ///
    /// # Errors
    /// Returns [`Error::Unsupported`] unless `supports_scan` is true.
    fn scan(&self) -> Result<Vec<Vec<u8>>> {
        Err(Error::Unsupported {
            operation: "scan",
            backend: self.name(),
        })
    }
}

#[derive(Debug)]
struct StoredEntry {
    value: Vec<u8>,
    version: u64,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |deadline| deadline > now)
    }
}

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<String, StoredEntry>,
    next_version: u64,
}

impl Entries {
    fn bump(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }

    fn live(&self, key: &str, now: Instant) -> Option<&StoredEntry> {
        self.map.get(key).filter(|entry| entry.is_live(now))
    }
}

/// In-process store with versioned entries and TTL expiry.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    entries: Mutex<Entries>,
    scan_enabled: bool,
}

impl InMemoryKeyValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow enumeration of every value.
    #[must_use]
    pub fn with_scan(mut self, enabled: bool) -> Self {
        self.scan_enabled = enabled;
        self
    }
}

fn deadline(ttl: Option<Duration>) -> Option<Instant> {
    ttl.and_then(|ttl| Instant::now().checked_add(ttl))
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn name(&self) -> &'static str {
        "in-memory-kv"
    }

    fn get(&self, key: &str) -> Result<Option<Versioned>> {
        let entries = self.entries.lock().map_err(poisoned)?;
        Ok(entries.live(key, Instant::now()).map(|entry| Versioned {
            value: entry.value.clone(),
            version: entry.version,
        }))
    }

    fn add(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool> {
        let mut entries = self.entries.lock().map_err(poisoned)?;
        if entries.live(key, Instant::now()).is_some() {
            return Ok(false);
        }
        let version = entries.bump();
        entries.map.insert(
            key.to_string(),
            StoredEntry {
                value,
                version,
                expires_at: deadline(ttl),
            },
        );
        Ok(true)
    }

    fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool> {
        let mut entries = self.entries.lock().map_err(poisoned)?;
        if entries.live(key, Instant::now()).is_none() {
            return Ok(false);
        }
        let version = entries.bump();
        entries.map.insert(
            key.to_string(),
            StoredEntry {
                value,
                version,
                expires_at: deadline(ttl),
            },
        );
        Ok(true)
    }

    fn replace(
        &self,
        key: &str,
        value: Vec<u8>,
        expected: u64,
        ttl: Option<Duration>,
    ) -> Result<bool> {
        let mut entries = self.entries.lock().map_err(poisoned)?;
        match entries.live(key, Instant::now()) {
            Some(entry) if entry.version == expected => {}
            _ => return Ok(false),
        }
        let version = entries.bump();
        entries.map.insert(
            key.to_string(),
            StoredEntry {
                value,
                version,
                expires_at: deadline(ttl),
            },
        );
        Ok(true)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.lock().map_err(poisoned)?;
        let now = Instant::now();
        Ok(entries
            .map
            .remove(key)
            .is_some_and(|entry| entry.is_live(now)))
    }

    fn supports_scan(&self) -> bool {
        self.scan_enabled
    }

    fn scan(&self) -> Result<Vec<Vec<u8>>> {
        if !self.scan_enabled {
            return Err(Error::Unsupported {
                operation: "scan",
                backend: self.name(),
            });
        }
        let entries = self.entries.lock().map_err(poisoned)?;
        let now = Instant::now();
        Ok(entries
            .map
            .values()
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
            .collect())
    }
}

/// Registry over a byte-oriented key-value store.
///
/// Updates are optimistic: read, mutate, then compare-and-set on the stored
/// version, retrying on conflict.
#[derive(Debug)]
pub struct KeyValueTicketRegistry<S> {
    store: S,
    codec: TicketCodec,
    max_update_attempts: usize,
}

impl<S: KeyValueStore> KeyValueTicketRegistry<S> {
    pub fn new(store: S, codec: TicketCodec) -> Self {
        Self {
            store,
            codec,
            max_update_attempts: DEFAULT_MAX_UPDATE_ATTEMPTS,
        }
    }

    #[must_use]
    pub fn with_max_update_attempts(mut self, attempts: usize) -> Self {
        self.max_update_attempts = attempts.max(1);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn key(&self, id: &str) -> String {
        self.codec.encode_ticket_id(id)
    }
}

impl<S: KeyValueStore> TicketRegistry for KeyValueTicketRegistry<S> {
    fn name(&self) -> &'static str {
        self.store.name()
    }

    fn add_ticket(&self, ticket: Ticket) -> Result<()> {
        let bytes = self.codec.encode(&ticket)?;
        let ttl = ticket.expiration_policy().time_to_live();
        if self.store.add(&self.key(ticket.id()), bytes, ttl)? {
            Ok(())
        } else {
            Err(Error::DuplicateTicket(ticket.id().to_string()))
        }
    }

    fn find_ticket(&self, id: &str) -> Result<Option<Ticket>> {
        self.store
            .get(&self.key(id))?
            .map(|stored| self.codec.decode(&stored.value))
            .transpose()
    }

    fn update_ticket(&self, ticket: Ticket) -> Result<()> {
        let bytes = self.codec.encode(&ticket)?;
        let ttl = ticket.expiration_policy().time_to_live();
        if self.store.set(&self.key(ticket.id()), bytes, ttl)? {
            Ok(())
        } else {
            Err(Error::invalid_ticket(ticket.id(), InvalidTicketReason::NotFound))
        }
    }

    fn atomic_update(
        &self,
        id: &str,
        mutate: &mut dyn FnMut(&mut Ticket) -> Result<()>,
    ) -> Result<Ticket> {
        let key = self.key(id);
        for attempt in 1..=self.max_update_attempts {
            let Some(stored) = self.store.get(&key)? else {
                return Err(Error::invalid_ticket(id, InvalidTicketReason::NotFound));
            };
            let mut ticket = self.codec.decode(&stored.value)?;
            mutate(&mut ticket)?;

            let bytes = self.codec.encode(&ticket)?;
            let ttl = ticket.expiration_policy().time_to_live();
            if self.store.replace(&key, bytes, stored.version, ttl)? {
                return Ok(ticket);
            }
            debug!(ticket = id, attempt, "concurrent update detected, retrying");
        }
        Err(Error::Storage(format!(
            "gave up updating {id} after {} conflicting attempts",
            self.max_update_attempts
        )))
    }

    fn delete_single_ticket(&self, id: &str) -> Result<bool> {
        self.store.delete(&self.key(id))
    }

    fn get_tickets(&self) -> Result<Vec<Ticket>> {
        if !self.store.supports_scan() {
            return Err(Error::Unsupported {
                operation: "get_tickets",
                backend: self.store.name(),
            });
        }
        self.store
            .scan()?
            .iter()
            .map(|bytes| self.codec.decode(bytes))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        authentication::{AuthenticationBuilder, Principal},
        cipher::TicketCipherExecutor,
        ticket::{ExpirationPolicy, TicketGrantingTicket, TicketKind},
    };
    use std::sync::Arc;

    fn tgt(id: &str) -> Ticket {
        let mut builder = AuthenticationBuilder::new();
        builder.set_principal(Principal::new("casuser"));
        TicketGrantingTicket::new(id.to_string(), builder.build(), ExpirationPolicy::NeverExpires)
            .into()
    }

    #[test]
    fn store_versions_guard_replace() {
        let store = InMemoryKeyValueStore::new();
        assert!(store.add("k", b"one".to_vec(), None).expect("add"));
        assert!(!store.add("k", b"two".to_vec(), None).expect("add"));

        let current = store.get("k").expect("get").expect("present");
        assert!(store
            .replace("k", b"two".to_vec(), current.version, None)
            .expect("replace"));
        assert!(!store
            .replace("k", b"three".to_vec(), current.version, None)
            .expect("replace"));
        assert_eq!(store.get("k").expect("get").map(|v| v.value), Some(b"two".to_vec()));
    }

    #[test]
    fn store_entries_expire() {
        let store = InMemoryKeyValueStore::new();
        store
            .add("k", b"v".to_vec(), Some(Duration::ZERO))
            .expect("add");
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.get("k").expect("get"), None);
        assert!(store.add("k", b"again".to_vec(), None).expect("add"));
    }

    #[test]
    fn encrypted_registry_hides_ids() {
        let registry = KeyValueTicketRegistry::new(
            InMemoryKeyValueStore::new(),
            TicketCodec::new(Some(Arc::new(TicketCipherExecutor::new([9u8; 32])))),
        );
        registry.add_ticket(tgt("TGT-1")).expect("added");

        assert!(registry.store().get("TGT-1").expect("get").is_none());
        assert!(registry
            .get_ticket("TGT-1", TicketKind::TicketGranting)
            .is_ok());
    }

    #[test]
    fn scanless_store_cannot_enumerate() {
        let registry =
            KeyValueTicketRegistry::new(InMemoryKeyValueStore::new(), TicketCodec::default());
        registry.add_ticket(tgt("TGT-1")).expect("added");
        assert!(matches!(
            registry.get_tickets(),
            Err(Error::Unsupported {
                operation: "get_tickets",
                ..
            })
        ));
        assert!(registry.session_count().is_err());

        let scanning = KeyValueTicketRegistry::new(
            InMemoryKeyValueStore::new().with_scan(true),
            TicketCodec::default(),
        );
        scanning.add_ticket(tgt("TGT-1")).expect("added");
        assert_eq!(scanning.session_count().expect("count"), 1);
    }

    #[test]
    fn duplicate_add_fails() {
        let registry =
            KeyValueTicketRegistry::new(InMemoryKeyValueStore::new(), TicketCodec::default());
        registry.add_ticket(tgt("TGT-1")).expect("added");
        assert!(matches!(
            registry.add_ticket(tgt("TGT-1")),
            Err(Error::DuplicateTicket(_))
        ));
    }
}
