use crate::webflow::RequestContext;
use anyhow::{anyhow, Result};
use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};
use tracing::debug;
use uuid::Uuid;

/// Logins parked between two factors, keyed by an opaque flow id.
pub struct PendingFlows {
    ttl: Duration,
    flows: Mutex<HashMap<String, (Instant, RequestContext)>>,
}

impl PendingFlows {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            flows: Mutex::new(HashMap::new()),
        }
    }

    /// Park `context` and return the id to resume it with. The credential
    /// already used is dropped.
    /// # Errors
    /// Returns an error if the store lock is poisoned
    pub fn park(&self, mut context: RequestContext) -> Result<String> {
        context.put_credential(None);
        let id = Uuid::new_v4().to_string();
        let mut flows = self.lock()?;
        let ttl = self.ttl;
        flows.retain(|_, (parked, _)| parked.elapsed() < ttl);
        flows.insert(id.clone(), (Instant::now(), context));
        debug!(flow = %id, pending = flows.len(), "parked login flow");
        Ok(id)
    }

    /// Remove and return a parked flow, unless it is unknown or stale.
    /// # Errors
    /// Returns an error if the store lock is poisoned
    pub fn resume(&self, id: &str) -> Result<Option<RequestContext>> {
        let Some((parked, context)) = self.lock()?.remove(id) else {
            return Ok(None);
        };
        if parked.elapsed() >= self.ttl {
            debug!(flow = %id, "parked login flow expired");
            return Ok(None);
        }
        Ok(Some(context))
    }

    /// # Errors
    /// Returns an error if the store lock is poisoned
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, (Instant, RequestContext)>>> {
        self.flows
            .lock()
            .map_err(|_| anyhow!("pending flow store lock poisoned"))
    }
}
