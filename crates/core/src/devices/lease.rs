//! In-process lease backend

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use timekeep_common::time::Clock;
use timekeep_domain::{AttendanceError, Result};
use uuid::Uuid;

use super::ports::{Lease, LeaseProvider};

/// Leases held in memory, expiring by the injected clock. Suitable for a
/// single process and for tests.
pub struct InMemoryLeaseProvider {
    clock: Arc<dyn Clock>,
    leases: Mutex<HashMap<String, Lease>>,
}

impl InMemoryLeaseProvider {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock, leases: Mutex::new(HashMap::new()) }
    }
}

#[async_trait]
impl LeaseProvider for InMemoryLeaseProvider {
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<Option<Lease>> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|err| AttendanceError::Config(format!("lease ttl out of range: {err}")))?;
        let now = self.clock.now();

        let mut leases = self.leases.lock();
        if leases.get(key).is_some_and(|held| held.expires_at > now) {
            return Ok(None);
        }
        let lease = Lease { key: key.to_string(), token: Uuid::new_v4().to_string(), expires_at: now + ttl };
        leases.insert(key.to_string(), lease.clone());
        Ok(Some(lease))
    }

    async fn release(&self, lease: &Lease) -> Result<()> {
        let mut leases = self.leases.lock();
        if leases.get(&lease.key).is_some_and(|held| held.token == lease.token) {
            leases.remove(&lease.key);
        }
        Ok(())
    }
}
