use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::{ConnectionState, ConnectionStatus, RemoteStore};

/// In-process store with per-entry expiry. Backs local development and the
/// integration suite; readiness is assignable so degraded-mode paths can be
/// exercised without a network.
#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    status: ConnectionStatus,
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            status: ConnectionStatus::new(ConnectionState::Ready),
        }
    }

    pub fn set_state(&self, state: ConnectionState) {
        self.status.set(state);
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|entry| !entry.expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .lock()
            .get(key)
            .is_some_and(|entry| !entry.expired(now))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            let expired = entries.get(key).is_some_and(|entry| entry.expired(now));
            if expired {
                entries.remove(key);
                values.push(None);
                continue;
            }
            values.push(entries.get(key).map(|entry| entry.value.clone()));
        }
        Ok(values)
    }

    async fn multi_set(&self, pairs: Vec<(String, String)>) -> Result<()> {
        let mut entries = self.entries.lock();
        for (key, value) in pairs {
            entries.insert(
                key,
                Entry {
                    value,
                    expires_at: None,
                },
            );
        }
        Ok(())
    }

    async fn get_with_ttl(&self, key: &str) -> Result<Option<(String, i64)>> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let expired = entries.get(key).is_some_and(|entry| entry.expired(now));
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        match entries.get(key) {
            Some(entry) => {
                let ttl = match entry.expires_at {
                    Some(at) => at.saturating_duration_since(now).as_secs() as i64,
                    None => -1,
                };
                Ok(Some((entry.value.clone(), ttl)))
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, ttl_seconds: u64, value: String) -> Result<()> {
        let expires_at = Instant::now() + std::time::Duration::from_secs(ttl_seconds);
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Some(expires_at),
            },
        );
        Ok(())
    }

    async fn flush_all(&self) -> Result<()> {
        self.entries.lock().clear();
        Ok(())
    }
}
