use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail, ensure};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{trace, warn};

use crate::metrics;
use crate::store::RemoteStore;

/// A deserialized cache value together with its remaining time to live.
#[derive(Debug, Clone)]
pub struct TtlValue<V> {
    pub value: V,
    pub ttl: Duration,
}

/// Uniform caching façade over a [`RemoteStore`]. Every operation degrades
/// to "act as if there is no cache" when the store is unreachable; the cache
/// is a performance optimization, never a correctness dependency.
pub struct BatchCache<S> {
    store: Arc<S>,
}

impl<S> Clone for BatchCache<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: RemoteStore> BatchCache<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn is_ready(&self) -> bool {
        self.store.status().is_ready()
    }

    /// Batch read with loader fallback. Returns one value per requested key,
    /// in request order: cache hits where the store had them, freshly loaded
    /// values everywhere else. The loader is invoked at most once, with the
    /// ordered set of missing keys, and must answer positionally.
    ///
    /// Loaded values are written back to the store on a best-effort task the
    /// caller never waits on. Loader errors propagate; store errors never do.
    pub async fn get<K, V, L, Fut, M>(&self, keys: &[K], loader: L, key_mapper: M) -> Result<Vec<V>>
    where
        K: Clone,
        V: Serialize + DeserializeOwned,
        L: FnOnce(Vec<K>) -> Fut,
        Fut: Future<Output = Result<Vec<V>>>,
        M: Fn(&K) -> String,
    {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        if !self.is_ready() {
            trace!(keys = keys.len(), "store not ready; delegating batch to loader");
            metrics::record_batch_keys("degraded", keys.len() as u64);
            return loader(keys.to_vec()).await;
        }

        let store_keys: Vec<String> = keys.iter().map(|key| key_mapper(key)).collect();
        let raw = match self.store.multi_get(&store_keys).await {
            Ok(values) if values.len() == keys.len() => values,
            Ok(values) => {
                warn!(
                    expected = keys.len(),
                    got = values.len(),
                    "store multi-get answered with wrong arity; treating all keys as missing"
                );
                vec![None; keys.len()]
            }
            Err(err) => {
                warn!(error = %err, "store multi-get failed; treating all keys as missing");
                vec![None; keys.len()]
            }
        };

        let mut slots: Vec<Option<V>> = Vec::with_capacity(keys.len());
        let mut missing_idx: Vec<usize> = Vec::new();
        for (idx, raw_value) in raw.into_iter().enumerate() {
            let value = raw_value.and_then(|payload| match serde_json::from_str(&payload) {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!(error = %err, "malformed cached payload; treating key as missing");
                    None
                }
            });
            if value.is_none() {
                missing_idx.push(idx);
            }
            slots.push(value);
        }

        metrics::record_batch_keys("hit", (keys.len() - missing_idx.len()) as u64);

        if !missing_idx.is_empty() {
            let missing_keys: Vec<K> = missing_idx.iter().map(|&idx| keys[idx].clone()).collect();
            let loaded = loader(missing_keys).await?;
            ensure!(
                loaded.len() == missing_idx.len(),
                "loader returned {} values for {} missing keys",
                loaded.len(),
                missing_idx.len()
            );
            metrics::record_batch_keys("loaded", loaded.len() as u64);

            let mut pairs: Vec<(String, String)> = Vec::with_capacity(loaded.len());
            for (&idx, value) in missing_idx.iter().zip(&loaded) {
                match serde_json::to_string(value) {
                    Ok(payload) => pairs.push((store_keys[idx].clone(), payload)),
                    Err(err) => {
                        warn!(error = %err, "loaded value is not serializable; skipping write-back")
                    }
                }
            }
            self.spawn_write_back(pairs);

            for (idx, value) in missing_idx.into_iter().zip(loaded) {
                slots[idx] = Some(value);
            }
        }

        let mut values = Vec::with_capacity(slots.len());
        for slot in slots {
            match slot {
                Some(value) => values.push(value),
                None => bail!("cache slot left unfilled after loader pass"),
            }
        }
        Ok(values)
    }

    /// Atomically read a key's value and remaining TTL. Any store trouble,
    /// absent value, or malformed payload comes back as `None`.
    pub async fn get_single_with_ttl<V: DeserializeOwned>(&self, key: &str) -> Option<TtlValue<V>> {
        if !self.is_ready() {
            return None;
        }

        let (payload, ttl) = match self.store.get_with_ttl(key).await {
            Ok(Some(pair)) => pair,
            Ok(None) => return None,
            Err(err) => {
                warn!(error = %err, "store read failed; treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&payload) {
            Ok(value) => Some(TtlValue {
                value,
                ttl: Duration::from_secs(ttl.max(0) as u64),
            }),
            Err(err) => {
                warn!(error = %err, "malformed cached payload; treating as miss");
                None
            }
        }
    }

    /// Store one value under a TTL. Returns whether the write happened; a
    /// store that is down or failing swallows the write (counted, logged)
    /// rather than surfacing an error.
    pub async fn set_single<V: Serialize>(&self, key: &str, ttl_seconds: u64, value: &V) -> bool {
        if !self.is_ready() {
            return false;
        }

        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "value is not serializable; dropping cache write");
                metrics::record_cache_store_error();
                return false;
            }
        };

        match self.store.set_ex(key, ttl_seconds, payload).await {
            Ok(()) => {
                metrics::record_cache_store();
                true
            }
            Err(err) => {
                warn!(error = %err, "cache write failed; response unaffected");
                metrics::record_cache_store_error();
                false
            }
        }
    }

    /// Flush every entry. Administrative/test reset only; unlike the request
    /// path, errors propagate.
    pub async fn clear(&self) -> Result<()> {
        self.store.flush_all().await
    }

    fn spawn_write_back(&self, pairs: Vec<(String, String)>) {
        if pairs.is_empty() {
            return;
        }
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(err) = store.multi_set(pairs).await {
                metrics::record_writeback_error();
                warn!(error = %err, "best-effort cache write-back failed");
            }
        });
    }
}
