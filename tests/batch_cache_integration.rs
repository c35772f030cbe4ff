mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use parking_lot::Mutex;

use respcache::store::{ConnectionState, ConnectionStatus, RemoteStore};
use respcache::{BatchCache, MemoryStore};

use support::wait_until;

fn id_mapper(key: &String) -> String {
    key.clone()
}

fn memory_batch() -> (BatchCache<MemoryStore>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (BatchCache::new(Arc::clone(&store)), store)
}

#[tokio::test]
async fn populated_entries_are_reused_not_recomputed() -> Result<()> {
    let (cache, store) = memory_batch();
    let keys = vec!["a".to_string(), "b".to_string()];

    let first: Vec<String> = cache
        .get(
            &keys,
            |missing| async move { Ok(missing.iter().map(|k| format!("first-{k}")).collect()) },
            id_mapper,
        )
        .await?;
    assert_eq!(first, vec!["first-a", "first-b"]);

    assert!(
        wait_until(2_000, || store.contains_key("a") && store.contains_key("b")).await,
        "write-back never landed"
    );

    // A loader that would answer differently must not run for cached keys.
    let second: Vec<String> = cache
        .get(
            &keys,
            |_| async { bail!("loader must not run for cached keys") },
            id_mapper,
        )
        .await?;
    assert_eq!(second, first);
    Ok(())
}

#[tokio::test]
async fn values_come_back_in_request_order_across_hits_and_loads() -> Result<()> {
    let (cache, store) = memory_batch();

    // Pre-populate only b; a and c go through the loader.
    let primed: Vec<String> = cache
        .get(
            &vec!["b".to_string()],
            |missing| async move { Ok(missing.iter().map(|k| format!("value-{k}")).collect()) },
            id_mapper,
        )
        .await?;
    assert_eq!(primed, vec!["value-b"]);
    assert!(wait_until(2_000, || store.contains_key("b")).await);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_by_loader = Arc::clone(&seen);
    let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let values: Vec<String> = cache
        .get(
            &keys,
            move |missing| async move {
                seen_by_loader.lock().extend(missing.iter().cloned());
                Ok(missing.iter().map(|k| format!("value-{k}")).collect())
            },
            id_mapper,
        )
        .await?;

    assert_eq!(values, vec!["value-a", "value-b", "value-c"]);
    assert_eq!(*seen.lock(), vec!["a".to_string(), "c".to_string()]);
    Ok(())
}

#[tokio::test]
async fn degraded_mode_returns_exactly_the_loader_result() -> Result<()> {
    let (cache, store) = memory_batch();
    store.set_state(ConnectionState::Unavailable);

    let keys = vec!["x".to_string(), "y".to_string(), "z".to_string()];
    let direct: Vec<u64> = cache
        .get(
            &keys,
            |missing| async move { Ok((0..missing.len() as u64).collect()) },
            id_mapper,
        )
        .await?;

    assert_eq!(direct, vec![0, 1, 2]);
    assert!(store.is_empty(), "no caching may be attempted while degraded");
    Ok(())
}

/// Store whose reads always fail while still reporting itself ready, to
/// exercise the failed-multi-get path.
struct BrokenReads {
    status: ConnectionStatus,
}

impl BrokenReads {
    fn new() -> Self {
        Self {
            status: ConnectionStatus::new(ConnectionState::Ready),
        }
    }
}

#[async_trait]
impl RemoteStore for BrokenReads {
    fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    async fn multi_get(&self, _keys: &[String]) -> Result<Vec<Option<String>>> {
        Err(anyhow!("read path is down"))
    }

    async fn multi_set(&self, _pairs: Vec<(String, String)>) -> Result<()> {
        Err(anyhow!("write path is down"))
    }

    async fn get_with_ttl(&self, _key: &str) -> Result<Option<(String, i64)>> {
        Err(anyhow!("read path is down"))
    }

    async fn set_ex(&self, _key: &str, _ttl_seconds: u64, _value: String) -> Result<()> {
        Err(anyhow!("write path is down"))
    }

    async fn flush_all(&self) -> Result<()> {
        Err(anyhow!("admin path is down"))
    }
}

#[tokio::test]
async fn failed_multi_get_treats_every_key_as_missing() -> Result<()> {
    let cache = BatchCache::new(Arc::new(BrokenReads::new()));
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_seen = Arc::clone(&calls);

    let keys = vec!["a".to_string(), "b".to_string()];
    let values: Vec<String> = cache
        .get(
            &keys,
            move |missing| async move {
                calls_seen.fetch_add(1, Ordering::SeqCst);
                assert_eq!(missing, vec!["a".to_string(), "b".to_string()]);
                Ok(missing.iter().map(|k| format!("loaded-{k}")).collect())
            },
            id_mapper,
        )
        .await?;

    assert_eq!(values, vec!["loaded-a", "loaded-b"]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn malformed_cached_payload_is_reloaded() -> Result<()> {
    let (cache, store) = memory_batch();
    store
        .multi_set(vec![("a".to_string(), "{broken".to_string())])
        .await?;

    let keys = vec!["a".to_string()];
    let values: Vec<String> = cache
        .get(
            &keys,
            |missing| async move { Ok(missing.iter().map(|k| format!("fresh-{k}")).collect()) },
            id_mapper,
        )
        .await?;

    assert_eq!(values, vec!["fresh-a"]);
    Ok(())
}

#[tokio::test]
async fn single_key_round_trip_reports_remaining_ttl() -> Result<()> {
    let (cache, _) = memory_batch();

    assert!(cache.set_single("greeting", 60, &"hello".to_string()).await);
    let hit = cache
        .get_single_with_ttl::<String>("greeting")
        .await
        .expect("entry present");
    assert_eq!(hit.value, "hello");
    assert!(hit.ttl.as_secs() <= 60);
    Ok(())
}

#[tokio::test]
async fn clear_flushes_the_store() -> Result<()> {
    let (cache, store) = memory_batch();
    assert!(cache.set_single("k", 60, &1u32).await);
    cache.clear().await?;
    assert!(store.is_empty());
    assert!(cache.get_single_with_ttl::<u32>("k").await.is_none());
    Ok(())
}
