use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use anyhow::Result;
use async_trait::async_trait;

mod memory;
mod redis;

pub use memory::MemoryStore;
pub use redis::RedisStore;

/// Connectivity of the remote store as last observed by its own lifecycle
/// handling. Written only by connection-lifecycle code; read by every cache
/// operation. A stale read just sends one request down the degraded branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Ready,
    Unavailable,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Ready,
            2 => ConnectionState::Unavailable,
            _ => ConnectionState::Connecting,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Connecting => 0,
            ConnectionState::Ready => 1,
            ConnectionState::Unavailable => 2,
        }
    }
}

/// Shared, atomically-read handle on a store's [`ConnectionState`].
#[derive(Debug, Clone)]
pub struct ConnectionStatus {
    state: Arc<AtomicU8>,
}

impl ConnectionStatus {
    pub fn new(initial: ConnectionState) -> Self {
        crate::metrics::set_store_ready(initial == ConnectionState::Ready);
        Self {
            state: Arc::new(AtomicU8::new(initial.as_u8())),
        }
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Relaxed))
    }

    pub fn set(&self, state: ConnectionState) {
        self.state.store(state.as_u8(), Ordering::Relaxed);
        crate::metrics::set_store_ready(state == ConnectionState::Ready);
    }

    pub fn is_ready(&self) -> bool {
        self.get() == ConnectionState::Ready
    }
}

/// Remote key-value store consumed by the caching façade. Every payload is a
/// JSON text string; a missing key is `None`, never an error.
#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    fn status(&self) -> &ConnectionStatus;

    /// `MGET`: one slot per requested key, missing keys as `None`.
    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>>;

    /// `MSET`: no per-key expiry; batch entries age out through the store's
    /// own maxmemory eviction.
    async fn multi_set(&self, pairs: Vec<(String, String)>) -> Result<()>;

    /// `TTL` + `GET` for one key in a single atomic round trip. The TTL is
    /// the store's remaining-seconds answer, negative when no expiry is set.
    async fn get_with_ttl(&self, key: &str) -> Result<Option<(String, i64)>>;

    /// `SETEX`.
    async fn set_ex(&self, key: &str, ttl_seconds: u64, value: String) -> Result<()>;

    /// `FLUSHALL`; administrative/test reset, not a request-path operation.
    async fn flush_all(&self) -> Result<()>;
}
