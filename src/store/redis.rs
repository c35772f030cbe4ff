use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use parking_lot::Mutex;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::settings::Settings;
use crate::util::timeout_with_context;

use super::{ConnectionState, ConnectionStatus, RemoteStore};

const PROBE_BACKOFF_START: Duration = Duration::from_secs(1);
const PROBE_BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Redis-backed [`RemoteStore`]. Commands carry a bounded timeout, and a
/// background probe owns the readiness lifecycle: command errors wake it, a
/// failed probe cycle flips the store to `Unavailable`, a successful `PING`
/// flips it back to `Ready`.
pub struct RedisStore {
    client: redis::Client,
    manager: Mutex<Option<ConnectionManager>>,
    status: ConnectionStatus,
    connect_timeout: Duration,
    command_timeout: Duration,
    probe_interval: Duration,
    probe_wake: Notify,
}

impl RedisStore {
    /// Open the client and attempt an initial connection. A malformed URL is
    /// a configuration error and fails fast; an unreachable store leaves the
    /// instance in degraded mode with the probe retrying in the background.
    pub async fn connect(settings: &Settings) -> Result<Arc<Self>> {
        let client = redis::Client::open(settings.store_url.as_str())
            .with_context(|| format!("invalid store URL '{}'", settings.store_url))?;

        let store = Arc::new(Self {
            client,
            manager: Mutex::new(None),
            status: ConnectionStatus::new(ConnectionState::Connecting),
            connect_timeout: settings.store_connect_timeout(),
            command_timeout: settings.store_command_timeout(),
            probe_interval: settings.store_probe_interval(),
            probe_wake: Notify::new(),
        });

        if let Err(err) = store.try_connect().await {
            warn!(error = %err, "remote store unavailable at startup; running degraded");
            store.status.set(ConnectionState::Unavailable);
        }

        Arc::clone(&store).spawn_probe();
        Ok(store)
    }

    async fn try_connect(&self) -> Result<()> {
        let manager = timeout_with_context(
            self.connect_timeout,
            self.client.get_connection_manager(),
            "connecting to remote store",
        )
        .await?;
        *self.manager.lock() = Some(manager);
        self.status.set(ConnectionState::Ready);
        Ok(())
    }

    fn spawn_probe(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut backoff = PROBE_BACKOFF_START;
            loop {
                tokio::select! {
                    _ = self.probe_wake.notified() => {}
                    _ = tokio::time::sleep(self.probe_interval) => {}
                }

                match self.probe().await {
                    Ok(()) => {
                        if !self.status.is_ready() {
                            info!("remote store ready");
                            self.status.set(ConnectionState::Ready);
                        }
                        backoff = PROBE_BACKOFF_START;
                    }
                    Err(err) => {
                        if self.status.is_ready() {
                            warn!(error = %err, "remote store probe failed; entering degraded mode");
                        }
                        self.status.set(ConnectionState::Unavailable);
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(PROBE_BACKOFF_MAX);
                    }
                }
            }
        });
    }

    async fn probe(&self) -> Result<()> {
        let manager = self.manager.lock().clone();
        match manager {
            Some(mut conn) => {
                let pong: Result<String> = timeout_with_context(
                    self.command_timeout,
                    redis::cmd("PING").query_async(&mut conn),
                    "pinging remote store",
                )
                .await;
                pong?;
                Ok(())
            }
            None => self.try_connect().await,
        }
    }

    fn connection(&self) -> Result<ConnectionManager> {
        self.manager
            .lock()
            .clone()
            .ok_or_else(|| anyhow!("remote store not connected"))
    }

    /// Errors wake the probe so readiness reflects a failed retry cycle, not
    /// a single failed command.
    fn observe<T>(&self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.probe_wake.notify_one();
        }
        result
    }
}

#[async_trait]
impl RemoteStore for RedisStore {
    fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.connection()?;
        let result: Result<Vec<Option<String>>> = timeout_with_context(
            self.command_timeout,
            conn.mget(keys),
            "multi-getting keys from remote store",
        )
        .await;
        self.observe(result)
    }

    async fn multi_set(&self, pairs: Vec<(String, String)>) -> Result<()> {
        if pairs.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection()?;
        let mut cmd = redis::cmd("MSET");
        for (key, value) in &pairs {
            cmd.arg(key).arg(value);
        }
        let result: Result<()> = timeout_with_context(
            self.command_timeout,
            cmd.query_async(&mut conn),
            "multi-setting keys in remote store",
        )
        .await;
        self.observe(result)
    }

    async fn get_with_ttl(&self, key: &str) -> Result<Option<(String, i64)>> {
        let mut conn = self.connection()?;
        let mut pipe = redis::pipe();
        pipe.atomic().ttl(key).get(key);
        let result: Result<(i64, Option<String>)> = timeout_with_context(
            self.command_timeout,
            pipe.query_async(&mut conn),
            "reading key and ttl from remote store",
        )
        .await;
        let (ttl, value) = self.observe(result)?;
        Ok(value.map(|value| (value, ttl)))
    }

    async fn set_ex(&self, key: &str, ttl_seconds: u64, value: String) -> Result<()> {
        let mut conn = self.connection()?;
        let result: Result<()> = timeout_with_context(
            self.command_timeout,
            conn.set_ex(key, value, ttl_seconds),
            "storing key in remote store",
        )
        .await;
        self.observe(result)
    }

    async fn flush_all(&self) -> Result<()> {
        let mut conn = self.connection()?;
        let result: Result<()> = timeout_with_context(
            self.command_timeout,
            redis::cmd("FLUSHALL").query_async(&mut conn),
            "flushing remote store",
        )
        .await;
        self.observe(result)
    }
}
