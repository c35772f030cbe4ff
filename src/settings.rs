use std::path::Path;
use std::time::Duration;

use anyhow::{Result, ensure};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::logging::LogFormat;

fn default_store_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_store_connect_timeout() -> u64 {
    5
}

fn default_store_command_timeout() -> u64 {
    2
}

fn default_store_probe_interval() -> u64 {
    3
}

fn default_compression_threshold() -> usize {
    1024
}

fn default_cache_ttl() -> u64 {
    1
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_store_url")]
    pub store_url: String,
    /// Seconds allowed for establishing a store connection.
    #[serde(default = "default_store_connect_timeout")]
    pub store_connect_timeout: u64,
    /// Seconds allowed per store command before it counts as unavailable.
    #[serde(default = "default_store_command_timeout")]
    pub store_command_timeout: u64,
    /// Seconds between readiness probes against the store.
    #[serde(default = "default_store_probe_interval")]
    pub store_probe_interval: u64,
    /// Bodies at or above this many bytes are stored gzip-compressed.
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: usize,
    /// Fallback TTL in seconds when a response carries no usable max-age.
    #[serde(default = "default_cache_ttl")]
    pub default_cache_ttl: u64,
    #[serde(default = "default_log_format")]
    pub log: LogFormat,
}

impl Settings {
    /// Load settings from an optional file plus `RESPCACHE__`-prefixed
    /// environment variables, validating before anything touches the store.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix("RESPCACHE")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build().map_err(to_anyhow)?;
        let settings: Settings = cfg.try_deserialize().map_err(to_anyhow)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.store_url.trim().is_empty(), "store_url must be set");
        ensure!(
            self.store_connect_timeout >= 1,
            "store_connect_timeout must be at least 1 second"
        );
        ensure!(
            self.store_command_timeout >= 1,
            "store_command_timeout must be at least 1 second"
        );
        ensure!(
            self.store_probe_interval >= 1,
            "store_probe_interval must be at least 1 second"
        );
        ensure!(
            self.compression_threshold >= 1,
            "compression_threshold must be at least 1 byte"
        );
        ensure!(
            self.default_cache_ttl >= 1,
            "default_cache_ttl must be at least 1 second"
        );
        Ok(())
    }

    pub fn store_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.store_connect_timeout)
    }

    pub fn store_command_timeout(&self) -> Duration {
        Duration::from_secs(self.store_command_timeout)
    }

    pub fn store_probe_interval(&self) -> Duration {
        Duration::from_secs(self.store_probe_interval)
    }

    pub fn default_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.default_cache_ttl)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_url: default_store_url(),
            store_connect_timeout: default_store_connect_timeout(),
            store_command_timeout: default_store_command_timeout(),
            store_probe_interval: default_store_probe_interval(),
            compression_threshold: default_compression_threshold(),
            default_cache_ttl: default_cache_ttl(),
            log: default_log_format(),
        }
    }
}

fn to_anyhow(err: ConfigError) -> anyhow::Error {
    anyhow::anyhow!(err)
}
