use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};

mod batch;
mod cache_control;
mod check;
mod encoding;
mod key;
mod response;
mod update;

pub use batch::{BatchCache, TtlValue};
pub use check::{CheckOutcome, ServedResponse};
pub use encoding::gzip_accepted;
pub use key::response_cache_key;
pub use response::{CachedHttpResponse, PersistedResponse};
pub use update::{UpdatePlan, UpdateSkipReason, plan_update};

use crate::settings::Settings;
use crate::store::RemoteStore;

/// The method-independent identity and negotiation headers of an incoming
/// request, as originally received. `path_and_query` is the raw, pre-
/// normalization form; the key derivation depends on it byte for byte.
#[derive(Debug, Clone)]
pub struct CacheRequest {
    pub method: Method,
    pub path_and_query: String,
    pub headers: HeaderMap,
}

impl CacheRequest {
    pub fn new(method: Method, path_and_query: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            method,
            path_and_query: path_and_query.into(),
            headers,
        }
    }

    fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }
}

/// What the business-logic handlers produced for one request: the triple the
/// update stage decides cacheability over.
#[derive(Debug, Clone)]
pub struct ComputedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Response cache over a [`BatchCache`]: the check stage before request
/// handling, the update stage after it. Clone-cheap; safe to share across
/// request tasks.
pub struct ResponseCache<S> {
    inner: Arc<Inner<S>>,
}

struct Inner<S> {
    batch: BatchCache<S>,
    compression_threshold: usize,
    default_ttl: Duration,
    default_headers: HeaderMap,
}

impl<S> Clone for ResponseCache<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: RemoteStore> ResponseCache<S> {
    pub fn new(batch: BatchCache<S>, settings: &Settings, default_headers: HeaderMap) -> Self {
        Self {
            inner: Arc::new(Inner {
                batch,
                compression_threshold: settings.compression_threshold,
                default_ttl: settings.default_cache_ttl(),
                default_headers,
            }),
        }
    }

    pub fn batch(&self) -> &BatchCache<S> {
        &self.inner.batch
    }

    fn compression_threshold(&self) -> usize {
        self.inner.compression_threshold
    }

    fn default_ttl(&self) -> Duration {
        self.inner.default_ttl
    }

    fn default_headers(&self) -> &HeaderMap {
        &self.inner.default_headers
    }
}
