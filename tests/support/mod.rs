#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, StatusCode};

use respcache::settings::Settings;
use respcache::{BatchCache, CacheRequest, ComputedResponse, MemoryStore, ResponseCache};

pub const COMPRESSION_THRESHOLD: usize = 1024;

pub fn test_settings() -> Settings {
    Settings {
        compression_threshold: COMPRESSION_THRESHOLD,
        ..Settings::default()
    }
}

pub fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    headers
}

/// Engine over an in-process store, plus the store itself for direct
/// inspection.
pub fn memory_engine() -> (ResponseCache<MemoryStore>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let batch = BatchCache::new(Arc::clone(&store));
    let engine = ResponseCache::new(batch, &test_settings(), default_headers());
    (engine, store)
}

pub fn get_request(path_and_query: &str) -> CacheRequest {
    CacheRequest::new(Method::GET, path_and_query, HeaderMap::new())
}

pub fn request_with_headers(
    method: Method,
    path_and_query: &str,
    header_pairs: &[(&str, &str)],
) -> CacheRequest {
    let mut headers = HeaderMap::new();
    for (name, value) in header_pairs {
        headers.append(
            http::header::HeaderName::try_from(*name).expect("test header name"),
            HeaderValue::from_str(value).expect("test header value"),
        );
    }
    CacheRequest::new(method, path_and_query, headers)
}

pub fn ok_response(body: &str, max_age: u64) -> ComputedResponse {
    response_with(StatusCode::OK, body, max_age, None)
}

pub fn ok_response_with_etag(body: &str, max_age: u64, etag: &str) -> ComputedResponse {
    response_with(StatusCode::OK, body, max_age, Some(etag))
}

pub fn response_with(
    status: StatusCode,
    body: &str,
    max_age: u64,
    etag: Option<&str>,
) -> ComputedResponse {
    let mut headers = default_headers();
    headers.insert(
        "cache-control",
        HeaderValue::from_str(&format!("public, max-age={max_age}")).expect("cache-control"),
    );
    if let Some(etag) = etag {
        headers.insert("etag", HeaderValue::from_str(etag).expect("etag"));
    }
    ComputedResponse {
        status,
        headers,
        body: Bytes::from(body.to_string()),
    }
}

/// Polls `cond` until it holds or roughly `deadline_ms` of (possibly paused)
/// time has passed. Write-backs are spawned tasks, so tests poll rather than
/// await them.
pub async fn wait_until(deadline_ms: u64, mut cond: impl FnMut() -> bool) -> bool {
    let steps = deadline_ms / 10;
    for _ in 0..steps {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
