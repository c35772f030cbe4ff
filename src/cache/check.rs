use bytes::Bytes;
use http::header::{
    CACHE_CONTROL, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, ETAG, IF_NONE_MATCH, VARY,
};
use http::{HeaderMap, HeaderValue, StatusCode};
use tracing::{trace, warn};

use crate::metrics;
use crate::store::RemoteStore;

use super::cache_control::public_max_age;
use super::encoding::gzip_accepted;
use super::key::response_cache_key;
use super::response::{CachedHttpResponse, PersistedResponse};
use super::{CacheRequest, ResponseCache};

/// Result of the pre-handler cache check. `Miss` hands back the derived key
/// for the request-scoped context; `Serve` is terminal and short-circuits
/// the rest of the request.
#[derive(Debug)]
pub enum CheckOutcome {
    Miss { key: String },
    Serve(Box<ServedResponse>),
}

/// A response fully prepared from the cache, ready to be flushed. `body` is
/// `None` when nothing goes on the wire (304, HEAD).
#[derive(Debug, Clone)]
pub struct ServedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl<S: RemoteStore> ResponseCache<S> {
    /// Runs once per request, before business logic. Serves straight from
    /// the cache on a hit; otherwise reports the key to attach to the
    /// request context. Degraded mode and malformed entries are misses.
    pub async fn check(&self, request: &CacheRequest) -> CheckOutcome {
        let key = response_cache_key(&request.path_and_query);

        let Some(hit) = self
            .batch()
            .get_single_with_ttl::<PersistedResponse>(&key)
            .await
        else {
            metrics::record_cache_lookup(false);
            trace!(path = %request.path_and_query, "response cache miss");
            return CheckOutcome::Miss { key };
        };

        let cached = match CachedHttpResponse::from_persisted(&hit.value) {
            Ok(cached) => cached,
            Err(err) => {
                // The broken entry ages out on its own TTL; no point deleting.
                warn!(error = %err, "malformed cached response; treating as miss");
                metrics::record_cache_lookup(false);
                return CheckOutcome::Miss { key };
            }
        };

        let remaining = hit.ttl;

        if let Some(etag) = cached.headers().get(ETAG)
            && request.headers.get(IF_NONE_MATCH) == Some(etag)
        {
            metrics::record_cache_lookup(true);
            trace!(path = %request.path_and_query, "conditional cache hit");
            let mut headers = cached.headers().clone();
            headers.remove(CONTENT_TYPE);
            headers.insert(CACHE_CONTROL, public_max_age(remaining));
            return CheckOutcome::Serve(Box::new(ServedResponse {
                status: StatusCode::NOT_MODIFIED,
                headers,
                body: None,
            }));
        }

        let mut headers = cached.headers().clone();
        headers.insert(CACHE_CONTROL, public_max_age(remaining));
        headers.insert(VARY, HeaderValue::from_static("accept-encoding"));

        let (body, length) = if cached.compressed() && gzip_accepted(&request.headers) {
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
            (cached.body().clone(), cached.len())
        } else {
            match cached.uncompressed_body() {
                Ok(body) => {
                    let length = body.len() as u64;
                    (body, length)
                }
                Err(err) => {
                    warn!(error = %err, "cached body failed to decompress; treating as miss");
                    metrics::record_cache_lookup(false);
                    return CheckOutcome::Miss { key };
                }
            }
        };
        headers.insert(CONTENT_LENGTH, HeaderValue::from(length));

        metrics::record_cache_lookup(true);
        trace!(path = %request.path_and_query, "response cache hit");
        CheckOutcome::Serve(Box::new(ServedResponse {
            status: cached.status(),
            headers,
            body: (!request.is_head()).then_some(body),
        }))
    }
}
