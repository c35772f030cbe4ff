use std::time::Duration;

use http::header::{CACHE_CONTROL, CONTENT_ENCODING, CONTENT_LENGTH, VARY};
use http::{HeaderMap, StatusCode};
use tracing::{trace, warn};

use crate::store::RemoteStore;

use super::cache_control::response_ttl;
use super::response::CachedHttpResponse;
use super::{ComputedResponse, ResponseCache};

/// Why the update stage declined to cache a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSkipReason {
    NoCacheKey,
    EmptyBody,
    UncacheableStatus,
    ZeroTtl,
}

#[derive(Debug)]
pub enum UpdatePlan {
    Skip(UpdateSkipReason),
    Store { ttl: Duration },
}

/// Pure cacheability decision for a just-computed response. Eligible when a
/// cache key was attached by the check stage, the body is non-empty, and the
/// status is 2xx or the internally produced not-modified; the TTL comes from
/// the response's own `max-age`, falling back to `default_ttl`.
pub fn plan_update(
    cache_key: Option<&str>,
    status: StatusCode,
    body_len: usize,
    headers: &HeaderMap,
    default_ttl: Duration,
) -> UpdatePlan {
    if cache_key.is_none() {
        return UpdatePlan::Skip(UpdateSkipReason::NoCacheKey);
    }
    if body_len == 0 {
        return UpdatePlan::Skip(UpdateSkipReason::EmptyBody);
    }
    if !(status.is_success() || status == StatusCode::NOT_MODIFIED) {
        return UpdatePlan::Skip(UpdateSkipReason::UncacheableStatus);
    }
    let ttl = response_ttl(headers, default_ttl);
    if ttl.is_zero() {
        return UpdatePlan::Skip(UpdateSkipReason::ZeroTtl);
    }
    UpdatePlan::Store { ttl }
}

/// Headers recomputed on every hit; stored copies must not be trusted.
fn strip_volatile(headers: &mut HeaderMap) {
    headers.remove(CACHE_CONTROL);
    headers.remove(CONTENT_ENCODING);
    headers.remove(CONTENT_LENGTH);
    headers.remove(VARY);
}

impl<S: RemoteStore> ResponseCache<S> {
    /// Runs once per request, after business logic and before the response
    /// is flushed. Stores the response when eligible; returns whether a
    /// write happened. Store failures never affect the current response.
    pub async fn update(
        &self,
        cache_key: Option<&str>,
        response: &ComputedResponse,
        override_headers: &HeaderMap,
    ) -> bool {
        let plan = plan_update(
            cache_key,
            response.status,
            response.body.len(),
            &response.headers,
            self.default_ttl(),
        );
        let ttl = match plan {
            UpdatePlan::Skip(reason) => {
                trace!(?reason, "response not cached");
                return false;
            }
            UpdatePlan::Store { ttl } => ttl,
        };
        let Some(key) = cache_key else {
            return false;
        };

        // A not-modified result skipped the usual header-setting path, so its
        // own header set is unusable; rebuild from defaults plus the
        // request-scoped overrides. The representation itself is a full fresh
        // body, so it is stored as a 200.
        let (stored_status, mut headers) = if response.status == StatusCode::NOT_MODIFIED {
            let mut merged = self.default_headers().clone();
            for (name, value) in override_headers {
                merged.insert(name, value.clone());
            }
            (StatusCode::OK, merged)
        } else {
            (response.status, response.headers.clone())
        };
        strip_volatile(&mut headers);

        let compress = response.body.len() >= self.compression_threshold();
        let cached =
            match CachedHttpResponse::new(stored_status, headers, response.body.clone(), compress) {
                Ok(cached) => cached,
                Err(err) => {
                    warn!(error = %err, "failed to build cacheable response; skipping");
                    return false;
                }
            };
        let payload = match cached.to_persisted() {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "response body not representable in the store; skipping");
                return false;
            }
        };

        self.batch().set_single(key, ttl.as_secs(), &payload).await
    }
}
