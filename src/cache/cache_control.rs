use std::time::Duration;

use http::{HeaderMap, HeaderValue};

/// First parsable `max-age` directive across the response's `Cache-Control`
/// headers. Absent or unparsable directives yield `None`.
pub fn max_age(headers: &HeaderMap) -> Option<Duration> {
    for value in headers.get_all(http::header::CACHE_CONTROL) {
        if let Ok(s) = value.to_str() {
            for part in s.split(',') {
                let part = part.trim();
                if let Some(stripped) = part.strip_prefix("max-age=")
                    && let Ok(secs) = stripped.trim().parse::<u64>()
                {
                    return Some(Duration::from_secs(secs));
                }
            }
        }
    }
    None
}

/// TTL a response is stored under: its own max-age when present, otherwise
/// the configured fallback. An explicit `max-age=0` comes back as zero and
/// makes the update stage skip the write.
pub fn response_ttl(headers: &HeaderMap, default_ttl: Duration) -> Duration {
    max_age(headers).unwrap_or(default_ttl)
}

/// `public, max-age=<n>` recomputed from the remaining TTL at lookup time.
pub fn public_max_age(remaining: Duration) -> HeaderValue {
    HeaderValue::from_str(&format!("public, max-age={}", remaining.as_secs()))
        .unwrap_or_else(|_| HeaderValue::from_static("public, max-age=0"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::CACHE_CONTROL;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, value.parse().unwrap());
        headers
    }

    #[test]
    fn parses_max_age_among_other_directives() {
        let headers = headers_with("public, max-age=60, must-revalidate");
        assert_eq!(max_age(&headers), Some(Duration::from_secs(60)));
    }

    #[test]
    fn missing_header_yields_none() {
        assert_eq!(max_age(&HeaderMap::new()), None);
    }

    #[test]
    fn unparsable_max_age_yields_none() {
        let headers = headers_with("max-age=soon");
        assert_eq!(max_age(&headers), None);
    }

    #[test]
    fn explicit_zero_is_not_the_fallback() {
        let headers = headers_with("max-age=0");
        assert_eq!(
            response_ttl(&headers, Duration::from_secs(1)),
            Duration::ZERO
        );
    }

    #[test]
    fn fallback_applies_when_absent() {
        assert_eq!(
            response_ttl(&HeaderMap::new(), Duration::from_secs(1)),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn formats_remaining_ttl() {
        assert_eq!(
            public_max_age(Duration::from_secs(20)),
            HeaderValue::from_static("public, max-age=20")
        );
    }
}
