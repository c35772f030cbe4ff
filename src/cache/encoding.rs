use http::HeaderMap;

/// Whether the request's `Accept-Encoding` admits a gzip representation.
///
/// A listed `gzip` (or `x-gzip`) coding decides directly; `*` acts as a
/// fallback for codings not otherwise listed. A `q=0` parameter disables the
/// coding it is attached to; a malformed qvalue counts as acceptance.
pub fn gzip_accepted(headers: &HeaderMap) -> bool {
    let mut wildcard = None;

    for value in headers.get_all(http::header::ACCEPT_ENCODING) {
        let Ok(s) = value.to_str() else { continue };
        for entry in s.split(',') {
            let mut parts = entry.trim().split(';');
            let coding = parts.next().unwrap_or("").trim();
            let enabled = parts
                .find_map(|param| param.trim().strip_prefix("q="))
                .and_then(|q| q.trim().parse::<f32>().ok())
                .map(|q| q > 0.0)
                .unwrap_or(true);

            if coding.eq_ignore_ascii_case("gzip") || coding.eq_ignore_ascii_case("x-gzip") {
                return enabled;
            }
            if coding == "*" {
                wildcard = Some(enabled);
            }
        }
    }

    wildcard.unwrap_or(false)
}
