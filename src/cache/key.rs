/// Bumped whenever the key derivation or the persisted value shape changes,
/// so new processes never read entries written under the old schema.
const KEY_SCHEMA_VERSION: &str = "v2";

/// Stable cache key for a request's method-independent identity: a blake3
/// digest of the originally-received path plus raw query string, before any
/// normalization. Query parameter order is deliberately significant.
pub fn response_cache_key(path_and_query: &str) -> String {
    let digest = blake3::hash(path_and_query.as_bytes());
    format!("{}.{KEY_SCHEMA_VERSION}", digest.to_hex())
}
