pub mod cache;
pub mod logging;
pub mod metrics;
pub mod settings;
pub mod store;
pub mod util;

use std::sync::Arc;

use anyhow::Result;
use http::HeaderMap;

pub use cache::{
    BatchCache, CacheRequest, CheckOutcome, ComputedResponse, ResponseCache, ServedResponse,
};
pub use store::{ConnectionState, MemoryStore, RedisStore, RemoteStore};

use crate::settings::Settings;

/// Wire up the full engine against the remote store named in `settings`.
///
/// A store that is unreachable at startup leaves the engine running in
/// degraded mode; only an invalid configuration is a hard error.
pub async fn build(
    settings: Settings,
    default_headers: HeaderMap,
) -> Result<ResponseCache<RedisStore>> {
    settings.validate()?;
    let store = RedisStore::connect(&settings).await?;
    let batch = BatchCache::new(Arc::clone(&store));
    Ok(ResponseCache::new(batch, &settings, default_headers))
}
