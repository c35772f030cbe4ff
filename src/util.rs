use std::{future::Future, time::Duration};

use anyhow::{Context, Result, anyhow};
use tokio::time::timeout;

/// Bounds a store round trip with `tokio::time::timeout`. An elapsed
/// deadline and an inner error both surface as an `anyhow::Error` naming the
/// operation, so callers log one consistent message either way.
pub async fn timeout_with_context<F, T, E>(
    duration: Duration,
    future: F,
    context: impl Into<String>,
) -> Result<T>
where
    F: Future<Output = Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let context = context.into();
    timeout(duration, future)
        .await
        .map_err(|_| anyhow!("timed out {context}"))?
        .with_context(|| format!("failed while {context}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_through_successful_results() {
        let result: Result<u32> = timeout_with_context(
            Duration::from_secs(1),
            async { Ok::<_, std::io::Error>(7) },
            "computing",
        )
        .await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn reports_elapsed_deadline_with_context() {
        let result: Result<u32> = timeout_with_context(
            Duration::from_millis(5),
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, std::io::Error>(7)
            },
            "waiting on the store",
        )
        .await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("timed out waiting on the store"));
    }

    #[tokio::test]
    async fn wraps_inner_errors_with_context() {
        let result: Result<u32> = timeout_with_context(
            Duration::from_secs(1),
            async { Err::<u32, _>(std::io::Error::other("boom")) },
            "reading a key",
        )
        .await;
        let err = result.unwrap_err();
        assert!(format!("{err:#}").contains("failed while reading a key"));
    }
}
