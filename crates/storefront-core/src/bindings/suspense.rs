use std::sync::Arc;

use crate::cache::{CacheSnapshot, QueryStatus};
use crate::error::ApiError;

/// Outcome of one suspending read.
///
/// `Pending` tells the caller's scheduler to read again after the entry
/// changes; [`QueryClient::suspend`](crate::bindings::QueryClient::suspend)
/// does exactly that.
#[derive(Debug)]
pub enum Suspense<T> {
    Ready(Arc<T>),
    Pending,
    Failed(ApiError),
}

impl<T> Suspense<T> {
    /// Current data wins, so stale data keeps rendering during a background
    /// refresh. Data that predates an invalidation never resolves a read:
    /// the read waits for the refetch or fails with its error.
    pub(crate) fn from_snapshot(snapshot: CacheSnapshot<T>) -> Self {
        let CacheSnapshot {
            key,
            status,
            data,
            error,
            is_outdated,
            ..
        } = snapshot;

        match (data, status) {
            (Some(data), _) if !is_outdated => Self::Ready(data),
            (_, QueryStatus::Error) => {
                Self::Failed(error.unwrap_or_else(|| ApiError::unknown(String::new())))
            }
            (None, QueryStatus::Success) => Self::Failed(ApiError::unknown(format!(
                "cached value for {key} has an unexpected type"
            ))),
            _ => Self::Pending,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// `None` while pending.
    pub fn into_result(self) -> Option<Result<Arc<T>, ApiError>> {
        match self {
            Self::Ready(data) => Some(Ok(data)),
            Self::Failed(error) => Some(Err(error)),
            Self::Pending => None,
        }
    }
}

impl<T> Clone for Suspense<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Ready(data) => Self::Ready(Arc::clone(data)),
            Self::Pending => Self::Pending,
            Self::Failed(error) => Self::Failed(error.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::QueryClient;
    use crate::cache::QueryCache;
    use crate::domain::ApiResponse;
    use crate::error::ApiErrorKind;
    use crate::query_key;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    type VersionFuture = Pin<Box<dyn Future<Output = Result<ApiResponse<u64>, ApiError>> + Send>>;

    /// Fetch that reports the server version current when it started.
    fn versioned_fetch(
        version: &Arc<AtomicU64>,
    ) -> impl Fn() -> VersionFuture + Clone + Send + Sync + 'static {
        let version = Arc::clone(version);
        move || -> VersionFuture {
            let seen = version.load(Ordering::SeqCst);
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(ApiResponse::new(seen, 200))
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn pending_read_resolves_after_fetch() {
        let client = QueryClient::new(QueryCache::default());
        let key = query_key!["categories", "with-product-count"];
        let fetch = || async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok::<_, ApiError>(ApiResponse::new(3_u64, 200))
        };

        assert!(client.read_suspense(&key, fetch).is_pending());
        // a second poll attaches to the same fetch
        assert!(client.read_suspense(&key, fetch).is_pending());

        let value = client.suspend(&key, fetch).await.expect("ready");
        assert_eq!(*value, 3);
        assert!(client.read_suspense(&key, fetch).is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn error_is_the_failure_outcome() {
        let client = QueryClient::new(QueryCache::default());
        let key = query_key!["products", "detail", 404];
        let fetch = || async { Err::<ApiResponse<u64>, _>(ApiError::from_response(404, None)) };

        let error = client.suspend(&key, fetch).await.expect_err("404");
        assert_eq!(error.status, 404);

        match client.read_suspense(&key, fetch) {
            Suspense::Failed(error) => assert_eq!(error.status, 404),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn read_after_invalidation_waits_for_the_refetch() {
        let client = QueryClient::new(QueryCache::default());
        let key = query_key!["products", "list", "all"];
        let version = Arc::new(AtomicU64::new(1));
        let fetch = versioned_fetch(&version);

        assert!(client.read_suspense(&key, fetch.clone()).is_pending());
        tokio::time::sleep(Duration::from_millis(50)).await;

        // a write lands on the server while version 1 is still in flight
        version.store(2, Ordering::SeqCst);
        client.invalidate(&[query_key!["products", "list"]]);

        let value = client.suspend(&key, fetch.clone()).await.expect("refetched");
        assert_eq!(*value, 2);
        assert!(client.read_suspense(&key, fetch).is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn result_invalidated_in_flight_never_resolves_a_read() {
        let client = QueryClient::new(QueryCache::default());
        let key = query_key!["categories", "popular"];
        let version = Arc::new(AtomicU64::new(1));
        let fetch = versioned_fetch(&version);

        assert!(client.read_suspense(&key, fetch.clone()).is_pending());
        version.store(2, Ordering::SeqCst);
        client.invalidate(&[key.clone()]);

        // nobody waits, so version 1 lands without a refetch
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(client.cache().read::<u64>(&key).is_outdated);

        assert!(client.read_suspense(&key, fetch.clone()).is_pending());
        let value = client.suspend(&key, fetch).await.expect("refetched");
        assert_eq!(*value, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn mismatched_cached_type_fails_instead_of_waiting() {
        let client = QueryClient::new(QueryCache::default());
        let key = query_key!["products", "detail", 9];
        client.cache().set_data(&key, String::from("not a count"));
        let fetch = || async { Ok::<_, ApiError>(ApiResponse::new(9_u64, 200)) };

        let error = client.suspend(&key, fetch).await.expect_err("type mismatch");
        assert_eq!(error.kind, ApiErrorKind::Unknown);
        assert!(error.message.contains("unexpected type"));
    }
}
