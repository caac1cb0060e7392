use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::cache::QueryKey;
use crate::error::ApiError;

/// Type-erased cached value. Readers downcast it back to `Arc<T>`.
pub type CachedValue = Arc<dyn Any + Send + Sync>;

pub type FetchFuture = Pin<Box<dyn Future<Output = Result<CachedValue, ApiError>> + Send>>;

/// Produces one fetch for a key. Called at most once per started fetch.
pub type Fetcher = Arc<dyn Fn() -> FetchFuture + Send + Sync>;

/// Wraps a typed async closure into a [`Fetcher`].
pub fn fetcher<T, F, Fut>(fetch: F) -> Fetcher
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
{
    Arc::new(move || -> FetchFuture {
        let pending = fetch();
        Box::pin(async move { pending.await.map(|value| Arc::new(value) as CachedValue) })
    })
}

/// Lifecycle state of one cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryStatus {
    /// No data and no fetch in flight.
    Idle,
    Fetching,
    Success,
    Error,
}

impl QueryStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) struct CacheEntry {
    pub(crate) status: QueryStatus,
    pub(crate) data: Option<CachedValue>,
    pub(crate) error: Option<ApiError>,
    pub(crate) fetched_at: Option<Instant>,
    pub(crate) stale_at: Option<Instant>,
    pub(crate) updated_at: Option<OffsetDateTime>,
    pub(crate) subscriber_count: usize,
    /// Most recently registered fetcher; reused for invalidation refetches.
    pub(crate) fetcher: Option<Fetcher>,
    /// Id of the fetch whose result this entry will accept.
    pub(crate) fetch_id: u64,
    /// Set when an invalidation lands while a fetch is in flight.
    pub(crate) invalidated: bool,
    /// Data was fetched before the latest invalidation.
    pub(crate) outdated: bool,
    /// An eviction timer task is sleeping for this entry.
    pub(crate) gc_armed: bool,
    /// When the subscriber count last dropped to zero.
    pub(crate) released_at: Option<Instant>,
    version: watch::Sender<u64>,
}

impl CacheEntry {
    pub(crate) fn new(now: Instant) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            fetched_at: None,
            stale_at: None,
            updated_at: None,
            subscriber_count: 0,
            fetcher: None,
            fetch_id: 0,
            invalidated: false,
            outdated: false,
            gc_armed: false,
            released_at: Some(now),
            version,
        }
    }

    /// Stale once `now` is past the freshness window. Entries without a
    /// fresh completed fetch have no `stale_at` and are always stale.
    pub(crate) fn is_stale(&self, now: Instant) -> bool {
        self.stale_at.map_or(true, |stale_at| now > stale_at)
    }

    /// `true` when a subscription should start a fetch.
    pub(crate) fn needs_fetch(&self, now: Instant) -> bool {
        match self.status {
            QueryStatus::Fetching => false,
            QueryStatus::Idle => true,
            QueryStatus::Success | QueryStatus::Error => self.is_stale(now),
        }
    }

    pub(crate) fn has_waiters(&self) -> bool {
        self.subscriber_count > 0 || self.version.receiver_count() > 0
    }

    pub(crate) fn changes(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Publishes a transition to every observer.
    pub(crate) fn bump(&self) {
        self.version.send_modify(|version| *version = version.wrapping_add(1));
    }

    pub(crate) fn snapshot<T>(&self, key: &QueryKey, now: Instant) -> CacheSnapshot<T>
    where
        T: Send + Sync + 'static,
    {
        let data = self.data.as_ref().and_then(|value| {
            let typed = Arc::clone(value).downcast::<T>().ok();
            if typed.is_none() {
                tracing::warn!(key = %key, "cached value has a different type than requested");
            }
            typed
        });

        CacheSnapshot {
            key: key.clone(),
            status: self.status,
            data,
            error: self.error.clone(),
            fetched_at: self.fetched_at,
            stale_at: self.stale_at,
            updated_at: self.updated_at,
            subscriber_count: self.subscriber_count,
            is_stale: self.is_stale(now),
            is_outdated: self.outdated && self.data.is_some(),
        }
    }
}

/// Point-in-time copy of one entry. Never changes after it is taken.
#[derive(Debug)]
pub struct CacheSnapshot<T> {
    pub key: QueryKey,
    pub status: QueryStatus,
    pub data: Option<Arc<T>>,
    pub error: Option<ApiError>,
    pub fetched_at: Option<Instant>,
    pub stale_at: Option<Instant>,
    /// Wall-clock time of the last successful fetch.
    pub updated_at: Option<OffsetDateTime>,
    pub subscriber_count: usize,
    pub is_stale: bool,
    /// `data` predates the latest invalidation of this key.
    pub is_outdated: bool,
}

impl<T> CacheSnapshot<T> {
    pub(crate) fn missing(key: &QueryKey) -> Self {
        Self {
            key: key.clone(),
            status: QueryStatus::Idle,
            data: None,
            error: None,
            fetched_at: None,
            stale_at: None,
            updated_at: None,
            subscriber_count: 0,
            is_stale: true,
            is_outdated: false,
        }
    }

    pub fn is_fetching(&self) -> bool {
        self.status == QueryStatus::Fetching
    }
}

impl<T> Clone for CacheSnapshot<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            fetched_at: self.fetched_at,
            stale_at: self.stale_at,
            updated_at: self.updated_at,
            subscriber_count: self.subscriber_count,
            is_stale: self.is_stale,
            is_outdated: self.is_outdated,
        }
    }
}
