//! # Query Cache
//!
//! Keyed cache of in-flight and completed fetches. The cache is the only
//! owner of entry state: every transition happens under one lock, and each
//! one is published to observers through a per-entry `watch` version counter.
//!
//! ## Guarantees
//!
//! - At most one fetch is in flight per [`QueryKey`]; later callers attach to it.
//! - Stale data is served immediately while a background refetch runs.
//! - [`QueryCache::invalidate`] clears data and error for a whole key family.
//!   A fetch already in flight still lands, but its result is marked stale and
//!   refetched when anyone is still interested.
//! - Unobserved entries are evicted after the retention window.
//!
//! ## Example
//!
//! ```rust,ignore
//! let cache = QueryCache::new(QueryCacheConfig::default());
//! let key = query_key!["products", "hot"];
//! let hot = cache
//!     .fetch::<Vec<Product>>(&key, fetcher(move || {
//!         let products = products.clone();
//!         async move { products.hot().await.map(|response| response.data) }
//!     }))
//!     .await?;
//! ```

mod entry;
mod key;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use time::OffsetDateTime;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::ApiError;

pub use entry::{fetcher, CacheSnapshot, CachedValue, FetchFuture, Fetcher, QueryStatus};
pub use key::{KeyPart, QueryKey};

use entry::CacheEntry;

/// Freshness and retention windows for every entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryCacheConfig {
    /// How long a successful fetch stays fresh.
    pub stale_time: Duration,
    /// How long an entry with no subscribers is kept.
    pub gc_time: Duration,
}

impl Default for QueryCacheConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_secs(5 * 60),
            gc_time: Duration::from_secs(10 * 60),
        }
    }
}

impl QueryCacheConfig {
    pub fn from_client_config(config: &ClientConfig) -> Self {
        Self {
            stale_time: config.stale_time,
            gc_time: config.gc_time,
        }
    }

    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn with_gc_time(mut self, gc_time: Duration) -> Self {
        self.gc_time = gc_time;
        self
    }
}

struct CacheInner {
    entries: Mutex<HashMap<QueryKey, CacheEntry>>,
    config: QueryCacheConfig,
    next_fetch_id: AtomicU64,
}

/// Shared handle to one cache. Clones address the same entries.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("config", &self.inner.config)
            .field("entries", &self.len())
            .finish()
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(QueryCacheConfig::default())
    }
}

impl QueryCache {
    pub fn new(config: QueryCacheConfig) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: Mutex::new(HashMap::new()),
                config,
                next_fetch_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> QueryCacheConfig {
        self.inner.config
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, CacheEntry>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers interest in `key` and starts a fetch when the entry is idle
    /// or stale and nothing is in flight.
    pub fn subscribe(&self, key: &QueryKey, fetcher: Fetcher) -> Subscription {
        let now = Instant::now();
        let mut entries = self.lock();
        let entry = self.entry_mut(&mut entries, key, now);

        entry.subscriber_count += 1;
        entry.released_at = None;
        entry.fetcher = Some(Arc::clone(&fetcher));

        if entry.needs_fetch(now) {
            self.start_fetch(key, entry, fetcher);
        } else if entry.status == QueryStatus::Fetching {
            debug!(key = %key, "attached to in-flight fetch");
        } else {
            debug!(key = %key, "served from cache");
        }

        Subscription {
            cache: self.clone(),
            key: key.clone(),
            changes: entry.changes(),
            active: true,
        }
    }

    /// Synchronous snapshot. A key the cache has never seen reads as idle.
    pub fn read<T>(&self, key: &QueryKey) -> CacheSnapshot<T>
    where
        T: Send + Sync + 'static,
    {
        let entries = self.lock();
        match entries.get(key) {
            Some(entry) => entry.snapshot(key, Instant::now()),
            None => CacheSnapshot::missing(key),
        }
    }

    /// Starts a fetch for an idle entry or one with stale data, without
    /// subscribing. A stored error is left for the caller to surface.
    ///
    /// The returned receiver observes every later transition of the entry.
    pub fn ensure(&self, key: &QueryKey, fetcher: Fetcher) -> watch::Receiver<u64> {
        let now = Instant::now();
        let mut entries = self.lock();
        let entry = self.entry_mut(&mut entries, key, now);
        entry.fetcher = Some(Arc::clone(&fetcher));

        let stale_data = entry.status == QueryStatus::Success && entry.is_stale(now);
        if entry.status == QueryStatus::Idle || stale_data {
            self.start_fetch(key, entry, fetcher);
        }
        entry.changes()
    }

    /// Waits for a settled value: fresh data is returned at once, otherwise
    /// the deduplicated fetch is awaited.
    pub async fn fetch<T>(&self, key: &QueryKey, fetcher: Fetcher) -> Result<Arc<T>, ApiError>
    where
        T: Send + Sync + 'static,
    {
        let mut changes = self.ensure(key, Arc::clone(&fetcher));
        loop {
            let snapshot = self.read::<T>(key);
            match snapshot.status {
                QueryStatus::Success => {
                    if let Some(data) = snapshot.data {
                        return Ok(data);
                    }
                    return Err(ApiError::unknown(format!(
                        "cached value for {key} has an unexpected type"
                    )));
                }
                QueryStatus::Error => {
                    return Err(snapshot
                        .error
                        .unwrap_or_else(|| ApiError::unknown(String::new())));
                }
                QueryStatus::Idle => {
                    // invalidated after the last transition with nobody subscribed
                    changes = self.ensure(key, Arc::clone(&fetcher));
                    continue;
                }
                QueryStatus::Fetching => {}
            }

            if changes.changed().await.is_err() {
                return Err(ApiError::unknown(format!(
                    "query {key} was removed before it settled"
                )));
            }
        }
    }

    /// Clears data and error of every entry under any of `prefixes` and
    /// refetches the ones that are still subscribed. Returns the match count.
    pub fn invalidate(&self, prefixes: &[QueryKey]) -> usize {
        let mut entries = self.lock();
        let matched: Vec<QueryKey> = entries
            .keys()
            .filter(|key| prefixes.iter().any(|prefix| key.starts_with(prefix)))
            .cloned()
            .collect();

        for key in &matched {
            let Some(entry) = entries.get_mut(key) else {
                continue;
            };
            entry.data = None;
            entry.error = None;
            entry.outdated = false;
            entry.fetched_at = None;
            entry.stale_at = None;

            if entry.status == QueryStatus::Fetching {
                entry.invalidated = true;
                entry.bump();
                continue;
            }

            entry.status = QueryStatus::Idle;
            entry.bump();
            if entry.subscriber_count > 0 {
                if let Some(fetcher) = entry.fetcher.clone() {
                    self.start_fetch(key, entry, fetcher);
                }
            }
        }

        let prefixes: Vec<String> = prefixes.iter().map(ToString::to_string).collect();
        info!(?prefixes, matched = matched.len(), "invalidated queries");
        matched.len()
    }

    /// Forces a fetch with the entry's last fetcher. `false` when the key is
    /// unknown, has no fetcher, or already has a fetch in flight.
    pub fn refetch(&self, key: &QueryKey) -> bool {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(key) else {
            return false;
        };
        if entry.status == QueryStatus::Fetching {
            return false;
        }
        match entry.fetcher.clone() {
            Some(fetcher) => {
                self.start_fetch(key, entry, fetcher);
                true
            }
            None => false,
        }
    }

    /// Seeds `key` with a value, e.g. the entity a mutation returned.
    pub fn set_data<T>(&self, key: &QueryKey, value: T)
    where
        T: Send + Sync + 'static,
    {
        let now = Instant::now();
        let stale_time = self.inner.config.stale_time;
        let mut entries = self.lock();
        let entry = self.entry_mut(&mut entries, key, now);

        entry.data = Some(Arc::new(value));
        entry.error = None;
        entry.outdated = false;
        entry.fetched_at = Some(now);
        entry.stale_at = Some(now + stale_time);
        entry.updated_at = Some(OffsetDateTime::now_utc());
        // an in-flight fetch keeps the entry in Fetching until it lands
        if entry.status != QueryStatus::Fetching {
            entry.status = QueryStatus::Success;
        }
        entry.bump();
    }

    /// Drops `key` outright. Waiters on it observe the removal as an error.
    pub fn remove(&self, key: &QueryKey) -> bool {
        let removed = self.lock().remove(key).is_some();
        if removed {
            debug!(key = %key, "removed query");
        }
        removed
    }

    /// Evicts every unobserved, settled entry whose retention window has
    /// elapsed. Returns the eviction count.
    pub fn collect_garbage(&self) -> usize {
        let now = Instant::now();
        let gc_time = self.inner.config.gc_time;
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| {
            let expired = entry
                .released_at
                .is_some_and(|released_at| now.duration_since(released_at) >= gc_time);
            !(expired && entry.subscriber_count == 0 && entry.status != QueryStatus::Fetching)
        });
        let evicted = before - entries.len();
        if evicted > 0 {
            info!(evicted, "collected unused queries");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.lock().contains_key(key)
    }

    /// Change feed of an existing entry.
    pub fn watch(&self, key: &QueryKey) -> Option<watch::Receiver<u64>> {
        self.lock().get(key).map(CacheEntry::changes)
    }

    fn entry_mut<'a>(
        &self,
        entries: &'a mut HashMap<QueryKey, CacheEntry>,
        key: &QueryKey,
        now: Instant,
    ) -> &'a mut CacheEntry {
        entries.entry(key.clone()).or_insert_with(|| {
            let mut entry = CacheEntry::new(now);
            self.schedule_gc(key, &mut entry);
            entry
        })
    }

    /// Moves `entry` to Fetching and runs `fetcher` on the current runtime.
    /// Caller holds the lock.
    fn start_fetch(&self, key: &QueryKey, entry: &mut CacheEntry, fetcher: Fetcher) {
        let fetch_id = self.inner.next_fetch_id.fetch_add(1, Ordering::Relaxed);
        entry.fetch_id = fetch_id;
        entry.status = QueryStatus::Fetching;
        entry.invalidated = false;

        let Ok(handle) = Handle::try_current() else {
            warn!(key = %key, "no async runtime available, fetch not started");
            entry.status = QueryStatus::Error;
            entry.error = Some(ApiError::unknown("no async runtime available to run the fetch"));
            entry.fetched_at = Some(Instant::now());
            entry.stale_at = None;
            entry.bump();
            return;
        };

        debug!(key = %key, fetch_id, "fetch started");
        entry.bump();

        let cache = Arc::downgrade(&self.inner);
        let key = key.clone();
        handle.spawn(async move {
            let result = fetcher().await;
            if let Some(inner) = Weak::upgrade(&cache) {
                QueryCache { inner }.complete(&key, fetch_id, result);
            }
        });
    }

    fn complete(&self, key: &QueryKey, fetch_id: u64, result: Result<CachedValue, ApiError>) {
        let now = Instant::now();
        let stale_time = self.inner.config.stale_time;
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(key) else {
            debug!(key = %key, "fetch landed after its query was removed");
            return;
        };
        if entry.fetch_id != fetch_id {
            debug!(key = %key, fetch_id, "dropping superseded fetch result");
            return;
        }

        entry.fetched_at = Some(now);
        match result {
            Ok(value) => {
                entry.data = Some(value);
                entry.error = None;
                entry.status = QueryStatus::Success;
                entry.updated_at = Some(OffsetDateTime::now_utc());
                // a result invalidated in flight lands already stale
                entry.outdated = entry.invalidated;
                entry.stale_at = (!entry.invalidated).then(|| now + stale_time);
                debug!(key = %key, "fetch succeeded");
            }
            Err(error) => {
                warn!(key = %key, status = error.status, message = %error.message, "fetch failed");
                entry.error = Some(error);
                entry.status = QueryStatus::Error;
                entry.stale_at = None;
            }
        }

        let refetch = entry.invalidated && entry.has_waiters();
        entry.invalidated = false;
        entry.bump();

        if refetch {
            if let Some(fetcher) = entry.fetcher.clone() {
                debug!(key = %key, "refetching after invalidation during fetch");
                self.start_fetch(key, entry, fetcher);
            }
        } else if entry.subscriber_count == 0 {
            self.schedule_gc(key, entry);
        }
    }

    fn release(&self, key: &QueryKey) {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        entry.subscriber_count = entry.subscriber_count.saturating_sub(1);
        entry.bump();
        if entry.subscriber_count == 0 {
            self.schedule_gc(key, entry);
        }
    }

    /// Records the release and arms the entry's eviction timer. At most one
    /// timer task runs per entry; it re-reads `released_at` when it wakes.
    fn schedule_gc(&self, key: &QueryKey, entry: &mut CacheEntry) {
        entry.released_at = Some(Instant::now());
        if entry.gc_armed {
            return;
        }
        let Ok(handle) = Handle::try_current() else {
            return;
        };
        entry.gc_armed = true;

        let gc_time = self.inner.config.gc_time;
        let cache = Arc::downgrade(&self.inner);
        let key = key.clone();
        handle.spawn(async move {
            let mut deadline = Instant::now() + gc_time;
            loop {
                tokio::time::sleep_until(deadline).await;
                let Some(inner) = Weak::upgrade(&cache) else {
                    return;
                };
                match (QueryCache { inner }).sweep(&key) {
                    Some(next) => deadline = next,
                    None => return,
                }
            }
        });
    }

    /// Evicts `key` when it has been unobserved for the whole retention
    /// window. Returns the next deadline while the timer has to stay armed.
    fn sweep(&self, key: &QueryKey) -> Option<Instant> {
        let now = Instant::now();
        let gc_time = self.inner.config.gc_time;
        let mut entries = self.lock();
        let entry = entries.get_mut(key)?;

        let released_at = match entry.released_at {
            Some(released_at)
                if entry.subscriber_count == 0 && entry.status != QueryStatus::Fetching =>
            {
                released_at
            }
            _ => {
                // rearmed by the next release or completed fetch
                entry.gc_armed = false;
                return None;
            }
        };

        let deadline = released_at + gc_time;
        if now < deadline {
            return Some(deadline);
        }
        entries.remove(key);
        info!(key = %key, "evicted unused query");
        None
    }
}

/// Live interest in one key. Dropping it unsubscribes.
pub struct Subscription {
    cache: QueryCache,
    key: QueryKey,
    changes: watch::Receiver<u64>,
    active: bool,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("active", &self.active)
            .finish()
    }
}

impl Subscription {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Resolves on the entry's next transition. `false` once the entry is gone.
    pub async fn changed(&mut self) -> bool {
        self.changes.changed().await.is_ok()
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if std::mem::take(&mut self.active) {
            self.cache.release(&self.key);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
