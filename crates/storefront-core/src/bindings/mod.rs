//! # Bindings
//!
//! Adapters from the [`QueryCache`] to the UI's two read models plus
//! mutations:
//!
//! | Mode | Entry point | Shape |
//! |------|-------------|-------|
//! | Observable | [`QueryClient::observe`] | [`QueryObserver`] with a live [`QueryState`] |
//! | Suspending | [`QueryClient::read_suspense`] / [`QueryClient::suspend`] | [`Suspense`] `Ready`/`Pending`/`Failed` |
//! | Mutation | [`QueryClient::mutation`] | [`Mutation`] that invalidates on success |
//!
//! [`ResourceQueries`] and [`CatalogQueries`] bundle these per resource.

mod catalog;
mod mutation;
mod observer;
mod resource_queries;
mod suspense;

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use crate::cache::{fetcher, Fetcher, QueryCache, QueryKey};
use crate::domain::QueryOutput;
use crate::error::ApiError;

pub use catalog::{category_keys, product_keys, CatalogQueries};
pub use mutation::{
    Mutation, MutationOptions, MutationStatus, Notifier, TracingNotifier,
    DEFAULT_SUCCESS_MESSAGE,
};
pub use observer::{QueryObserver, QueryState};
pub use resource_queries::ResourceQueries;
pub use suspense::Suspense;

/// Per-query switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Disabled queries never fetch; their observers only read the cache.
    pub enabled: bool,
    /// Report fetch failures through the [`Notifier`].
    pub notify_errors: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            notify_errors: true,
        }
    }
}

impl QueryOptions {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn quiet(mut self) -> Self {
        self.notify_errors = false;
        self
    }
}

/// Entry point for bindings: one cache plus the notifier that surfaces
/// messages to the user. Cheap to clone.
#[derive(Clone)]
pub struct QueryClient {
    cache: QueryCache,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryClient")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl QueryClient {
    pub fn new(cache: QueryCache) -> Self {
        Self {
            cache,
            notifier: Arc::new(TracingNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    pub fn invalidate(&self, keys: &[QueryKey]) -> usize {
        self.cache.invalidate(keys)
    }

    /// Observable mode: subscribes on creation, unsubscribes on drop.
    pub fn observe<R, F, Fut>(
        &self,
        key: QueryKey,
        options: QueryOptions,
        fetch: F,
    ) -> QueryObserver<R::Data>
    where
        R: QueryOutput,
        R::Data: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ApiError>> + Send + 'static,
    {
        let subscription = options
            .enabled
            .then(|| self.cache.subscribe(&key, self.query_fetcher(fetch, options.notify_errors)));
        QueryObserver::new(self.cache.clone(), key, subscription)
    }

    /// Suspending mode, one poll: never blocks.
    pub fn read_suspense<R, F, Fut>(&self, key: &QueryKey, fetch: F) -> Suspense<R::Data>
    where
        R: QueryOutput,
        R::Data: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ApiError>> + Send + 'static,
    {
        self.poll_suspense(key, self.query_fetcher(fetch, false)).0
    }

    /// Suspending mode: waits while the read is pending and resolves to the
    /// data or to the stored error.
    pub async fn suspend<R, F, Fut>(&self, key: &QueryKey, fetch: F) -> Result<Arc<R::Data>, ApiError>
    where
        R: QueryOutput,
        R::Data: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ApiError>> + Send + 'static,
    {
        let fetcher = self.query_fetcher(fetch, false);
        loop {
            let (suspense, mut changes) = self.poll_suspense::<R::Data>(key, Arc::clone(&fetcher));
            match suspense {
                Suspense::Ready(data) => return Ok(data),
                Suspense::Failed(error) => return Err(error),
                Suspense::Pending => {}
            }
            // a removed entry is recreated on the next poll
            let _ = changes.changed().await;
        }
    }

    pub fn mutation<I, R, F, Fut>(&self, run: F, options: MutationOptions) -> Mutation<I, R::Data>
    where
        I: 'static,
        R: QueryOutput,
        R::Data: 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ApiError>> + Send + 'static,
    {
        Mutation::new(self.clone(), run, options)
    }

    fn poll_suspense<T>(&self, key: &QueryKey, fetcher: Fetcher) -> (Suspense<T>, watch::Receiver<u64>)
    where
        T: Send + Sync + 'static,
    {
        let changes = self.cache.ensure(key, fetcher);
        (Suspense::from_snapshot(self.cache.read::<T>(key)), changes)
    }

    fn query_fetcher<R, F, Fut>(&self, fetch: F, notify_errors: bool) -> Fetcher
    where
        R: QueryOutput,
        R::Data: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ApiError>> + Send + 'static,
    {
        let notifier = notify_errors.then(|| Arc::clone(&self.notifier));
        fetcher(move || {
            let pending = fetch();
            let notifier = notifier.clone();
            async move {
                match pending.await {
                    Ok(output) => Ok(output.into_data()),
                    Err(error) => {
                        if let Some(notifier) = notifier {
                            notifier.error(&error);
                        }
                        Err(error)
                    }
                }
            }
        })
    }
}
