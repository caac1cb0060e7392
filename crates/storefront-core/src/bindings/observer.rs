use std::marker::PhantomData;
use std::sync::Arc;

use time::OffsetDateTime;

use crate::cache::{CacheSnapshot, QueryCache, QueryKey, QueryStatus, Subscription};
use crate::error::ApiError;

/// What a UI component renders for one query.
#[derive(Debug)]
pub struct QueryState<T> {
    pub status: QueryStatus,
    pub data: Option<Arc<T>>,
    pub error: Option<ApiError>,
    /// First load: fetching with nothing to show yet.
    pub is_loading: bool,
    /// Any fetch in flight, including background refreshes.
    pub is_fetching: bool,
    pub is_stale: bool,
    pub updated_at: Option<OffsetDateTime>,
}

impl<T> QueryState<T> {
    fn from_snapshot(snapshot: CacheSnapshot<T>) -> Self {
        let is_fetching = snapshot.status == QueryStatus::Fetching;
        Self {
            status: snapshot.status,
            is_loading: is_fetching && snapshot.data.is_none(),
            is_fetching,
            is_stale: snapshot.is_stale,
            updated_at: snapshot.updated_at,
            data: snapshot.data,
            error: snapshot.error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            is_loading: self.is_loading,
            is_fetching: self.is_fetching,
            is_stale: self.is_stale,
            updated_at: self.updated_at,
        }
    }
}

/// Live view over one key. Holding it keeps the entry subscribed; dropping it
/// unsubscribes. A disabled observer never fetches.
#[derive(Debug)]
pub struct QueryObserver<T> {
    cache: QueryCache,
    key: QueryKey,
    subscription: Option<Subscription>,
    _data: PhantomData<fn() -> T>,
}

impl<T> QueryObserver<T>
where
    T: Send + Sync + 'static,
{
    pub(crate) fn new(cache: QueryCache, key: QueryKey, subscription: Option<Subscription>) -> Self {
        Self {
            cache,
            key,
            subscription,
            _data: PhantomData,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn is_enabled(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn state(&self) -> QueryState<T> {
        QueryState::from_snapshot(self.cache.read::<T>(&self.key))
    }

    /// Resolves on the next transition. `false` for disabled observers and
    /// once the entry is gone.
    pub async fn changed(&mut self) -> bool {
        match self.subscription.as_mut() {
            Some(subscription) => subscription.changed().await,
            None => false,
        }
    }

    /// Waits until no fetch is in flight and returns that state.
    pub async fn settled(&mut self) -> QueryState<T> {
        loop {
            let state = self.state();
            if !state.is_fetching || !self.changed().await {
                return state;
            }
        }
    }

    pub fn refetch(&self) -> bool {
        self.is_enabled() && self.cache.refetch(&self.key)
    }
}
