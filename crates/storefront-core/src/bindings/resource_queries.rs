use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::bindings::{Mutation, MutationOptions, QueryClient, QueryObserver, QueryOptions, Suspense};
use crate::cache::{KeyPart, QueryKey};
use crate::domain::{PaginatedResponse, QueryParams, ResourceId};
use crate::error::ApiError;
use crate::services::ResourceService;

/// Binding factory for one CRUD resource.
///
/// Keys follow one layout per resource name:
///
/// | Family | Key |
/// |--------|-----|
/// | all | `[name]` |
/// | lists | `[name, "list"]` |
/// | list | `[name, "list", params]` |
/// | paginated | `[name, "list", "paginated", params]` |
/// | details | `[name, "detail"]` |
/// | detail | `[name, "detail", id]` |
///
/// Writes invalidate by family, so every cached list goes stale after a
/// create no matter which params it was read with.
pub struct ResourceQueries<T, C = T, U = C> {
    name: String,
    service: ResourceService<T, C, U>,
    client: QueryClient,
}

impl<T, C, U> Clone for ResourceQueries<T, C, U> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            service: self.service.clone(),
            client: self.client.clone(),
        }
    }
}

impl<T, C, U> std::fmt::Debug for ResourceQueries<T, C, U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceQueries")
            .field("name", &self.name)
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

impl<T, C, U> ResourceQueries<T, C, U> {
    pub fn new(name: impl Into<String>, service: ResourceService<T, C, U>, client: QueryClient) -> Self {
        Self {
            name: name.into(),
            service,
            client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service(&self) -> &ResourceService<T, C, U> {
        &self.service
    }

    pub fn client(&self) -> &QueryClient {
        &self.client
    }

    pub fn all_key(&self) -> QueryKey {
        QueryKey::new([KeyPart::from(&self.name)])
    }

    pub fn lists_key(&self) -> QueryKey {
        self.all_key().child("list")
    }

    pub fn list_key(&self, params: &QueryParams) -> QueryKey {
        self.lists_key().child(params)
    }

    pub fn paginated_key(&self, params: &QueryParams) -> QueryKey {
        self.lists_key().child("paginated").child(params)
    }

    pub fn details_key(&self) -> QueryKey {
        self.all_key().child("detail")
    }

    pub fn detail_key(&self, id: &ResourceId) -> QueryKey {
        self.details_key().child(id)
    }
}

impl<T, C, U> ResourceQueries<T, C, U>
where
    T: DeserializeOwned + Send + Sync + 'static,
    C: Send + Sync + 'static,
    U: Send + Sync + 'static,
{
    pub fn list(&self, params: QueryParams, options: QueryOptions) -> QueryObserver<Vec<T>> {
        let key = self.list_key(&params);
        let service = self.service.clone();
        self.client.observe(key, options, move || {
            let service = service.clone();
            let params = params.clone();
            async move { service.get_all(Some(params)).await }
        })
    }

    /// Disabled for blank ids (`0` or an empty string).
    pub fn detail(&self, id: impl Into<ResourceId>, options: QueryOptions) -> QueryObserver<T> {
        let id = id.into();
        let options = options.enabled(options.enabled && !id.is_blank());
        let key = self.detail_key(&id);
        let service = self.service.clone();
        self.client.observe(key, options, move || {
            let service = service.clone();
            let id = id.clone();
            async move { service.get_by_id(id).await }
        })
    }

    pub fn paginated(&self, params: QueryParams, options: QueryOptions) -> QueryObserver<PaginatedResponse<T>> {
        let key = self.paginated_key(&params);
        let service = self.service.clone();
        self.client.observe(key, options, move || {
            let service = service.clone();
            let params = params.clone();
            async move { service.get_paginated(Some(params)).await }
        })
    }

    /// One non-blocking suspending poll of the list.
    pub fn read_list(&self, params: QueryParams) -> Suspense<Vec<T>> {
        let key = self.list_key(&params);
        let service = self.service.clone();
        self.client.read_suspense(&key, move || {
            let service = service.clone();
            let params = params.clone();
            async move { service.get_all(Some(params)).await }
        })
    }

    pub async fn suspense_list(&self, params: QueryParams) -> Result<Arc<Vec<T>>, ApiError> {
        let key = self.list_key(&params);
        let service = self.service.clone();
        self.client
            .suspend(&key, move || {
                let service = service.clone();
                let params = params.clone();
                async move { service.get_all(Some(params)).await }
            })
            .await
    }

    pub async fn suspense_detail(&self, id: impl Into<ResourceId>) -> Result<Arc<T>, ApiError> {
        let id = id.into();
        let key = self.detail_key(&id);
        let service = self.service.clone();
        self.client
            .suspend(&key, move || {
                let service = service.clone();
                let id = id.clone();
                async move { service.get_by_id(id).await }
            })
            .await
    }

    pub async fn suspense_paginated(
        &self,
        params: QueryParams,
    ) -> Result<Arc<PaginatedResponse<T>>, ApiError> {
        let key = self.paginated_key(&params);
        let service = self.service.clone();
        self.client
            .suspend(&key, move || {
                let service = service.clone();
                let params = params.clone();
                async move { service.get_paginated(Some(params)).await }
            })
            .await
    }

    /// Removes the entity; invalidates every list.
    pub fn delete(&self) -> Mutation<ResourceId, ()> {
        let service = self.service.clone();
        self.client.mutation(
            move |id: ResourceId| {
                let service = service.clone();
                async move { service.delete(id).await }
            },
            MutationOptions::default()
                .invalidates([self.lists_key()])
                .with_success_message("deleted successfully"),
        )
    }
}

impl<T, C, U> ResourceQueries<T, C, U>
where
    T: DeserializeOwned + Send + Sync + 'static,
    C: Serialize + Send + Sync + 'static,
    U: Send + Sync + 'static,
{
    /// Invalidates every list on success.
    pub fn create(&self) -> Mutation<C, T> {
        let service = self.service.clone();
        self.client.mutation(
            move |dto: C| {
                let service = service.clone();
                async move { service.create(&dto).await }
            },
            MutationOptions::default()
                .invalidates([self.lists_key()])
                .with_success_message("created successfully"),
        )
    }
}

impl<T, C, U> ResourceQueries<T, C, U>
where
    T: DeserializeOwned + Send + Sync + 'static,
    C: Send + Sync + 'static,
    U: Serialize + Send + Sync + 'static,
{
    /// Invalidates every list and every detail on success.
    pub fn update(&self) -> Mutation<(ResourceId, U), T> {
        let service = self.service.clone();
        self.client.mutation(
            move |(id, dto): (ResourceId, U)| {
                let service = service.clone();
                async move { service.update(id, &dto).await }
            },
            MutationOptions::default()
                .invalidates([self.lists_key(), self.details_key()])
                .with_success_message("updated successfully"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_client::ApiClient;
    use crate::cache::QueryCache;
    use crate::config::ClientConfig;
    use crate::http_client::{HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse};
    use crate::query_key;
    use crate::retry::RetryPolicy;
    use serde::Deserialize;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Widget {
        id: i64,
        name: String,
    }

    #[derive(Debug, Default)]
    struct ScriptedHttpClient {
        responses: Mutex<VecDeque<HttpResponse>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedHttpClient {
        fn with_responses(responses: impl IntoIterator<Item = HttpResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into_iter().collect()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn recorded_requests(&self) -> Vec<HttpRequest> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .clone()
        }
    }

    impl HttpClient for ScriptedHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .push(request);
            let response = self
                .responses
                .lock()
                .expect("response script should not be poisoned")
                .pop_front()
                .ok_or_else(|| HttpError::Other(String::from("script exhausted")));
            Box::pin(async move { response })
        }
    }

    fn widgets(transport: Arc<ScriptedHttpClient>) -> (ResourceQueries<Widget>, QueryCache) {
        let client = Arc::new(ApiClient::new(
            transport,
            &ClientConfig::default().with_base_url("https://api.example.test"),
        ));
        let service = ResourceService::new(client, "/widgets").with_retry(RetryPolicy::none());
        let cache = QueryCache::default();
        let queries = ResourceQueries::new("widgets", service, QueryClient::new(cache.clone()));
        (queries, cache)
    }

    #[test]
    fn keys_nest_under_the_resource_name() {
        let (queries, _) = widgets(ScriptedHttpClient::with_responses([]));
        let params = QueryParams::new().page(1);

        assert_eq!(queries.all_key(), query_key!["widgets"]);
        assert_eq!(queries.list_key(&params), query_key!["widgets", "list", &params]);
        assert_eq!(queries.detail_key(&ResourceId::Int(7)), query_key!["widgets", "detail", 7]);
        assert!(queries.paginated_key(&params).starts_with(&queries.lists_key()));
        assert!(!queries.detail_key(&ResourceId::Int(7)).starts_with(&queries.lists_key()));
    }

    #[tokio::test(start_paused = true)]
    async fn blank_id_disables_detail() {
        let transport = ScriptedHttpClient::with_responses([]);
        let (queries, _) = widgets(Arc::clone(&transport));

        let observer = queries.detail(0, QueryOptions::default());
        tokio::task::yield_now().await;

        assert!(!observer.is_enabled());
        assert!(transport.recorded_requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn create_makes_cached_lists_stale() {
        let transport = ScriptedHttpClient::with_responses([
            HttpResponse::ok_json(r#"[{"id":1,"name":"bolt"}]"#),
            HttpResponse::new(201, r#"{"id":2,"name":"nut"}"#),
            HttpResponse::ok_json(r#"[{"id":1,"name":"bolt"},{"id":2,"name":"nut"}]"#),
        ]);
        let (queries, cache) = widgets(Arc::clone(&transport));
        let params = QueryParams::new();

        let first = queries.suspense_list(params.clone()).await.expect("list");
        assert_eq!(first.len(), 1);

        let created = queries
            .create()
            .mutate(Widget {
                id: 2,
                name: String::from("nut"),
            })
            .await
            .expect("create");
        assert_eq!(created.name, "nut");
        assert!(cache.read::<Vec<Widget>>(&queries.list_key(&params)).data.is_none());

        let second = queries.suspense_list(params).await.expect("list");
        assert_eq!(second.len(), 2);

        let methods: Vec<HttpMethod> = transport
            .recorded_requests()
            .into_iter()
            .map(|request| request.method)
            .collect();
        assert_eq!(methods, vec![HttpMethod::Get, HttpMethod::Post, HttpMethod::Get]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_update_leaves_detail_cached() {
        let transport = ScriptedHttpClient::with_responses([
            HttpResponse::ok_json(r#"{"id":3,"name":"gear"}"#),
            HttpResponse::new(422, r#"{"message":"name taken"}"#),
        ]);
        let (queries, cache) = widgets(Arc::clone(&transport));

        queries.suspense_detail(3).await.expect("detail");
        let error = queries
            .update()
            .mutate((
                ResourceId::Int(3),
                Widget {
                    id: 3,
                    name: String::from("cog"),
                },
            ))
            .await
            .expect_err("422");

        assert_eq!(error.status, 422);
        let cached = cache.read::<Widget>(&queries.detail_key(&ResourceId::Int(3)));
        assert_eq!(cached.data.map(|widget| widget.name.clone()), Some(String::from("gear")));
    }
}
