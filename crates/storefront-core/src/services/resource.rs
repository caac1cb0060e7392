use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::api_client::{ApiClient, RawResponse, RequestOptions};
use crate::domain::{ApiResponse, PaginatedResponse, QueryParams, ResourceId};
use crate::error::ApiError;
use crate::http_client::HttpMethod;
use crate::retry::{self, RetryPolicy};

/// Typed CRUD facade over one REST resource.
///
/// `T` is the entity, `C` the create body and `U` the update body. The service
/// holds no per-request state, so one instance can be cloned and shared across
/// the whole process. Reads go through the retry executor; writes are sent
/// exactly once.
pub struct ResourceService<T, C = T, U = C> {
    client: Arc<ApiClient>,
    endpoint: String,
    retry: RetryPolicy,
    _types: PhantomData<fn() -> (T, C, U)>,
}

impl<T, C, U> Clone for ResourceService<T, C, U> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            endpoint: self.endpoint.clone(),
            retry: self.retry.clone(),
            _types: PhantomData,
        }
    }
}

impl<T, C, U> fmt::Debug for ResourceService<T, C, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceService")
            .field("endpoint", &self.endpoint)
            .field("max_retries", &self.retry.max_retries)
            .finish_non_exhaustive()
    }
}

impl<T, C, U> ResourceService<T, C, U> {
    /// `endpoint` is the resource path, e.g. `/products`.
    pub fn new(client: Arc<ApiClient>, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        let endpoint = format!("/{}", endpoint.trim_matches('/'));
        Self {
            client,
            endpoint,
            retry: RetryPolicy::default(),
            _types: PhantomData,
        }
    }

    /// Policy applied to reads. Writes ignore it.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn path_for(&self, suffix: impl fmt::Display) -> String {
        format!("{}/{}", self.endpoint, suffix)
    }

    async fn read(&self, path: &str, params: Option<QueryParams>) -> Result<RawResponse, ApiError> {
        retry::execute(|| self.client.get(path, params.clone()), &self.retry).await
    }

    async fn write(
        &self,
        method: HttpMethod,
        path: &str,
        data: Option<Value>,
    ) -> Result<RawResponse, ApiError> {
        debug!(method = method.as_str(), path, "sending write");
        let options = RequestOptions { params: None, data };
        self.client
            .request(method, path, options)
            .await
            .map_err(ApiError::from)
    }

    pub async fn delete(&self, id: impl Into<ResourceId>) -> Result<ApiResponse<()>, ApiError> {
        let path = self.path_for(id.into());
        let raw = self.write(HttpMethod::Delete, &path, None).await?;
        ApiResponse::<Value>::from_raw(raw).map(|response| response.map(|_| ()))
    }

    /// `DELETE /{resource}` with body `{"ids": [...]}`.
    pub async fn bulk_delete(&self, ids: &[ResourceId]) -> Result<ApiResponse<()>, ApiError> {
        let raw = self
            .write(HttpMethod::Delete, &self.endpoint, Some(json!({ "ids": ids })))
            .await?;
        ApiResponse::<Value>::from_raw(raw).map(|response| response.map(|_| ()))
    }

    /// Read outside the CRUD shape, e.g. `custom_get("hot", None)`.
    pub async fn custom_get<R>(
        &self,
        subpath: &str,
        params: Option<QueryParams>,
    ) -> Result<ApiResponse<R>, ApiError>
    where
        R: DeserializeOwned,
    {
        let path = self.path_for(subpath.trim_start_matches('/'));
        ApiResponse::from_raw(self.read(&path, params).await?)
    }

    pub async fn custom_post<R, B>(&self, subpath: &str, body: &B) -> Result<ApiResponse<R>, ApiError>
    where
        R: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let path = self.path_for(subpath.trim_start_matches('/'));
        let raw = self.write(HttpMethod::Post, &path, Some(encode(body)?)).await?;
        ApiResponse::from_raw(raw)
    }
}

impl<T, C, U> ResourceService<T, C, U>
where
    T: DeserializeOwned,
{
    pub async fn get_all(
        &self,
        params: Option<QueryParams>,
    ) -> Result<ApiResponse<Vec<T>>, ApiError> {
        ApiResponse::from_raw(self.read(&self.endpoint, params).await?)
    }

    pub async fn get_paginated(
        &self,
        params: Option<QueryParams>,
    ) -> Result<PaginatedResponse<T>, ApiError> {
        PaginatedResponse::from_raw(self.read(&self.endpoint, params).await?)
    }

    pub async fn get_by_id(&self, id: impl Into<ResourceId>) -> Result<ApiResponse<T>, ApiError> {
        let path = self.path_for(id.into());
        ApiResponse::from_raw(self.read(&path, None).await?)
    }

    /// Partial update (`PATCH`); any serializable subset of fields.
    pub async fn patch<P>(&self, id: impl Into<ResourceId>, changes: &P) -> Result<ApiResponse<T>, ApiError>
    where
        P: Serialize + ?Sized,
    {
        let path = self.path_for(id.into());
        let raw = self
            .write(HttpMethod::Patch, &path, Some(encode(changes)?))
            .await?;
        ApiResponse::from_raw(raw)
    }
}

impl<T, C, U> ResourceService<T, C, U>
where
    T: DeserializeOwned,
    C: Serialize,
{
    pub async fn create(&self, dto: &C) -> Result<ApiResponse<T>, ApiError> {
        let raw = self
            .write(HttpMethod::Post, &self.endpoint, Some(encode(dto)?))
            .await?;
        ApiResponse::from_raw(raw)
    }
}

impl<T, C, U> ResourceService<T, C, U>
where
    T: DeserializeOwned,
    U: Serialize,
{
    /// Full replacement (`PUT`).
    pub async fn update(&self, id: impl Into<ResourceId>, dto: &U) -> Result<ApiResponse<T>, ApiError> {
        let path = self.path_for(id.into());
        let raw = self.write(HttpMethod::Put, &path, Some(encode(dto)?)).await?;
        ApiResponse::from_raw(raw)
    }
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<Value, ApiError> {
    serde_json::to_value(body)
        .map_err(|error| ApiError::unknown(format!("failed to encode request body: {error}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::http_client::{HttpClient, HttpError, HttpRequest, HttpResponse};
    use serde::Deserialize;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Widget {
        id: i64,
        name: String,
    }

    #[derive(Debug)]
    struct RecordingHttpClient {
        response: Result<HttpResponse, HttpError>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl RecordingHttpClient {
        fn returning(response: Result<HttpResponse, HttpError>) -> Arc<Self> {
            Arc::new(Self {
                response,
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

    impl HttpClient for RecordingHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .push(request);
            let response = self.response.clone();
            Box::pin(async move { response })
        }
    }

    fn service(transport: Arc<RecordingHttpClient>) -> ResourceService<Widget> {
        let config = ClientConfig::default().with_base_url("https://api.example.test");
        ResourceService::new(Arc::new(ApiClient::new(transport, &config)), "widgets")
    }

    #[tokio::test]
    async fn get_by_id_builds_resource_path() {
        let transport = RecordingHttpClient::returning(Ok(HttpResponse::ok_json(
            r#"{"id":7,"name":"sprocket"}"#,
        )));
        let widgets = service(transport.clone());

        let response = widgets.get_by_id(7).await.expect("found");

        assert_eq!(response.data.name, "sprocket");
        assert_eq!(
            transport.recorded_requests()[0].url,
            "https://api.example.test/widgets/7"
        );
    }

    #[tokio::test]
    async fn update_uses_put_and_patch_uses_patch() {
        let transport = RecordingHttpClient::returning(Ok(HttpResponse::ok_json(
            r#"{"id":1,"name":"gear"}"#,
        )));
        let widgets = service(transport.clone());
        let widget = Widget {
            id: 1,
            name: String::from("gear"),
        };

        widgets.update(1, &widget).await.expect("updated");
        widgets
            .patch(1, &json!({ "name": "gear" }))
            .await
            .expect("patched");

        let requests = transport.recorded_requests();
        assert_eq!(requests[0].method, HttpMethod::Put);
        assert_eq!(requests[1].method, HttpMethod::Patch);
        assert_eq!(requests[1].body.as_deref(), Some(r#"{"name":"gear"}"#));
    }

    #[tokio::test]
    async fn bulk_delete_sends_ids_body() {
        let transport = RecordingHttpClient::returning(Ok(HttpResponse::new(204, "")));
        let widgets = service(transport.clone());

        let response = widgets
            .bulk_delete(&[ResourceId::Int(1), ResourceId::from("b-2")])
            .await
            .expect("deleted");

        assert_eq!(response.status, 204);
        let request = &transport.recorded_requests()[0];
        assert_eq!(request.method, HttpMethod::Delete);
        assert_eq!(request.url, "https://api.example.test/widgets");
        assert_eq!(request.body.as_deref(), Some(r#"{"ids":[1,"b-2"]}"#));
    }

    #[tokio::test]
    async fn writes_are_never_retried() {
        let transport =
            RecordingHttpClient::returning(Err(HttpError::Connect(String::from("offline"))));
        let widgets = service(transport.clone());
        let widget = Widget {
            id: 1,
            name: String::from("gear"),
        };

        let error = widgets.create(&widget).await.expect_err("offline");

        assert_eq!(error.status, 0);
        assert_eq!(transport.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn custom_get_appends_subpath() {
        let transport = RecordingHttpClient::returning(Ok(HttpResponse::ok_json("[]")));
        let widgets = service(transport.clone());

        let response: ApiResponse<Vec<Widget>> = widgets
            .custom_get("/popular", Some(QueryParams::new().with("limit", 5)))
            .await
            .expect("listed");

        assert!(response.data.is_empty());
        assert_eq!(
            transport.recorded_requests()[0].url,
            "https://api.example.test/widgets/popular?limit=5"
        );
    }
}
