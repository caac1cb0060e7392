//! Configured request/response entry point over an [`HttpClient`] transport.
//!
//! [`ApiClient`] resolves the base address once at construction, attaches the
//! JSON headers, enforces the timeout ceiling and runs the before-send
//! interceptors. The after-receive step turns the transport response into a
//! [`RawResponse`] or an [`HttpError::Status`]. It never retries and never
//! caches.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::domain::QueryParams;
use crate::http_client::{
    HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient,
};

const JSON: &str = "application/json";

/// Successful response with its JSON body already parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    /// `Value::Null` when the server sent an empty body.
    pub body: Value,
}

/// Hook run on every outgoing request after the standard headers are set.
pub trait RequestInterceptor: Send + Sync {
    fn before_send(&self, request: HttpRequest) -> HttpRequest;
}

/// Supplies the current access token, if any.
pub trait TokenSource: Send + Sync {
    fn token(&self) -> Option<String>;
}

impl<F> TokenSource for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn token(&self) -> Option<String> {
        self()
    }
}

/// Attaches `Authorization: Bearer <token>` when the source has a token.
///
/// Token renewal is the source's concern; a missing token sends the request
/// unauthenticated.
pub struct AuthInterceptor<S> {
    source: S,
}

impl<S: TokenSource> AuthInterceptor<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: TokenSource> RequestInterceptor for AuthInterceptor<S> {
    fn before_send(&self, request: HttpRequest) -> HttpRequest {
        match self.source.token() {
            Some(token) => request.with_auth(&HttpAuth::BearerToken(token)),
            None => request,
        }
    }
}

/// Per-call query parameters and JSON body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub params: Option<QueryParams>,
    pub data: Option<Value>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn params(mut self, params: QueryParams) -> Self {
        self.params = Some(params);
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// The single configured HTTP entry point. Share one instance per process.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn HttpClient>,
    base_url: String,
    timeout: Duration,
    interceptors: Vec<Arc<dyn RequestInterceptor>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("interceptors", &self.interceptors.len())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(transport: Arc<dyn HttpClient>, config: &ClientConfig) -> Self {
        Self {
            transport,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            timeout: config.timeout,
            interceptors: Vec::new(),
        }
    }

    /// Client backed by reqwest, using the configured user agent.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(Arc::new(ReqwestHttpClient::new(&config.user_agent)), config)
    }

    pub fn with_interceptor(mut self, interceptor: impl RequestInterceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Joins the base address, `path` and the encoded params.
    pub fn url_for(&self, path: &str, params: Option<&QueryParams>) -> String {
        let mut url = self.base_url.clone();
        if !path.is_empty() {
            if !path.starts_with('/') {
                url.push('/');
            }
            url.push_str(path);
        }
        if let Some(params) = params.filter(|params| !params.is_empty()) {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&params.to_query_string());
        }
        url
    }

    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        options: RequestOptions,
    ) -> Result<RawResponse, HttpError> {
        let url = self.url_for(path, options.params.as_ref());
        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);

        let mut request = HttpRequest::new(method, url)
            .with_header("Content-Type", JSON)
            .with_header("Accept", JSON)
            .with_timeout_ms(timeout_ms);
        if let Some(data) = options.data {
            request = request.with_body(data.to_string());
        }
        for interceptor in &self.interceptors {
            request = interceptor.before_send(request);
        }

        debug!(method = method.as_str(), url = %request.url, "dispatching request");

        let response = tokio::time::timeout(self.timeout, self.transport.execute(request))
            .await
            .map_err(|_| HttpError::Timeout)??;

        debug!(status = response.status, "received response");
        after_receive(response)
    }

    pub async fn get(
        &self,
        path: &str,
        params: Option<QueryParams>,
    ) -> Result<RawResponse, HttpError> {
        let options = RequestOptions {
            params,
            data: None,
        };
        self.request(HttpMethod::Get, path, options).await
    }
}

fn after_receive(response: HttpResponse) -> Result<RawResponse, HttpError> {
    let parsed = if response.body.trim().is_empty() {
        Ok(Value::Null)
    } else {
        serde_json::from_str::<Value>(&response.body)
    };

    if !response.is_success() {
        return Err(HttpError::Status {
            status: response.status,
            body: parsed.ok().filter(|body| !body.is_null()),
        });
    }

    let body = parsed.map_err(|error| HttpError::Decode(error.to_string()))?;
    Ok(RawResponse {
        status: response.status,
        body,
    })
}
