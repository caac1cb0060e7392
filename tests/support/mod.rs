//! Scripted transport shared by the behavior tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use storefront_core::{
    ApiClient, ClientConfig, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse,
};

pub const BASE_URL: &str = "https://shop.example.test/b2b-config";

/// Replays scripted outcomes in order; the last one repeats once the
/// script runs out. Every request is recorded.
#[derive(Debug)]
pub struct ScriptedHttpClient {
    script: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    last: Mutex<Option<Result<HttpResponse, HttpError>>>,
    requests: Mutex<Vec<HttpRequest>>,
    latency: Duration,
}

impl ScriptedHttpClient {
    pub fn new(script: impl IntoIterator<Item = Result<HttpResponse, HttpError>>) -> Arc<Self> {
        Self::with_latency(script, Duration::ZERO)
    }

    pub fn with_latency(
        script: impl IntoIterator<Item = Result<HttpResponse, HttpError>>,
        latency: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            latency,
        })
    }

    pub fn always(outcome: Result<HttpResponse, HttpError>) -> Arc<Self> {
        Self::new([outcome])
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .expect("request store should not be poisoned")
            .clone()
    }

    pub fn count(&self, method: HttpMethod) -> usize {
        self.requests()
            .iter()
            .filter(|request| request.method == method)
            .count()
    }

    fn next_outcome(&self) -> Result<HttpResponse, HttpError> {
        let mut script = self.script.lock().expect("script should not be poisoned");
        let mut last = self.last.lock().expect("script should not be poisoned");
        match script.pop_front() {
            Some(outcome) => {
                *last = Some(outcome.clone());
                outcome
            }
            None => last
                .clone()
                .unwrap_or_else(|| Err(HttpError::Other(String::from("empty script")))),
        }
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
        let outcome = self.next_outcome();
        let latency = self.latency;
        Box::pin(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            outcome
        })
    }
}

pub fn config() -> ClientConfig {
    ClientConfig::default().with_base_url(BASE_URL)
}

pub fn api(transport: Arc<ScriptedHttpClient>) -> Arc<ApiClient> {
    Arc::new(ApiClient::new(transport, &config()))
}

pub fn json(status: u16, body: &str) -> Result<HttpResponse, HttpError> {
    Ok(HttpResponse::new(status, body))
}

/// Local server that accepts each connection and hangs up before replying.
/// Returns its base URL and the accepted-connection counter.
pub async fn hang_up_server() -> (String, Arc<AtomicUsize>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("listener address");
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            drop(socket);
        }
    });
    (format!("http://{addr}"), accepted)
}
