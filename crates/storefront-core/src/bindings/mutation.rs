use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use crate::bindings::QueryClient;
use crate::cache::QueryKey;
use crate::domain::QueryOutput;
use crate::error::{friendly_message, ApiError};

pub const DEFAULT_SUCCESS_MESSAGE: &str = "operation succeeded";

/// Surfaces user-facing messages. The UI layer supplies its own; the
/// default logs them.
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);

    fn error(&self, error: &ApiError);
}

/// Writes notifications to the `tracing` stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn success(&self, message: &str) {
        info!(message, "success");
    }

    fn error(&self, error: &ApiError) {
        warn!(status = error.status, code = ?error.code, "{}", friendly_message(error));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOptions {
    /// Key families invalidated after a successful write.
    pub invalidate: Vec<QueryKey>,
    pub success_message: String,
    pub notify_success: bool,
    pub notify_errors: bool,
}

impl Default for MutationOptions {
    fn default() -> Self {
        Self {
            invalidate: Vec::new(),
            success_message: String::from(DEFAULT_SUCCESS_MESSAGE),
            notify_success: true,
            notify_errors: true,
        }
    }
}

impl MutationOptions {
    pub fn invalidates(mut self, keys: impl IntoIterator<Item = QueryKey>) -> Self {
        self.invalidate.extend(keys);
        self
    }

    pub fn with_success_message(mut self, message: impl Into<String>) -> Self {
        self.success_message = message.into();
        self
    }

    /// No success or error notifications.
    pub fn silent(mut self) -> Self {
        self.notify_success = false;
        self.notify_errors = false;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    Idle,
    Pending,
    Success,
    Error,
}

#[derive(Debug)]
struct MutationState {
    status: MutationStatus,
    error: Option<ApiError>,
}

type Run<I, O> =
    Arc<dyn Fn(I) -> Pin<Box<dyn Future<Output = Result<O, ApiError>> + Send>> + Send + Sync>;

/// A write bound to the keys it makes stale.
///
/// On success the configured key families are invalidated and the success
/// message is shown. On failure the error is shown and nothing is
/// invalidated, so the last good cached state stays visible.
pub struct Mutation<I, O> {
    client: QueryClient,
    run: Run<I, O>,
    options: MutationOptions,
    state: Arc<Mutex<MutationState>>,
}

impl<I, O> Clone for Mutation<I, O> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            run: Arc::clone(&self.run),
            options: self.options.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<I, O> std::fmt::Debug for Mutation<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mutation")
            .field("options", &self.options)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl<I, O> Mutation<I, O> {
    pub(crate) fn new<R, F, Fut>(client: QueryClient, run: F, options: MutationOptions) -> Self
    where
        I: 'static,
        O: 'static,
        R: QueryOutput<Data = O>,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ApiError>> + Send + 'static,
    {
        let run: Run<I, O> = Arc::new(
            move |input: I| -> Pin<Box<dyn Future<Output = Result<O, ApiError>> + Send>> {
                let pending = run(input);
                Box::pin(async move { pending.await.map(QueryOutput::into_data) })
            },
        );
        Self {
            client,
            run,
            options,
            state: Arc::new(Mutex::new(MutationState {
                status: MutationStatus::Idle,
                error: None,
            })),
        }
    }

    pub fn options(&self) -> &MutationOptions {
        &self.options
    }

    pub fn status(&self) -> MutationStatus {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .status
    }

    pub fn is_pending(&self) -> bool {
        self.status() == MutationStatus::Pending
    }

    /// Error of the last failed call, cleared by the next call.
    pub fn error(&self) -> Option<ApiError> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .error
            .clone()
    }

    pub fn reset(&self) {
        self.set_state(MutationStatus::Idle, None);
    }

    pub async fn mutate(&self, input: I) -> Result<O, ApiError> {
        self.set_state(MutationStatus::Pending, None);

        match (self.run)(input).await {
            Ok(output) => {
                if !self.options.invalidate.is_empty() {
                    self.client.invalidate(&self.options.invalidate);
                }
                if self.options.notify_success {
                    self.client.notifier().success(&self.options.success_message);
                }
                self.set_state(MutationStatus::Success, None);
                Ok(output)
            }
            Err(error) => {
                if self.options.notify_errors {
                    self.client.notifier().error(&error);
                }
                self.set_state(MutationStatus::Error, Some(error.clone()));
                Err(error)
            }
        }
    }

    fn set_state(&self, status: MutationStatus, error: Option<ApiError>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.status = status;
        state.error = error;
    }
}
