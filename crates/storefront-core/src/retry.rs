//! Bounded retry with exponential backoff for idempotent reads.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

use crate::config::ClientConfig;
use crate::error::ApiError;

/// Backoff strategy for retrying failed requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Uses a fixed delay between retries.
    Fixed {
        /// Delay between retries.
        delay: Duration,
    },
    /// Uses an exponential delay between retries.
    ///
    /// The delay is calculated as `base * (factor ^ attempt)`.
    Exponential {
        /// The initial backoff duration.
        base: Duration,
        /// The multiplicative factor for each subsequent retry.
        factor: f64,
        /// The maximum duration to wait between retries.
        max: Duration,
        /// Whether to apply random jitter (+/- 50%) to the delay.
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_secs(1),
            factor: 2.0,
            max: Duration::from_secs(30),
            jitter: false,
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt + 1` (`attempt` is 0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let seconds = base.as_secs_f64() * factor.powi(exponent);
                let capped_seconds = seconds.min(max.as_secs_f64());

                let mut delay = Duration::from_secs_f64(capped_seconds);

                // +/- 50% of the capped delay
                if jitter {
                    let jitter_ms = (delay.as_millis() as f64 * 0.5) as u64;
                    let random_offset = fastrand::u64(0..=(jitter_ms * 2));
                    let total_ms =
                        delay.as_millis() as i64 + (random_offset as i64 - jitter_ms as i64);
                    delay = Duration::from_millis(total_ms.max(0) as u64);
                }

                delay
            }
        }
    }
}

/// Which failures are repeated, how often, and how long to wait in between.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
    /// Decides whether a failure is worth repeating.
    pub retryable: fn(&ApiError) -> bool,
    /// When set, a backoff wait that would end past this budget (measured
    /// from the first attempt) is cancelled and the last error surfaces.
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Backoff::default(),
            retryable: ApiError::is_transient,
            deadline: None,
        }
    }
}

impl RetryPolicy {
    /// Policy for idempotent reads, from the process configuration.
    pub fn reads(config: &ClientConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: Backoff::Exponential {
                base: config.retry_base_delay,
                factor: 2.0,
                max: config.retry_max_delay,
                jitter: false,
            },
            ..Self::default()
        }
    }

    pub fn exponential(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed { delay },
            ..Self::default()
        }
    }

    /// Single attempt; used for writes.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_retryable(mut self, retryable: fn(&ApiError) -> bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn should_retry(&self, error: &ApiError, attempt: u32) -> bool {
        attempt < self.max_retries && (self.retryable)(error)
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}

/// Progress of one logical request. Lives only inside [`execute`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Retries performed so far.
    pub attempt: u32,
    pub next_delay: Option<Duration>,
}

/// Runs `thunk` until it succeeds, fails terminally, or retries run out.
///
/// Every failure is normalized into an [`ApiError`] before the policy sees it.
pub async fn execute<T, E, F, Fut>(mut thunk: F, policy: &RetryPolicy) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<ApiError>,
{
    let started = Instant::now();
    let mut state = RetryState::default();

    loop {
        let error = match thunk().await {
            Ok(value) => return Ok(value),
            Err(error) => error.into(),
        };

        if !policy.should_retry(&error, state.attempt) {
            return Err(error);
        }

        let delay = policy.delay_for_attempt(state.attempt);
        if let Some(deadline) = policy.deadline {
            if started.elapsed() + delay > deadline {
                warn!(
                    attempt = state.attempt,
                    status = error.status,
                    "retry wait would pass the deadline, giving up"
                );
                return Err(error);
            }
        }

        state.attempt += 1;
        state.next_delay = Some(delay);
        warn!(
            attempt = state.attempt,
            max_retries = policy.max_retries,
            delay_ms = delay.as_millis() as u64,
            status = error.status,
            kind = %error.kind(),
            "retrying after transient failure"
        );
        tokio::time::sleep(delay).await;
    }
}
