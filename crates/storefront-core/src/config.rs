//! Process-wide client configuration.
//!
//! Configuration is resolved once at startup and handed to the components
//! that need it; nothing re-reads the environment afterwards.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `STOREFRONT_ENV` | build profile | `development` or `production` |
//! | `STOREFRONT_BASE_URL` | per environment | REST backend base address |
//! | `STOREFRONT_TIMEOUT_MS` | `10000` | Request timeout ceiling |
//! | `STOREFRONT_MAX_RETRIES` | `3` | Retries for idempotent reads |
//! | `STOREFRONT_STALE_TIME_SECS` | `300` | Cache freshness window |
//! | `STOREFRONT_GC_TIME_SECS` | `600` | Cache retention window |

use std::time::Duration;

use crate::error::ConfigError;

const DEVELOPMENT_BASE_URL: &str = "http://localhost:8081/b2b-config";
const PRODUCTION_BASE_URL: &str = "https://b2b-test.shanshu.work/b2b-config";

/// Runtime environment, used only to pick the default base address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Requests go through the local development proxy.
    Development,
    Production,
}

impl Environment {
    /// Resolves the environment from `STOREFRONT_ENV`, falling back to the
    /// build profile.
    pub fn detect() -> Self {
        std::env::var("STOREFRONT_ENV")
            .ok()
            .and_then(|value| Self::parse(&value).ok())
            .unwrap_or_else(Self::from_build_profile)
    }

    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(ConfigError::InvalidEnvironment {
                value: value.to_owned(),
            }),
        }
    }

    const fn from_build_profile() -> Self {
        if cfg!(debug_assertions) {
            Self::Development
        } else {
            Self::Production
        }
    }

    pub const fn default_base_url(self) -> &'static str {
        match self {
            Self::Development => DEVELOPMENT_BASE_URL,
            Self::Production => PRODUCTION_BASE_URL,
        }
    }
}

/// Settings for the HTTP client, retry executor and query cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    /// First backoff delay; doubles on every retry up to `retry_max_delay`.
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    /// How long a successful fetch stays fresh.
    pub stale_time: Duration,
    /// How long an unobserved cache entry is retained.
    pub gc_time: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::for_environment(Environment::Production)
    }
}

impl ClientConfig {
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            base_url: environment.default_base_url().to_owned(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(30),
            stale_time: Duration::from_secs(5 * 60),
            gc_time: Duration::from_secs(10 * 60),
            user_agent: String::from(concat!("storefront/", env!("CARGO_PKG_VERSION"))),
        }
    }

    /// Reads `STOREFRONT_*` overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an injectable variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("STOREFRONT_ENV") {
            Some(value) => Environment::parse(&value)?,
            None => Environment::from_build_profile(),
        };
        let mut config = Self::for_environment(environment);

        if let Some(base_url) = lookup("STOREFRONT_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(value) = lookup("STOREFRONT_TIMEOUT_MS") {
            config.timeout = Duration::from_millis(parse_number("STOREFRONT_TIMEOUT_MS", &value)?);
        }
        if let Some(value) = lookup("STOREFRONT_MAX_RETRIES") {
            let retries = parse_number("STOREFRONT_MAX_RETRIES", &value)?;
            config.max_retries = u32::try_from(retries).map_err(|_| ConfigError::InvalidNumber {
                var: "STOREFRONT_MAX_RETRIES",
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup("STOREFRONT_STALE_TIME_SECS") {
            config.stale_time =
                Duration::from_secs(parse_number("STOREFRONT_STALE_TIME_SECS", &value)?);
        }
        if let Some(value) = lookup("STOREFRONT_GC_TIME_SECS") {
            config.gc_time = Duration::from_secs(parse_number("STOREFRONT_GC_TIME_SECS", &value)?);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delays(mut self, base: Duration, max: Duration) -> Self {
        self.retry_base_delay = base;
        self.retry_max_delay = max;
        self
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

fn parse_number(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidNumber {
            var,
            value: value.to_owned(),
        })
}
