//! Normalized API errors.
//!
//! Every failure that leaves a resource service is an [`ApiError`]. Raw
//! transport failures ([`HttpError`]) are classified exactly once, by
//! [`normalize`], in this order:
//!
//! | Raw failure | `status` | `message` |
//! |-------------|----------|-----------|
//! | transport timeout | 408 | `request timed out` |
//! | no response (connect failure) | 0 | `network unreachable` |
//! | non-2xx response | response status | body `message` or `server error` |
//! | anything else carrying a message | 500 | that message |
//! | anything else | 500 | `unknown error` |

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::http_client::HttpError;

pub const TIMEOUT_MESSAGE: &str = "request timed out";
pub const NETWORK_UNREACHABLE_MESSAGE: &str = "network unreachable";
pub const SERVER_ERROR_MESSAGE: &str = "server error";
pub const UNKNOWN_ERROR_MESSAGE: &str = "unknown error";

/// Closed classification of [`ApiError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    /// The transport gave up waiting (status 408).
    Timeout,
    /// No response was received (status 0).
    NetworkUnreachable,
    /// The server answered with a 4xx status.
    ClientError,
    /// The server answered with a 5xx status.
    ServerError,
    /// Anything the classifier could not place (status 500).
    Unknown,
}

impl ApiErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::NetworkUnreachable => "network_unreachable",
            Self::ClientError => "client_error",
            Self::ServerError => "server_error",
            Self::Unknown => "unknown",
        }
    }

    /// Transient failures are the only ones worth repeating.
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::Timeout | Self::NetworkUnreachable)
    }
}

impl Display for ApiErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable, transport-free error value surfaced to every caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub status: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
    pub kind: ApiErrorKind,
}

impl ApiError {
    pub fn timeout() -> Self {
        Self::bare(408, TIMEOUT_MESSAGE, ApiErrorKind::Timeout)
    }

    pub fn network_unreachable() -> Self {
        Self::bare(0, NETWORK_UNREACHABLE_MESSAGE, ApiErrorKind::NetworkUnreachable)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            return Self::bare(500, UNKNOWN_ERROR_MESSAGE, ApiErrorKind::Unknown);
        }
        Self::bare(500, message, ApiErrorKind::Unknown)
    }

    /// Payload arrived but did not match the expected entity shape.
    pub fn decode(message: impl Into<String>) -> Self {
        Self {
            code: Some(String::from("decode_error")),
            ..Self::bare(
                500,
                format!("response did not match the expected shape: {}", message.into()),
                ApiErrorKind::Unknown,
            )
        }
    }

    /// Builds the error for a non-2xx response, pulling `message`, `code` and
    /// `details` out of the JSON body when the server supplied them.
    pub fn from_response(status: u16, body: Option<&Value>) -> Self {
        let kind = match status {
            400..=499 => ApiErrorKind::ClientError,
            500..=599 => ApiErrorKind::ServerError,
            _ => ApiErrorKind::Unknown,
        };
        let object = body.and_then(Value::as_object);

        let message = object
            .and_then(|map| map.get("message"))
            .and_then(Value::as_str)
            .filter(|message| !message.trim().is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| String::from(SERVER_ERROR_MESSAGE));
        let code = object.and_then(|map| map.get("code")).and_then(code_text);
        let details = object
            .and_then(|map| map.get("details"))
            .and_then(Value::as_object)
            .cloned();

        Self {
            status,
            message,
            code,
            details,
            kind,
        }
    }

    fn bare(status: u16, message: impl Into<String>, kind: ApiErrorKind) -> Self {
        Self {
            status,
            message: message.into(),
            code: None,
            details: None,
            kind,
        }
    }

    pub const fn kind(&self) -> ApiErrorKind {
        self.kind
    }

    pub const fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }

    /// Human-readable phrase for display, see [`friendly_message`].
    pub fn friendly_message(&self) -> &str {
        friendly_message(self)
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (status {}", self.message, self.status)?;
        if let Some(code) = &self.code {
            write!(f, ", code {code}")?;
        }
        f.write_str(")")
    }
}

impl std::error::Error for ApiError {}

impl From<HttpError> for ApiError {
    fn from(raw: HttpError) -> Self {
        normalize(&raw)
    }
}

impl From<&HttpError> for ApiError {
    fn from(raw: &HttpError) -> Self {
        normalize(raw)
    }
}

/// Classifies a raw transport failure. Total: every input maps to an error.
pub fn normalize(raw: &HttpError) -> ApiError {
    match raw {
        HttpError::Timeout => ApiError::timeout(),
        HttpError::Connect(_) => ApiError::network_unreachable(),
        HttpError::Status { status, body } => ApiError::from_response(*status, body.as_ref()),
        HttpError::Decode(message) | HttpError::Other(message) => ApiError::unknown(message.as_str()),
    }
}

/// `true` for 4xx statuses.
pub const fn is_client_error(status: u16) -> bool {
    status >= 400 && status < 500
}

/// Fixed phrase for well-known statuses.
pub const fn status_message(status: u16) -> Option<&'static str> {
    match status {
        400 => Some("the request parameters are invalid"),
        401 => Some("not authorized, please sign in again"),
        403 => Some("you do not have permission to access this resource"),
        404 => Some("the requested resource does not exist"),
        408 => Some("the request timed out, please try again later"),
        409 => Some("the resource is in conflict, please try again later"),
        422 => Some("the submitted data is invalid"),
        429 => Some("too many requests, please try again later"),
        500 => Some("server error, please try again later"),
        502 => Some("bad gateway, please try again later"),
        503 => Some("the service is temporarily unavailable, please try again later"),
        504 => Some("gateway timeout, please try again later"),
        _ => None,
    }
}

/// Status phrase when the table knows the status, otherwise the error's own message.
pub fn friendly_message(error: &ApiError) -> &str {
    status_message(error.status).unwrap_or(error.message.as_str())
}

fn code_text(value: &Value) -> Option<String> {
    match value {
        Value::String(code) => Some(code.clone()),
        Value::Number(code) => Some(code.to_string()),
        _ => None,
    }
}

/// Invalid process configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("invalid environment '{value}', expected development or production")]
    InvalidEnvironment { value: String },

    #[error("base url cannot be empty")]
    EmptyBaseUrl,

    #[error("timeout must be greater than zero")]
    ZeroTimeout,
}
