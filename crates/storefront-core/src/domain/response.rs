//! Response envelopes and the normalization of loosely-typed JSON bodies.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api_client::RawResponse;
use crate::error::ApiError;

/// Payload plus the status metadata the backend attached to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T, status: u16) -> Self {
        Self {
            data,
            status,
            message: None,
            code: None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            data: f(self.data),
            status: self.status,
            message: self.message,
            code: self.code,
        }
    }
}

impl<T: DeserializeOwned> ApiResponse<T> {
    /// Reads a raw body into a typed response.
    ///
    /// A JSON object carrying a `data` field is an envelope: its `status`,
    /// `message` and `code` win over the HTTP status. Any other body is the
    /// payload itself.
    pub fn from_raw(raw: RawResponse) -> Result<Self, ApiError> {
        let RawResponse { status, body } = raw;
        match body {
            Value::Object(mut envelope) if envelope.contains_key("data") => {
                let data = envelope.remove("data").unwrap_or(Value::Null);
                Ok(Self {
                    data: decode(data)?,
                    status: envelope_status(&envelope).unwrap_or(status),
                    message: envelope
                        .get("message")
                        .and_then(Value::as_str)
                        .map(str::to_owned),
                    code: envelope.get("code").and_then(code_text),
                })
            }
            payload => Ok(Self::new(decode(payload)?, status)),
        }
    }
}

/// Paging metadata returned next to a page of entities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageMeta {
    pub current_page: u64,
    pub last_page: u64,
    pub per_page: u64,
    pub total: u64,
}

impl PageMeta {
    pub const fn has_next_page(&self) -> bool {
        self.current_page < self.last_page
    }
}

/// One page of entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub meta: PageMeta,
}

impl<T: DeserializeOwned> PaginatedResponse<T> {
    /// Accepts both a bare `{data, meta}` page and one wrapped in an envelope.
    pub fn from_raw(raw: RawResponse) -> Result<Self, ApiError> {
        match raw.body {
            Value::Object(mut body) if !body.contains_key("meta") && body.contains_key("data") => {
                decode(body.remove("data").unwrap_or(Value::Null))
            }
            body => decode(body),
        }
    }
}

/// Unwraps a fetch result into the value a binding caches.
pub trait QueryOutput {
    type Data;

    fn into_data(self) -> Self::Data;
}

impl<T> QueryOutput for ApiResponse<T> {
    type Data = T;

    fn into_data(self) -> T {
        self.data
    }
}

impl<T> QueryOutput for PaginatedResponse<T> {
    type Data = Self;

    fn into_data(self) -> Self {
        self
    }
}

pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|error| ApiError::decode(error.to_string()))
}

fn envelope_status(envelope: &Map<String, Value>) -> Option<u16> {
    envelope
        .get("status")
        .and_then(Value::as_u64)
        .and_then(|status| u16::try_from(status).ok())
}

fn code_text(value: &Value) -> Option<String> {
    match value {
        Value::String(code) => Some(code.clone()),
        Value::Number(code) => Some(code.to_string()),
        _ => None,
    }
}
