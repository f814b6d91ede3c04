//! Error types for Graph API calls

use std::fmt;

use serde_json::{Value, json};

/// Type tag for errors raised by the transport rather than by the provider.
pub const TRANSPORT_ERROR_TYPE: &str = "TransportException";

/// Type tag used when the provider gave no usable type.
pub const DEFAULT_ERROR_TYPE: &str = "Exception";

const UNKNOWN_ERROR_MESSAGE: &str = "Unknown Error. Check result()";

/// Message fragments the provider uses for a dead or revoked access token.
const INVALID_TOKEN_MESSAGES: &[&str] = &[
    "Error validating access token",
    "Invalid OAuth access token",
];

/// Error types whose messages are checked for token invalidation.
const INVALIDATING_TYPES: &[&str] = &["OAuthException", "invalid_token", DEFAULT_ERROR_TYPE];

/// Failures to get a response body out of the HTTP client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("TLS trust failure: {0}")]
    Tls(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

/// An error reported by the provider's API, or a wrapped transport failure.
///
/// Three error payload shapes are understood:
/// - `{"error": "invalid_token", "error_description": "..."}`
/// - `{"error": {"message": "...", "type": "OAuthException", "code": 190}}`
/// - `{"error_code": 102, "error_msg": "..."}`
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    code: i64,
    message: String,
    error_type: String,
    result: Value,
}

impl ApiError {
    /// Build an error from a decoded error payload.
    pub fn from_result(result: Value) -> Self {
        let code = result
            .get("error_code")
            .and_then(numeric)
            .or_else(|| result.pointer("/error/code").and_then(numeric))
            .unwrap_or(0);

        let message = [
            result.get("error_description"),
            result.pointer("/error/message"),
            result.get("error_msg"),
        ]
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .find(|m| !m.is_empty())
        .unwrap_or(UNKNOWN_ERROR_MESSAGE)
        .to_string();

        let error_type = match result.get("error") {
            Some(Value::String(kind)) => kind.clone(),
            Some(Value::Object(error)) => error
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_ERROR_TYPE)
                .to_string(),
            _ => DEFAULT_ERROR_TYPE.to_string(),
        };

        Self {
            code,
            message,
            error_type,
            result,
        }
    }

    pub fn code(&self) -> i64 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn error_type(&self) -> &str {
        &self.error_type
    }

    /// The raw payload the error was built from.
    pub fn result(&self) -> &Value {
        &self.result
    }

    pub fn is_transport(&self) -> bool {
        self.error_type == TRANSPORT_ERROR_TYPE
    }

    /// Whether this error means the access token in use is dead.
    ///
    /// Callers holding cached session state must drop it when this is true,
    /// otherwise every following request retries the same token.
    pub fn invalidates_token(&self) -> bool {
        INVALIDATING_TYPES.contains(&self.error_type.as_str())
            && INVALID_TOKEN_MESSAGES
                .iter()
                .any(|fragment| self.message.contains(fragment))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.error_type)?;
        if self.code != 0 {
            write!(f, "{}: ", self.code)?;
        }
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        Self::from_result(json!({
            "error": {
                "message": err.to_string(),
                "type": TRANSPORT_ERROR_TYPE,
            }
        }))
    }
}

fn numeric(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
