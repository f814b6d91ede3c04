//! Wire layer for the provider's Graph API
//!
//! Defines the `Transport` trait that decouples the identity resolver from the
//! HTTP client. `HttpTransport` is the reqwest-backed implementation; tests
//! substitute a recording fake. Everything the provider returns is handed back
//! as raw text so callers can decide how to decode it: the token endpoint
//! answers URL-encoded, the API answers JSON.
//!
//! Request flow for an API call:
//! 1. Caller builds params and runs them through `encode_params()`
//! 2. `build_url()` joins the domain base and the path
//! 3. `Transport::post_form()` sends a form POST and returns the body text
//! 4. `decode_response()` parses JSON and turns error payloads into `ApiError`

pub mod error;
pub mod http;
pub mod request;

pub use error::{ApiError, TransportError};
pub use http::{HttpTransport, TransportConfig};
pub use request::{Method, Params, build_url, decode_response, encode_params};

use std::future::Future;
use std::pin::Pin;

/// Form fields as sent on the wire. Every value is already a string.
pub type FormFields = Vec<(String, String)>;

/// Result alias for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// HTTP capability used for both the token endpoint and the API.
///
/// Implementations POST `fields` form-encoded to `url` and return the
/// response body regardless of HTTP status: the provider reports failures in
/// the body, and decoding is the caller's job. Only failures to obtain a body
/// at all (connect, TLS, timeout) are errors.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn Transport>`).
pub trait Transport: Send + Sync {
    fn post_form<'a>(
        &'a self,
        url: &'a str,
        fields: &'a [(String, String)],
    ) -> Pin<Box<dyn Future<Output = TransportResult<String>> + Send + 'a>>;
}
