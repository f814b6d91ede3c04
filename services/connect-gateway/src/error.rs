//! Service-specific error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failures of a gateway route.
///
/// Resolution itself degrades to "anonymous" rather than failing, so only
/// provider API errors and store trouble reach here.
#[derive(Error, Debug)]
pub enum Error {
    #[error("provider API call failed: {0}")]
    Api(#[from] graph_api::ApiError),

    #[error("session store unavailable: {0}")]
    Store(#[from] connect_auth::Error),
}

impl From<connect_session::Error> for Error {
    fn from(err: connect_session::Error) -> Self {
        match err {
            connect_session::Error::Api(e) => Error::Api(e),
            connect_session::Error::Store(e) => Error::Store(e),
        }
    }
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Api(_) => StatusCode::BAD_GATEWAY,
            Error::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Error::Api(e) => serde_json::json!({
                "error": {
                    "type": e.error_type(),
                    "code": e.code(),
                    "message": e.message(),
                }
            }),
            Error::Store(_) => serde_json::json!({
                "error": {
                    "type": "store_error",
                    "message": self.to_string(),
                }
            }),
        };
        (status, axum::Json(body)).into_response()
    }
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;
