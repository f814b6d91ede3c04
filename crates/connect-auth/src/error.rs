//! Error types for login primitives

/// Errors from code exchange and session persistence.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("session store error: {0}")]
    Store(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
