//! Error types for resolver operations

use graph_api::ApiError;

/// Errors surfaced by the resolver.
///
/// Resolution itself never fails on provider trouble (a bad code or a bad
/// signature just means "no session"). What remains is API calls the caller
/// asked for, and a session store that cannot be read or written.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] connect_auth::Error),
}

impl Error {
    /// The provider error, if this is one.
    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            Error::Api(err) => Some(err),
            Error::Store(_) => None,
        }
    }
}

/// Result alias for resolver operations.
pub type Result<T> = std::result::Result<T, Error>;
