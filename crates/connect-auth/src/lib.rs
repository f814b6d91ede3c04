//! Provider login primitives
//!
//! Verifies signed requests, exchanges authorization codes, guards the login
//! redirect with a CSRF state, and persists the four session fields the
//! identity resolver relies on. This crate holds no per-request state of its
//! own; `connect-session` composes these pieces into the resolver.
//!
//! Login flow:
//! 1. `CsrfGuard::ensure()` lays down a state token in the session store
//! 2. User is redirected to `login_url()` and authorizes the app
//! 3. The provider redirects back with `code` and `state`
//! 4. `CsrfGuard::consume()` checks the state round-tripped exactly
//! 5. `exchange_code()` trades the code for an access token
//! 6. Code and token are saved via `SessionData::update()`

pub mod app;
pub mod constants;
pub mod csrf;
pub mod error;
pub mod persistence;
pub mod signed_request;
pub mod token;
pub mod urls;

pub use app::{AppCredentials, Endpoints};
pub use constants::*;
pub use csrf::{CsrfGuard, generate_state};
pub use error::{Error, Result};
pub use persistence::{FileStore, MemoryStore, PersistedFields, SessionData, SessionStore};
pub use signed_request::{SignedRequest, VerificationError};
pub use token::exchange_code;
pub use urls::{LoginOptions, current_url, login_url, strip_query_params};
