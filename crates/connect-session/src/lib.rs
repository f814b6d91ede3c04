//! Per-request identity resolution
//!
//! Decides which access token and which user are in effect for one incoming
//! request, from three competing signals: a signed request from the provider,
//! an authorization code on the redirect back from the login dialog, and the
//! session fields persisted by earlier requests. Also makes authenticated API
//! calls and drops the session when the provider reports the token dead.
//!
//! Resolution precedence:
//! 1. A valid signed request decides alone: its token, its code, or an
//!    explicit "no session" that clears everything persisted
//! 2. Otherwise a new authorization code whose CSRF state round-trips is
//!    exchanged for a token
//! 3. Otherwise the persisted token stands
//!
//! The user id follows the token: trusted straight from a signed request,
//! fetched from `/me` when the token is new or changed, else taken from the
//! session. Each `Resolver` resolves once and caches for its lifetime.

pub mod context;
pub mod error;
pub mod metrics;
pub mod resolver;

mod api;
mod identity;
mod token;

#[cfg(test)]
mod testing;

pub use connect_auth::LoginOptions;
pub use context::RequestContext;
pub use error::{Error, Result};
pub use graph_api::{ApiError, Method, Params};
pub use resolver::{ConnectApp, Resolver};
