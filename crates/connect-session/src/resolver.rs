//! Resolver construction and session-level operations
//!
//! `ConnectApp` is the long-lived configuration (app credentials, endpoints,
//! store, transport) shared by all requests. `Resolver` is the short-lived,
//! per-request state machine built from it. Token resolution, identity
//! resolution and API calls are implemented in sibling modules as further
//! `impl Resolver` blocks.

use std::sync::Arc;

use connect_auth::{
    AppCredentials, CsrfGuard, Endpoints, LoginOptions, SIGNED_REQUEST_PARAM, SessionData,
    SessionStore, SignedRequest, login_url,
};
use graph_api::Transport;
use serde_json::Value;
use tracing::{debug, info};

use crate::context::RequestContext;
use crate::error::Result;

/// One configured application.
///
/// Cheap to clone; hand a clone to every request handler.
#[derive(Clone)]
pub struct ConnectApp {
    credentials: AppCredentials,
    endpoints: Endpoints,
    store: Arc<dyn SessionStore>,
    transport: Arc<dyn Transport>,
}

impl ConnectApp {
    pub fn new(
        credentials: AppCredentials,
        endpoints: Endpoints,
        store: Arc<dyn SessionStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            credentials,
            endpoints,
            store,
            transport,
        }
    }

    pub fn credentials(&self) -> &AppCredentials {
        &self.credentials
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Build the resolver for one request.
    pub async fn resolver(&self, request: RequestContext) -> Result<Resolver> {
        Resolver::load(self, request).await
    }
}

/// Identity state of a single request.
///
/// Nothing is resolved until asked for. The access token and user id are
/// each resolved at most once; later calls return the cached value until an
/// API error or `logout()` invalidates it.
pub struct Resolver {
    pub(crate) app: AppCredentials,
    pub(crate) endpoints: Endpoints,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) session: SessionData,
    pub(crate) request: RequestContext,
    pub(crate) csrf: CsrfGuard,
    pub(crate) signed_request: Option<SignedRequest>,
    /// `None` until resolved, or after invalidation
    pub(crate) access_token: Option<String>,
    /// `None` until resolved; `Some(0)` means no user
    pub(crate) user: Option<u64>,
    /// `/me` as fetched while resolving the user
    pub(crate) profile: Option<Value>,
}

impl Resolver {
    async fn load(app: &ConnectApp, request: RequestContext) -> Result<Self> {
        let namespace = app.credentials.storage_namespace(request.session());
        let session = SessionData::new(app.store.clone(), namespace);
        let csrf = CsrfGuard::load(&session).await?;
        let signed_request = read_signed_request(&app.credentials, &request);

        Ok(Self {
            app: app.credentials.clone(),
            endpoints: app.endpoints.clone(),
            transport: app.transport.clone(),
            session,
            request,
            csrf,
            signed_request,
            access_token: None,
            user: None,
            profile: None,
        })
    }

    /// The verified signed request of this request, if there is one.
    pub fn signed_request(&self) -> Option<&SignedRequest> {
        self.signed_request.as_ref()
    }

    pub fn request(&self) -> &RequestContext {
        &self.request
    }

    /// Login dialog URL, laying down a CSRF state first if none exists.
    pub async fn login_url(&mut self, options: &LoginOptions) -> Result<String> {
        let state = self.csrf.ensure(&self.session).await?;
        Ok(login_url(
            &self.endpoints.www,
            &self.app.app_id,
            &state,
            options,
        ))
    }

    /// Forget everything about the current user.
    pub async fn logout(&mut self) -> Result<()> {
        self.session.clear_all().await?;
        self.csrf = CsrfGuard::default();
        self.access_token = None;
        self.user = Some(0);
        self.profile = None;
        crate::metrics::record_invalidation("logout");
        info!(namespace = self.session.namespace(), "session logged out");
        Ok(())
    }

    /// Drop cached and persisted state after `reason` showed it to be stale.
    pub(crate) async fn clear_session(&mut self, reason: &'static str) -> Result<()> {
        debug!(reason, namespace = self.session.namespace(), "invalidating session");
        crate::metrics::record_invalidation(reason);
        self.csrf = CsrfGuard::default();
        self.session.clear_all().await?;
        Ok(())
    }
}

/// The signed request comes from the request parameter when present, else
/// from the SDK cookie. A signature that does not verify counts as absent.
fn read_signed_request(app: &AppCredentials, request: &RequestContext) -> Option<SignedRequest> {
    let cookie = app.signed_request_cookie();
    let (token, source) = match request.param(SIGNED_REQUEST_PARAM) {
        Some(token) => (token, "param"),
        None => (request.cookie(&cookie)?, "cookie"),
    };

    match SignedRequest::verify(token, app.secret.expose()) {
        Ok(signed) => {
            debug!(source, "signed request verified");
            Some(signed)
        }
        Err(e) => {
            debug!(source, error = %e, "ignoring signed request");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{APP_ID, fixture, signed};
    use serde_json::json;

    #[tokio::test]
    async fn signed_request_from_param() {
        let (app, _, _) = fixture();
        let resolver = app
            .resolver(RequestContext::new().with_param(
                "signed_request",
                signed(json!({"algorithm": "HMAC-SHA256", "user_id": "5"})),
            ))
            .await
            .unwrap();
        assert_eq!(resolver.signed_request().unwrap().user_id(), Some(5));
    }

    #[tokio::test]
    async fn signed_request_from_cookie() {
        let (app, _, _) = fixture();
        let resolver = app
            .resolver(RequestContext::new().with_cookie(
                format!("fbsr_{APP_ID}"),
                signed(json!({"algorithm": "HMAC-SHA256", "user_id": "6"})),
            ))
            .await
            .unwrap();
        assert_eq!(resolver.signed_request().unwrap().user_id(), Some(6));
    }

    #[tokio::test]
    async fn param_shadows_cookie_even_when_invalid() {
        let (app, _, _) = fixture();
        let resolver = app
            .resolver(
                RequestContext::new()
                    .with_param("signed_request", "garbage")
                    .with_cookie(
                        format!("fbsr_{APP_ID}"),
                        signed(json!({"algorithm": "HMAC-SHA256", "user_id": "6"})),
                    ),
            )
            .await
            .unwrap();
        assert!(resolver.signed_request().is_none());
    }

    #[tokio::test]
    async fn forged_signed_request_is_absent() {
        let (app, _, _) = fixture();
        let forged = SignedRequest::sign(
            &json!({"algorithm": "HMAC-SHA256", "user_id": "1"}),
            "not-the-secret",
        );
        let resolver = app
            .resolver(RequestContext::new().with_param("signed_request", forged))
            .await
            .unwrap();
        assert!(resolver.signed_request().is_none());
    }

    #[tokio::test]
    async fn login_url_lays_down_state() {
        let (app, store, _) = fixture();
        let mut resolver = app.resolver(RequestContext::new()).await.unwrap();

        let url = resolver
            .login_url(&LoginOptions {
                redirect_uri: Some("https://x.test/me".into()),
                ..LoginOptions::default()
            })
            .await
            .unwrap();

        let state = store.load("fb_1").await.unwrap().state.unwrap();
        assert!(url.starts_with("https://www.facebook.com/dialog/oauth?client_id=1&state="));
        assert!(url.contains(&format!("state={state}")));

        // Same state on the next login URL
        let again = resolver.login_url(&LoginOptions::default()).await.unwrap();
        assert!(again.contains(&format!("state={state}")));
    }

    #[tokio::test]
    async fn sessions_are_namespaced() {
        let (app, store, _) = fixture();
        let mut a = app
            .resolver(RequestContext::new().with_session("a"))
            .await
            .unwrap();
        a.login_url(&LoginOptions::default()).await.unwrap();

        assert!(store.load("a:fb_1").await.unwrap().state.is_some());
        assert!(store.load("fb_1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn logout_clears_everything() {
        let (app, store, _) = fixture();
        store
            .save(
                "fb_1",
                connect_auth::PersistedFields {
                    state: Some("s".into()),
                    code: Some("c".into()),
                    access_token: Some("t".into()),
                    user_id: Some(42),
                },
            )
            .await
            .unwrap();

        let mut resolver = app.resolver(RequestContext::new()).await.unwrap();
        resolver.logout().await.unwrap();

        assert!(store.is_empty().await);
        assert_eq!(resolver.user_id().await.unwrap(), 0);
        assert_eq!(resolver.access_token().await.unwrap(), "1|s");
    }
}
