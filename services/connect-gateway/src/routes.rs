//! Login, logout and identity routes
//!
//! Each request gets its own `Resolver`, scoped to the browser session named
//! by the session cookie. A browser without one is issued a fresh uuid.

use std::collections::HashMap;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, Uri, header};
use axum::response::{IntoResponse, Redirect, Response};
use connect_session::{LoginOptions, RequestContext, Resolver};
use tracing::{debug, info, warn};

use crate::AppState;
use crate::error::{Error, Result};
use crate::metrics;

type QueryParams = Query<HashMap<String, String>>;

/// GET /login: redirect to the provider's login dialog.
///
/// Query: `redirect_uri`, `scope` (comma-separated), `display`.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Query(params): QueryParams,
) -> Response {
    let session = BrowserSession::from_headers(&headers, &state.session_cookie);
    let options = LoginOptions {
        redirect_uri: params.get("redirect_uri").cloned(),
        scope: params
            .get("scope")
            .map(|scope| {
                scope
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default(),
        display: params.get("display").cloned(),
    };

    let result = async {
        let mut resolver = resolver(&state, &headers, &uri, params, &session).await?;
        let url = resolver.login_url(&options).await?;
        debug!(session = %session.id, "redirecting to login dialog");
        Ok::<_, Error>(Redirect::to(&url).into_response())
    }
    .await;

    finish("/login", result, &session, &state.session_cookie)
}

/// GET /logout: drop the session, then redirect to `redirect_uri` or `/`.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Query(params): QueryParams,
) -> Response {
    let session = BrowserSession::from_headers(&headers, &state.session_cookie);
    let target = params
        .get("redirect_uri")
        .cloned()
        .unwrap_or_else(|| "/".to_string());
    let signed_cookie = state.app.credentials().signed_request_cookie();

    let result = async {
        let mut resolver = resolver(&state, &headers, &uri, params, &session).await?;
        resolver.logout().await?;
        info!(session = %session.id, "logged out");

        let mut response = Redirect::to(&target).into_response();
        // The in-page SDK cookie would otherwise log the browser straight back in
        append_cookie(&mut response, &format!("{signed_cookie}=; Path=/; Max-Age=0"));
        Ok::<_, Error>(response)
    }
    .await;

    finish("/logout", result, &session, &state.session_cookie)
}

/// GET /me: resolve the current user, running any pending code exchange.
///
/// Returns `{"user_id": 0, "profile": null}` for anonymous requests.
pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Query(params): QueryParams,
) -> Response {
    let session = BrowserSession::from_headers(&headers, &state.session_cookie);

    let result = async {
        let mut resolver = resolver(&state, &headers, &uri, params, &session).await?;
        let profile = resolver.user_info().await?;
        let user_id = resolver.user_id().await?;
        Ok::<_, Error>(Json(serde_json::json!({
            "user_id": user_id,
            "profile": profile,
        }))
        .into_response())
    }
    .await;

    finish("/me", result, &session, &state.session_cookie)
}

async fn resolver(
    state: &AppState,
    headers: &HeaderMap,
    uri: &Uri,
    params: HashMap<String, String>,
    session: &BrowserSession,
) -> Result<Resolver> {
    let mut request = RequestContext::new()
        .with_params(params)
        .with_session(session.id.clone());
    for (name, value) in parse_cookies(headers) {
        request = request.with_cookie(name, value);
    }
    if let Some(url) = request_url(headers, uri) {
        request = request.with_current_url(url);
    }
    Ok(state.app.resolver(request).await?)
}

/// Render the outcome, record it, and hand out the session cookie if new.
fn finish(
    route: &'static str,
    result: Result<Response>,
    session: &BrowserSession,
    cookie_name: &str,
) -> Response {
    let mut response = match result {
        Ok(response) => response,
        Err(e) => {
            warn!(route, error = %e, "request failed");
            e.into_response()
        }
    };
    if session.is_new {
        append_cookie(
            &mut response,
            &format!("{cookie_name}={}; Path=/; HttpOnly; SameSite=Lax", session.id),
        );
    }
    metrics::record_request(route, response.status().as_u16());
    response
}

fn append_cookie(response: &mut Response, cookie: &str) {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => warn!(error = %e, "unencodable cookie dropped"),
    }
}

/// The browser session a request belongs to.
struct BrowserSession {
    id: String,
    is_new: bool,
}

impl BrowserSession {
    fn from_headers(headers: &HeaderMap, cookie_name: &str) -> Self {
        match parse_cookies(headers).remove(cookie_name) {
            Some(id) if !id.is_empty() => Self { id, is_new: false },
            _ => Self {
                id: uuid::Uuid::new_v4().as_simple().to_string(),
                is_new: true,
            },
        }
    }
}

fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

/// URL of this request as the browser saw it, from `Host` and
/// `X-Forwarded-Proto`.
fn request_url(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    let host = headers.get(header::HOST)?.to_str().ok()?;
    let https = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|proto| proto.eq_ignore_ascii_case("https"));
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    connect_auth::current_url(https, host, path).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                axum::http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn parses_cookie_headers() {
        let cookies = parse_cookies(&headers(&[
            ("cookie", "connect_sid=abc; fbsr_1=sig.payload"),
            ("cookie", "other=1"),
        ]));
        assert_eq!(cookies["connect_sid"], "abc");
        assert_eq!(cookies["fbsr_1"], "sig.payload");
        assert_eq!(cookies["other"], "1");
    }

    #[test]
    fn session_cookie_is_reused_or_issued() {
        let existing = BrowserSession::from_headers(
            &headers(&[("cookie", "connect_sid=abc")]),
            "connect_sid",
        );
        assert_eq!(existing.id, "abc");
        assert!(!existing.is_new);

        let fresh = BrowserSession::from_headers(&HeaderMap::new(), "connect_sid");
        assert!(fresh.is_new);
        assert_eq!(fresh.id.len(), 32);
    }

    #[test]
    fn request_url_honours_forwarded_proto() {
        let uri: Uri = "/me?code=c&state=s&x=1".parse().unwrap();
        assert_eq!(
            request_url(&headers(&[("host", "gw.test")]), &uri).as_deref(),
            Some("http://gw.test/me?x=1")
        );
        assert_eq!(
            request_url(
                &headers(&[("host", "gw.test"), ("x-forwarded-proto", "https")]),
                &uri
            )
            .as_deref(),
            Some("https://gw.test/me?x=1")
        );
        assert!(request_url(&HeaderMap::new(), &uri).is_none());
    }
}
