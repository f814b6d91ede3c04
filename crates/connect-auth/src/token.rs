//! Authorization code exchange
//!
//! POSTs the code to the graph token endpoint. Unlike the rest of the API, the
//! token endpoint answers URL-encoded (`access_token=...&expires=...`), so the
//! body is parsed here rather than through `graph_api::decode_response`.

use graph_api::{Transport, build_url};
use url::form_urlencoded;

use crate::app::{AppCredentials, Endpoints};
use crate::constants::TOKEN_PATH;
use crate::error::{Error, Result};

/// Exchange an authorization code for a user access token.
///
/// `redirect_uri` must equal the one the code was issued for: the current
/// URL for server-side redirects, the empty string for codes the in-page SDK
/// put in a signed request. The application token is sent as `access_token`
/// since the endpoint requires some token on every call.
pub async fn exchange_code(
    transport: &dyn Transport,
    endpoints: &Endpoints,
    app: &AppCredentials,
    code: &str,
    redirect_uri: &str,
) -> Result<String> {
    if code.is_empty() {
        return Err(Error::TokenExchange("authorization code is empty".into()));
    }

    let fields = vec![
        ("client_id".to_string(), app.app_id.clone()),
        ("client_secret".to_string(), app.secret.expose().clone()),
        ("redirect_uri".to_string(), redirect_uri.to_string()),
        ("code".to_string(), code.to_string()),
        ("access_token".to_string(), app.application_token()),
    ];

    let url = build_url(&endpoints.graph, TOKEN_PATH, &[]);
    let body = transport
        .post_form(&url, &fields)
        .await
        .map_err(|e| Error::TokenExchange(format!("token endpoint unreachable: {e}")))?;

    parse_token_response(&body)
}

fn parse_token_response(body: &str) -> Result<String> {
    if body.trim().is_empty() {
        return Err(Error::TokenExchange("empty token response".into()));
    }
    form_urlencoded::parse(body.trim().as_bytes())
        .find(|(key, value)| key == "access_token" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| Error::TokenExchange("token response has no access_token".into()))
}
