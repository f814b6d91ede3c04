//! Current-URL canonicalization and the login dialog URL

use graph_api::build_url;
use url::Url;

use crate::constants::{DROP_QUERY_PARAMS, LOGIN_DIALOG_PATH};
use crate::error::{Error, Result};

/// Rebuild the URL of the current request, minus the provider's own
/// parameters.
///
/// `https` should be true when the connection is TLS or a proxy reports
/// `X-Forwarded-Proto: https`. Default ports are dropped.
pub fn current_url(https: bool, host: &str, request_uri: &str) -> Result<String> {
    let scheme = if https { "https" } else { "http" };
    strip_query_params(&format!("{scheme}://{host}{request_uri}"), DROP_QUERY_PARAMS)
}

/// Drop every query parameter whose raw text starts with `{name}=` for a
/// name in `drop`. Retained parameters keep their original encoding and order.
pub fn strip_query_params(url: &str, drop: &[&str]) -> Result<String> {
    let parsed = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| Error::InvalidUrl(format!("{url}: no host")))?;

    let mut rebuilt = format!("{}://{host}", parsed.scheme());
    if let Some(port) = parsed.port() {
        rebuilt.push_str(&format!(":{port}"));
    }
    rebuilt.push_str(parsed.path());

    if let Some(query) = parsed.query() {
        let retained: Vec<&str> = query
            .split('&')
            .filter(|param| !param.is_empty())
            .filter(|param| {
                !drop
                    .iter()
                    .any(|name| param.starts_with(&format!("{name}=")))
            })
            .collect();
        if !retained.is_empty() {
            rebuilt.push('?');
            rebuilt.push_str(&retained.join("&"));
        }
    }

    Ok(rebuilt)
}

/// Caller choices for the login dialog.
#[derive(Debug, Clone, Default)]
pub struct LoginOptions {
    /// Where the provider sends the user afterwards
    pub redirect_uri: Option<String>,
    /// Extended permissions, sent comma-separated
    pub scope: Vec<String>,
    /// Dialog form factor, e.g. `page` or `popup`
    pub display: Option<String>,
}

/// Build the login dialog URL for `app_id` carrying CSRF `state`.
pub fn login_url(www: &str, app_id: &str, state: &str, options: &LoginOptions) -> String {
    let scope = options.scope.join(",");
    let mut query = vec![("client_id", app_id), ("state", state)];
    if let Some(redirect_uri) = &options.redirect_uri {
        query.push(("redirect_uri", redirect_uri.as_str()));
    }
    if !scope.is_empty() {
        query.push(("scope", scope.as_str()));
    }
    if let Some(display) = &options.display {
        query.push(("display", display.as_str()));
    }
    build_url(www, LOGIN_DIALOG_PATH, &query)
}
