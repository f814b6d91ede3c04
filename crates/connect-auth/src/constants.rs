//! Provider endpoints and naming conventions

/// Graph API base, also hosts the token endpoint
pub const GRAPH_URL: &str = "https://graph.facebook.com/";

/// Web base hosting the login dialog
pub const WWW_URL: &str = "https://www.facebook.com/";

/// Token endpoint path, relative to the graph base
pub const TOKEN_PATH: &str = "/oauth/access_token";

/// Login dialog path, relative to the web base
pub const LOGIN_DIALOG_PATH: &str = "dialog/oauth";

/// Request parameter carrying a signed request
pub const SIGNED_REQUEST_PARAM: &str = "signed_request";

/// Signed request cookie is named `{prefix}_{app_id}`
pub const SIGNED_REQUEST_COOKIE_PREFIX: &str = "fbsr";

/// Persisted fields are namespaced as `{prefix}_{app_id}`
pub const STORAGE_PREFIX: &str = "fb";

/// The only signature algorithm accepted in a signed request
pub const SIGNED_REQUEST_ALGORITHM: &str = "HMAC-SHA256";

/// Query parameters dropped when rebuilding the current URL
pub const DROP_QUERY_PARAMS: &[&str] = &["code", "state", SIGNED_REQUEST_PARAM];
