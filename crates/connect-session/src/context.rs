//! What the resolver gets to see of the incoming request

use std::collections::HashMap;

/// Parameters, cookies and URL of one request, as extracted by the web layer.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    current_url: Option<String>,
    params: HashMap<String, String>,
    cookies: HashMap<String, String>,
    session: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// URL of this request, used as the default `redirect_uri` of a code
    /// exchange. Provider parameters are stripped before use.
    pub fn with_current_url(mut self, url: impl Into<String>) -> Self {
        self.current_url = Some(url.into());
        self
    }

    /// A query or form parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Browser session the persisted fields belong to, when one store backs
    /// many sessions.
    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    pub fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_request_parts() {
        let request = RequestContext::new()
            .with_current_url("https://x.test/me?code=c")
            .with_params([("code", "c"), ("state", "s")])
            .with_cookie("fbsr_1", "sig.payload")
            .with_session("sid-1");

        assert_eq!(request.current_url(), Some("https://x.test/me?code=c"));
        assert_eq!(request.param("code"), Some("c"));
        assert_eq!(request.param("state"), Some("s"));
        assert_eq!(request.param("signed_request"), None);
        assert_eq!(request.cookie("fbsr_1"), Some("sig.payload"));
        assert_eq!(request.session(), Some("sid-1"));
    }
}
