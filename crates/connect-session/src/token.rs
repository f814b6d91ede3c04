//! Access token resolution

use connect_auth::{DROP_QUERY_PARAMS, exchange_code, strip_query_params};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::metrics;
use crate::resolver::Resolver;

impl Resolver {
    /// The token API calls are made with: the user's if one resolves, else
    /// the application token. Resolved once, then cached.
    pub async fn access_token(&mut self) -> Result<String> {
        if let Some(token) = &self.access_token {
            return Ok(token.clone());
        }
        let token = match self.user_access_token().await? {
            Some(token) => token,
            None => self.app.application_token(),
        };
        self.access_token = Some(token.clone());
        Ok(token)
    }

    /// Use `token` for the rest of this request instead of resolving one.
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.access_token = Some(token.into());
        self.profile = None;
    }

    /// The user access token, if any source yields one.
    ///
    /// A signed request decides alone. Without one, a new authorization code
    /// is exchanged if its CSRF state matches. Failing both, the persisted
    /// token stands.
    pub(crate) async fn user_access_token(&mut self) -> Result<Option<String>> {
        if let Some(signed) = &self.signed_request {
            if let Some(token) = signed.oauth_token() {
                let token = token.to_string();
                let persisted = token.clone();
                self.session
                    .update(move |f| f.access_token = Some(persisted))
                    .await?;
                debug!("access token taken from signed request");
                return Ok(Some(token));
            }

            if let Some(code) = signed.code().map(str::to_string) {
                // Codes issued to the in-page SDK are bound to an empty redirect URI
                if let Some(token) = self.exchange(&code, "", "signed_request").await {
                    self.persist_exchange(code, token.clone()).await?;
                    return Ok(Some(token));
                }
            }

            self.clear_session("signed_request").await?;
            return Ok(None);
        }

        if let Some(code) = self.new_code().await? {
            let redirect_uri = self.redirect_uri();
            return match self.exchange(&code, &redirect_uri, "redirect").await {
                Some(token) => {
                    self.persist_exchange(code, token.clone()).await?;
                    Ok(Some(token))
                }
                None => {
                    self.clear_session("bad_code").await?;
                    Ok(None)
                }
            };
        }

        Ok(self.session.load().await?.access_token)
    }

    /// An authorization code from this request that has not been exchanged
    /// yet and whose `state` parameter matches the CSRF state.
    async fn new_code(&mut self) -> Result<Option<String>> {
        let Some(code) = self.request.param("code").filter(|c| !c.is_empty()) else {
            return Ok(None);
        };
        let code = code.to_string();

        if self.session.load().await?.code.as_deref() == Some(code.as_str()) {
            debug!("authorization code already exchanged");
            return Ok(None);
        }

        let state = self.request.param("state").unwrap_or_default().to_string();
        if !self.csrf.consume(&self.session, &state).await? {
            warn!(
                namespace = self.session.namespace(),
                "CSRF state token does not match one provided"
            );
            return Ok(None);
        }
        Ok(Some(code))
    }

    /// Current request URL without the provider's own parameters.
    fn redirect_uri(&self) -> String {
        let Some(url) = self.request.current_url() else {
            return String::new();
        };
        strip_query_params(url, DROP_QUERY_PARAMS).unwrap_or_else(|e| {
            warn!(error = %e, "unusable current URL, exchanging without redirect_uri");
            String::new()
        })
    }

    async fn exchange(
        &self,
        code: &str,
        redirect_uri: &str,
        source: &'static str,
    ) -> Option<String> {
        match exchange_code(
            self.transport.as_ref(),
            &self.endpoints,
            &self.app,
            code,
            redirect_uri,
        )
        .await
        {
            Ok(token) => {
                info!(source, "exchanged authorization code");
                metrics::record_code_exchange(source, true);
                Some(token)
            }
            Err(e) => {
                warn!(source, error = %e, "authorization code exchange failed");
                metrics::record_code_exchange(source, false);
                None
            }
        }
    }

    async fn persist_exchange(&self, code: String, token: String) -> Result<()> {
        self.session
            .update(move |f| {
                f.code = Some(code);
                f.access_token = Some(token);
            })
            .await?;
        Ok(())
    }
}
