//! Authenticated API calls

use graph_api::{ApiError, Method, Params, build_url, decode_response, encode_params};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::metrics;
use crate::resolver::Resolver;

impl Resolver {
    /// Call the API at `path`.
    ///
    /// The resolved access token is added unless `params` already carries
    /// one. If the provider reports the token invalid, the session is dropped
    /// before the error is returned, so the next request starts over.
    pub async fn api(&mut self, path: &str, method: Method, mut params: Params) -> Result<Value> {
        if !params.contains_key("access_token") {
            params.insert(
                "access_token".to_string(),
                Value::String(self.access_token().await?),
            );
        }
        params.insert(
            "method".to_string(),
            Value::String(method.as_str().to_string()),
        );

        let url = build_url(&self.endpoints.graph, path, &[]);
        let fields = encode_params(&params);
        debug!(path, method = method.as_str(), "api call");

        let outcome = match self.transport.post_form(&url, &fields).await {
            Ok(body) => decode_response(&body),
            Err(e) => Err(ApiError::from(e)),
        };

        match outcome {
            Ok(value) => Ok(value),
            Err(err) => {
                self.on_api_error(&err).await;
                Err(err.into())
            }
        }
    }

    /// GET `path` with no extra parameters.
    pub async fn get(&mut self, path: &str) -> Result<Value> {
        self.api(path, Method::Get, Params::new()).await
    }

    async fn on_api_error(&mut self, err: &ApiError) {
        metrics::record_api_error(err.error_type());
        if !err.invalidates_token() {
            return;
        }

        warn!(error = %err, "access token rejected, dropping session");
        self.access_token = None;
        self.user = Some(0);
        self.profile = None;
        if let Err(e) = self.clear_session("token_error").await {
            warn!(error = %e, "failed to clear session after token error");
        }
    }
}
