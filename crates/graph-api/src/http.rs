//! reqwest-backed transport
//!
//! Every call is a form-encoded POST bounded by a short connect timeout and a
//! longer overall timeout. When a CA bundle is configured, a second client
//! trusting it is kept aside and used for exactly one retry when the first
//! attempt fails the TLS handshake.

use std::error::Error as _;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::TransportError;
use crate::{Transport, TransportResult};

/// User-Agent sent with every request.
pub const USER_AGENT: &str = concat!("graph-connect-rs/", env!("CARGO_PKG_VERSION"));

/// Transport settings.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    pub timeout: Duration,
    /// PEM bundle trusted on retry after a TLS handshake failure
    pub ca_bundle: Option<PathBuf>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(60),
            ca_bundle: None,
        }
    }
}

pub struct HttpTransport {
    client: reqwest::Client,
    fallback: Option<reqwest::Client>,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> TransportResult<Self> {
        let client = builder(config)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        let fallback = match &config.ca_bundle {
            Some(path) => {
                let pem = std::fs::read(path).map_err(|e| {
                    TransportError::Client(format!("reading CA bundle {}: {e}", path.display()))
                })?;
                let certificates = reqwest::Certificate::from_pem_bundle(&pem)
                    .map_err(|e| TransportError::Client(format!("parsing CA bundle: {e}")))?;
                let mut fallback = builder(config);
                for certificate in certificates {
                    fallback = fallback.add_root_certificate(certificate);
                }
                Some(
                    fallback
                        .build()
                        .map_err(|e| TransportError::Client(e.to_string()))?,
                )
            }
            None => None,
        };

        Ok(Self { client, fallback })
    }

    async fn send(
        client: &reqwest::Client,
        url: &str,
        fields: &[(String, String)],
    ) -> TransportResult<String> {
        let response = client
            .post(url)
            .form(fields)
            .send()
            .await
            .map_err(classify)?;
        debug!(url, status = response.status().as_u16(), "provider responded");
        response.text().await.map_err(classify)
    }
}

impl Transport for HttpTransport {
    fn post_form<'a>(
        &'a self,
        url: &'a str,
        fields: &'a [(String, String)],
    ) -> Pin<Box<dyn Future<Output = TransportResult<String>> + Send + 'a>> {
        Box::pin(async move {
            match Self::send(&self.client, url, fields).await {
                Err(TransportError::Tls(msg)) => match &self.fallback {
                    Some(fallback) => {
                        warn!(url, error = %msg, "TLS handshake failed, retrying with CA bundle");
                        Self::send(fallback, url, fields).await
                    }
                    None => Err(TransportError::Tls(msg)),
                },
                other => other,
            }
        })
    }
}

fn builder(config: &TransportConfig) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.timeout)
        .user_agent(USER_AGENT)
}

fn classify(err: reqwest::Error) -> TransportError {
    let msg = err.to_string();
    if err.is_timeout() {
        TransportError::Timeout(msg)
    } else if is_tls_error(&err) {
        TransportError::Tls(source_chain(&err))
    } else if err.is_connect() {
        TransportError::Connect(source_chain(&err))
    } else {
        TransportError::Request(msg)
    }
}

/// Whether a rustls error sits anywhere in the chain. The handshake reports
/// it wrapped in an `io::Error`, whose `source()` skips the wrapped error.
fn is_tls_error(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(inner) = source {
        if inner.is::<rustls::Error>() {
            return true;
        }
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            if io.get_ref().is_some_and(|e| e.is::<rustls::Error>()) {
                return true;
            }
        }
        source = inner.source();
    }
    false
}

fn source_chain(err: &reqwest::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text
}
