//! Signed request verification
//!
//! A signed request is `base64url(signature).base64url(json payload)`, where the
//! signature is HMAC-SHA256 of the *encoded* payload segment keyed with the app
//! secret. The provider hands one over either as the `signed_request`
//! parameter or in the `fbsr_{app_id}` cookie.
//!
//! Verification failures are not errors from the caller's point of view: a
//! request with a bad signature is treated exactly like a request without a
//! signed request. `VerificationError` exists so the reason can be logged.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha2::Sha256;

use crate::constants::SIGNED_REQUEST_ALGORITHM;

type HmacSha256 = Hmac<Sha256>;

/// URL-safe alphabet, no padding on encode, padding optional on decode.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Why a signed request was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("signed request is not two dot-separated segments")]
    Malformed,

    #[error("signed request segment is not base64url: {0}")]
    Encoding(String),

    #[error("signed request payload is not a JSON object: {0}")]
    Payload(String),

    #[error("unsupported signed request algorithm: {0}")]
    Algorithm(String),

    #[error("signed request signature mismatch")]
    Signature,
}

pub fn base64_url_encode(bytes: &[u8]) -> String {
    URL_SAFE_LENIENT.encode(bytes)
}

pub fn base64_url_decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_LENIENT.decode(input)
}

/// Claims of a verified signed request.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedRequest {
    claims: Map<String, Value>,
}

impl SignedRequest {
    /// Decode `token` and check its signature against `secret`.
    pub fn verify(token: &str, secret: &str) -> Result<Self, VerificationError> {
        let (encoded_sig, payload) = token.split_once('.').ok_or(VerificationError::Malformed)?;

        let sig = base64_url_decode(encoded_sig)
            .map_err(|e| VerificationError::Encoding(e.to_string()))?;
        let decoded = base64_url_decode(payload)
            .map_err(|e| VerificationError::Encoding(e.to_string()))?;
        let claims: Map<String, Value> = serde_json::from_slice(&decoded)
            .map_err(|e| VerificationError::Payload(e.to_string()))?;

        let algorithm = claims
            .get("algorithm")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !algorithm.eq_ignore_ascii_case(SIGNED_REQUEST_ALGORITHM) {
            return Err(VerificationError::Algorithm(algorithm.to_string()));
        }

        // verify_slice compares in constant time
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| VerificationError::Signature)?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&sig)
            .map_err(|_| VerificationError::Signature)?;

        Ok(Self { claims })
    }

    /// Produce a signed request the way the provider does.
    ///
    /// `claims` should include `"algorithm": "HMAC-SHA256"`; it is not added.
    pub fn sign(claims: &Value, secret: &str) -> String {
        let payload = base64_url_encode(claims.to_string().as_bytes());
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(payload.as_bytes());
        let sig = base64_url_encode(&mac.finalize().into_bytes());
        format!("{sig}.{payload}")
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.claims.get(key)
    }

    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    /// The user the provider vouches for. Accepts the id as a number or a
    /// numeric string.
    pub fn user_id(&self) -> Option<u64> {
        match self.claims.get("user_id")? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
        .filter(|id| *id != 0)
    }

    /// Access token embedded by the provider's canvas pages.
    pub fn oauth_token(&self) -> Option<&str> {
        self.non_empty_str("oauth_token")
    }

    /// Authorization code embedded by the in-page SDK.
    pub fn code(&self) -> Option<&str> {
        self.non_empty_str("code")
    }

    fn non_empty_str(&self, key: &str) -> Option<&str> {
        self.claims
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}
