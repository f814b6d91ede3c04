//! Request encoding and response decoding for API calls

use serde_json::{Map, Value};
use url::form_urlencoded;

use crate::FormFields;
use crate::error::ApiError;

/// Caller-supplied API parameters. Non-string values are sent as compact JSON.
pub type Params = Map<String, Value>;

/// Logical HTTP method of an API call.
///
/// The provider is always called with a POST; the logical method travels as
/// the `method` form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

/// Flatten params into string form fields.
pub fn encode_params(params: &Params) -> FormFields {
    params
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}

/// Join a domain base URL, a path and optional query parameters.
///
/// A leading `/` on `path` is ignored so `"/me"` and `"me"` are the same call.
pub fn build_url(base: &str, path: &str, query: &[(&str, &str)]) -> String {
    let mut url = base.to_string();
    if !url.ends_with('/') {
        url.push('/');
    }
    url.push_str(path.strip_prefix('/').unwrap_or(path));
    if !query.is_empty() {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(query)
            .finish();
        url.push('?');
        url.push_str(&encoded);
    }
    url
}

/// Parse an API response body.
///
/// Results are returned, errors become `ApiError`. A body that is not JSON at
/// all is reported as an error too.
pub fn decode_response(body: &str) -> Result<Value, ApiError> {
    let result: Value = serde_json::from_str(body).map_err(|e| {
        ApiError::from_result(serde_json::json!({
            "error": {
                "message": format!("response is not valid JSON: {e}"),
                "type": crate::error::DEFAULT_ERROR_TYPE,
            }
        }))
    })?;

    if is_error_payload(&result) {
        return Err(ApiError::from_result(result));
    }
    Ok(result)
}

fn is_error_payload(result: &Value) -> bool {
    let Some(object) = result.as_object() else {
        return false;
    };
    let has = |key: &str| object.get(key).is_some_and(|v| !v.is_null());
    has("error") || (has("error_code") && has("error_msg"))
}
