//! Shared response handling for REST calls.

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use taskboard_protocol::ErrorBody;

use crate::error::ClientError;

/// Pass successful responses through; turn error responses into `ClientError`.
pub(crate) async fn check(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(error_from_parts(status, &body))
}

/// Map a non-success status and raw body to an error.
///
/// 422 carries form validation messages; everything else is a generic API error.
pub(crate) fn error_from_parts(status: StatusCode, body: &str) -> ClientError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });

    if status == StatusCode::UNPROCESSABLE_ENTITY {
        ClientError::Validation(message)
    } else {
        ClientError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

/// Decode `value[key]` when the server wraps the record, or `value` itself when it doesn't.
pub(crate) fn from_envelope<T: DeserializeOwned>(
    value: Value,
    key: &str,
) -> Result<T, ClientError> {
    match value {
        Value::Object(mut map) if map.contains_key(key) => {
            let inner = map.remove(key).unwrap_or(Value::Null);
            Ok(serde_json::from_value(inner)?)
        }
        other => Ok(serde_json::from_value(other)?),
    }
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
