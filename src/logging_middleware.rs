// src/logging_middleware.rs
//! Middleware for logging request and response bodies in debug mode

use axum::body::to_bytes;
use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use serde_json::Value;
use tracing::{debug, Level};

/// JSON keys whose values never reach the logs
const REDACTED_KEYS: [&str; 3] = ["password", "access_token", "token"];

/// Bodies larger than this are passed through unlogged
const MAX_LOGGED_BODY: usize = 64 * 1024;

/// Replaces secret values anywhere in a JSON document.
pub fn redact(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, inner) in map.iter_mut() {
                if REDACTED_KEYS.contains(&key.to_lowercase().as_str()) {
                    *inner = Value::String("[redacted]".to_string());
                } else {
                    redact(inner);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact),
        _ => {}
    }
}

fn printable(bytes: &Bytes) -> Option<String> {
    if bytes.is_empty() || bytes.len() > MAX_LOGGED_BODY {
        return None;
    }
    let body_str = std::str::from_utf8(bytes).ok()?;
    match serde_json::from_str::<Value>(body_str) {
        Ok(mut json) => {
            redact(&mut json);
            Some(serde_json::to_string_pretty(&json).unwrap_or_else(|_| body_str.to_string()))
        }
        // Non-JSON bodies may still carry credentials; log only their size
        Err(_) => Some(format!("<{} bytes, not JSON>", bytes.len())),
    }
}

/// Middleware to log request and response bodies in debug mode
pub async fn log_request_response(request: Request, next: Next) -> Result<Response, StatusCode> {
    if !tracing::enabled!(Level::DEBUG) {
        return Ok(next.run(request).await);
    }

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if let Some(request_body) = printable(&bytes) {
        debug!(
            method = %parts.method,
            uri = %parts.uri,
            request_body = %request_body,
            "📥 Request"
        );
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let bytes = to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if let Some(response_body) = printable(&bytes) {
        debug!(
            status = %parts.status,
            response_body = %response_body,
            "📤 Response"
        );
    }

    Ok(Response::from_parts(parts, Body::from(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_redact_nested_secrets() {
        let mut body = json!({
            "username": "alice",
            "password": "hunter22",
            "nested": [{"Access_Token": "ya29.abc", "keep": 1}]
        });

        redact(&mut body);

        assert_eq!(body["username"], "alice");
        assert_eq!(body["password"], "[redacted]");
        assert_eq!(body["nested"][0]["Access_Token"], "[redacted]");
        assert_eq!(body["nested"][0]["keep"], 1);
    }

    #[test]
    fn test_printable_skips_empty_and_non_json() {
        assert_eq!(printable(&Bytes::new()), None);
        assert_eq!(
            printable(&Bytes::from_static(b"password=hunter22")),
            Some("<17 bytes, not JSON>".to_string())
        );
    }
}
