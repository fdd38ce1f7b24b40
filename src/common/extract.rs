// JSON body extractor whose rejections use the API error shape

use axum::extract::{rejection::JsonRejection, FromRequest};
use tracing::debug;

use super::ApiError;

/// Like `axum::Json`, but malformed bodies become `{ok:false, errors:[..]}` 400s.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        // The serde detail stays in the logs
        debug!(detail = %rejection.body_text(), "Rejected JSON body");

        let message = match rejection {
            JsonRejection::MissingJsonContentType(_) => "Expected a JSON request body",
            JsonRejection::JsonSyntaxError(_) => "Request body is not valid JSON",
            JsonRejection::JsonDataError(_) => "Request body has missing or invalid fields",
            _ => "Could not read request body",
        };
        ApiError::validation(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use serde::Deserialize;

    #[allow(dead_code)]
    #[derive(Debug, Deserialize)]
    struct Payload {
        id: i64,
    }

    async fn extract(content_type: Option<&str>, body: &str) -> Result<ApiJson<Payload>, ApiError> {
        let mut builder = Request::builder().method("POST").uri("/");
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();
        ApiJson::<Payload>::from_request(request, &()).await
    }

    fn message(result: Result<ApiJson<Payload>, ApiError>) -> String {
        match result {
            Err(ApiError::Validation(messages)) => messages.join(", "),
            Err(other) => panic!("expected validation error, got {:?}", other),
            Ok(_) => panic!("expected rejection"),
        }
    }

    #[tokio::test]
    async fn test_rejections_use_short_messages() {
        let json = Some("application/json");

        assert_eq!(message(extract(None, r#"{"id": 1}"#).await), "Expected a JSON request body");
        assert_eq!(message(extract(json, "{not json").await), "Request body is not valid JSON");
        assert_eq!(
            message(extract(json, "{}").await),
            "Request body has missing or invalid fields"
        );
        assert_eq!(
            message(extract(json, r#"{"id": "x"}"#).await),
            "Request body has missing or invalid fields"
        );
    }

    #[tokio::test]
    async fn test_valid_body_extracts() {
        let ApiJson(payload) = extract(Some("application/json"), r#"{"id": 7}"#).await.unwrap();
        assert_eq!(payload.id, 7);
    }
}
