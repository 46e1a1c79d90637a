//! HTTP error responses
//!
//! Every error the service returns has the same JSON shape:
//! `{"error": {"type": "...", "message": "...", "request_id": "req_..."}}`,
//! plus `code` when Fortnox supplied one.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// JSON error response.
pub fn error_response(
    status: StatusCode,
    error_type: &str,
    message: &str,
    request_id: &str,
) -> Response {
    let body = serde_json::json!({
        "error": {
            "type": error_type,
            "message": message,
            "request_id": request_id,
        }
    });
    (
        status,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

/// Status code and `type` label for a client error.
///
/// Remote failures that are not the caller's fault (5xx, unparseable
/// payloads, transport errors) are reported as 502.
pub fn classify(err: &fortnox_client::Error) -> (StatusCode, &'static str) {
    use fortnox_client::Error;

    match err {
        Error::Authentication(_) => (StatusCode::UNAUTHORIZED, "authentication_error"),
        Error::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
        Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        Error::RateLimit(_) => (StatusCode::TOO_MANY_REQUESTS, "rate_limit_error"),
        Error::Api(_) => (StatusCode::BAD_GATEWAY, "api_error"),
    }
}

/// Response for a failed client call.
pub fn client_error_response(err: &fortnox_client::Error, request_id: &str) -> Response {
    let (status, error_type) = classify(err);
    let mut body = serde_json::json!({
        "error": {
            "type": error_type,
            "message": err.message(),
            "request_id": request_id,
        }
    });
    if let Some(code) = err.code() {
        body["error"]["code"] = code.into();
    }
    (
        status,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}
