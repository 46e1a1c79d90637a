//! Read-only API passthrough
//!
//! GET /api/{*path} forwards to `<api_base_url>/{path}` with the query string,
//! using the service's own token (refreshed as needed). Paths that would
//! leave the API base URL (absolute URLs, dot segments, ...) are rejected by
//! the client as validation errors. Typed client errors are mapped to HTTP
//! statuses by `error::client_error_response`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fortnox_client::QueryParams;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::client_error_response;
use crate::{AppState, new_request_id};

/// GET /api/{*path}
pub async fn passthrough(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    let request_id = new_request_id();
    forward(&state, &path, query.into_iter().collect(), &request_id).await
}

#[instrument(skip_all, fields(request_id = %request_id, path = %path))]
async fn forward(state: &AppState, path: &str, query: QueryParams, request_id: &str) -> Response {
    match state.client.http().get(path, query).await {
        Ok(Value::Null) => StatusCode::NO_CONTENT.into_response(),
        Ok(body) => {
            debug!("API request succeeded");
            (StatusCode::OK, axum::Json(body)).into_response()
        }
        Err(e) => {
            warn!(error = %e, "API request failed");
            client_error_response(&e, request_id)
        }
    }
}
