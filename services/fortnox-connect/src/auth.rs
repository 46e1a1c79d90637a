//! Authorization flow endpoints
//!
//! - GET /auth/start[?account_type=service]: 303 redirect to the Fortnox
//!   consent page with a fresh single-use `state`
//! - GET /auth/callback?code=..&state=..: redirect target registered for the
//!   app; redeems the state and exchanges the code for tokens
//!
//! Issued tokens are persisted by the `TokenFile` listener, not here.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use fortnox_auth::{AccountType, AuthParams};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::error_response;
use crate::metrics::record_authorization;
use crate::{AppState, new_request_id};

#[derive(Debug, Deserialize)]
pub struct StartParams {
    #[serde(default)]
    account_type: Option<String>,
}

/// GET /auth/start
pub async fn start(State(state): State<AppState>, Query(params): Query<StartParams>) -> Response {
    let request_id = new_request_id();
    let account_type = match params.account_type.as_deref() {
        None | Some("") => None,
        Some("service") => Some(AccountType::Service),
        Some(other) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                &format!("unsupported account_type: {other}"),
                &request_id,
            );
        }
    };

    let authorization = state.client.auth().authorization_url(&AuthParams {
        scopes: None,
        account_type,
    });
    info!(request_id, ?account_type, "authorization flow started");
    Redirect::to(&authorization.url).into_response()
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    /// Set by Fortnox when the user declines or the request is invalid.
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// GET /auth/callback
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let request_id = new_request_id();

    if let Some(error) = params.error {
        record_authorization("denied");
        let message = match params.error_description {
            Some(description) => format!("{error}: {description}"),
            None => error,
        };
        warn!(request_id, error = %message, "authorization denied by provider");
        return error_response(
            StatusCode::BAD_REQUEST,
            "authorization_denied",
            &message,
            &request_id,
        );
    }

    let code = params.code.filter(|c| !c.is_empty());
    let oauth_state = params.state.filter(|s| !s.is_empty());
    let (Some(code), Some(oauth_state)) = (code, oauth_state) else {
        record_authorization("invalid_request");
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "missing code or state parameter",
            &request_id,
        );
    };

    match state
        .client
        .auth()
        .exchange_code_for_token(&code, &oauth_state)
        .await
    {
        Ok(tokens) => {
            record_authorization("success");
            info!(request_id, scope = %tokens.scope, "authorization completed");
            (
                StatusCode::OK,
                axum::Json(serde_json::json!({
                    "status": "authorized",
                    "scope": tokens.scope,
                    "expires_in": tokens.expires_in,
                })),
            )
                .into_response()
        }
        Err(fortnox_auth::Error::InvalidState) => {
            record_authorization("invalid_state");
            warn!(request_id, "callback with unknown or expired state");
            error_response(
                StatusCode::UNAUTHORIZED,
                "invalid_state",
                "invalid or expired state parameter",
                &request_id,
            )
        }
        Err(e) => {
            record_authorization("exchange_failed");
            warn!(request_id, error = %e, "token exchange failed");
            error_response(
                StatusCode::BAD_GATEWAY,
                "token_exchange_failed",
                &e.to_string(),
                &request_id,
            )
        }
    }
}
