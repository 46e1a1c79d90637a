//! Authenticated request execution
//!
//! Every API call goes through `HttpClient::request`: it obtains a valid
//! access token, sends the request, and classifies the response into a JSON
//! value or a typed `Error`. A 401/403 triggers exactly one token refresh and
//! one retry of the same request.

use std::time::Instant;

use fortnox_auth::AuthManager;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, Response, StatusCode, Url};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, ErrorInfo, Result};
use crate::metrics;
use crate::query::QueryParams;

/// Per-request options.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Extra headers. They override the defaults (`Content-Type`,
    /// `Authorization`) on name collision.
    pub headers: HeaderMap,
    pub query: QueryParams,
    /// JSON body, sent for POST and PUT only.
    pub body: Option<Value>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: reqwest::header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Executes authenticated requests against the Fortnox REST API.
#[derive(Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base_url: Url,
    auth: AuthManager,
}

impl HttpClient {
    /// Build a client for `auth`'s configured API base URL.
    pub fn new(auth: AuthManager, http: reqwest::Client) -> Result<Self> {
        let mut base = auth.config().api_base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| Error::validation(format!("api_base_url: {e}")))?;
        Ok(Self {
            http,
            base_url,
            auth,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }

    /// Send `method path` and return the parsed JSON body.
    ///
    /// Returns `Value::Null` for 204 and for successful non-JSON responses.
    pub async fn request(&self, method: Method, path: &str, options: RequestOptions) -> Result<Value> {
        let started = Instant::now();
        let result = self.execute(&method, path, &options).await;
        metrics::record_duration(method.as_str(), started.elapsed().as_secs_f64());
        if let Err(e) = &result {
            debug!(%method, path, error = %e, "request failed");
        }
        result
    }

    pub async fn get(&self, path: &str, query: QueryParams) -> Result<Value> {
        self.request(Method::GET, path, RequestOptions::new().query(query))
            .await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<Value> {
        self.request(Method::POST, path, RequestOptions::new().body(body))
            .await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<Value> {
        self.request(Method::PUT, path, RequestOptions::new().body(body))
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<Value> {
        self.request(Method::DELETE, path, RequestOptions::new()).await
    }

    async fn execute(&self, method: &Method, path: &str, options: &RequestOptions) -> Result<Value> {
        let token = self.auth.get_valid_access_token().await?;
        let url = self.build_url(path, &options.query)?;

        let response = self.send(method, url.clone(), &token, options).await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return self
                .retry_after_refresh(method, url, options, &token, response)
                .await;
        }
        classify(response).await
    }

    /// Refresh once and resend. If the refresh itself fails, the original
    /// 401/403 is reported.
    ///
    /// The refresh goes through the manager's single-flight slot, so
    /// concurrent rejections of the same token share one refresh.
    async fn retry_after_refresh(
        &self,
        method: &Method,
        url: Url,
        options: &RequestOptions,
        rejected_token: &str,
        original: Response,
    ) -> Result<Value> {
        metrics::record_auth_retry();
        warn!(
            %method,
            path = url.path(),
            status = original.status().as_u16(),
            "request unauthorized, refreshing token and retrying once"
        );

        match self.auth.refresh_rejected_token(rejected_token).await {
            Ok(_) => {
                drop(original);
                let token = self.auth.get_valid_access_token().await?;
                let retry = self.send(method, url, &token, options).await?;
                classify(retry).await
            }
            Err(e) => {
                debug!(error = %e, "token refresh failed, reporting original response");
                Err(authentication_failure(original).await)
            }
        }
    }

    async fn send(
        &self,
        method: &Method,
        url: Url,
        token: &str,
        options: &RequestOptions,
    ) -> Result<Response> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| Error::authentication("access token is not a valid header value"))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);
        for (name, value) in &options.headers {
            headers.insert(name.clone(), value.clone());
        }

        debug!(%method, path = url.path(), "sending request");
        let mut request = self.http.request(method.clone(), url).headers(headers);
        if *method == Method::POST || *method == Method::PUT {
            if let Some(body) = &options.body {
                request = request.json(body);
            }
        }

        match request.send().await {
            Ok(response) => {
                metrics::record_response(method.as_str(), Some(response.status().as_u16()));
                Ok(response)
            }
            Err(e) => {
                metrics::record_response(method.as_str(), None);
                Err(Error::transport(e))
            }
        }
    }

    /// Append `path` to the base URL with exactly one `/` between them and
    /// add the query parameters in order.
    ///
    /// The result always stays below the base URL; see `check_path` for what
    /// is rejected.
    fn build_url(&self, path: &str, query: &QueryParams) -> Result<Url> {
        let relative = path.trim_start_matches('/');
        check_path(relative)
            .map_err(|reason| Error::validation(format!("invalid request path {path:?}: {reason}")))?;

        let mut url = Url::parse(&format!("{}{relative}", self.base_url))
            .map_err(|e| Error::validation(format!("invalid request path {path:?}: {e}")))?;
        if !url.as_str().starts_with(self.base_url.as_str()) {
            return Err(Error::validation(format!(
                "invalid request path {path:?}: escapes the API base URL"
            )));
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter());
        }
        Ok(url)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

/// A request path must be a plain relative path: no scheme, no empty or
/// dot segments (percent-encoded dots included), no backslashes, control
/// characters, query or fragment.
fn check_path(path: &str) -> std::result::Result<(), &'static str> {
    if path.contains("://") {
        return Err("absolute URLs are not allowed");
    }
    if path
        .chars()
        .any(|c| c == '\\' || c == '?' || c == '#' || c.is_control())
    {
        return Err("contains a character that is not allowed in a path");
    }
    for segment in path.split('/') {
        let decoded = urlencoding::decode_binary(segment.as_bytes());
        match decoded.as_ref() {
            b"" => return Err("empty path segment"),
            b"." | b".." => return Err("dot segments are not allowed"),
            _ => {}
        }
    }
    Ok(())
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"))
}

async fn classify(response: Response) -> Result<Value> {
    let status = response.status();
    if status == StatusCode::NO_CONTENT {
        return Ok(Value::Null);
    }
    if status.is_success() {
        if !is_json(&response) {
            return Ok(Value::Null);
        }
        return response.json::<Value>().await.map_err(Error::transport);
    }
    Err(error_from_response(response).await)
}

/// Typed error for a non-2xx response.
async fn error_from_response(response: Response) -> Error {
    let status = response.status();
    let json = is_json(&response);
    let text = match response.text().await {
        Ok(text) => text,
        Err(e) => return Error::transport(e),
    };

    if json {
        if let Ok(body) = serde_json::from_str::<Value>(&text) {
            return Error::from_error_body(status.as_u16(), body);
        }
    }
    Error::Api(
        ErrorInfo::new(format!(
            "HTTP {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        ))
        .with_status(status.as_u16())
        .with_details(Value::String(text)),
    )
}

/// Authentication error for a 401/403 that a refresh could not fix.
async fn authentication_failure(response: Response) -> Error {
    let status = response.status();
    let json = is_json(&response);
    let text = response.text().await.unwrap_or_default();

    let body = if json {
        serde_json::from_str::<Value>(&text).ok()
    } else {
        None
    };
    if let Some(body) = body {
        match Error::from_error_body(status.as_u16(), body.clone()) {
            err @ Error::Authentication(_) => return err,
            _ => {
                return Error::Authentication(
                    ErrorInfo::new(format!(
                        "Authentication failed: {}",
                        status.canonical_reason().unwrap_or("")
                    ))
                    .with_status(status.as_u16())
                    .with_details(body),
                );
            }
        }
    }

    Error::Authentication(
        ErrorInfo::new(format!(
            "Authentication failed: {}",
            status.canonical_reason().unwrap_or("")
        ))
        .with_status(status.as_u16())
        .with_details(Value::String(text)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::{Path, RawQuery, State};
    use axum::http::{HeaderMap as AxumHeaders, StatusCode as AxumStatus};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use fortnox_auth::Config;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    #[derive(Clone, Default)]
    struct MockState {
        token_calls: Arc<AtomicUsize>,
        api_calls: Arc<AtomicUsize>,
        reject_refresh: Arc<AtomicBool>,
    }

    struct MockApi {
        addr: String,
        state: MockState,
    }

    fn bearer(headers: &AxumHeaders) -> Option<String> {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    }

    /// Refresh tokens rotate: the n-th call only accepts `rt_{n-1}`, so a
    /// second refresh with an already used token is rejected.
    async fn token_handler(State(state): State<MockState>, form: String) -> axum::response::Response {
        let n = state.token_calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let presented = form
            .split('&')
            .find_map(|pair| pair.strip_prefix("refresh_token="));
        let rotated_out = presented != Some(format!("rt_{}", n - 1).as_str());
        if state.reject_refresh.load(Ordering::SeqCst) || rotated_out {
            return (
                AxumStatus::BAD_REQUEST,
                axum::Json(json!({"error": "invalid_grant"})),
            )
                .into_response();
        }
        axum::Json(json!({
            "access_token": format!("at_{n}"),
            "refresh_token": format!("rt_{n}"),
            "scope": "article",
            "expires_in": 3600,
            "token_type": "Bearer",
        }))
        .into_response()
    }

    async fn echo_handler(
        State(state): State<MockState>,
        method: axum::http::Method,
        Path(path): Path<String>,
        RawQuery(query): RawQuery,
        headers: AxumHeaders,
        body: String,
    ) -> axum::response::Response {
        state.api_calls.fetch_add(1, Ordering::SeqCst);
        axum::Json(json!({
            "method": method.as_str(),
            "path": path,
            "query": query,
            "authorization": bearer(&headers),
            "content_type": headers.get("content-type").and_then(|v| v.to_str().ok()),
            "x_trace": headers.get("x-trace").and_then(|v| v.to_str().ok()),
            "body": body,
        }))
        .into_response()
    }

    fn envelope(message: &str, code: i64) -> axum::Json<Value> {
        axum::Json(json!({"ErrorInformation": {"Error": 1, "Message": message, "Code": code}}))
    }

    /// Only the refreshed token (`at_1`) is accepted.
    async fn protected_handler(
        State(state): State<MockState>,
        headers: AxumHeaders,
    ) -> axum::response::Response {
        state.api_calls.fetch_add(1, Ordering::SeqCst);
        if bearer(&headers).as_deref() == Some("Bearer at_1") {
            axum::Json(json!({"ok": true})).into_response()
        } else {
            (AxumStatus::UNAUTHORIZED, envelope("Unauthorized", 2000310)).into_response()
        }
    }

    async fn always_unauthorized(State(state): State<MockState>) -> axum::response::Response {
        state.api_calls.fetch_add(1, Ordering::SeqCst);
        (AxumStatus::UNAUTHORIZED, envelope("Unauthorized", 2000310)).into_response()
    }

    async fn forbidden_text(State(state): State<MockState>) -> axum::response::Response {
        state.api_calls.fetch_add(1, Ordering::SeqCst);
        (AxumStatus::FORBIDDEN, "nope").into_response()
    }

    async fn start_mock_api() -> MockApi {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());
        let state = MockState::default();

        let app = Router::new()
            .route("/oauth-v1/token", post(token_handler))
            .route(
                "/3/echo/{*path}",
                get(echo_handler)
                    .post(echo_handler)
                    .put(echo_handler)
                    .delete(echo_handler),
            )
            .route("/3/empty", get(|| async { AxumStatus::NO_CONTENT }))
            .route("/3/text", get(|| async { "plain text" }))
            .route(
                "/3/bad",
                get(|| async { (AxumStatus::BAD_REQUEST, envelope("Bad data", 7)) }),
            )
            .route(
                "/3/missing",
                get(|| async { (AxumStatus::NOT_FOUND, envelope("Kunde inte hitta", 2001302)) }),
            )
            .route(
                "/3/limited",
                get(|| async { (AxumStatus::TOO_MANY_REQUESTS, envelope("Too many requests", 2000)) }),
            )
            .route(
                "/3/gateway",
                get(|| async {
                    (
                        AxumStatus::BAD_GATEWAY,
                        [("content-type", "text/html")],
                        "<html>bad gateway</html>",
                    )
                }),
            )
            .route(
                "/3/weird",
                get(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, axum::Json(json!({"oops": 1}))) }),
            )
            .route("/3/protected", get(protected_handler))
            .route("/3/always-401", get(always_unauthorized))
            .route("/3/forbidden-text", get(forbidden_text))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        MockApi { addr, state }
    }

    fn client_for(api: &MockApi, refresh_token: Option<&str>) -> HttpClient {
        let builder = Config::builder("client-id", "client-secret", "https://app.example/callback")
            .api_base_url(format!("{}/3", api.addr))
            .oauth_base_url(api.addr.clone());
        let builder = match refresh_token {
            Some(rt) => builder.initial_tokens("at_0", rt),
            None => builder.initial_access_token("at_0"),
        };
        let auth = AuthManager::new(builder.build()).unwrap();
        HttpClient::new(auth, reqwest::Client::new()).unwrap()
    }

    #[tokio::test]
    async fn get_sends_bearer_token_and_query() {
        let api = start_mock_api().await;
        let client = client_for(&api, Some("rt_0"));

        let query = QueryParams::new()
            .with("filter", "active")
            .with("page", 2);
        let body = client.get("/echo/articles", query).await.unwrap();

        assert_eq!(body["method"], "GET");
        assert!(body["path"].as_str().unwrap().ends_with("articles"));
        assert_eq!(body["query"], "filter=active&page=2");
        assert_eq!(body["authorization"], "Bearer at_0");
        assert_eq!(body["content_type"], "application/json");
    }

    #[tokio::test]
    async fn post_and_put_send_json_body_delete_does_not() {
        let api = start_mock_api().await;
        let client = client_for(&api, Some("rt_0"));

        let body = client
            .post("echo/articles", json!({"Article": {"Description": "Widget"}}))
            .await
            .unwrap();
        assert_eq!(body["method"], "POST");
        let sent: Value = serde_json::from_str(body["body"].as_str().unwrap()).unwrap();
        assert_eq!(sent["Article"]["Description"], "Widget");

        let body = client
            .put("echo/articles/A1", json!({"Article": {"Unit": "st"}}))
            .await
            .unwrap();
        assert_eq!(body["method"], "PUT");
        assert!(body["body"].as_str().unwrap().contains("\"Unit\""));

        let options = RequestOptions::new().body(json!({"ignored": true}));
        let body = client
            .request(Method::DELETE, "echo/articles/A1", options)
            .await
            .unwrap();
        assert_eq!(body["method"], "DELETE");
        assert_eq!(body["body"], "");
    }

    #[tokio::test]
    async fn caller_headers_are_merged_and_override() {
        let api = start_mock_api().await;
        let client = client_for(&api, Some("rt_0"));

        let options = RequestOptions::new()
            .header(
                reqwest::header::HeaderName::from_static("x-trace"),
                HeaderValue::from_static("abc"),
            )
            .header(AUTHORIZATION, HeaderValue::from_static("Bearer override"));
        let body = client
            .request(Method::GET, "echo/x", options)
            .await
            .unwrap();
        assert_eq!(body["x_trace"], "abc");
        assert_eq!(body["authorization"], "Bearer override");
    }

    #[tokio::test]
    async fn no_content_and_non_json_success_are_null() {
        let api = start_mock_api().await;
        let client = client_for(&api, Some("rt_0"));

        assert_eq!(client.get("empty", QueryParams::new()).await.unwrap(), Value::Null);
        assert_eq!(client.get("text", QueryParams::new()).await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn error_envelopes_map_by_status() {
        let api = start_mock_api().await;
        let client = client_for(&api, Some("rt_0"));

        let err = client.get("bad", QueryParams::new()).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(err.message(), "Bad data");
        assert_eq!(err.code(), Some(7));
        assert_eq!(err.status(), Some(400));

        let err = client.get("missing", QueryParams::new()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let err = client.get("limited", QueryParams::new()).await.unwrap_err();
        assert!(matches!(err, Error::RateLimit(_)));
        assert_eq!(err.status(), Some(429));

        let err = client.get("weird", QueryParams::new()).await.unwrap_err();
        assert!(matches!(err, Error::Api(_)));
        assert_eq!(err.message(), "Unknown error occurred");
        assert_eq!(err.details(), Some(&json!({"oops": 1})));
    }

    #[tokio::test]
    async fn non_json_error_uses_status_text() {
        let api = start_mock_api().await;
        let client = client_for(&api, Some("rt_0"));

        let err = client.get("gateway", QueryParams::new()).await.unwrap_err();
        assert!(matches!(err, Error::Api(_)));
        assert_eq!(err.message(), "HTTP 502: Bad Gateway");
        assert_eq!(err.status(), Some(502));
        assert_eq!(err.details(), Some(&json!("<html>bad gateway</html>")));
    }

    #[tokio::test]
    async fn unauthorized_refreshes_once_and_retries() {
        let api = start_mock_api().await;
        let client = client_for(&api, Some("rt_0"));

        let body = client.get("protected", QueryParams::new()).await.unwrap();
        assert_eq!(body, json!({"ok": true}));
        assert_eq!(api.state.token_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.state.api_calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            client.auth().get_valid_access_token().await.unwrap(),
            "at_1"
        );
    }

    #[tokio::test]
    async fn concurrent_unauthorized_requests_share_one_refresh() {
        let api = start_mock_api().await;
        let client = client_for(&api, Some("rt_0"));

        let (a, b) = tokio::join!(
            client.get("protected", QueryParams::new()),
            client.get("protected", QueryParams::new()),
        );
        assert_eq!(a.unwrap(), json!({"ok": true}));
        assert_eq!(b.unwrap(), json!({"ok": true}));
        assert_eq!(api.state.token_calls.load(Ordering::SeqCst), 1);

        let status = client.auth().token_status();
        assert!(status.has_access_token);
        assert!(status.has_refresh_token);
        assert!(!status.refresh_in_flight);
    }

    #[tokio::test]
    async fn spawned_unauthorized_requests_keep_the_session() {
        let api = start_mock_api().await;
        let client = client_for(&api, Some("rt_0"));

        let tasks = (0..4).map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.get("protected", QueryParams::new()).await })
        });
        for result in futures_util::future::join_all(tasks).await {
            assert_eq!(result.unwrap().unwrap(), json!({"ok": true}));
        }
        assert_eq!(api.state.token_calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.auth().get_valid_access_token().await.unwrap(), "at_1");
    }

    #[tokio::test]
    async fn unauthorized_recovery_joins_a_due_refresh() {
        let api = start_mock_api().await;
        let client = client_for(&api, Some("rt_0"));
        client.auth().set_tokens(&fortnox_auth::TokenResponse {
            access_token: "at_0".into(),
            refresh_token: "rt_0".into(),
            scope: "article".into(),
            expires_in: 60,
            token_type: "Bearer".into(),
        });

        // The first request refreshes up front, the recovery joins it.
        let (request, recovery) = tokio::join!(
            client.get("protected", QueryParams::new()),
            client.auth().refresh_rejected_token("at_0"),
        );
        assert_eq!(request.unwrap(), json!({"ok": true}));
        recovery.unwrap();
        assert_eq!(api.state.token_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.state.api_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_that_fails_again_is_classified_normally() {
        let api = start_mock_api().await;
        let client = client_for(&api, Some("rt_0"));

        let err = client.get("always-401", QueryParams::new()).await.unwrap_err();
        assert!(err.requires_reauthentication());
        assert_eq!(err.message(), "Unauthorized");
        assert_eq!(api.state.token_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.state.api_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rejected_refresh_reports_original_response() {
        let api = start_mock_api().await;
        api.state.reject_refresh.store(true, Ordering::SeqCst);
        let client = client_for(&api, Some("rt_0"));

        let err = client.get("always-401", QueryParams::new()).await.unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
        assert_eq!(err.message(), "Unauthorized");
        assert_eq!(err.code(), Some(2000310));
        assert_eq!(api.state.api_calls.load(Ordering::SeqCst), 1);
        assert!(!client.auth().token_status().has_access_token);
    }

    #[tokio::test]
    async fn missing_refresh_token_reports_original_response() {
        let api = start_mock_api().await;
        let client = client_for(&api, None);

        let err = client
            .get("forbidden-text", QueryParams::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
        assert_eq!(err.message(), "Authentication failed: Forbidden");
        assert_eq!(err.status(), Some(403));
        assert_eq!(err.details(), Some(&json!("nope")));
        assert_eq!(api.state.token_calls.load(Ordering::SeqCst), 0);
        assert_eq!(api.state.api_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transport_failure_is_api_error_with_cause() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = Config::builder("client-id", "client-secret", "https://app.example/callback")
            .api_base_url(format!("http://{addr}/3"))
            .initial_tokens("at_0", "rt_0")
            .build();
        let client =
            HttpClient::new(AuthManager::new(config).unwrap(), reqwest::Client::new()).unwrap();

        let err = client.get("articles", QueryParams::new()).await.unwrap_err();
        assert!(matches!(err, Error::Api(_)));
        assert!(err.info().cause.is_some());
        assert!(err.message().starts_with("Request failed"));
    }

    #[tokio::test]
    async fn refresh_transport_failure_keeps_cause() {
        let api = start_mock_api().await;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead = listener.local_addr().unwrap();
        drop(listener);

        let config = Config::builder("client-id", "client-secret", "https://app.example/callback")
            .api_base_url(format!("{}/3", api.addr))
            .oauth_base_url(format!("http://{dead}"))
            .build();
        let client =
            HttpClient::new(AuthManager::new(config).unwrap(), reqwest::Client::new()).unwrap();
        client.auth().set_tokens(&fortnox_auth::TokenResponse {
            access_token: "at_0".into(),
            refresh_token: "rt_0".into(),
            scope: "article".into(),
            expires_in: 60,
            token_type: "Bearer".into(),
        });

        let err = client.get("echo/articles", QueryParams::new()).await.unwrap_err();
        assert!(matches!(err, Error::Api(_)));
        assert!(err.info().cause.is_some());
        assert_eq!(api.state.api_calls.load(Ordering::SeqCst), 0);
        assert!(client.auth().token_status().has_refresh_token);
    }

    #[tokio::test]
    async fn unauthenticated_client_fails_before_sending() {
        let api = start_mock_api().await;
        let config = Config::builder("client-id", "client-secret", "https://app.example/callback")
            .api_base_url(format!("{}/3", api.addr))
            .build();
        let client =
            HttpClient::new(AuthManager::new(config).unwrap(), reqwest::Client::new()).unwrap();

        let err = client.get("echo/articles", QueryParams::new()).await.unwrap_err();
        assert!(err.requires_reauthentication());
        assert_eq!(api.state.api_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn url_joining_normalises_slashes() {
        for base in ["https://api.fortnox.se/3", "https://api.fortnox.se/3/"] {
            let config = Config::builder("id", "secret", "https://app.example/callback")
                .api_base_url(base)
                .build();
            let client =
                HttpClient::new(AuthManager::new(config).unwrap(), reqwest::Client::new()).unwrap();
            for path in ["articles/A1", "/articles/A1"] {
                let url = client.build_url(path, &QueryParams::new()).unwrap();
                assert_eq!(url.as_str(), "https://api.fortnox.se/3/articles/A1");
            }
        }
    }

    #[test]
    fn hostile_paths_never_leave_the_base_url() {
        let config = Config::builder("id", "secret", "https://app.example/callback").build();
        let client =
            HttpClient::new(AuthManager::new(config).unwrap(), reqwest::Client::new()).unwrap();

        for path in [
            "http://evil.example/steal",
            "//evil.example/steal",
            "../2/other",
            "articles/../../oauth-v1/token",
            "articles/%2e%2e/x",
            "articles/%2E./x",
            "./articles",
            "articles//A1",
            "articles\\..\\x",
            "articles/.\t./x",
            "articles?x=1",
            "articles#frag",
            "",
        ] {
            let err = client.build_url(path, &QueryParams::new()).unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "path {path:?}");
        }
    }

    #[test]
    fn encoded_slashes_stay_inside_one_segment() {
        let config = Config::builder("id", "secret", "https://app.example/callback").build();
        let client =
            HttpClient::new(AuthManager::new(config).unwrap(), reqwest::Client::new()).unwrap();
        let url = client
            .build_url("articles/http%3A%2F%2Fevil.example", &QueryParams::new())
            .unwrap();
        assert_eq!(url.host_str(), Some("api.fortnox.se"));
        assert_eq!(url.path(), "/3/articles/http%3A%2F%2Fevil.example");
    }

    #[test]
    fn query_values_are_encoded() {
        let config = Config::builder("id", "secret", "https://app.example/callback").build();
        let client =
            HttpClient::new(AuthManager::new(config).unwrap(), reqwest::Client::new()).unwrap();
        let url = client
            .build_url("customers", &QueryParams::new().with("name", "Acme & Co"))
            .unwrap();
        assert_eq!(url.query(), Some("name=Acme+%26+Co"));
    }
}
