//! OAuth authorization-code and refresh-token lifecycle
//!
//! `AuthManager` owns the token state and the pending `state` values for one
//! client. It is cheap to clone (shared `Arc`) so the request layer and the
//! application can hold the same instance; there is no process-wide state.
//!
//! Refresh is single-flight: the first caller that finds the token due stores
//! a shared future in `TokenState`, later callers await a clone of it, and an
//! RAII guard inside the future empties the slot when the attempt finishes,
//! whether it succeeded, failed, or was dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures_util::FutureExt;
use reqwest::Url;
use reqwest::header::AUTHORIZATION;
use tracing::{debug, info, warn};

use crate::config::{AuthParams, Config};
use crate::constants::{AUTHORIZE_PATH, DEFAULT_SCOPES, TOKEN_PATH};
use crate::error::{Error, Result};
use crate::state::PendingAuthorizations;
use crate::token::{SharedRefresh, TokenResponse, TokenState, TokenStatus};

/// Authorization URL plus the `state` value embedded in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationUrl {
    pub url: String,
    pub state: String,
}

/// Coordinates authorization, code exchange, and token refresh.
#[derive(Clone)]
pub struct AuthManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    http: reqwest::Client,
    authorize_url: Url,
    token_url: Url,
    tokens: Mutex<TokenState>,
    pending: Mutex<PendingAuthorizations>,
}

/// What the token endpoint answered, when it answered at all.
enum TokenOutcome {
    Issued(TokenResponse),
    Rejected { status: u16, body: String },
}

impl AuthManager {
    /// Validate `config` and create a manager with a default HTTP client.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_http_client(config, reqwest::Client::new())
    }

    /// Same as `new` but reuses the caller's `reqwest::Client` (timeouts,
    /// proxies, connection pool).
    pub fn with_http_client(config: Config, http: reqwest::Client) -> Result<Self> {
        config.validate()?;
        let base = Url::parse(&config.oauth_base_url)
            .map_err(|e| Error::InvalidConfig(format!("oauth_base_url: {e}")))?;
        let authorize_url = base
            .join(AUTHORIZE_PATH)
            .map_err(|e| Error::InvalidConfig(format!("authorization endpoint: {e}")))?;
        let token_url = base
            .join(TOKEN_PATH)
            .map_err(|e| Error::InvalidConfig(format!("token endpoint: {e}")))?;

        let tokens = TokenState::new(
            config.initial_access_token.clone(),
            config.initial_refresh_token.clone(),
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                http,
                authorize_url,
                token_url,
                tokens: Mutex::new(tokens),
                pending: Mutex::new(PendingAuthorizations::default()),
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Build the URL the user's browser is sent to, recording a fresh
    /// single-use `state` for the callback. No network call.
    pub fn authorization_url(&self, params: &AuthParams) -> AuthorizationUrl {
        let state = lock(&self.inner.pending).issue();

        let scopes = match (&params.scopes, &self.inner.config.scopes) {
            (Some(scopes), _) => scopes.join(" "),
            (None, configured) if !configured.is_empty() => configured.join(" "),
            _ => DEFAULT_SCOPES.join(" "),
        };

        let mut url = self.inner.authorize_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.inner.config.client_id)
                .append_pair("response_type", "code")
                .append_pair("redirect_uri", &self.inner.config.redirect_uri)
                .append_pair("scope", &scopes)
                .append_pair("state", &state)
                .append_pair("access_type", "offline");
            if let Some(account_type) = params.account_type {
                query.append_pair("account_type", account_type.as_str());
            }
        }

        debug!(scope = %scopes, "authorization URL issued");
        AuthorizationUrl {
            url: url.into(),
            state,
        }
    }

    /// Redeem a `state` value returned on the callback. Single use.
    pub fn validate_state(&self, state: &str) -> bool {
        lock(&self.inner.pending).validate(state)
    }

    /// Exchange an authorization code for tokens and store them.
    pub async fn exchange_code_for_token(&self, code: &str, state: &str) -> Result<TokenResponse> {
        if !self.validate_state(state) {
            warn!("authorization callback with unknown or expired state");
            return Err(Error::InvalidState);
        }

        let redirect_uri = self.inner.config.redirect_uri.as_str();
        let outcome = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .await?;

        match outcome {
            TokenOutcome::Issued(tokens) => {
                self.store_tokens(&tokens).await;
                info!(scope = %tokens.scope, expires_in = tokens.expires_in, "authorization code exchanged");
                Ok(tokens)
            }
            TokenOutcome::Rejected { status, body } => {
                warn!(status, "token endpoint rejected authorization code");
                Err(Error::TokenExchange { status, body })
            }
        }
    }

    /// Refresh the access token unconditionally.
    ///
    /// A rejected refresh clears every stored token and notifies the
    /// listener; the user has to authorize again. Transport failures leave
    /// the stored tokens untouched.
    pub async fn refresh_access_token(&self) -> Result<TokenResponse> {
        let refresh_token = lock(&self.inner.tokens)
            .refresh_token()
            .map(str::to_owned)
            .ok_or(Error::MissingRefreshToken)?;

        let outcome = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
            ])
            .await;

        match outcome {
            Ok(TokenOutcome::Issued(tokens)) => {
                metrics::counter!("fortnox_token_refresh_total", "outcome" => "success")
                    .increment(1);
                self.store_tokens(&tokens).await;
                info!(expires_in = tokens.expires_in, "access token refreshed");
                Ok(tokens)
            }
            Ok(TokenOutcome::Rejected { status, body }) => {
                metrics::counter!("fortnox_token_refresh_total", "outcome" => "rejected")
                    .increment(1);
                warn!(status, "refresh token rejected, clearing stored tokens");
                lock(&self.inner.tokens).clear();
                if let Some(listener) = &self.inner.config.listener {
                    listener.on_token_expire().await;
                }
                Err(Error::RefreshRejected { status, body })
            }
            Err(e) => {
                metrics::counter!("fortnox_token_refresh_total", "outcome" => "error")
                    .increment(1);
                warn!(error = %e, "token refresh request failed");
                Err(e)
            }
        }
    }

    /// Current access token, refreshing first when it is about to expire.
    ///
    /// Concurrent callers share one refresh: whoever finds the slot empty
    /// starts it, everyone awaits the same handle and sees the same outcome.
    pub async fn get_valid_access_token(&self) -> Result<String> {
        let refresh = {
            let mut tokens = lock(&self.inner.tokens);
            if tokens.should_refresh_token() {
                debug!("access token due for refresh");
                Some(self.join_or_start_refresh(&mut tokens))
            } else {
                None
            }
        };

        if let Some(refresh) = refresh {
            refresh.await?;
        }

        lock(&self.inner.tokens)
            .access_token()
            .map(str::to_owned)
            .ok_or(Error::MissingAccessToken)
    }

    /// Refresh after the API rejected `rejected_token`, through the same
    /// single-flight slot as `get_valid_access_token`.
    ///
    /// A refresh already in flight is joined. If no refresh is running and
    /// the stored access token is no longer `rejected_token`, another caller
    /// has already replaced it and nothing is sent.
    pub async fn refresh_rejected_token(&self, rejected_token: &str) -> Result<()> {
        let refresh = {
            let mut tokens = lock(&self.inner.tokens);
            let replaced = tokens
                .access_token()
                .is_some_and(|current| current != rejected_token);
            if replaced && tokens.refresh_in_flight().is_none() {
                debug!("rejected access token already replaced");
                return Ok(());
            }
            self.join_or_start_refresh(&mut tokens)
        };
        refresh.await
    }

    /// Store tokens obtained elsewhere, e.g. restored from disk.
    pub fn set_tokens(&self, tokens: &TokenResponse) {
        lock(&self.inner.tokens).set_tokens(tokens);
    }

    /// Forget all tokens without notifying the listener.
    pub fn clear_tokens(&self) {
        lock(&self.inner.tokens).clear();
    }

    pub fn token_status(&self) -> TokenStatus {
        lock(&self.inner.tokens).status()
    }

    /// The in-flight refresh, or a new one installed in the slot. Called with
    /// the token lock held so check and install are one step.
    fn join_or_start_refresh(&self, tokens: &mut TokenState) -> SharedRefresh {
        if let Some(in_flight) = tokens.refresh_in_flight() {
            debug!("joining in-flight token refresh");
            return in_flight;
        }
        let handle = self.start_refresh();
        tokens.set_refresh_in_flight(Some(handle.clone()));
        handle
    }

    fn start_refresh(&self) -> SharedRefresh {
        let manager = self.clone();
        async move {
            let _release = RefreshRelease(&manager.inner.tokens);
            manager.refresh_access_token().await.map(|_| ())
        }
        .boxed()
        .shared()
    }

    async fn store_tokens(&self, tokens: &TokenResponse) {
        lock(&self.inner.tokens).set_tokens(tokens);
        if let Some(listener) = &self.inner.config.listener {
            listener.on_token_refresh(tokens).await;
        }
    }

    /// POST a grant to the token endpoint with HTTP Basic client credentials.
    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenOutcome> {
        let response = self
            .inner
            .http
            .post(self.inner.token_url.clone())
            .header(AUTHORIZATION, self.basic_credentials())
            .form(form)
            .send()
            .await
            .map_err(|e| Error::Http(Arc::new(e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Ok(TokenOutcome::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<TokenResponse>()
            .await
            .map(TokenOutcome::Issued)
            .map_err(|e| Error::InvalidTokenResponse(e.to_string()))
    }

    fn basic_credentials(&self) -> String {
        let config = &self.inner.config;
        let pair = format!("{}:{}", config.client_id, config.client_secret.expose());
        format!("Basic {}", STANDARD.encode(pair))
    }
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("client_id", &self.inner.config.client_id)
            .field("tokens", &self.token_status())
            .finish()
    }
}

/// Empties the in-flight refresh slot when dropped.
struct RefreshRelease<'a>(&'a Mutex<TokenState>);

impl Drop for RefreshRelease<'_> {
    fn drop(&mut self) {
        lock(self.0).set_refresh_in_flight(None);
    }
}

/// Lock a std mutex, recovering the data if a previous holder panicked.
/// None of the guarded state can be left half-updated by a panic.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
