//! Token endpoint payloads and the in-memory token state
//!
//! `TokenState` is plain data plus derived predicates. It is owned by an
//! `AuthManager` and only ever mutated through it; nothing here performs I/O.
//! Expiry is tracked with `tokio::time::Instant` so tests can drive the clock
//! with `tokio::time::pause()`/`advance()`.

use futures_util::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant};

use crate::constants::{MAX_TOKEN_LIFETIME, REFRESH_MARGIN};
use crate::error::Result;

/// Response from the token endpoint for both code exchange and refresh.
///
/// `expires_in` is a delta in seconds from the response time; `TokenState`
/// turns it into an absolute deadline when the tokens are stored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub scope: String,
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: String,
}

/// Handle to the single in-flight refresh. Every waiter polls a clone.
pub(crate) type SharedRefresh = Shared<BoxFuture<'static, Result<()>>>;

/// Current access/refresh tokens and their expiry.
#[derive(Default)]
pub struct TokenState {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<Instant>,
    refresh_in_flight: Option<SharedRefresh>,
}

impl TokenState {
    /// Seed with externally stored tokens. No expiry is known for them.
    pub fn new(access_token: Option<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.filter(|t| !t.is_empty()),
            refresh_token: refresh_token.filter(|t| !t.is_empty()),
            expires_at: None,
            refresh_in_flight: None,
        }
    }

    /// Replace both tokens and the expiry in one step. Lifetimes longer than
    /// `MAX_TOKEN_LIFETIME` are capped.
    pub fn set_tokens(&mut self, tokens: &TokenResponse) {
        let lifetime = Duration::from_secs(tokens.expires_in).min(MAX_TOKEN_LIFETIME);
        self.access_token = Some(tokens.access_token.clone());
        self.refresh_token = Some(tokens.refresh_token.clone());
        self.expires_at = Some(Instant::now() + lifetime);
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    /// An unknown expiry counts as expired.
    pub fn is_access_token_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Instant::now() >= expires_at,
            None => true,
        }
    }

    /// True when an expiry and a refresh token exist and the token expires
    /// within `REFRESH_MARGIN`. Without a refresh token nothing can be
    /// refreshed, so this stays false even for an expired token.
    pub fn should_refresh_token(&self) -> bool {
        match (self.expires_at, &self.refresh_token) {
            (Some(expires_at), Some(_)) => Instant::now() + REFRESH_MARGIN >= expires_at,
            _ => false,
        }
    }

    /// Drop all tokens and the expiry. The in-flight slot is left to the
    /// refresh that owns it; its release guard clears it on completion.
    pub fn clear(&mut self) {
        self.access_token = None;
        self.refresh_token = None;
        self.expires_at = None;
    }

    pub(crate) fn refresh_in_flight(&self) -> Option<SharedRefresh> {
        self.refresh_in_flight.clone()
    }

    pub(crate) fn set_refresh_in_flight(&mut self, handle: Option<SharedRefresh>) {
        self.refresh_in_flight = handle;
    }

    pub fn status(&self) -> TokenStatus {
        TokenStatus {
            has_access_token: self.access_token.is_some(),
            has_refresh_token: self.refresh_token.is_some(),
            access_token_expired: self.is_access_token_expired(),
            refresh_due: self.should_refresh_token(),
            refresh_in_flight: self.refresh_in_flight.is_some(),
            expires_in_secs: self
                .expires_at
                .map(|at| at.saturating_duration_since(Instant::now()).as_secs()),
        }
    }
}

impl std::fmt::Debug for TokenState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenState")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .field("refresh_in_flight", &self.refresh_in_flight.is_some())
            .finish()
    }
}

/// Read-only snapshot of `TokenState`, safe to log or serve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenStatus {
    pub has_access_token: bool,
    pub has_refresh_token: bool,
    pub access_token_expired: bool,
    pub refresh_due: bool,
    pub refresh_in_flight: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_secs: Option<u64>,
}
