//! Client configuration
//!
//! Built once with `Config::builder` and never mutated afterwards. The client
//! secret is wrapped in `common::Secret` so it never shows up in Debug output
//! or logs.

use std::fmt;
use std::sync::Arc;

use common::Secret;
use reqwest::Url;

use crate::constants::{DEFAULT_API_BASE_URL, DEFAULT_OAUTH_BASE_URL};
use crate::error::{Error, Result};
use crate::listener::TokenListener;

/// Immutable client configuration.
#[derive(Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub api_base_url: String,
    pub oauth_base_url: String,
    pub initial_access_token: Option<String>,
    pub initial_refresh_token: Option<String>,
    pub listener: Option<Arc<dyn TokenListener>>,
}

impl Config {
    pub fn builder(
        client_id: impl Into<String>,
        client_secret: impl Into<Secret<String>>,
        redirect_uri: impl Into<String>,
    ) -> ConfigBuilder {
        ConfigBuilder {
            config: Config {
                client_id: client_id.into(),
                client_secret: client_secret.into(),
                redirect_uri: redirect_uri.into(),
                scopes: Vec::new(),
                api_base_url: DEFAULT_API_BASE_URL.to_string(),
                oauth_base_url: DEFAULT_OAUTH_BASE_URL.to_string(),
                initial_access_token: None,
                initial_refresh_token: None,
                listener: None,
            },
        }
    }

    /// Check the required fields.
    ///
    /// Client id, secret, and redirect URI must be non-empty, and the redirect
    /// URI must parse as an absolute URL.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(Error::InvalidConfig("client_id is required".into()));
        }
        if self.client_secret.is_blank() {
            return Err(Error::InvalidConfig("client_secret is required".into()));
        }
        if self.redirect_uri.trim().is_empty() {
            return Err(Error::InvalidConfig("redirect_uri is required".into()));
        }
        Url::parse(&self.redirect_uri).map_err(|e| {
            Error::InvalidConfig(format!("redirect_uri must be a valid URL: {e}"))
        })?;
        Url::parse(&self.oauth_base_url).map_err(|e| {
            Error::InvalidConfig(format!("oauth_base_url must be a valid URL: {e}"))
        })?;
        Url::parse(&self.api_base_url).map_err(|e| {
            Error::InvalidConfig(format!("api_base_url must be a valid URL: {e}"))
        })?;
        Ok(())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret)
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("api_base_url", &self.api_base_url)
            .field("oauth_base_url", &self.oauth_base_url)
            .field("initial_access_token", &self.initial_access_token.is_some())
            .field("initial_refresh_token", &self.initial_refresh_token.is_some())
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

/// Builder for `Config`.
#[must_use]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Default scopes for authorization URLs that don't name their own.
    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn oauth_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.oauth_base_url = url.into();
        self
    }

    /// Tokens obtained in an earlier session.
    pub fn initial_tokens(
        mut self,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        self.config.initial_access_token = Some(access_token.into());
        self.config.initial_refresh_token = Some(refresh_token.into());
        self
    }

    pub fn initial_access_token(mut self, access_token: impl Into<String>) -> Self {
        self.config.initial_access_token = Some(access_token.into());
        self
    }

    pub fn listener(mut self, listener: Arc<dyn TokenListener>) -> Self {
        self.config.listener = Some(listener);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

/// Kind of Fortnox account the authorization is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountType {
    /// Integration acting as a service account instead of a user.
    Service,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Service => "service",
        }
    }
}

/// Per-call overrides for the authorization URL.
#[derive(Debug, Clone, Default)]
pub struct AuthParams {
    pub scopes: Option<Vec<String>>,
    pub account_type: Option<AccountType>,
}
