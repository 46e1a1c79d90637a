//! Fortnox OAuth endpoints and token lifecycle constants
//!
//! The OAuth server lives on `apps.fortnox.se`; the resource API on
//! `api.fortnox.se/3`. Both hosts can be overridden through `Config` for
//! staging environments and tests.

use std::time::Duration;

/// Default host serving `/oauth-v1/auth` and `/oauth-v1/token`.
pub const DEFAULT_OAUTH_BASE_URL: &str = "https://apps.fortnox.se";

/// Default resource API base URL (version 3 of the REST API).
pub const DEFAULT_API_BASE_URL: &str = "https://api.fortnox.se/3";

/// Path of the browser-facing authorization endpoint.
pub const AUTHORIZE_PATH: &str = "/oauth-v1/auth";

/// Path of the server-to-server token endpoint (code exchange and refresh).
pub const TOKEN_PATH: &str = "/oauth-v1/token";

/// Scopes requested when neither the call nor the config names any.
pub const DEFAULT_SCOPES: &[&str] = &["article"];

/// How long an authorization `state` value stays redeemable.
pub const STATE_TTL: Duration = Duration::from_secs(10 * 60);

/// Refresh this long before the access token actually expires.
pub const REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

/// Upper bound applied to a token's advertised lifetime.
pub const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Random bytes per `state` value (256 bits).
pub const STATE_BYTES: usize = 32;
