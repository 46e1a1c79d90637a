//! Fortnox OAuth 2.0 authentication
//!
//! Authorization-code flow with refresh-token rotation for the Fortnox API.
//! Everything is instance-scoped: one `AuthManager` per client, holding the
//! token state and the pending authorization `state` values.
//!
//! Flow:
//! 1. `AuthManager::authorization_url()` issues a single-use `state` and the
//!    browser URL for `/oauth-v1/auth`
//! 2. The provider redirects back with `code` and `state`
//! 3. `AuthManager::exchange_code_for_token()` redeems the state and trades
//!    the code for tokens at `/oauth-v1/token`
//! 4. `AuthManager::get_valid_access_token()` hands out the access token,
//!    refreshing it (once, however many callers) five minutes before expiry
//! 5. A `TokenListener` (e.g. `TokenFile`) sees every issued token and every
//!    rejected refresh

pub mod config;
pub mod constants;
pub mod error;
pub mod listener;
pub mod manager;
pub mod state;
pub mod token;
pub mod token_file;

pub use config::{AccountType, AuthParams, Config, ConfigBuilder};
pub use error::{Error, Result};
pub use listener::{ListenerFuture, TokenListener};
pub use manager::{AuthManager, AuthorizationUrl};
pub use state::{PendingAuthorizations, generate_state};
pub use token::{TokenResponse, TokenState, TokenStatus};
pub use token_file::{StoredTokens, TokenFile, unix_millis};
