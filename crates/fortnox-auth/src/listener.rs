//! Token lifecycle callbacks
//!
//! Applications persist tokens or alert users by implementing
//! `TokenListener`. Both hooks are awaited by the `AuthManager` before the
//! triggering operation returns.

use std::future::Future;
use std::pin::Pin;

use crate::token::TokenResponse;

/// Boxed future returned by listener hooks.
pub type ListenerFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Receives token issuance and expiry events.
///
/// Uses `Pin<Box<dyn Future>>` return types so listeners can be stored as
/// `Arc<dyn TokenListener>`.
pub trait TokenListener: Send + Sync {
    /// Called after every successful code exchange or refresh with the tokens
    /// that were just stored.
    fn on_token_refresh<'a>(&'a self, tokens: &'a TokenResponse) -> ListenerFuture<'a> {
        let _ = tokens;
        Box::pin(async {})
    }

    /// Called after a refresh was rejected and all tokens were cleared. The
    /// user has to go through the authorization flow again.
    fn on_token_expire(&self) -> ListenerFuture<'_> {
        Box::pin(async {})
    }
}
