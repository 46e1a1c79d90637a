//! On-disk token persistence
//!
//! `TokenFile` keeps the latest tokens in a JSON file so a restarted process
//! can skip the browser flow. Writes go to a temp file that is renamed over
//! the target, so a crash never leaves a truncated file. Permissions are 0600
//! since the file holds live credentials.
//!
//! Plug it in as the `TokenListener`: every issued token is saved, and an
//! expired refresh token deletes the file.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::listener::{ListenerFuture, TokenListener};
use crate::token::TokenResponse;

/// Tokens as persisted. `expires_at` is a unix timestamp in milliseconds
/// (absolute, computed from `expires_in` at save time).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTokens {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub scope: String,
    pub expires_at: u64,
}

impl StoredTokens {
    pub fn from_response(tokens: &TokenResponse, now_millis: u64) -> Self {
        Self {
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            scope: tokens.scope.clone(),
            expires_at: now_millis.saturating_add(tokens.expires_in.saturating_mul(1000)),
        }
    }

    /// Rebuild a token response whose `expires_in` is the time remaining at
    /// `now_millis` (zero once past), ready for `AuthManager::set_tokens`.
    pub fn to_response(&self, now_millis: u64) -> TokenResponse {
        TokenResponse {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            scope: self.scope.clone(),
            expires_in: self.expires_at.saturating_sub(now_millis) / 1000,
            token_type: "Bearer".to_string(),
        }
    }
}

/// JSON token file, usable as a `TokenListener`.
#[derive(Debug, Clone)]
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read stored tokens. A missing file is `Ok(None)`.
    pub async fn load(&self) -> Result<Option<StoredTokens>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "token file not found, starting unauthenticated");
                return Ok(None);
            }
            Err(e) => return Err(Error::Storage(format!("reading token file: {e}"))),
        };
        let stored: StoredTokens = serde_json::from_str(&contents)
            .map_err(|e| Error::Storage(format!("parsing token file: {e}")))?;
        info!(path = %self.path.display(), "loaded stored tokens");
        Ok(Some(stored))
    }

    pub async fn save(&self, tokens: &TokenResponse) -> Result<()> {
        let stored = StoredTokens::from_response(tokens, unix_millis());
        write_atomic(&self.path, &stored).await
    }

    /// Delete the file. Deleting a missing file is not an error.
    pub async fn remove(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "removed token file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!("removing token file: {e}"))),
        }
    }
}

impl TokenListener for TokenFile {
    fn on_token_refresh<'a>(&'a self, tokens: &'a TokenResponse) -> ListenerFuture<'a> {
        Box::pin(async move {
            if let Err(e) = self.save(tokens).await {
                warn!(path = %self.path.display(), error = %e, "failed to persist tokens");
            }
        })
    }

    fn on_token_expire(&self) -> ListenerFuture<'_> {
        Box::pin(async move {
            if let Err(e) = self.remove().await {
                warn!(path = %self.path.display(), error = %e, "failed to remove expired tokens");
            }
        })
    }
}

/// Current wall-clock time in unix milliseconds.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

async fn write_atomic(path: &Path, data: &StoredTokens) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Storage(format!("serializing tokens: {e}")))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let tmp_path = dir.join(format!(".fortnox-tokens.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Storage(format!("writing temp token file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Storage(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Storage(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), "persisted tokens");
    Ok(())
}
