//! Configuration types and loading
//!
//! Config path precedence: `--config` > `CONFIG_PATH` > `fortnox-connect.toml`.
//! The client secret is read from the `FORTNOX_CLIENT_SECRET` env var or
//! `client_secret_file`, never from the TOML itself.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::Secret;
use fortnox_auth::TokenListener;
use serde::Deserialize;

/// Env var holding the OAuth client secret.
pub const CLIENT_SECRET_ENV: &str = "FORTNOX_CLIENT_SECRET";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub fortnox: FortnoxConfig,
    pub server: ServerConfig,
}

/// Fortnox app registration
#[derive(Debug, Deserialize)]
pub struct FortnoxConfig {
    pub client_id: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// File containing the client secret (alternative to FORTNOX_CLIENT_SECRET)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    /// Must match the redirect URI registered for the app; normally
    /// `<public url>/auth/callback`.
    pub redirect_uri: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_oauth_base_url")]
    pub oauth_base_url: String,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Timeout for calls to Fortnox, token endpoint included.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Where issued tokens are persisted. Without it tokens live in memory
    /// only and a restart needs a new authorization.
    #[serde(default)]
    pub token_file: Option<PathBuf>,
}

fn default_api_base_url() -> String {
    fortnox_auth::constants::DEFAULT_API_BASE_URL.to_string()
}

fn default_oauth_base_url() -> String {
    fortnox_auth::constants::DEFAULT_OAUTH_BASE_URL.to_string()
}

fn default_max_connections() -> usize {
    256
}

fn default_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from a TOML file, then resolve the client secret.
    ///
    /// Client secret resolution order:
    /// 1. FORTNOX_CLIENT_SECRET env var
    /// 2. client_secret_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| common::Error::read(path, e))?;
        let mut config: Config =
            toml::from_str(&contents).map_err(|e| common::Error::parse(path, e))?;

        if config.fortnox.client_id.trim().is_empty() {
            return Err(common::Error::Config("client_id must not be empty".into()));
        }

        for (name, url) in [
            ("redirect_uri", &config.fortnox.redirect_uri),
            ("api_base_url", &config.fortnox.api_base_url),
            ("oauth_base_url", &config.fortnox.oauth_base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{name} must start with http:// or https://, got: {url}"
                )));
            }
        }

        if config.server.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if config.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        // Env var takes precedence over file
        if let Ok(secret) = std::env::var(CLIENT_SECRET_ENV) {
            config.fortnox.client_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.fortnox.client_secret_file {
            let secret = std::fs::read_to_string(secret_file)
                .map_err(|e| common::Error::read(secret_file, e))?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                config.fortnox.client_secret = Some(Secret::new(secret));
            }
        }

        if config
            .fortnox
            .client_secret
            .as_ref()
            .is_none_or(|s| s.is_blank())
        {
            return Err(common::Error::Config(format!(
                "client secret missing: set {CLIENT_SECRET_ENV} or client_secret_file"
            )));
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("fortnox-connect.toml")
    }

    /// Client configuration for the SDK, with `listener` notified of every
    /// token change.
    pub fn client_config(&self, listener: Option<Arc<dyn TokenListener>>) -> fortnox_auth::Config {
        let secret = self
            .fortnox
            .client_secret
            .clone()
            .unwrap_or_else(|| Secret::new(String::new()));
        let mut builder = fortnox_auth::Config::builder(
            self.fortnox.client_id.clone(),
            secret,
            self.fortnox.redirect_uri.clone(),
        )
        .scopes(self.fortnox.scopes.iter().cloned())
        .api_base_url(self.fortnox.api_base_url.clone())
        .oauth_base_url(self.fortnox.oauth_base_url.clone());
        if let Some(listener) = listener {
            builder = builder.listener(listener);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that mutate environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn valid_toml() -> &'static str {
        r#"
[fortnox]
client_id = "my-client"
redirect_uri = "http://localhost:8080/auth/callback"
scopes = ["article", "customer", "invoice"]

[server]
listen_addr = "127.0.0.1:8080"
token_file = "/var/lib/fortnox-connect/tokens.json"
"#
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_valid_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, valid_toml());

        unsafe { set_env(CLIENT_SECRET_ENV, "env-secret") };
        let config = Config::load(&path).unwrap();
        unsafe { remove_env(CLIENT_SECRET_ENV) };

        assert_eq!(config.fortnox.client_id, "my-client");
        assert_eq!(config.fortnox.scopes, vec!["article", "customer", "invoice"]);
        assert_eq!(config.fortnox.api_base_url, "https://api.fortnox.se/3");
        assert_eq!(config.fortnox.oauth_base_url, "https://apps.fortnox.se");
        assert_eq!(config.server.max_connections, 256);
        assert_eq!(config.server.timeout_secs, 30);
        assert_eq!(
            config.server.token_file,
            Some(PathBuf::from("/var/lib/fortnox-connect/tokens.json"))
        );
        assert_eq!(
            config.fortnox.client_secret.as_ref().unwrap().expose(),
            "env-secret"
        );
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(common::Error::Read { .. })));
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");
        assert!(matches!(Config::load(&path), Err(common::Error::Parse { .. })));
    }

    #[test]
    fn test_client_secret_from_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let secret_path = dir.path().join("client_secret");
        std::fs::write(&secret_path, "file-secret\n").unwrap();
        let path = write_config(
            &dir,
            &format!(
                r#"
[fortnox]
client_id = "my-client"
client_secret_file = "{}"
redirect_uri = "https://connect.example/auth/callback"

[server]
listen_addr = "127.0.0.1:8080"
"#,
                secret_path.display()
            ),
        );

        unsafe { remove_env(CLIENT_SECRET_ENV) };
        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.fortnox.client_secret.as_ref().unwrap().expose(),
            "file-secret"
        );
        assert!(config.server.token_file.is_none());
    }

    #[test]
    fn test_client_secret_env_overrides_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[fortnox]
client_id = "my-client"
client_secret_file = "/nonexistent/client_secret"
redirect_uri = "https://connect.example/auth/callback"

[server]
listen_addr = "127.0.0.1:8080"
"#,
        );

        unsafe { set_env(CLIENT_SECRET_ENV, "env-wins") };
        let config = Config::load(&path).unwrap();
        unsafe { remove_env(CLIENT_SECRET_ENV) };
        assert_eq!(
            config.fortnox.client_secret.as_ref().unwrap().expose(),
            "env-wins"
        );
    }

    #[test]
    fn test_missing_client_secret_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, valid_toml());

        unsafe { remove_env(CLIENT_SECRET_ENV) };
        let err = Config::load(&path).unwrap_err().to_string();
        assert!(err.contains(CLIENT_SECRET_ENV), "got: {err}");
    }

    #[test]
    fn test_unreadable_client_secret_file_names_path() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[fortnox]
client_id = "my-client"
client_secret_file = "/nonexistent/client_secret"
redirect_uri = "https://connect.example/auth/callback"

[server]
listen_addr = "127.0.0.1:8080"
"#,
        );

        unsafe { remove_env(CLIENT_SECRET_ENV) };
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, common::Error::Read { .. }));
        assert!(err.to_string().contains("/nonexistent/client_secret"));
    }

    #[test]
    fn test_blank_client_secret_file_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let secret_path = dir.path().join("client_secret");
        std::fs::write(&secret_path, "  \n").unwrap();
        let path = write_config(
            &dir,
            &format!(
                r#"
[fortnox]
client_id = "my-client"
client_secret_file = "{}"
redirect_uri = "https://connect.example/auth/callback"

[server]
listen_addr = "127.0.0.1:8080"
"#,
                secret_path.display()
            ),
        );

        unsafe { remove_env(CLIENT_SECRET_ENV) };
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_redirect_uri_without_scheme_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[fortnox]
client_id = "my-client"
redirect_uri = "localhost:8080/auth/callback"

[server]
listen_addr = "127.0.0.1:8080"
"#,
        );

        unsafe { set_env(CLIENT_SECRET_ENV, "secret") };
        let result = Config::load(&path);
        unsafe { remove_env(CLIENT_SECRET_ENV) };
        let err = result.unwrap_err().to_string();
        assert!(err.contains("redirect_uri must start with http"), "got: {err}");
    }

    #[test]
    fn test_zero_limits_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        unsafe { set_env(CLIENT_SECRET_ENV, "secret") };

        for setting in ["max_connections = 0", "timeout_secs = 0"] {
            let path = write_config(
                &dir,
                &format!(
                    r#"
[fortnox]
client_id = "my-client"
redirect_uri = "http://localhost:8080/auth/callback"

[server]
listen_addr = "127.0.0.1:8080"
{setting}
"#
                ),
            );
            assert!(Config::load(&path).is_err(), "{setting} must be rejected");
        }
        unsafe { remove_env(CLIENT_SECRET_ENV) };
    }

    #[test]
    fn test_resolve_path_cli_overrides_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/should-lose.toml") };
        let path = Config::resolve_path(Some("/cli/wins.toml"));
        assert_eq!(path, PathBuf::from("/cli/wins.toml"));
        assert_eq!(Config::resolve_path(None), PathBuf::from("/env/should-lose.toml"));
        unsafe { remove_env("CONFIG_PATH") };
    }

    #[test]
    fn test_resolve_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CONFIG_PATH") };
        assert_eq!(Config::resolve_path(None), PathBuf::from("fortnox-connect.toml"));
    }

    #[test]
    fn test_client_config_carries_settings() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, valid_toml());
        unsafe { set_env(CLIENT_SECRET_ENV, "env-secret") };
        let config = Config::load(&path).unwrap();
        unsafe { remove_env(CLIENT_SECRET_ENV) };

        let client = config.client_config(None);
        assert_eq!(client.client_id, "my-client");
        assert_eq!(client.client_secret.expose(), "env-secret");
        assert_eq!(client.scopes, vec!["article", "customer", "invoice"]);
        assert!(client.validate().is_ok());
    }
}
