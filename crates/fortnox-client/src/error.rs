//! Typed errors returned by every client call
//!
//! Each variant carries the same `ErrorInfo`: a message, the remote numeric
//! error code when Fortnox supplied one, the HTTP status, and the raw payload.
//! Callers match on the variant to tell "authorize again" apart from "fix the
//! request" and "try later".

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

/// Details shared by all error kinds.
#[derive(Debug, Clone, Default)]
pub struct ErrorInfo {
    pub message: String,
    /// Fortnox error code from `ErrorInformation.Code`.
    pub code: Option<i64>,
    pub status: Option<u16>,
    /// Raw error payload (parsed JSON or the response text as a string).
    pub details: Option<Value>,
    /// Underlying transport failure, if the request never got a response.
    pub cause: Option<Arc<reqwest::Error>>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(code) = self.code {
            write!(f, " (code {code})")?;
        }
        Ok(())
    }
}

/// Client error taxonomy.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Invalid callback state, failed code exchange or refresh, no token,
    /// or a 401/403 that a refresh could not fix.
    #[error("authentication error: {0}")]
    Authentication(ErrorInfo),

    /// Invalid client configuration or input, or a remote 400.
    #[error("validation error: {0}")]
    Validation(ErrorInfo),

    #[error("not found: {0}")]
    NotFound(ErrorInfo),

    #[error("rate limit exceeded: {0}")]
    RateLimit(ErrorInfo),

    /// Any other remote failure, unrecognised error payload, or transport error.
    #[error("API error: {0}")]
    Api(ErrorInfo),
}

impl Error {
    /// Authentication failure raised locally (status 401).
    pub fn authentication(message: impl Into<String>) -> Self {
        Error::Authentication(ErrorInfo::new(message).with_status(401))
    }

    /// Validation failure raised locally (status 400).
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(ErrorInfo::new(message).with_status(400))
    }

    /// Transport failure, keeping the `reqwest::Error` as the cause.
    pub fn transport(err: reqwest::Error) -> Self {
        Error::Api(ErrorInfo {
            message: format!("Request failed: {err}"),
            cause: Some(Arc::new(err)),
            ..ErrorInfo::default()
        })
    }

    /// Classify a JSON error body by HTTP status.
    ///
    /// Bodies shaped like `{"ErrorInformation": {"Message", "Code"}}` map to
    /// a typed variant; anything else becomes a generic `Api` error.
    pub fn from_error_body(status: u16, body: Value) -> Self {
        let envelope = match ErrorEnvelope::deserialize(&body) {
            Ok(envelope) => envelope.error_information,
            Err(_) => {
                return Error::Api(
                    ErrorInfo::new("Unknown error occurred")
                        .with_status(status)
                        .with_details(body),
                );
            }
        };

        let info = ErrorInfo::new(envelope.message)
            .with_code(envelope.code)
            .with_status(status)
            .with_details(body);

        match status {
            400 => Error::Validation(info),
            401 | 403 => Error::Authentication(info),
            404 => Error::NotFound(info),
            429 => Error::RateLimit(info),
            _ => Error::Api(info),
        }
    }

    pub fn info(&self) -> &ErrorInfo {
        match self {
            Error::Authentication(info)
            | Error::Validation(info)
            | Error::NotFound(info)
            | Error::RateLimit(info)
            | Error::Api(info) => info,
        }
    }

    pub fn message(&self) -> &str {
        &self.info().message
    }

    pub fn code(&self) -> Option<i64> {
        self.info().code
    }

    pub fn status(&self) -> Option<u16> {
        self.info().status
    }

    pub fn details(&self) -> Option<&Value> {
        self.info().details.as_ref()
    }

    /// True when the user has to go through the authorization flow again.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(self, Error::Authentication(_))
    }
}

impl From<fortnox_auth::Error> for Error {
    fn from(err: fortnox_auth::Error) -> Self {
        use fortnox_auth::Error as Auth;

        match &err {
            Auth::InvalidConfig(msg) => Error::validation(msg.clone()),
            Auth::Http(cause) => Error::Api(ErrorInfo {
                message: err.to_string(),
                cause: Some(cause.clone()),
                ..ErrorInfo::default()
            }),
            Auth::Storage(_) => Error::Api(ErrorInfo::new(err.to_string())),
            Auth::TokenExchange { body, .. } | Auth::RefreshRejected { body, .. } => {
                let details = serde_json::from_str(body)
                    .unwrap_or_else(|_| Value::String(body.clone()));
                Error::Authentication(
                    ErrorInfo::new(err.to_string())
                        .with_status(401)
                        .with_details(details),
                )
            }
            Auth::InvalidState
            | Auth::MissingRefreshToken
            | Auth::MissingAccessToken
            | Auth::InvalidTokenResponse(_) => Error::authentication(err.to_string()),
        }
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fortnox error payload: `{"ErrorInformation": {"Error", "Message", "Code"}}`.
///
/// Some endpoints answer with lowercase keys, hence the aliases.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(rename = "ErrorInformation")]
    error_information: ErrorInformation,
}

#[derive(Debug, Deserialize)]
struct ErrorInformation {
    #[serde(rename = "Message", alias = "message")]
    message: String,
    #[serde(rename = "Code", alias = "code")]
    code: i64,
    #[serde(rename = "Error", alias = "error", default)]
    #[allow(dead_code)]
    error: Option<i64>,
}
