//! Fortnox REST API client
//!
//! `FortnoxClient` bundles the OAuth token lifecycle from `fortnox-auth`
//! with an authenticated request layer and thin resource façades:
//!
//! - `http`: token acquisition, request building, response classification,
//!   one refresh-and-retry on 401/403
//! - `error`: the typed error taxonomy every call returns
//! - `resources`: articles, customers, orders, invoices, price lists, prices
//!
//! ```no_run
//! # async fn run() -> fortnox_client::Result<()> {
//! use fortnox_client::{Config, FortnoxClient, QueryParams};
//!
//! let config = Config::builder("client-id", "client-secret", "https://app.example/callback")
//!     .initial_tokens("access", "refresh")
//!     .build();
//! let client = FortnoxClient::new(config)?;
//! let articles = client
//!     .articles()
//!     .list(QueryParams::new().with("limit", 100))
//!     .await?;
//! println!("{}", articles["MetaInformation"]);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod http;
pub mod metrics;
pub mod query;
pub mod resources;

pub use client::FortnoxClient;
pub use error::{Error, ErrorInfo, Result};
pub use fortnox_auth::{AccountType, AuthManager, AuthParams, Config, TokenListener, TokenResponse};
pub use http::{HttpClient, RequestOptions};
pub use query::QueryParams;
