//! `FortnoxClient`: one authenticated session with the API
//!
//! Owns an `AuthManager` and the `HttpClient` built on it. Resource
//! accessors are cheap; every façade shares the same token state.

use fortnox_auth::{AuthManager, Config};

use crate::error::Result;
use crate::http::HttpClient;
use crate::resources::{Articles, Customers, Invoices, Orders, PriceLists, Prices};

#[derive(Debug, Clone)]
pub struct FortnoxClient {
    http: HttpClient,
}

impl FortnoxClient {
    /// Validate `config` and build a client. Configuration problems are
    /// reported as `Error::Validation`.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_http_client(config, reqwest::Client::new())
    }

    /// Same as `new` with a caller-supplied `reqwest::Client`, e.g. one with
    /// a request timeout. It is used for both token and API calls.
    pub fn with_http_client(config: Config, http: reqwest::Client) -> Result<Self> {
        let auth = AuthManager::with_http_client(config, http.clone())?;
        let http = HttpClient::new(auth, http)?;
        Ok(Self { http })
    }

    /// Authorization flow and token state.
    pub fn auth(&self) -> &AuthManager {
        self.http.auth()
    }

    /// Raw request access for endpoints without a façade.
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub fn articles(&self) -> Articles {
        Articles::new(self.http.clone())
    }

    pub fn customers(&self) -> Customers {
        Customers::new(self.http.clone())
    }

    pub fn orders(&self) -> Orders {
        Orders::new(self.http.clone())
    }

    pub fn invoices(&self) -> Invoices {
        Invoices::new(self.http.clone())
    }

    pub fn price_lists(&self) -> PriceLists {
        PriceLists::new(self.http.clone())
    }

    pub fn prices(&self) -> Prices {
        Prices::new(self.http.clone())
    }
}
