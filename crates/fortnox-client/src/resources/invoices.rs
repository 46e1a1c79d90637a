//! `/invoices`

use reqwest::Method;
use serde_json::Value;

use super::{Collection, require_fields};
use crate::error::Result;
use crate::http::HttpClient;
use crate::query::QueryParams;

/// Customer invoices. PDF endpoints are not exposed.
#[derive(Debug, Clone)]
pub struct Invoices {
    collection: Collection,
}

impl Invoices {
    pub(crate) fn new(http: HttpClient) -> Self {
        Self {
            collection: Collection::new(http, "invoices", "Invoice", "Document number"),
        }
    }

    /// List invoices. `filter` accepts `cancelled`, `fullypaid`, `unpaid`,
    /// `unpaidoverdue`, `unbooked`.
    pub async fn list(&self, query: QueryParams) -> Result<Value> {
        self.collection.list(query).await
    }

    pub async fn get(&self, document_number: &str) -> Result<Value> {
        self.collection.get(document_number).await
    }

    /// Create an invoice. `CustomerNumber` is required.
    pub async fn create(&self, invoice: Value) -> Result<Value> {
        require_fields(&invoice, &["CustomerNumber"])?;
        self.collection.create(invoice).await
    }

    pub async fn update(&self, document_number: &str, invoice: Value) -> Result<Value> {
        self.collection.update(document_number, invoice).await
    }

    pub async fn bookkeep(&self, document_number: &str) -> Result<Value> {
        self.put_action(document_number, "bookkeep").await
    }

    pub async fn cancel(&self, document_number: &str) -> Result<Value> {
        self.put_action(document_number, "cancel").await
    }

    /// Create a credit invoice for a booked invoice.
    pub async fn credit(&self, document_number: &str) -> Result<Value> {
        self.put_action(document_number, "credit").await
    }

    pub async fn send_email(&self, document_number: &str) -> Result<Value> {
        self.collection
            .entity_action(Method::GET, document_number, "email")
            .await
    }

    pub async fn external_print(&self, document_number: &str) -> Result<Value> {
        self.put_action(document_number, "externalprint").await
    }

    async fn put_action(&self, document_number: &str, action: &str) -> Result<Value> {
        self.collection
            .entity_action(Method::PUT, document_number, action)
            .await
    }
}
