//! `/orders`

use reqwest::Method;
use serde_json::Value;

use super::{Collection, require_fields};
use crate::error::Result;
use crate::http::HttpClient;
use crate::query::QueryParams;

/// Sales orders.
///
/// Orders are never deleted, only cancelled. PDF endpoints (`print`,
/// `preview`) are not exposed.
#[derive(Debug, Clone)]
pub struct Orders {
    collection: Collection,
}

impl Orders {
    pub(crate) fn new(http: HttpClient) -> Self {
        Self {
            collection: Collection::new(http, "orders", "Order", "Document number"),
        }
    }

    /// List orders. `filter` accepts `cancelled`, `expired`, `invoicecreated`,
    /// `invoicenotcreated`.
    pub async fn list(&self, query: QueryParams) -> Result<Value> {
        self.collection.list(query).await
    }

    pub async fn get(&self, document_number: &str) -> Result<Value> {
        self.collection.get(document_number).await
    }

    /// Create an order. `CustomerNumber` is required.
    pub async fn create(&self, order: Value) -> Result<Value> {
        require_fields(&order, &["CustomerNumber"])?;
        self.collection.create(order).await
    }

    pub async fn update(&self, document_number: &str, order: Value) -> Result<Value> {
        self.collection.update(document_number, order).await
    }

    pub async fn cancel(&self, document_number: &str) -> Result<Value> {
        self.collection
            .entity_action(Method::PUT, document_number, "cancel")
            .await
    }

    /// Turn the order into an invoice. Returns the raw response, which
    /// carries the new invoice reference.
    pub async fn create_invoice(&self, document_number: &str) -> Result<Value> {
        self.collection
            .action(Method::PUT, document_number, "createinvoice")
            .await
    }

    /// Send the order to the customer's e-mail address.
    pub async fn send_email(&self, document_number: &str) -> Result<Value> {
        self.collection
            .entity_action(Method::GET, document_number, "email")
            .await
    }

    /// Mark the order as printed externally.
    pub async fn external_print(&self, document_number: &str) -> Result<Value> {
        self.collection
            .entity_action(Method::GET, document_number, "externalprint")
            .await
    }
}
