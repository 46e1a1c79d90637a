//! `/customers`

use serde_json::Value;

use super::{Collection, require_fields};
use crate::error::Result;
use crate::http::HttpClient;
use crate::query::QueryParams;

/// Customer register.
#[derive(Debug, Clone)]
pub struct Customers {
    collection: Collection,
}

impl Customers {
    pub(crate) fn new(http: HttpClient) -> Self {
        Self {
            collection: Collection::new(http, "customers", "Customer", "Customer number"),
        }
    }

    pub async fn list(&self, query: QueryParams) -> Result<Value> {
        self.collection.list(query).await
    }

    pub async fn get(&self, customer_number: &str) -> Result<Value> {
        self.collection.get(customer_number).await
    }

    /// Create a customer. `Name` is required.
    pub async fn create(&self, customer: Value) -> Result<Value> {
        require_fields(&customer, &["Name"])?;
        self.collection.create(customer).await
    }

    pub async fn update(&self, customer_number: &str, customer: Value) -> Result<Value> {
        self.collection.update(customer_number, customer).await
    }

    pub async fn delete(&self, customer_number: &str) -> Result<()> {
        self.collection.delete(customer_number).await
    }
}
