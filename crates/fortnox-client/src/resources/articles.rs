//! `/articles`

use serde_json::Value;

use super::{Collection, require_fields};
use crate::error::Result;
use crate::http::HttpClient;
use crate::query::QueryParams;

/// Article register.
#[derive(Debug, Clone)]
pub struct Articles {
    collection: Collection,
}

impl Articles {
    pub(crate) fn new(http: HttpClient) -> Self {
        Self {
            collection: Collection::new(http, "articles", "Article", "Article number"),
        }
    }

    /// List articles. Filters (`articlenumber`, `description`, `sortby`,
    /// `page`, `limit`, ...) are passed through as-is.
    pub async fn list(&self, query: QueryParams) -> Result<Value> {
        self.collection.list(query).await
    }

    pub async fn get(&self, article_number: &str) -> Result<Value> {
        self.collection.get(article_number).await
    }

    /// Create an article. `Description` is required.
    pub async fn create(&self, article: Value) -> Result<Value> {
        require_fields(&article, &["Description"])?;
        self.collection.create(article).await
    }

    pub async fn update(&self, article_number: &str, article: Value) -> Result<Value> {
        self.collection.update(article_number, article).await
    }

    pub async fn delete(&self, article_number: &str) -> Result<()> {
        self.collection.delete(article_number).await
    }
}
