//! `/pricelists`

use serde_json::Value;

use super::{Collection, require_fields};
use crate::error::Result;
use crate::http::HttpClient;
use crate::query::QueryParams;

#[derive(Debug, Clone)]
pub struct PriceLists {
    collection: Collection,
}

impl PriceLists {
    pub(crate) fn new(http: HttpClient) -> Self {
        Self {
            collection: Collection::new(http, "pricelists", "PriceList", "Price list code"),
        }
    }

    pub async fn list(&self, query: QueryParams) -> Result<Value> {
        self.collection.list(query).await
    }

    pub async fn get(&self, code: &str) -> Result<Value> {
        self.collection.get(code).await
    }

    /// Create a price list. `Code` and `Description` are required.
    pub async fn create(&self, price_list: Value) -> Result<Value> {
        require_fields(&price_list, &["Code", "Description"])?;
        self.collection.create(price_list).await
    }

    pub async fn update(&self, code: &str, price_list: Value) -> Result<Value> {
        self.collection.update(code, price_list).await
    }

    pub async fn delete(&self, code: &str) -> Result<()> {
        self.collection.delete(code).await
    }
}

#[cfg(test)]
mod tests {
    use crate::Error;
    use crate::resources::test_support;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn crud_round() {
        let api = test_support::start().await;
        api.reply(
            StatusCode::OK,
            json!({"PriceList": {"Code": "B", "Description": "Wholesale"}}),
        );
        let lists = api.client.price_lists();

        let created = lists
            .create(json!({"Code": "B", "Description": "Wholesale"}))
            .await
            .unwrap();
        assert_eq!(created["Code"], "B");
        let req = api.last();
        assert_eq!((req.method.as_str(), req.uri.as_str()), ("POST", "/3/pricelists"));

        lists.get("B").await.unwrap();
        assert_eq!(api.last().uri, "/3/pricelists/B");

        lists
            .update("B", json!({"Description": "Retail"}))
            .await
            .unwrap();
        assert_eq!(
            api.last().body,
            Some(json!({"PriceList": {"Description": "Retail"}}))
        );

        api.reply(StatusCode::NO_CONTENT, json!(null));
        lists.delete("B").await.unwrap();
        assert_eq!(api.last().method, "DELETE");
    }

    #[tokio::test]
    async fn create_requires_code_and_description() {
        let api = test_support::start().await;
        let lists = api.client.price_lists();

        let err = lists.create(json!({"Description": "Retail"})).await.unwrap_err();
        assert_eq!(err.message(), "Code is required");
        let err = lists.create(json!({"Code": "B"})).await.unwrap_err();
        assert_eq!(err.message(), "Description is required");
        let err = lists.get("").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(err.message(), "Price list code is required");
        assert!(api.requests().is_empty());
    }
}
