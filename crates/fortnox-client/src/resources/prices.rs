//! `/prices`
//!
//! A price is addressed by price list code, article number, and optionally
//! the quantity tier it starts at: `/prices/{list}/{article}[/{from}]`.

use serde_json::Value;

use super::{Collection, as_object, has_value, require_fields, require_id};
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::query::QueryParams;

#[derive(Debug, Clone)]
pub struct Prices {
    collection: Collection,
}

impl Prices {
    pub(crate) fn new(http: HttpClient) -> Self {
        Self {
            collection: Collection::new(http, "prices", "Price", "Price list code"),
        }
    }

    /// List prices, filtered by `pricelist`, `articlenumber`, ... query
    /// parameters.
    pub async fn list(&self, query: QueryParams) -> Result<Value> {
        self.collection.list(query).await
    }

    /// Price of `article_number` in `price_list`; `from_quantity` selects a
    /// volume tier.
    pub async fn get(
        &self,
        price_list: &str,
        article_number: &str,
        from_quantity: Option<u32>,
    ) -> Result<Value> {
        let path = self.price_path(price_list, article_number, from_quantity)?;
        self.collection.get_at(&path).await
    }

    /// Create a price. `ArticleNumber` and `PriceList` are required, along
    /// with exactly one of `Price` and `Percent`.
    pub async fn create(&self, price: Value) -> Result<Value> {
        require_fields(&price, &["ArticleNumber", "PriceList"])?;
        let object = as_object(&price)?;
        match (has_value(object, "Price"), has_value(object, "Percent")) {
            (false, false) => {
                return Err(Error::validation("Either Price or Percent must be provided"));
            }
            (true, true) => {
                return Err(Error::validation("Cannot specify both Price and Percent"));
            }
            _ => {}
        }
        self.collection.create(price).await
    }

    pub async fn update(
        &self,
        price_list: &str,
        article_number: &str,
        from_quantity: u32,
        price: Value,
    ) -> Result<Value> {
        let path = self.price_path(price_list, article_number, Some(from_quantity))?;
        self.collection.update_at(&path, price).await
    }

    pub async fn delete(
        &self,
        price_list: &str,
        article_number: &str,
        from_quantity: u32,
    ) -> Result<()> {
        let path = self.price_path(price_list, article_number, Some(from_quantity))?;
        self.collection.delete_at(&path).await
    }

    fn price_path(
        &self,
        price_list: &str,
        article_number: &str,
        from_quantity: Option<u32>,
    ) -> Result<String> {
        require_id("Price list code", price_list)?;
        require_id("Article number", article_number)?;
        let mut path = format!(
            "{}/{}/{}",
            self.collection.base_path(),
            urlencoding::encode(price_list),
            urlencoding::encode(article_number)
        );
        if let Some(from) = from_quantity {
            path.push_str(&format!("/{from}"));
        }
        Ok(path)
    }
}
