//! Resource façades
//!
//! Thin wrappers over `HttpClient`, one per Fortnox collection. Payloads are
//! `serde_json` objects in the remote casing (`Description`, `CustomerNumber`,
//! ...); responses are unwrapped from their single-key envelope
//! (`{"Article": {...}}` yields the inner object). List calls return the
//! whole response so `MetaInformation` stays available.

mod articles;
mod customers;
mod invoices;
mod orders;
mod price_lists;
mod prices;

pub use articles::Articles;
pub use customers::Customers;
pub use invoices::Invoices;
pub use orders::Orders;
pub use price_lists::PriceLists;
pub use prices::Prices;

use reqwest::Method;
use serde_json::{Map, Value, json};

use crate::error::{Error, ErrorInfo, Result};
use crate::http::{HttpClient, RequestOptions};
use crate::query::QueryParams;

/// CRUD plumbing shared by the collection façades.
#[derive(Debug, Clone)]
pub(crate) struct Collection {
    http: HttpClient,
    base_path: &'static str,
    /// Envelope key of a single entity, e.g. `Article`.
    wrapper: &'static str,
    /// Human name of the identifier, used in validation messages.
    id_name: &'static str,
}

impl Collection {
    pub(crate) fn new(
        http: HttpClient,
        base_path: &'static str,
        wrapper: &'static str,
        id_name: &'static str,
    ) -> Self {
        Self {
            http,
            base_path,
            wrapper,
            id_name,
        }
    }

    pub(crate) async fn list(&self, query: QueryParams) -> Result<Value> {
        self.http.get(self.base_path, query).await
    }

    pub(crate) async fn get(&self, id: &str) -> Result<Value> {
        let path = self.entity_path(id)?;
        self.get_at(&path).await
    }

    pub(crate) async fn create(&self, payload: Value) -> Result<Value> {
        let body = self.wrap(payload);
        let response = self.http.post(self.base_path, body).await?;
        unwrap_entity(response, self.wrapper)
    }

    pub(crate) async fn update(&self, id: &str, payload: Value) -> Result<Value> {
        let path = self.entity_path(id)?;
        self.update_at(&path, payload).await
    }

    pub(crate) async fn delete(&self, id: &str) -> Result<()> {
        let path = self.entity_path(id)?;
        self.delete_at(&path).await
    }

    /// Entities addressed by more than one key (prices) build their own path
    /// and use the `*_at` variants.
    pub(crate) async fn get_at(&self, path: &str) -> Result<Value> {
        let response = self.http.get(path, QueryParams::new()).await?;
        unwrap_entity(response, self.wrapper)
    }

    pub(crate) async fn update_at(&self, path: &str, payload: Value) -> Result<Value> {
        require_update_fields(&payload)?;
        let body = self.wrap(payload);
        let response = self.http.put(path, body).await?;
        unwrap_entity(response, self.wrapper)
    }

    pub(crate) async fn delete_at(&self, path: &str) -> Result<()> {
        self.http.delete(path).await?;
        Ok(())
    }

    pub(crate) fn base_path(&self) -> &'static str {
        self.base_path
    }

    /// Document action such as `bookkeep` or `email`. PUT actions send an
    /// empty object as body.
    pub(crate) async fn action(&self, method: Method, id: &str, action: &str) -> Result<Value> {
        let path = format!("{}/{action}", self.entity_path(id)?);
        let options = if method == Method::PUT {
            RequestOptions::new().body(json!({}))
        } else {
            RequestOptions::new()
        };
        self.http.request(method, &path, options).await
    }

    /// Same as `action`, unwrapping the entity envelope.
    pub(crate) async fn entity_action(&self, method: Method, id: &str, action: &str) -> Result<Value> {
        let response = self.action(method, id, action).await?;
        unwrap_entity(response, self.wrapper)
    }

    fn wrap(&self, payload: Value) -> Value {
        let mut object = Map::new();
        object.insert(self.wrapper.to_string(), payload);
        Value::Object(object)
    }

    fn entity_path(&self, id: &str) -> Result<String> {
        require_id(self.id_name, id)?;
        Ok(format!("{}/{}", self.base_path, urlencoding::encode(id)))
    }
}

/// Reject blank identifiers before any request is made.
pub(crate) fn require_id(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{name} is required")));
    }
    Ok(())
}

/// The payload as an object, or a validation error.
pub(crate) fn as_object(payload: &Value) -> Result<&Map<String, Value>> {
    payload
        .as_object()
        .ok_or_else(|| Error::validation("payload must be a JSON object"))
}

/// Every named field must be present, non-null, and not an empty string.
pub(crate) fn require_fields(payload: &Value, fields: &[&str]) -> Result<()> {
    let object = as_object(payload)?;
    for field in fields {
        if !has_value(object, field) {
            return Err(Error::validation(format!("{field} is required")));
        }
    }
    Ok(())
}

pub(crate) fn require_update_fields(payload: &Value) -> Result<()> {
    if as_object(payload)?.is_empty() {
        return Err(Error::validation(
            "At least one field must be provided for update",
        ));
    }
    Ok(())
}

pub(crate) fn has_value(object: &Map<String, Value>, field: &str) -> bool {
    match object.get(field) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Take the single entity out of `{"<wrapper>": {...}}`.
pub(crate) fn unwrap_entity(response: Value, wrapper: &str) -> Result<Value> {
    match response {
        Value::Object(mut object) if object.contains_key(wrapper) => {
            Ok(object.remove(wrapper).unwrap_or(Value::Null))
        }
        other => Err(Error::Api(
            ErrorInfo::new(format!("response is missing the {wrapper} object"))
                .with_details(other),
        )),
    }
}
