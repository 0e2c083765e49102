//! Document store and client-local slot storage
//!
//! The core reads and writes plain JSON documents grouped in collections.
//! Backends only move documents; typed access goes through [`fetch`],
//! [`fetch_all`] and [`save`].

mod cart_slot;
mod memory;
mod postgres;

pub use cart_slot::{CartStorage, FileCartStorage, MemoryCartStorage};
pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const PRODUCTS: &str = "products";
pub const VARIANTS: &str = "variants";
pub const ORDERS: &str = "orders";
pub const REVIEWS: &str = "reviews";

/// Equality filter on a top-level document field.
#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self { field: field.into(), value: value.into() }
    }

    fn matches(&self, doc: &Value) -> bool { doc.get(&self.field) == Some(&self.value) }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// Documents matching every filter, ordered by id.
    async fn list(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Value>, StoreError>;

    /// Inserts or replaces a whole document.
    async fn put(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError>;

    /// Shallow-merges `partial` into an existing document.
    async fn update(&self, collection: &str, id: &str, partial: Value) -> Result<(), StoreError>;

    /// Removes a document; absent ids are not an error.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}

pub async fn fetch<T: DeserializeOwned>(store: &dyn DocumentStore, collection: &str, id: &str) -> Result<Option<T>, StoreError> {
    match store.get(collection, id).await? {
        Some(doc) => Ok(Some(decode(doc)?)),
        None => Ok(None),
    }
}

pub async fn fetch_all<T: DeserializeOwned>(store: &dyn DocumentStore, collection: &str, filters: &[Filter]) -> Result<Vec<T>, StoreError> {
    store.list(collection, filters).await?.into_iter().map(decode).collect()
}

pub async fn save<T: Serialize>(store: &dyn DocumentStore, collection: &str, id: &str, value: &T) -> Result<(), StoreError> {
    store.put(collection, id, serde_json::to_value(value)?).await
}

fn decode<T: DeserializeOwned>(mut doc: Value) -> Result<T, StoreError> {
    normalize_timestamps(&mut doc);
    Ok(serde_json::from_value(doc)?)
}

/// Rewrites top-level `*At` fields stored as epoch millis or as
/// `{seconds, nanoseconds}` objects into RFC 3339 strings.
pub fn normalize_timestamps(doc: &mut Value) {
    let Some(fields) = doc.as_object_mut() else { return };
    for (key, value) in fields.iter_mut() {
        if !key.ends_with("At") { continue; }
        if let Some(ts) = as_timestamp(value) {
            *value = Value::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true));
        }
    }
}

fn as_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => DateTime::from_timestamp_millis(n.as_i64()?),
        Value::Object(o) => {
            let seconds = o.get("seconds").or_else(|| o.get("_seconds"))?.as_i64()?;
            let nanos = o.get("nanoseconds").or_else(|| o.get("_nanoseconds")).and_then(Value::as_u64).unwrap_or(0);
            DateTime::from_timestamp(seconds, u32::try_from(nanos).ok()?)
        }
        _ => None,
    }
}

fn merge_into(target: &mut Value, partial: Value, collection: &str, id: &str) -> Result<(), StoreError> {
    let (Some(fields), Value::Object(updates)) = (target.as_object_mut(), partial) else {
        return Err(StoreError::InvalidDocument(format!("{collection}/{id}: update must merge two objects")));
    };
    merge_fields(fields, updates);
    Ok(())
}

fn merge_fields(fields: &mut Map<String, Value>, updates: Map<String, Value>) {
    for (key, value) in updates {
        fields.insert(key, value);
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn not_found(collection: &str, id: &str) -> Self {
        Self::NotFound { collection: collection.to_string(), id: id.to_string() }
    }

    /// Transport failures the user can retry as-is.
    pub fn is_retryable(&self) -> bool { matches!(self, Self::Database(_) | Self::Io(_)) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn millis_and_second_objects_become_rfc3339() {
        let mut doc = json!({
            "createdAt": 1_700_000_000_000_i64,
            "updatedAt": { "seconds": 1_700_000_000, "nanoseconds": 500_000_000 },
            "stock": 5,
        });
        normalize_timestamps(&mut doc);
        assert_eq!(doc["createdAt"], "2023-11-14T22:13:20Z");
        assert_eq!(doc["updatedAt"], "2023-11-14T22:13:20.500Z");
        assert_eq!(doc["stock"], 5);
    }

    #[test]
    fn rfc3339_strings_are_left_alone() {
        let mut doc = json!({ "createdAt": "2024-01-01T00:00:00Z" });
        normalize_timestamps(&mut doc);
        assert_eq!(doc["createdAt"], "2024-01-01T00:00:00Z");
    }

    #[test]
    fn filters_compare_top_level_fields() {
        let doc = json!({ "productId": "P1", "active": true });
        assert!(Filter::eq("productId", "P1").matches(&doc));
        assert!(!Filter::eq("active", false).matches(&doc));
        assert!(!Filter::eq("missing", 1).matches(&doc));
    }
}
