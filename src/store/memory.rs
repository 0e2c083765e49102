//! In-process document store

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use super::{merge_into, DocumentStore, Filter, StoreError};

/// Document store held in memory, used for development and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self, collection: &str) -> usize {
        self.collections.read().get(collection).map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.collections.read().get(collection).and_then(|docs| docs.get(id)).cloned())
    }

    async fn list(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Value>, StoreError> {
        let guard = self.collections.read();
        let Some(docs) = guard.get(collection) else { return Ok(Vec::new()) };
        Ok(docs.values().filter(|doc| filters.iter().all(|f| f.matches(doc))).cloned().collect())
    }

    async fn put(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError> {
        self.collections.write().entry(collection.to_string()).or_default().insert(id.to_string(), doc);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, partial: Value) -> Result<(), StoreError> {
        let mut guard = self.collections.write();
        let doc = guard
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::not_found(collection, id))?;
        merge_into(doc, partial, collection, id)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        if let Some(docs) = self.collections.write().get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use testresult::TestResult;

    #[tokio::test]
    async fn put_get_update_delete() -> TestResult {
        let store = MemoryStore::new();
        store.put("orders", "ORD-1", json!({ "status": "pending", "total": 1100 })).await?;
        store.update("orders", "ORD-1", json!({ "status": "confirmed" })).await?;
        let doc = store.get("orders", "ORD-1").await?;
        assert_eq!(doc, Some(json!({ "status": "confirmed", "total": 1100 })));
        store.delete("orders", "ORD-1").await?;
        store.delete("orders", "ORD-1").await?;
        assert_eq!(store.get("orders", "ORD-1").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn update_of_missing_document_fails() {
        let store = MemoryStore::new();
        let err = store.update("orders", "nope", json!({ "status": "paid" })).await;
        assert!(matches!(err, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn list_applies_filters_in_id_order() -> TestResult {
        let store = MemoryStore::new();
        store.put("variants", "b", json!({ "productId": "P1" })).await?;
        store.put("variants", "a", json!({ "productId": "P1" })).await?;
        store.put("variants", "c", json!({ "productId": "P2" })).await?;
        let docs = store.list("variants", &[Filter::eq("productId", "P1")]).await?;
        assert_eq!(docs.len(), 2);
        assert_eq!(store.len("variants"), 3);
        assert!(store.list("missing", &[]).await?.is_empty());
        Ok(())
    }
}
