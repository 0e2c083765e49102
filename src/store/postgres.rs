//! Postgres-backed document store
//!
//! Every collection shares one `documents` table keyed by
//! `(collection, id)` with the body in a JSONB column.

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;

use super::{DocumentStore, Filter, StoreError};

#[derive(Clone, Debug)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    /// Connects and applies pending migrations.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!(max_connections, "document store connected");
        Ok(Self { pool })
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let row: Option<Json<Value>> = sqlx::query_scalar("SELECT body FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection).bind(id)
            .fetch_optional(&self.pool).await?;
        Ok(row.map(|Json(body)| body))
    }

    async fn list(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Value>, StoreError> {
        let containment: Map<String, Value> = filters.iter().map(|f| (f.field.clone(), f.value.clone())).collect();
        let rows: Vec<Json<Value>> = sqlx::query_scalar("SELECT body FROM documents WHERE collection = $1 AND body @> $2 ORDER BY id")
            .bind(collection).bind(Json(Value::Object(containment)))
            .fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|Json(body)| body).collect())
    }

    async fn put(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO documents (collection, id, body, updated_at) VALUES ($1, $2, $3, NOW()) ON CONFLICT (collection, id) DO UPDATE SET body = EXCLUDED.body, updated_at = NOW()")
            .bind(collection).bind(id).bind(Json(doc))
            .execute(&self.pool).await?;
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, partial: Value) -> Result<(), StoreError> {
        if !partial.is_object() {
            return Err(StoreError::InvalidDocument(format!("{collection}/{id}: update must be an object")));
        }
        let result = sqlx::query("UPDATE documents SET body = body || $3, updated_at = NOW() WHERE collection = $1 AND id = $2")
            .bind(collection).bind(id).bind(Json(partial))
            .execute(&self.pool).await?;
        if result.rows_affected() == 0 { return Err(StoreError::not_found(collection, id)); }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection).bind(id)
            .execute(&self.pool).await?;
        Ok(())
    }
}
