//! PostgreSQL driver: one sqlx pool per database alias.

use crate::catalog::{FieldSchema, FieldType, TableSchema};
use crate::config::ConnectionConfig;
use crate::sql::{self, bind_all, QueryBuf};
use crate::storage::{Filter, ListQuery, StoreError, TableStore};
use crate::value::{RowValue, Scalar};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;

pub struct PgStore {
    pool: PgPool,
    namespace: String,
}

impl PgStore {
    /// Open the pool and wait for a first connection, so an unreachable server fails here.
    pub async fn connect(conn: &ConnectionConfig) -> Result<Self, StoreError> {
        let url = conn.resolve_url().map_err(|e| StoreError::Other(e.to_string()))?;
        let pool = PgPoolOptions::new()
            .max_connections(conn.max_connections)
            .acquire_timeout(Duration::from_secs(conn.acquire_timeout_secs))
            .connect(&url)
            .await?;
        Ok(PgStore {
            pool,
            namespace: conn.schema.clone(),
        })
    }

    async fn fetch_rows(&self, table: &TableSchema, q: &QueryBuf) -> Result<Vec<RowValue>, StoreError> {
        tracing::debug!(sql = %q.sql, "query");
        let rows = bind_all(sqlx::query(&q.sql), &q.params)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|r| row_to_value(table, r)).collect()
    }

    async fn fetch_optional(&self, table: &TableSchema, q: &QueryBuf) -> Result<Option<RowValue>, StoreError> {
        tracing::debug!(sql = %q.sql, "query");
        let row = bind_all(sqlx::query(&q.sql), &q.params)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_value(table, &r)).transpose()
    }
}

#[async_trait]
impl TableStore for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn list_tables(&self) -> Result<Vec<String>, StoreError> {
        tracing::debug!(sql = %sql::LIST_TABLES, "query");
        let names = sqlx::query_scalar::<_, String>(sql::LIST_TABLES)
            .bind(&self.namespace)
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    async fn table_exists(&self, table: &TableSchema) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>(sql::TABLE_EXISTS)
            .bind(&table.namespace)
            .bind(&table.physical_name)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn select(&self, table: &TableSchema, query: &ListQuery) -> Result<Vec<RowValue>, StoreError> {
        self.fetch_rows(table, &sql::select_list(table, query)).await
    }

    async fn count(&self, table: &TableSchema, filters: &[Filter]) -> Result<u64, StoreError> {
        let q = sql::select_count(table, filters);
        tracing::debug!(sql = %q.sql, "query");
        let mut query = sqlx::query_scalar::<_, i64>(&q.sql);
        for p in &q.params {
            query = sql::bind_scalar_as(query, p);
        }
        let n = query.fetch_one(&self.pool).await?;
        Ok(n.max(0) as u64)
    }

    async fn fetch(&self, table: &TableSchema, id: &Scalar) -> Result<Option<RowValue>, StoreError> {
        self.fetch_optional(table, &sql::select_by_id(table, id)).await
    }

    async fn exists(&self, table: &TableSchema, field: &FieldSchema, value: &Scalar) -> Result<bool, StoreError> {
        let q = sql::select_exists(table, field, value);
        tracing::debug!(sql = %q.sql, "query");
        let mut query = sqlx::query_scalar::<_, bool>(&q.sql);
        for p in &q.params {
            query = sql::bind_scalar_as(query, p);
        }
        Ok(query.fetch_one(&self.pool).await?)
    }

    async fn insert(&self, table: &TableSchema, row: &RowValue) -> Result<RowValue, StoreError> {
        self.fetch_optional(table, &sql::insert(table, row))
            .await?
            .ok_or_else(|| StoreError::Other(format!("insert into {} returned no row", table.physical_name)))
    }

    async fn update(
        &self,
        table: &TableSchema,
        id: &Scalar,
        changes: &RowValue,
    ) -> Result<Option<RowValue>, StoreError> {
        self.fetch_optional(table, &sql::update(table, id, changes)).await
    }

    async fn delete(&self, table: &TableSchema, id: &Scalar) -> Result<bool, StoreError> {
        let q = sql::delete(table, id);
        tracing::debug!(sql = %q.sql, "query");
        let result = bind_all(sqlx::query(&q.sql), &q.params)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Decode a row selected with the builder's canonical casts, one field at a time.
fn row_to_value(table: &TableSchema, row: &PgRow) -> Result<RowValue, StoreError> {
    let mut out = RowValue::new();
    for f in &table.fields {
        let v = cell_to_scalar(row, f).map_err(|e| StoreError::Other(format!("decode {}: {}", f.name, e)))?;
        out.set(f.name.clone(), v);
    }
    Ok(out)
}

fn cell_to_scalar(row: &PgRow, field: &FieldSchema) -> Result<Scalar, sqlx::Error> {
    let name = field.name.as_str();
    let v = match field.field_type {
        FieldType::Text => row.try_get::<Option<String>, _>(name)?.map(Scalar::Text),
        FieldType::Integer => row.try_get::<Option<i64>, _>(name)?.map(Scalar::Integer),
        FieldType::Decimal => row
            .try_get::<Option<rust_decimal::Decimal>, _>(name)?
            .map(Scalar::Decimal),
        FieldType::Boolean => row.try_get::<Option<bool>, _>(name)?.map(Scalar::Boolean),
        FieldType::Timestamp => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name)?
            .map(Scalar::Timestamp),
        FieldType::Date => row.try_get::<Option<chrono::NaiveDate>, _>(name)?.map(Scalar::Date),
        FieldType::Uuid | FieldType::ForeignKey(_) => row.try_get::<Option<uuid::Uuid>, _>(name)?.map(Scalar::Uuid),
    };
    Ok(v.unwrap_or(Scalar::Null))
}
