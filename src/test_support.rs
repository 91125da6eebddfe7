//! Shared fixtures for unit tests: a three-database catalog and in-memory connectors.

use crate::catalog::{self, Catalog, DatabaseAlias, FieldSchema, TableSchema};
use crate::config::parse_config;
use crate::router::Connector;
use crate::storage::{Filter, ListQuery, MemoryStore, StoreError, TableStore};
use crate::value::{RowValue, Scalar};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub(crate) const SAMPLE_CONFIG: &str = r#"{
  "databases": [
    {
      "alias": "db1",
      "alternates": ["shop"],
      "connection": { "driver": "memory" },
      "ignore_tables": ["django_migrations"],
      "tables": [
        {
          "name": "category",
          "alternates": ["categories"],
          "table": "app1_category",
          "fields": [
            { "name": "id", "type": "uuid" },
            { "name": "name", "type": "text", "max_length": 100 }
          ]
        },
        {
          "name": "product",
          "alternates": ["products"],
          "table": "app1_product",
          "fields": [
            { "name": "id", "type": "uuid" },
            { "name": "name", "type": "text", "max_length": 200 },
            { "name": "description", "type": "text", "nullable": true },
            { "name": "price", "type": "decimal", "max_digits": 10, "decimal_places": 2 },
            { "name": "category", "column": "category_id", "type": "foreign_key", "references": "category", "nullable": true }
          ]
        }
      ]
    },
    {
      "alias": "db2",
      "connection": { "driver": "memory" },
      "tables": [
        {
          "name": "species",
          "table": "app2_species",
          "fields": [
            { "name": "id", "type": "uuid" },
            { "name": "name", "type": "text" }
          ]
        },
        {
          "name": "breed",
          "alternates": ["breeds"],
          "table": "app2_breed",
          "fields": [
            { "name": "id", "type": "uuid" },
            { "name": "name", "type": "text" },
            { "name": "species", "column": "species_id", "type": "foreign_key", "references": "species" }
          ]
        },
        {
          "name": "animal",
          "alternates": ["animals"],
          "table": "app2_animal",
          "fields": [
            { "name": "id", "type": "uuid" },
            { "name": "name", "type": "text", "max_length": 100 },
            { "name": "age", "type": "integer", "nullable": true, "rules": { "minimum": 0 } },
            { "name": "breed", "column": "breed_id", "type": "foreign_key", "references": "breed", "nullable": true },
            { "name": "created", "type": "timestamp", "default": "now" },
            { "name": "updated", "type": "timestamp", "auto_now": true }
          ]
        }
      ]
    },
    {
      "alias": "db3",
      "connection": { "driver": "memory" },
      "tables": [
        {
          "name": "genre",
          "table": "app3_genre",
          "fields": [
            { "name": "id", "type": "uuid" },
            { "name": "name", "type": "text" }
          ]
        },
        {
          "name": "movie",
          "alternates": ["movies"],
          "table": "app3_movie",
          "fields": [
            { "name": "id", "type": "uuid" },
            { "name": "title", "type": "text" },
            { "name": "genre", "column": "genre_id", "type": "foreign_key", "references": "genre", "nullable": true },
            { "name": "released", "type": "date", "nullable": true },
            { "name": "rating", "type": "decimal", "nullable": true, "max_digits": 3, "decimal_places": 1 },
            { "name": "in_stock", "type": "boolean", "default": true },
            { "name": "featured_product", "type": "foreign_key", "references": "db1.product", "nullable": true }
          ]
        }
      ]
    }
  ]
}"#;

pub(crate) fn sample_catalog() -> Catalog {
    let config = parse_config(SAMPLE_CONFIG).expect("sample config parses");
    catalog::build(&config).expect("sample config builds")
}

/// Hands out one pre-built [`MemoryStore`] per alias, so tests can reach into
/// the same store the router uses.
pub(crate) struct StaticConnector {
    stores: HashMap<String, Arc<MemoryStore>>,
}

impl StaticConnector {
    pub(crate) fn for_catalog(catalog: &Catalog) -> Arc<Self> {
        let stores = catalog
            .list_aliases()
            .into_iter()
            .filter_map(|name| catalog.alias(name))
            .map(|db| {
                let store = MemoryStore::with_tables(db.tables().iter().map(|t| t.physical_name.as_str()));
                (db.alias.clone(), Arc::new(store))
            })
            .collect();
        Arc::new(StaticConnector { stores })
    }

    pub(crate) fn store(&self, alias: &str) -> Arc<MemoryStore> {
        self.stores[alias].clone()
    }
}

#[async_trait]
impl Connector for StaticConnector {
    async fn connect(&self, db: &DatabaseAlias) -> Result<Arc<dyn TableStore>, StoreError> {
        self.stores
            .get(&db.alias)
            .map(|s| s.clone() as Arc<dyn TableStore>)
            .ok_or_else(|| StoreError::Unavailable(format!("no store for {}", db.alias)))
    }
}

/// Fails the first `failures` connection attempts, then delegates.
pub(crate) struct FailingConnector {
    inner: Arc<StaticConnector>,
    failures: usize,
    attempts: AtomicUsize,
}

impl FailingConnector {
    pub(crate) fn new(inner: Arc<StaticConnector>, failures: usize) -> Arc<Self> {
        Arc::new(FailingConnector {
            inner,
            failures,
            attempts: AtomicUsize::new(0),
        })
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FailingConnector {
    async fn connect(&self, db: &DatabaseAlias) -> Result<Arc<dyn TableStore>, StoreError> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        self.inner.connect(db).await
    }
}

/// Connector whose stores report `Unavailable` for the next N operations.
pub(crate) struct FlakyConnector {
    inner: Arc<StaticConnector>,
    pending: Arc<AtomicUsize>,
}

impl FlakyConnector {
    pub(crate) fn for_catalog(catalog: &Catalog) -> Arc<Self> {
        Arc::new(FlakyConnector {
            inner: StaticConnector::for_catalog(catalog),
            pending: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub(crate) fn fail_next(&self, n: usize) {
        self.pending.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for FlakyConnector {
    async fn connect(&self, db: &DatabaseAlias) -> Result<Arc<dyn TableStore>, StoreError> {
        Ok(Arc::new(FlakyStore {
            inner: self.inner.connect(db).await?,
            pending: self.pending.clone(),
        }))
    }
}

struct FlakyStore {
    inner: Arc<dyn TableStore>,
    pending: Arc<AtomicUsize>,
}

impl FlakyStore {
    fn trip(&self) -> Result<(), StoreError> {
        let tripped = self
            .pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if tripped {
            Err(StoreError::Unavailable("connection reset".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TableStore for FlakyStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.trip()?;
        self.inner.ping().await
    }

    async fn list_tables(&self) -> Result<Vec<String>, StoreError> {
        self.trip()?;
        self.inner.list_tables().await
    }

    async fn table_exists(&self, table: &TableSchema) -> Result<bool, StoreError> {
        self.trip()?;
        self.inner.table_exists(table).await
    }

    async fn select(&self, table: &TableSchema, query: &ListQuery) -> Result<Vec<RowValue>, StoreError> {
        self.trip()?;
        self.inner.select(table, query).await
    }

    async fn count(&self, table: &TableSchema, filters: &[Filter]) -> Result<u64, StoreError> {
        self.trip()?;
        self.inner.count(table, filters).await
    }

    async fn fetch(&self, table: &TableSchema, id: &Scalar) -> Result<Option<RowValue>, StoreError> {
        self.trip()?;
        self.inner.fetch(table, id).await
    }

    async fn exists(&self, table: &TableSchema, field: &FieldSchema, value: &Scalar) -> Result<bool, StoreError> {
        self.trip()?;
        self.inner.exists(table, field, value).await
    }

    async fn insert(&self, table: &TableSchema, row: &RowValue) -> Result<RowValue, StoreError> {
        self.trip()?;
        self.inner.insert(table, row).await
    }

    async fn update(
        &self,
        table: &TableSchema,
        id: &Scalar,
        changes: &RowValue,
    ) -> Result<Option<RowValue>, StoreError> {
        self.trip()?;
        self.inner.update(table, id, changes).await
    }

    async fn delete(&self, table: &TableSchema, id: &Scalar) -> Result<bool, StoreError> {
        self.trip()?;
        self.inner.delete(table, id).await
    }
}
