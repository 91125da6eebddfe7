//! In-process driver. Each alias gets its own instance, so isolation holds here too.

use crate::catalog::{FieldSchema, TableSchema};
use crate::storage::{Filter, ListQuery, StoreError, TableStore};
use crate::value::{RowValue, Scalar};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Tables keyed by physical name; rows keyed by field name.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<RowValue>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn with_tables<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let store = MemoryStore::new();
        for name in names {
            store.create_table(name);
        }
        store
    }

    pub fn create_table(&self, name: &str) {
        if let Ok(mut tables) = self.tables.write() {
            tables.entry(name.to_string()).or_default();
        }
    }

    /// Returns whether the table existed.
    pub fn drop_table(&self, name: &str) -> bool {
        self.tables
            .write()
            .map(|mut tables| tables.remove(name).is_some())
            .unwrap_or(false)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Vec<RowValue>>>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Other("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Vec<RowValue>>>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Other("memory store lock poisoned".into()))
    }
}

fn rows<'a>(
    tables: &'a HashMap<String, Vec<RowValue>>,
    table: &TableSchema,
) -> Result<&'a Vec<RowValue>, StoreError> {
    tables
        .get(&table.physical_name)
        .ok_or_else(|| StoreError::MissingTable(table.physical_name.clone()))
}

fn rows_mut<'a>(
    tables: &'a mut HashMap<String, Vec<RowValue>>,
    table: &TableSchema,
) -> Result<&'a mut Vec<RowValue>, StoreError> {
    tables
        .get_mut(&table.physical_name)
        .ok_or_else(|| StoreError::MissingTable(table.physical_name.clone()))
}

fn matches(row: &RowValue, filters: &[Filter]) -> bool {
    filters
        .iter()
        .all(|f| row.get(&f.field).unwrap_or(&Scalar::Null) == &f.value)
}

fn compare_field(a: &RowValue, b: &RowValue, field: &str) -> Ordering {
    let null = Scalar::Null;
    a.get(field)
        .unwrap_or(&null)
        .compare(b.get(field).unwrap_or(&null))
        .unwrap_or(Ordering::Equal)
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.read().map(|_| ())
    }

    async fn list_tables(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self.read()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn table_exists(&self, table: &TableSchema) -> Result<bool, StoreError> {
        Ok(self.read()?.contains_key(&table.physical_name))
    }

    async fn select(&self, table: &TableSchema, query: &ListQuery) -> Result<Vec<RowValue>, StoreError> {
        let tables = self.read()?;
        let mut out: Vec<RowValue> = rows(&tables, table)?
            .iter()
            .filter(|r| matches(r, &query.filters))
            .cloned()
            .collect();
        let pk = table.primary_key.as_str();
        out.sort_by(|a, b| {
            let primary = match &query.order_by {
                Some(order) => {
                    let ord = compare_field(a, b, &order.field);
                    if order.descending {
                        ord.reverse()
                    } else {
                        ord
                    }
                }
                None => Ordering::Equal,
            };
            primary.then_with(|| compare_field(a, b, pk))
        });
        Ok(out
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
    }

    async fn count(&self, table: &TableSchema, filters: &[Filter]) -> Result<u64, StoreError> {
        let tables = self.read()?;
        Ok(rows(&tables, table)?.iter().filter(|r| matches(r, filters)).count() as u64)
    }

    async fn fetch(&self, table: &TableSchema, id: &Scalar) -> Result<Option<RowValue>, StoreError> {
        let tables = self.read()?;
        let pk = table.primary_key.as_str();
        Ok(rows(&tables, table)?
            .iter()
            .find(|r| r.get(pk) == Some(id))
            .cloned())
    }

    async fn exists(&self, table: &TableSchema, field: &FieldSchema, value: &Scalar) -> Result<bool, StoreError> {
        let tables = self.read()?;
        Ok(rows(&tables, table)?
            .iter()
            .any(|r| r.get(&field.name) == Some(value)))
    }

    async fn insert(&self, table: &TableSchema, row: &RowValue) -> Result<RowValue, StoreError> {
        let mut tables = self.write()?;
        let stored = rows_mut(&mut tables, table)?;
        let pk = table.primary_key.as_str();
        let id = row.get(pk).cloned().unwrap_or(Scalar::Null);
        if stored.iter().any(|r| r.get(pk) == Some(&id)) {
            return Err(StoreError::UniqueViolation(format!("{}.{}", table.physical_name, pk)));
        }
        let full: RowValue = table
            .fields
            .iter()
            .map(|f| (f.name.clone(), row.get(&f.name).cloned().unwrap_or(Scalar::Null)))
            .collect();
        stored.push(full.clone());
        Ok(full)
    }

    async fn update(
        &self,
        table: &TableSchema,
        id: &Scalar,
        changes: &RowValue,
    ) -> Result<Option<RowValue>, StoreError> {
        let mut tables = self.write()?;
        let pk = table.primary_key.as_str();
        let Some(row) = rows_mut(&mut tables, table)?
            .iter_mut()
            .find(|r| r.get(pk) == Some(id))
        else {
            return Ok(None);
        };
        for (k, v) in changes.iter() {
            if k != pk && table.field(k).is_some() {
                row.set(k, v.clone());
            }
        }
        Ok(Some(row.clone()))
    }

    async fn delete(&self, table: &TableSchema, id: &Scalar) -> Result<bool, StoreError> {
        let mut tables = self.write()?;
        let pk = table.primary_key.as_str();
        let stored = rows_mut(&mut tables, table)?;
        let before = stored.len();
        stored.retain(|r| r.get(pk) != Some(id));
        Ok(stored.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::OrderBy;
    use crate::test_support::sample_catalog;
    use uuid::Uuid;

    fn animal_row(name: &str, age: i64) -> RowValue {
        let mut row = RowValue::new();
        row.set("id", Scalar::Uuid(Uuid::new_v4()));
        row.set("name", Scalar::Text(name.into()));
        row.set("age", Scalar::Integer(age));
        row
    }

    fn query() -> ListQuery {
        ListQuery {
            filters: vec![],
            order_by: None,
            limit: 100,
            offset: 0,
        }
    }

    #[tokio::test]
    async fn test_insert_fills_undeclared_fields_with_null() {
        let catalog = sample_catalog();
        let animal = catalog.describe_table("db2", "animal").unwrap();
        let store = MemoryStore::with_tables(["app2_animal"]);
        let stored = store.insert(&animal, &animal_row("Rex", 3)).await.unwrap();
        assert_eq!(stored.get("breed"), Some(&Scalar::Null));
        assert_eq!(stored.len(), animal.fields.len());
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_key() {
        let catalog = sample_catalog();
        let animal = catalog.describe_table("db2", "animal").unwrap();
        let store = MemoryStore::with_tables(["app2_animal"]);
        let row = animal_row("Rex", 3);
        store.insert(&animal, &row).await.unwrap();
        assert!(matches!(
            store.insert(&animal, &row).await,
            Err(StoreError::UniqueViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_select_filters_orders_and_pages() {
        let catalog = sample_catalog();
        let animal = catalog.describe_table("db2", "animal").unwrap();
        let store = MemoryStore::with_tables(["app2_animal"]);
        for (name, age) in [("Rex", 3), ("Fido", 5), ("Bolt", 3), ("Ace", 1)] {
            store.insert(&animal, &animal_row(name, age)).await.unwrap();
        }

        let mut q = query();
        q.filters.push(Filter {
            field: "age".into(),
            value: Scalar::Integer(3),
        });
        assert_eq!(store.select(&animal, &q).await.unwrap().len(), 2);
        assert_eq!(store.count(&animal, &q.filters).await.unwrap(), 2);

        let mut q = query();
        q.order_by = Some(OrderBy {
            field: "age".into(),
            descending: true,
        });
        q.limit = 2;
        let rows = store.select(&animal, &q).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("name"), Some(&Scalar::Text("Fido".into())));

        q.offset = 3;
        let rows = store.select(&animal, &q).await.unwrap();
        assert_eq!(rows[0].get("name"), Some(&Scalar::Text("Ace".into())));
    }

    #[tokio::test]
    async fn test_nulls_sort_last_ascending_and_first_descending() {
        let catalog = sample_catalog();
        let animal = catalog.describe_table("db2", "animal").unwrap();
        let store = MemoryStore::with_tables(["app2_animal"]);
        let mut unknown_age = animal_row("A", 0);
        unknown_age.set("age", Scalar::Null);
        store.insert(&animal, &unknown_age).await.unwrap();
        store.insert(&animal, &animal_row("B", 2)).await.unwrap();

        let mut q = query();
        q.order_by = Some(OrderBy {
            field: "age".into(),
            descending: false,
        });
        let names: Vec<Scalar> = store
            .select(&animal, &q)
            .await
            .unwrap()
            .iter()
            .map(|r| r.get("name").cloned().unwrap())
            .collect();
        assert_eq!(names, vec![Scalar::Text("B".into()), Scalar::Text("A".into())]);

        q.order_by = Some(OrderBy {
            field: "age".into(),
            descending: true,
        });
        let first = store.select(&animal, &q).await.unwrap();
        assert_eq!(first[0].get("name"), Some(&Scalar::Text("A".into())));
    }

    #[tokio::test]
    async fn test_update_and_delete_unknown_row() {
        let catalog = sample_catalog();
        let animal = catalog.describe_table("db2", "animal").unwrap();
        let store = MemoryStore::with_tables(["app2_animal"]);
        let missing = Scalar::Uuid(Uuid::new_v4());
        assert!(store.update(&animal, &missing, &RowValue::new()).await.unwrap().is_none());
        assert!(!store.delete(&animal, &missing).await.unwrap());
    }

    #[tokio::test]
    async fn test_dropped_table_reports_missing() {
        let catalog = sample_catalog();
        let animal = catalog.describe_table("db2", "animal").unwrap();
        let store = MemoryStore::with_tables(["app2_animal"]);
        assert!(store.drop_table("app2_animal"));
        assert!(!store.table_exists(&animal).await.unwrap());
        assert!(matches!(
            store.select(&animal, &query()).await,
            Err(StoreError::MissingTable(_))
        ));
    }
}
