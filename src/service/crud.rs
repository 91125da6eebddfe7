//! Generic CRUD over a resolved handle: codec in, storage, codec out.

use crate::codec::{self, DecodeMode};
use crate::error::AppError;
use crate::resolver::{ModelResolver, ResolvedHandle};
use crate::storage::{Filter, ListQuery, StoreError};
use crate::value::Scalar;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

/// Attempts for read operations when the database reports itself unavailable.
/// Writes are never retried.
const READ_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// One page of encoded rows plus the total number of matching rows.
#[derive(Debug)]
pub struct Page {
    pub rows: Vec<Value>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

pub struct CrudService;

impl CrudService {
    pub async fn list(handle: &ResolvedHandle, query: &ListQuery) -> Result<Page, AppError> {
        let schema = handle.schema();
        let rows = read_with_retry(handle, "list", || handle.store().select(schema, query)).await?;
        let total = read_with_retry(handle, "list", || handle.store().count(schema, &query.filters)).await?;
        Ok(Page {
            rows: rows.iter().map(|r| codec::encode(schema, r)).collect(),
            total,
            limit: query.limit,
            offset: query.offset,
        })
    }

    pub async fn count(handle: &ResolvedHandle, filters: &[Filter]) -> Result<u64, AppError> {
        read_with_retry(handle, "count", || handle.store().count(handle.schema(), filters)).await
    }

    pub async fn retrieve(handle: &ResolvedHandle, id: &str) -> Result<Value, AppError> {
        let key = parse_id(handle, id)?;
        let schema = handle.schema();
        read_with_retry(handle, "retrieve", || handle.store().fetch(schema, &key))
            .await?
            .map(|row| codec::encode(schema, &row))
            .ok_or_else(|| not_found(handle, id))
    }

    /// Decode, check references, persist. A supplied key that already exists is a conflict.
    pub async fn create(
        resolver: &ModelResolver<'_>,
        handle: &ResolvedHandle,
        payload: &Value,
    ) -> Result<Value, AppError> {
        let schema = handle.schema();
        let row = codec::decode(schema, payload, DecodeMode::Create)?;
        codec::verify_references(resolver, schema, &row).await?;

        let supplied_key = payload
            .get(&schema.primary_key)
            .map(|v| !v.is_null())
            .unwrap_or(false);
        if supplied_key {
            let pk = schema.primary_key_field();
            let id = row.get(&pk.name).cloned().unwrap_or(Scalar::Null);
            let taken = handle
                .store()
                .exists(schema, pk, &id)
                .await
                .map_err(|e| AppError::from_store(schema, "create", e))?;
            if taken {
                return Err(AppError::DuplicateIdentifier(schema.name.clone()));
            }
        }

        let stored = handle
            .store()
            .insert(schema, &row)
            .await
            .map_err(|e| AppError::from_store(schema, "create", e))?;
        tracing::debug!(alias = %handle.alias(), table = %schema.name, "row created");
        Ok(codec::encode(schema, &stored))
    }

    /// Full (`partial == false`) or partial update of an existing row.
    pub async fn update(
        resolver: &ModelResolver<'_>,
        handle: &ResolvedHandle,
        id: &str,
        payload: &Value,
        partial: bool,
    ) -> Result<Value, AppError> {
        let schema = handle.schema();
        let key = parse_id(handle, id)?;
        let uuid = key.as_uuid().unwrap_or_default();
        let op = if partial { "partial_update" } else { "update" };

        let exists = handle
            .store()
            .fetch(schema, &key)
            .await
            .map_err(|e| AppError::from_store(schema, op, e))?;
        if exists.is_none() {
            return Err(not_found(handle, id));
        }

        let mode = if partial {
            DecodeMode::Partial(uuid)
        } else {
            DecodeMode::Replace(uuid)
        };
        let changes = codec::decode(schema, payload, mode)?;
        codec::verify_references(resolver, schema, &changes).await?;

        let stored = handle
            .store()
            .update(schema, &key, &changes)
            .await
            .map_err(|e| AppError::from_store(schema, op, e))?
            .ok_or_else(|| not_found(handle, id))?;
        Ok(codec::encode(schema, &stored))
    }

    pub async fn delete(handle: &ResolvedHandle, id: &str) -> Result<(), AppError> {
        let schema = handle.schema();
        let key = parse_id(handle, id)?;
        let removed = handle
            .store()
            .delete(schema, &key)
            .await
            .map_err(|e| AppError::from_store(schema, "delete", e))?;
        if removed {
            Ok(())
        } else {
            Err(not_found(handle, id))
        }
    }
}

/// Path identifiers that are not UUIDs cannot name a row.
fn parse_id(handle: &ResolvedHandle, id: &str) -> Result<Scalar, AppError> {
    Uuid::parse_str(id.trim())
        .map(Scalar::Uuid)
        .map_err(|_| not_found(handle, id))
}

fn not_found(handle: &ResolvedHandle, id: &str) -> AppError {
    AppError::NotFound(format!("{} '{}'", handle.schema().name, id))
}

/// Run a read, retrying while the store reports the database unavailable.
async fn read_with_retry<T, F, Fut>(handle: &ResolvedHandle, op: &'static str, mut f: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 1;
    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(StoreError::Unavailable(cause)) if attempt < READ_ATTEMPTS => {
                tracing::warn!(
                    alias = %handle.alias(),
                    table = %handle.schema().name,
                    op,
                    attempt,
                    %cause,
                    "read failed, retrying"
                );
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                attempt += 1;
            }
            Err(e) => return Err(AppError::from_store(handle.schema(), op, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::IsolationRouter;
    use crate::test_support::{sample_catalog, FlakyConnector, StaticConnector};
    use serde_json::json;

    fn setup() -> (crate::catalog::Catalog, IsolationRouter) {
        let catalog = sample_catalog();
        let router = IsolationRouter::new(&catalog, StaticConnector::for_catalog(&catalog));
        (catalog, router)
    }

    fn all() -> ListQuery {
        ListQuery {
            filters: vec![],
            order_by: None,
            limit: 100,
            offset: 0,
        }
    }

    #[tokio::test]
    async fn test_create_retrieve_round_trip() {
        let (catalog, router) = setup();
        let resolver = ModelResolver::new(&catalog, &router);
        let handle = resolver.resolve(Some("db1"), Some("product")).await.unwrap();
        let payload = json!({ "name": "Widget", "price": 9.99 });
        let created = CrudService::create(&resolver, &handle, &payload).await.unwrap();
        assert_eq!(created["name"], payload["name"]);
        assert_eq!(created["price"], payload["price"]);
        let id = created["id"].as_str().unwrap();

        let first = CrudService::retrieve(&handle, id).await.unwrap();
        let second = CrudService::retrieve(&handle, id).await.unwrap();
        assert_eq!(first, created);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_create_with_existing_key_conflicts() {
        let (catalog, router) = setup();
        let resolver = ModelResolver::new(&catalog, &router);
        let handle = resolver.resolve(Some("db1"), Some("category")).await.unwrap();
        let id = Uuid::new_v4().to_string();
        let payload = json!({ "id": id, "name": "Tools" });
        CrudService::create(&resolver, &handle, &payload).await.unwrap();
        assert!(matches!(
            CrudService::create(&resolver, &handle, &payload).await,
            Err(AppError::DuplicateIdentifier(_))
        ));
    }

    #[tokio::test]
    async fn test_foreign_key_miss_persists_nothing() {
        let (catalog, router) = setup();
        let resolver = ModelResolver::new(&catalog, &router);
        let handle = resolver.resolve(Some("db1"), Some("product")).await.unwrap();
        let payload = json!({ "name": "Widget", "price": 1, "category": Uuid::new_v4().to_string() });
        assert!(matches!(
            CrudService::create(&resolver, &handle, &payload).await,
            Err(AppError::ForeignKeyViolation(_))
        ));
        assert_eq!(CrudService::count(&handle, &[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_partial_update_touches_only_supplied_fields() {
        let (catalog, router) = setup();
        let resolver = ModelResolver::new(&catalog, &router);
        let handle = resolver.resolve(Some("db2"), Some("animal")).await.unwrap();
        let created = CrudService::create(&resolver, &handle, &json!({ "name": "Rex", "age": 3 }))
            .await
            .unwrap();
        let id = created["id"].as_str().unwrap();
        let updated = CrudService::update(&resolver, &handle, id, &json!({ "age": 4 }), true)
            .await
            .unwrap();
        assert_eq!(updated["name"], json!("Rex"));
        assert_eq!(updated["age"], json!(4));
        assert_eq!(updated["created"], created["created"]);
    }

    #[tokio::test]
    async fn test_update_and_delete_unknown_ids() {
        let (catalog, router) = setup();
        let resolver = ModelResolver::new(&catalog, &router);
        let handle = resolver.resolve(Some("db2"), Some("animal")).await.unwrap();
        let missing = Uuid::new_v4().to_string();
        assert!(matches!(
            CrudService::update(&resolver, &handle, &missing, &json!({ "name": "X" }), false).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            CrudService::delete(&handle, "not-a-uuid").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            CrudService::retrieve(&handle, &missing).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_reports_total_beyond_page() {
        let (catalog, router) = setup();
        let resolver = ModelResolver::new(&catalog, &router);
        let handle = resolver.resolve(Some("db3"), Some("genre")).await.unwrap();
        for name in ["Drama", "Crime", "Comedy"] {
            CrudService::create(&resolver, &handle, &json!({ "name": name }))
                .await
                .unwrap();
        }
        let mut q = all();
        q.limit = 2;
        let page = CrudService::list(&handle, &q).await.unwrap();
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.total, 3);
    }

    #[tokio::test]
    async fn test_reads_retry_transient_failures_and_writes_do_not() {
        let catalog = sample_catalog();
        let connector = FlakyConnector::for_catalog(&catalog);
        let router = IsolationRouter::new(&catalog, connector.clone());
        let resolver = ModelResolver::new(&catalog, &router);
        let handle = resolver.resolve(Some("db3"), Some("genre")).await.unwrap();

        connector.fail_next(2);
        let page = CrudService::list(&handle, &all()).await.unwrap();
        assert_eq!(page.total, 0);

        connector.fail_next(1);
        assert!(matches!(
            CrudService::create(&resolver, &handle, &json!({ "name": "Drama" })).await,
            Err(AppError::ConnectionUnavailable(_))
        ));
        assert_eq!(CrudService::count(&handle, &[]).await.unwrap(), 0);

        connector.fail_next(READ_ATTEMPTS as usize);
        assert!(matches!(
            CrudService::list(&handle, &all()).await,
            Err(AppError::ConnectionUnavailable(_))
        ));
    }
}
