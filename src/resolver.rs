//! Model resolver: raw `db` and `table` parameters to a schema bound to its own connection.

use crate::catalog::{Catalog, ForeignKeyTarget, TableSchema};
use crate::error::AppError;
use crate::router::{AliasConnection, IsolationRouter};
use crate::storage::{StoreError, TableStore};
use std::sync::Arc;

/// A table schema paired with the connection of the alias that owns it.
///
/// Built per request and never cached. The only constructor checks that the
/// schema and the connection belong to the same alias.
pub struct ResolvedHandle {
    schema: Arc<TableSchema>,
    connection: AliasConnection,
}

impl ResolvedHandle {
    fn bind(schema: Arc<TableSchema>, connection: AliasConnection) -> Result<Self, AppError> {
        if schema.alias != connection.alias() {
            return Err(AppError::Internal(format!(
                "table {}.{} paired with connection for {}",
                schema.alias,
                schema.name,
                connection.alias()
            )));
        }
        Ok(ResolvedHandle { schema, connection })
    }

    pub fn alias(&self) -> &str {
        self.connection.alias()
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub(crate) fn store(&self) -> &dyn TableStore {
        self.connection.store()
    }
}

pub struct ModelResolver<'a> {
    catalog: &'a Catalog,
    router: &'a IsolationRouter,
}

impl<'a> ModelResolver<'a> {
    pub fn new(catalog: &'a Catalog, router: &'a IsolationRouter) -> Self {
        ModelResolver { catalog, router }
    }

    /// Resolve request parameters. Steps run in order and the first failure aborts:
    /// missing parameter, unknown alias, unknown table (no storage access up to
    /// here), then a live existence check of the physical table.
    pub async fn resolve(&self, db: Option<&str>, table: Option<&str>) -> Result<ResolvedHandle, AppError> {
        let db = db.filter(|s| !s.is_empty()).ok_or(AppError::MissingParameter("db"))?;
        let table = table.filter(|s| !s.is_empty()).ok_or(AppError::MissingParameter("table"))?;

        let alias = self
            .catalog
            .alias(db)
            .ok_or_else(|| AppError::UnknownDatabase(db.to_string()))?;
        let schema = alias.table(table).cloned().ok_or_else(|| AppError::UnknownTable {
            alias: alias.alias.clone(),
            table: table.to_string(),
        })?;

        let connection = self.router.connection_for(&alias.alias).await?;
        match connection.store().table_exists(&schema).await {
            Ok(true) => {}
            Ok(false) | Err(StoreError::MissingTable(_)) => {
                tracing::warn!(alias = %schema.alias, table = %schema.name, "declared table missing from database");
                return Err(AppError::TableUnavailable {
                    alias: schema.alias.clone(),
                    table: schema.name.clone(),
                });
            }
            Err(e) => return Err(AppError::from_store(&schema, "resolve", e)),
        }
        ResolvedHandle::bind(schema, connection)
    }

    /// Handle for a foreign-key target, through the target's own alias.
    pub async fn resolve_reference(&self, target: &ForeignKeyTarget) -> Result<ResolvedHandle, AppError> {
        let schema = self.catalog.describe_table(&target.alias, &target.table).ok_or_else(|| {
            AppError::Internal(format!("foreign key target {}.{} not in catalog", target.alias, target.table))
        })?;
        let connection = self.router.connection_for(&schema.alias).await?;
        ResolvedHandle::bind(schema, connection)
    }
}
