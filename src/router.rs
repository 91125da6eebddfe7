//! Database isolation router: the only source of storage handles.
//!
//! Each alias has one slot holding its long-lived store (a sqlx pool for
//! PostgreSQL). A handle is only ever given out as an [`AliasConnection`] tagged
//! with its alias, and only the resolver can pair it with a table schema.

use crate::catalog::{Catalog, DatabaseAlias};
use crate::config::Driver;
use crate::error::AppError;
use crate::storage::{MemoryStore, PgStore, StoreError, TableStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Opens the store for one alias. Swappable so tests can supply their own stores.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, db: &DatabaseAlias) -> Result<Arc<dyn TableStore>, StoreError>;
}

/// Opens stores by the driver named in each alias's connection config.
pub struct DriverConnector;

#[async_trait]
impl Connector for DriverConnector {
    async fn connect(&self, db: &DatabaseAlias) -> Result<Arc<dyn TableStore>, StoreError> {
        match db.connection.driver {
            Driver::Postgres => Ok(Arc::new(PgStore::connect(&db.connection).await?)),
            Driver::Memory => Ok(Arc::new(MemoryStore::with_tables(
                db.tables().iter().map(|t| t.physical_name.as_str()),
            ))),
        }
    }
}

/// Store handle bound to one alias. Cannot be constructed outside the router.
#[derive(Clone)]
pub struct AliasConnection {
    alias: String,
    store: Arc<dyn TableStore>,
}

impl AliasConnection {
    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub(crate) fn store(&self) -> &dyn TableStore {
        self.store.as_ref()
    }
}

struct AliasSlot {
    db: Arc<DatabaseAlias>,
    store: RwLock<Option<Arc<dyn TableStore>>>,
}

pub struct IsolationRouter {
    slots: HashMap<String, AliasSlot>,
    connector: Arc<dyn Connector>,
}

impl IsolationRouter {
    /// One slot per canonical alias. Nothing connects until first use.
    pub fn new(catalog: &Catalog, connector: Arc<dyn Connector>) -> Self {
        let slots = catalog
            .list_aliases()
            .into_iter()
            .filter_map(|name| catalog.alias(name))
            .map(|db| {
                (
                    db.alias.clone(),
                    AliasSlot {
                        db: db.clone(),
                        store: RwLock::new(None),
                    },
                )
            })
            .collect();
        IsolationRouter { slots, connector }
    }

    /// Connection for a canonical alias, established lazily. A failed attempt is
    /// not remembered: the next call tries again.
    pub async fn connection_for(&self, alias: &str) -> Result<AliasConnection, AppError> {
        let slot = self
            .slots
            .get(alias)
            .ok_or_else(|| AppError::UnknownDatabase(alias.to_string()))?;

        if let Some(store) = slot.store.read().await.as_ref() {
            return Ok(AliasConnection {
                alias: slot.db.alias.clone(),
                store: store.clone(),
            });
        }

        let mut guard = slot.store.write().await;
        if let Some(store) = guard.as_ref() {
            return Ok(AliasConnection {
                alias: slot.db.alias.clone(),
                store: store.clone(),
            });
        }
        match self.connector.connect(&slot.db).await {
            Ok(store) => {
                tracing::info!(alias = %alias, driver = ?slot.db.connection.driver, "database connected");
                *guard = Some(store.clone());
                Ok(AliasConnection {
                    alias: slot.db.alias.clone(),
                    store,
                })
            }
            Err(e) => {
                tracing::warn!(alias = %alias, error = %e, "database connection failed");
                Err(AppError::ConnectionUnavailable(alias.to_string()))
            }
        }
    }

    /// Connect if needed and run a trivial round trip.
    pub async fn ping(&self, alias: &str) -> Result<(), AppError> {
        let conn = self.connection_for(alias).await?;
        conn.store().ping().await.map_err(|e| {
            tracing::warn!(alias = %alias, error = %e, "database ping failed");
            AppError::ConnectionUnavailable(alias.to_string())
        })
    }
}
