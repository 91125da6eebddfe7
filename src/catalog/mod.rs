//! Schema catalog: every database alias and the tables it owns.
//!
//! Built once at startup from [`GatewayConfig`](crate::config::GatewayConfig) and
//! read-only afterwards, so it is shared across requests behind an `Arc` with no locking.

mod builder;
pub mod schema;

pub use builder::build;
pub use schema::*;

use crate::config::ConnectionConfig;
use crate::error::{AppError, ConfigError};
use crate::router::IsolationRouter;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// One isolated storage backend and the tables registered to it.
#[derive(Debug)]
pub struct DatabaseAlias {
    pub alias: String,
    pub alternates: Vec<String>,
    pub connection: ConnectionConfig,
    pub ignore_tables: Vec<String>,
    tables: Vec<Arc<TableSchema>>,
}

impl DatabaseAlias {
    pub fn tables(&self) -> &[Arc<TableSchema>] {
        &self.tables
    }

    /// Look up by canonical name or alternate, case-insensitive.
    pub fn table(&self, name: &str) -> Option<&Arc<TableSchema>> {
        self.tables.iter().find(|t| t.answers_to(name))
    }
}

#[derive(Debug)]
pub struct Catalog {
    aliases: Vec<Arc<DatabaseAlias>>,
    /// Alias and every alternate spelling -> index into `aliases`.
    by_name: HashMap<String, usize>,
}

impl Catalog {
    pub(crate) fn from_aliases(aliases: Vec<Arc<DatabaseAlias>>) -> Self {
        let mut by_name = HashMap::new();
        for (i, db) in aliases.iter().enumerate() {
            by_name.insert(db.alias.clone(), i);
            for alt in &db.alternates {
                by_name.insert(alt.clone(), i);
            }
        }
        Catalog { aliases, by_name }
    }

    /// Canonical alias names in configuration order.
    pub fn list_aliases(&self) -> Vec<&str> {
        self.aliases.iter().map(|a| a.alias.as_str()).collect()
    }

    /// Exact, case-sensitive match on the alias or an alternate spelling.
    pub fn alias(&self, name: &str) -> Option<&Arc<DatabaseAlias>> {
        self.by_name.get(name).map(|&i| &self.aliases[i])
    }

    pub fn list_tables(&self, alias: &str) -> Option<Vec<&str>> {
        self.alias(alias)
            .map(|db| db.tables.iter().map(|t| t.name.as_str()).collect())
    }

    pub fn describe_table(&self, alias: &str, table: &str) -> Option<Arc<TableSchema>> {
        self.alias(alias).and_then(|db| db.table(table)).cloned()
    }

    /// Compare declared tables with each database's physical table list.
    ///
    /// A declared table missing physically, or a physical table that is neither
    /// declared nor listed in `ignore_tables`, fails startup.
    pub async fn verify_physical(&self, router: &IsolationRouter) -> Result<(), ConfigError> {
        for db in &self.aliases {
            let conn = router.connection_for(&db.alias).await.map_err(|e| match e {
                AppError::ConnectionUnavailable(_) => ConfigError::Unreachable {
                    alias: db.alias.clone(),
                    cause: e.to_string(),
                },
                other => ConfigError::Load(other.to_string()),
            })?;
            let physical: BTreeSet<String> = conn
                .store()
                .list_tables()
                .await
                .map_err(|e| ConfigError::Unreachable {
                    alias: db.alias.clone(),
                    cause: e.to_string(),
                })?
                .into_iter()
                .collect();
            let declared: BTreeSet<String> = db.tables.iter().map(|t| t.physical_name.clone()).collect();

            let missing: Vec<&String> = declared.difference(&physical).collect();
            if !missing.is_empty() {
                return Err(ConfigError::SchemaMismatch {
                    alias: db.alias.clone(),
                    detail: format!("declared tables missing from database: {:?}", missing),
                });
            }
            let undeclared: Vec<&String> = physical
                .difference(&declared)
                .filter(|t| !db.ignore_tables.contains(t))
                .collect();
            if !undeclared.is_empty() {
                return Err(ConfigError::SchemaMismatch {
                    alias: db.alias.clone(),
                    detail: format!("tables present but not declared: {:?}", undeclared),
                });
            }
            tracing::info!(alias = %db.alias, tables = declared.len(), "database schema verified");
        }
        Ok(())
    }
}
