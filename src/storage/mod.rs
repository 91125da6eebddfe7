//! Storage drivers behind one trait: PostgreSQL via sqlx, and an in-process store.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::catalog::{FieldSchema, TableSchema};
use crate::value::{RowValue, Scalar};
use async_trait::async_trait;
use thiserror::Error;

/// Driver-level failure, already classified so callers never see raw engine errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("connection unavailable: {0}")]
    Unavailable(String),
    #[error("table missing: {0}")]
    MissingTable(String),
    #[error("unique violation: {0}")]
    UniqueViolation(String),
    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),
    /// The database rejected a value: out of range, too long, null or failing a check.
    #[error("invalid data: {detail}")]
    InvalidData { column: Option<String>, detail: String },
    #[error("storage: {0}")]
    Other(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(e.to_string()),
            sqlx::Error::Database(db) => {
                let column = db
                    .try_downcast_ref::<sqlx::postgres::PgDatabaseError>()
                    .and_then(|pg| pg.column())
                    .map(str::to_string);
                classify_database(db.code().as_deref(), db.message(), column)
                    .unwrap_or_else(|| StoreError::Other(e.to_string()))
            }
            _ => StoreError::Other(e.to_string()),
        }
    }
}

/// Map a PostgreSQL SQLSTATE to a storage error. `None` for codes with no class of their own.
fn classify_database(code: Option<&str>, message: &str, column: Option<String>) -> Option<StoreError> {
    let message = message.to_string();
    let err = match code? {
        "23505" => StoreError::UniqueViolation(message),
        "23503" => StoreError::ForeignKeyViolation(message),
        "42P01" => StoreError::MissingTable(message),
        // class 22: data exception; 23502 not null; 23514 check constraint
        code if code.starts_with("22") || code == "23502" || code == "23514" => {
            StoreError::InvalidData { column, detail: message }
        }
        // class 08: connection exception; 57P01..03: server shutting down
        code if code.starts_with("08") || code.starts_with("57P") => StoreError::Unavailable(message),
        _ => return None,
    };
    Some(err)
}

/// Exact-match condition on a declared field.
#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Scalar,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListQuery {
    pub filters: Vec<Filter>,
    /// Primary key ascending when unset. The key is always the final tiebreak.
    pub order_by: Option<OrderBy>,
    pub limit: u32,
    pub offset: u32,
}

/// Row storage for the tables of one database alias.
///
/// Implementations receive only schemas that belong to their alias; the
/// resolver pairs each schema with its own alias connection.
#[async_trait]
pub trait TableStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    /// Physical table names in the configured namespace.
    async fn list_tables(&self) -> Result<Vec<String>, StoreError>;

    async fn table_exists(&self, table: &TableSchema) -> Result<bool, StoreError>;

    async fn select(&self, table: &TableSchema, query: &ListQuery) -> Result<Vec<RowValue>, StoreError>;

    async fn count(&self, table: &TableSchema, filters: &[Filter]) -> Result<u64, StoreError>;

    async fn fetch(&self, table: &TableSchema, id: &Scalar) -> Result<Option<RowValue>, StoreError>;

    async fn exists(&self, table: &TableSchema, field: &FieldSchema, value: &Scalar) -> Result<bool, StoreError>;

    /// Insert a complete row; returns the stored row.
    async fn insert(&self, table: &TableSchema, row: &RowValue) -> Result<RowValue, StoreError>;

    /// Apply `changes` to the row with key `id` in one statement. `None` when no such row.
    async fn update(
        &self,
        table: &TableSchema,
        id: &Scalar,
        changes: &RowValue,
    ) -> Result<Option<RowValue>, StoreError>;

    /// `false` when no such row.
    async fn delete(&self, table: &TableSchema, id: &Scalar) -> Result<bool, StoreError>;
}
