//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use crate::catalog::TableSchema;
use crate::storage::StoreError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("invalid primary key: table {table} field {field}")]
    InvalidPrimaryKey { table: String, field: String },
    #[error("duplicate {kind}: {name}")]
    Duplicate { kind: &'static str, name: String },
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("schema mismatch in database '{alias}': {detail}")]
    SchemaMismatch { alias: String, detail: String },
    #[error("database '{alias}' unreachable: {cause}")]
    Unreachable { alias: String, cause: String },
}

/// One field-level problem found while decoding a payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub reason: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        FieldViolation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("unknown database: {0}")]
    UnknownDatabase(String),
    #[error("unknown table '{table}' in database '{alias}'")]
    UnknownTable { alias: String, table: String },
    #[error("table '{table}' is not available in database '{alias}'")]
    TableUnavailable { alias: String, table: String },
    #[error("database '{0}' is unavailable")]
    ConnectionUnavailable(String),
    #[error("validation failed")]
    Validation(Vec<FieldViolation>),
    #[error("foreign key violation")]
    ForeignKeyViolation(Vec<FieldViolation>),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("identifier already exists: {0}")]
    DuplicateIdentifier(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Carries diagnostic detail for the log only; the response stays generic.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingParameter(_) | AppError::Validation(_) | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::UnknownDatabase(_)
            | AppError::UnknownTable { .. }
            | AppError::TableUnavailable { .. }
            | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ForeignKeyViolation(_) | AppError::DuplicateIdentifier(_) => StatusCode::CONFLICT,
            AppError::ConnectionUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthenticated => "not_authenticated",
            AppError::MissingParameter(_) => "missing_parameter",
            AppError::UnknownDatabase(_) => "unknown_database",
            AppError::UnknownTable { .. } => "unknown_table",
            AppError::TableUnavailable { .. } => "table_unavailable",
            AppError::ConnectionUnavailable(_) => "connection_unavailable",
            AppError::Validation(_) => "validation_error",
            AppError::ForeignKeyViolation(_) => "foreign_key_violation",
            AppError::NotFound(_) => "not_found",
            AppError::DuplicateIdentifier(_) => "duplicate_identifier",
            AppError::BadRequest(_) => "bad_request",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Single-field validation failure.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Validation(vec![FieldViolation::new(field, reason)])
    }

    /// Classify a driver error for `table`. Unclassifiable errors are logged here
    /// with alias, table and operation, and become a generic [`AppError::Internal`].
    pub fn from_store(table: &TableSchema, op: &'static str, e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(cause) => {
                tracing::warn!(alias = %table.alias, table = %table.name, op, %cause, "database unavailable");
                AppError::ConnectionUnavailable(table.alias.clone())
            }
            StoreError::MissingTable(_) => AppError::TableUnavailable {
                alias: table.alias.clone(),
                table: table.name.clone(),
            },
            StoreError::UniqueViolation(_) => AppError::DuplicateIdentifier(table.name.clone()),
            StoreError::ForeignKeyViolation(_) => AppError::ForeignKeyViolation(vec![FieldViolation::new(
                "non_field_errors",
                "a referenced row does not exist",
            )]),
            StoreError::InvalidData { column, detail } => {
                tracing::debug!(alias = %table.alias, table = %table.name, op, %detail, "database rejected value");
                let field = column
                    .and_then(|c| table.fields.iter().find(|f| f.column == c))
                    .map(|f| f.name.clone())
                    .unwrap_or_else(|| "non_field_errors".to_string());
                AppError::invalid(field, "value rejected by the database")
            }
            StoreError::Other(detail) => {
                tracing::error!(alias = %table.alias, table = %table.name, op, error = %detail, "storage operation failed");
                AppError::Internal(detail)
            }
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        };
        let details = match &self {
            AppError::Validation(v) | AppError::ForeignKeyViolation(v) => serde_json::to_value(v).ok(),
            _ => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message,
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}
