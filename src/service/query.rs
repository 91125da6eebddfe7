//! List parameters from the query string: filters, ordering, pagination.

use crate::catalog::TableSchema;
use crate::codec::coerce_str;
use crate::error::{AppError, FieldViolation};
use crate::storage::{Filter, ListQuery, OrderBy};
use std::collections::HashMap;

pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 1000;

/// Query keys that are never treated as filters.
const RESERVED: &[&str] = &["db", "table", "limit", "offset", "ordering"];

/// Build a list query. Keys that are not declared fields are ignored, as is an
/// ordering on an undeclared field. A filter value that does not coerce to its
/// field's type is a validation error; all such errors are reported together.
pub fn list_query(schema: &TableSchema, params: &HashMap<String, String>) -> Result<ListQuery, AppError> {
    let mut violations = Vec::new();

    let limit = match params.get("limit") {
        Some(raw) => raw.trim().parse::<u32>().unwrap_or_else(|_| {
            violations.push(FieldViolation::new("limit", "must be a non-negative integer"));
            DEFAULT_LIMIT
        }),
        None => DEFAULT_LIMIT,
    }
    .min(MAX_LIMIT);
    let offset = match params.get("offset") {
        Some(raw) => raw.trim().parse::<u32>().unwrap_or_else(|_| {
            violations.push(FieldViolation::new("offset", "must be a non-negative integer"));
            0
        }),
        None => 0,
    };

    let order_by = params.get("ordering").and_then(|raw| {
        let raw = raw.trim();
        let (name, descending) = match raw.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (raw, false),
        };
        schema.field(name).map(|f| OrderBy {
            field: f.name.clone(),
            descending,
        })
    });

    // Sorted so filter order, and the SQL built from it, is stable.
    let mut keys: Vec<&String> = params.keys().filter(|k| !RESERVED.contains(&k.as_str())).collect();
    keys.sort();
    let mut filters = Vec::new();
    for key in keys {
        let Some(field) = schema.field(key) else { continue };
        match coerce_str(&field.field_type, &params[key]) {
            Ok(value) => filters.push(Filter {
                field: field.name.clone(),
                value,
            }),
            Err(reason) => violations.push(FieldViolation::new(&field.name, reason)),
        }
    }

    if !violations.is_empty() {
        return Err(AppError::Validation(violations));
    }
    Ok(ListQuery {
        filters,
        order_by,
        limit,
        offset,
    })
}
