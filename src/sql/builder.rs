//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from a table schema.

use crate::catalog::{FieldSchema, TableSchema};
use crate::storage::{Filter, ListQuery};
use crate::value::{RowValue, Scalar};

/// Physical tables of a namespace; `$1` is the namespace.
pub const LIST_TABLES: &str = "SELECT table_name::text FROM information_schema.tables \
     WHERE table_schema = $1 AND table_type = 'BASE TABLE' ORDER BY table_name";

/// `$1` namespace, `$2` table.
pub const TABLE_EXISTS: &str = "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
     WHERE table_schema = $1 AND table_name = $2)";

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn qualified_table(table: &TableSchema) -> String {
    format!("{}.{}", quoted(&table.namespace), quoted(&table.physical_name))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Scalar>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Push a value and return its placeholder, cast to the field's type so
    /// text-typed nulls still land in typed columns.
    fn placeholder(&mut self, field: &FieldSchema, v: Scalar) -> String {
        self.params.push(v);
        format!("${}::{}", self.params.len(), field.field_type.pg_type())
    }
}

/// Every field cast to its canonical type and aliased to its API name, so the
/// driver decodes by field name with one Rust type per logical type.
fn select_column_list(table: &TableSchema) -> String {
    table
        .fields
        .iter()
        .map(|f| format!("{}::{} AS {}", quoted(&f.column), f.field_type.pg_type(), quoted(&f.name)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn where_clause(q: &mut QueryBuf, table: &TableSchema, filters: &[Filter]) -> String {
    let mut parts = Vec::new();
    for filter in filters {
        // Filters on undeclared fields never reach SQL.
        let Some(field) = table.field(&filter.field) else { continue };
        let ph = q.placeholder(field, filter.value.clone());
        parts.push(format!("{} = {}", quoted(&field.column), ph));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

fn pk_condition(q: &mut QueryBuf, table: &TableSchema, id: &Scalar) -> String {
    let pk = table.primary_key_field();
    let ph = q.placeholder(pk, id.clone());
    format!("{} = {}", quoted(&pk.column), ph)
}

/// SELECT with exact-match filters, ORDER BY (pk as tiebreak), LIMIT/OFFSET.
pub fn select_list(table: &TableSchema, query: &ListQuery) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, table, &query.filters);
    let pk = quoted(&table.primary_key_field().column);
    let order_sql = match query
        .order_by
        .as_ref()
        .and_then(|o| table.field(&o.field).map(|f| (f, o.descending)))
    {
        Some((f, descending)) if !f.primary_key => format!(
            " ORDER BY {} {}, {} ASC",
            quoted(&f.column),
            if descending { "DESC" } else { "ASC" },
            pk
        ),
        Some((_, true)) => format!(" ORDER BY {} DESC", pk),
        _ => format!(" ORDER BY {} ASC", pk),
    };
    q.sql = format!(
        "SELECT {} FROM {}{}{} LIMIT {} OFFSET {}",
        select_column_list(table),
        qualified_table(table),
        where_sql,
        order_sql,
        query.limit,
        query.offset
    );
    q
}

pub fn select_count(table: &TableSchema, filters: &[Filter]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, table, filters);
    q.sql = format!("SELECT COUNT(*) FROM {}{}", qualified_table(table), where_sql);
    q
}

pub fn select_by_id(table: &TableSchema, id: &Scalar) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cond = pk_condition(&mut q, table, id);
    q.sql = format!(
        "SELECT {} FROM {} WHERE {}",
        select_column_list(table),
        qualified_table(table),
        cond
    );
    q
}

pub fn select_exists(table: &TableSchema, field: &FieldSchema, value: &Scalar) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(field, value.clone());
    q.sql = format!(
        "SELECT EXISTS (SELECT 1 FROM {} WHERE {} = {})",
        qualified_table(table),
        quoted(&field.column),
        ph
    );
    q
}

/// INSERT of every declared field present in `row`, returning the stored row.
pub fn insert(table: &TableSchema, row: &RowValue) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for f in &table.fields {
        let Some(v) = row.get(&f.name) else { continue };
        placeholders.push(q.placeholder(f, v.clone()));
        cols.push(quoted(&f.column));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        qualified_table(table),
        cols.join(", "),
        placeholders.join(", "),
        select_column_list(table)
    );
    q
}

/// UPDATE by id: SET only declared, non-key fields present in `changes`.
/// With nothing to set this degrades to a SELECT by id.
pub fn update(table: &TableSchema, id: &Scalar, changes: &RowValue) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for f in &table.fields {
        if f.primary_key {
            continue;
        }
        let Some(v) = changes.get(&f.name) else { continue };
        let ph = q.placeholder(f, v.clone());
        sets.push(format!("{} = {}", quoted(&f.column), ph));
    }
    if sets.is_empty() {
        return select_by_id(table, id);
    }
    let cond = pk_condition(&mut q, table, id);
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} RETURNING {}",
        qualified_table(table),
        sets.join(", "),
        cond,
        select_column_list(table)
    );
    q
}

pub fn delete(table: &TableSchema, id: &Scalar) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cond = pk_condition(&mut q, table, id);
    q.sql = format!("DELETE FROM {} WHERE {}", qualified_table(table), cond);
    q
}
