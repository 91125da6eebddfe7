//! Table and field metadata: the data that drives the codec, the SQL builder and the drivers.

use crate::value::Scalar;
use regex::Regex;

/// Where a foreign-key field points: the owning alias, the canonical table name and its key field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForeignKeyTarget {
    pub alias: String,
    pub table: String,
    pub field: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Integer,
    Decimal,
    Boolean,
    Timestamp,
    Date,
    Uuid,
    /// Holds the referenced row's identifier (always a UUID).
    ForeignKey(ForeignKeyTarget),
}

impl FieldType {
    /// PostgreSQL type used for parameter casts and canonical SELECT casts.
    pub fn pg_type(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Integer => "bigint",
            FieldType::Decimal => "numeric",
            FieldType::Boolean => "boolean",
            FieldType::Timestamp => "timestamptz",
            FieldType::Date => "date",
            FieldType::Uuid | FieldType::ForeignKey(_) => "uuid",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::Decimal => "decimal",
            FieldType::Boolean => "boolean",
            FieldType::Timestamp => "timestamp",
            FieldType::Date => "date",
            FieldType::Uuid => "uuid",
            FieldType::ForeignKey(_) => "foreign_key",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldDefault {
    Now,
    Value(Scalar),
}

/// Post-coercion checks from the `rules` block. The pattern is compiled once at catalog build.
#[derive(Clone, Debug, Default)]
pub struct FieldRules {
    pub format: Option<String>,
    pub min_length: Option<u32>,
    pub max_length: Option<u32>,
    pub pattern: Option<Regex>,
    pub allowed: Option<Vec<serde_json::Value>>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug)]
pub struct FieldSchema {
    /// API name; keys of payloads and of `RowValue`.
    pub name: String,
    /// Physical column.
    pub column: String,
    pub field_type: FieldType,
    pub nullable: bool,
    pub primary_key: bool,
    pub default: Option<FieldDefault>,
    pub auto_now: bool,
    pub max_length: Option<u32>,
    pub max_digits: Option<u32>,
    pub decimal_places: Option<u32>,
    pub rules: FieldRules,
}

impl FieldSchema {
    /// Server supplies a value when the payload omits this field on create.
    pub fn has_default(&self) -> bool {
        self.primary_key || self.auto_now || self.default.is_some()
    }

    /// Must be present on create and on full replacement.
    pub fn is_required(&self) -> bool {
        !self.nullable && !self.has_default()
    }

    pub fn foreign_key(&self) -> Option<&ForeignKeyTarget> {
        match &self.field_type {
            FieldType::ForeignKey(t) => Some(t),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TableSchema {
    /// Canonical alias of the owning database. A schema is served only through this alias.
    pub alias: String,
    pub name: String,
    pub alternates: Vec<String>,
    /// PostgreSQL schema (namespace) the table lives in.
    pub namespace: String,
    pub physical_name: String,
    pub fields: Vec<FieldSchema>,
    pub primary_key: String,
}

impl TableSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn primary_key_field(&self) -> &FieldSchema {
        // Catalog build guarantees the key field exists.
        self.fields
            .iter()
            .find(|f| f.primary_key)
            .unwrap_or(&self.fields[0])
    }

    /// Canonical name or any alternate, case-insensitive.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name) || self.alternates.iter().any(|a| a.eq_ignore_ascii_case(name))
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = (&FieldSchema, &ForeignKeyTarget)> {
        self.fields
            .iter()
            .filter_map(|f| f.foreign_key().map(|target| (f, target)))
    }
}
