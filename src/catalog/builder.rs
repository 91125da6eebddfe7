//! Build the catalog from validated config: flatten tables and fields for runtime use.

use crate::catalog::schema::{FieldDefault, FieldRules, FieldSchema, FieldType, ForeignKeyTarget, TableSchema};
use crate::catalog::{Catalog, DatabaseAlias};
use crate::codec::coerce::coerce_json;
use crate::config::types::*;
use crate::config::{split_reference, validate};
use crate::error::ConfigError;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

pub fn build(config: &GatewayConfig) -> Result<Catalog, ConfigError> {
    validate(config)?;

    // Canonical (alias, table) for every configured table name and alternate, so
    // foreign keys can be written against either spelling.
    let mut canonical_tables: HashMap<(String, String), String> = HashMap::new();
    for db in &config.databases {
        for t in &db.tables {
            for name in std::iter::once(&t.name).chain(t.alternates.iter()) {
                canonical_tables.insert((db.alias.clone(), name.to_lowercase()), t.name.clone());
            }
        }
    }
    let primary_keys: HashMap<(&str, &str), &str> = config
        .databases
        .iter()
        .flat_map(|db| {
            db.tables
                .iter()
                .map(move |t| ((db.alias.as_str(), t.name.as_str()), t.primary_key.as_str()))
        })
        .collect();

    let mut aliases = Vec::with_capacity(config.databases.len());
    for db in &config.databases {
        let mut tables = Vec::with_capacity(db.tables.len());
        for t in &db.tables {
            let mut fields = Vec::with_capacity(t.fields.len());
            for f in &t.fields {
                let field_type = match f.type_ {
                    FieldTypeConfig::Text => FieldType::Text,
                    FieldTypeConfig::Integer => FieldType::Integer,
                    FieldTypeConfig::Decimal => FieldType::Decimal,
                    FieldTypeConfig::Boolean => FieldType::Boolean,
                    FieldTypeConfig::Timestamp => FieldType::Timestamp,
                    FieldTypeConfig::Date => FieldType::Date,
                    FieldTypeConfig::Uuid => FieldType::Uuid,
                    FieldTypeConfig::ForeignKey => {
                        let reference = f.references.as_deref().unwrap_or_default();
                        let (alias, table) = split_reference(&db.alias, reference);
                        let canonical = canonical_tables
                            .get(&(alias.to_string(), table.to_lowercase()))
                            .ok_or_else(|| ConfigError::MissingReference {
                                kind: "foreign key target",
                                id: reference.to_string(),
                            })?;
                        let key = primary_keys
                            .get(&(alias, canonical.as_str()))
                            .copied()
                            .unwrap_or("id");
                        FieldType::ForeignKey(ForeignKeyTarget {
                            alias: alias.to_string(),
                            table: canonical.clone(),
                            field: key.to_string(),
                        })
                    }
                };
                let default = match &f.default {
                    None => None,
                    Some(FieldDefaultConfig::Now) => {
                        if !matches!(field_type, FieldType::Timestamp | FieldType::Date) {
                            return Err(ConfigError::Validation(format!(
                                "{}.{}.{}: default \"now\" requires a timestamp or date field",
                                db.alias, t.name, f.name
                            )));
                        }
                        Some(FieldDefault::Now)
                    }
                    Some(FieldDefaultConfig::Value(v)) => {
                        let scalar = coerce_json(&field_type, v).map_err(|reason| {
                            ConfigError::Validation(format!(
                                "{}.{}.{}: default {}",
                                db.alias, t.name, f.name, reason
                            ))
                        })?;
                        Some(FieldDefault::Value(scalar))
                    }
                };
                let pattern = f
                    .rules
                    .pattern
                    .as_deref()
                    .map(Regex::new)
                    .transpose()
                    .map_err(|e| {
                        ConfigError::Validation(format!("{}.{}.{}: invalid pattern: {}", db.alias, t.name, f.name, e))
                    })?;
                fields.push(FieldSchema {
                    name: f.name.clone(),
                    column: f.column_name().to_string(),
                    field_type,
                    nullable: f.nullable,
                    primary_key: f.name == t.primary_key,
                    default,
                    auto_now: f.auto_now,
                    max_length: f.max_length,
                    max_digits: f.max_digits,
                    decimal_places: f.decimal_places,
                    rules: FieldRules {
                        format: f.rules.format.clone(),
                        min_length: f.rules.min_length,
                        max_length: f.rules.max_length,
                        pattern,
                        allowed: f.rules.allowed.clone(),
                        minimum: f.rules.minimum,
                        maximum: f.rules.maximum,
                    },
                });
            }
            tables.push(Arc::new(TableSchema {
                alias: db.alias.clone(),
                name: t.name.clone(),
                alternates: t.alternates.clone(),
                namespace: db.connection.schema.clone(),
                physical_name: t.physical_name().to_string(),
                fields,
                primary_key: t.primary_key.clone(),
            }));
        }
        aliases.push(Arc::new(DatabaseAlias {
            alias: db.alias.clone(),
            alternates: db.alternates.clone(),
            connection: db.connection.clone(),
            ignore_tables: db.ignore_tables.clone(),
            tables,
        }));
    }

    Ok(Catalog::from_aliases(aliases))
}
