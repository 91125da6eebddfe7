//! Config validation: uniqueness, primary keys and foreign-key references.

use crate::config::{Driver, FieldTypeConfig, GatewayConfig, TableConfig};
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};

/// Split a `references` value into (alias, table). A bare table name refers to `own_alias`.
pub fn split_reference<'a>(own_alias: &'a str, reference: &'a str) -> (&'a str, &'a str) {
    match reference.split_once('.') {
        Some((alias, table)) => (alias, table),
        None => (own_alias, reference),
    }
}

fn find_table<'a>(tables: &'a [TableConfig], name: &str) -> Option<&'a TableConfig> {
    tables.iter().find(|t| {
        t.name.eq_ignore_ascii_case(name) || t.alternates.iter().any(|a| a.eq_ignore_ascii_case(name))
    })
}

pub fn validate(config: &GatewayConfig) -> Result<(), ConfigError> {
    if config.databases.is_empty() {
        return Err(ConfigError::Validation("at least one database required".into()));
    }

    let mut alias_names = HashSet::new();
    for db in &config.databases {
        for name in std::iter::once(&db.alias).chain(db.alternates.iter()) {
            if name.is_empty() {
                return Err(ConfigError::Validation("database alias cannot be empty".into()));
            }
            if !alias_names.insert(name.as_str()) {
                return Err(ConfigError::Duplicate {
                    kind: "database alias",
                    name: name.clone(),
                });
            }
        }
        if db.connection.driver == Driver::Postgres
            && db.connection.url.is_none()
            && db.connection.url_env.is_none()
        {
            return Err(ConfigError::Validation(format!(
                "database '{}': postgres connection needs url or url_env",
                db.alias
            )));
        }
    }

    let tables_by_alias: HashMap<&str, &[TableConfig]> = config
        .databases
        .iter()
        .map(|db| (db.alias.as_str(), db.tables.as_slice()))
        .collect();

    for db in &config.databases {
        let mut table_names = HashSet::new();
        let mut physical_names = HashSet::new();
        for t in &db.tables {
            for name in std::iter::once(&t.name).chain(t.alternates.iter()) {
                if !table_names.insert(name.to_lowercase()) {
                    return Err(ConfigError::Duplicate {
                        kind: "table name",
                        name: format!("{}.{}", db.alias, name),
                    });
                }
            }
            if !physical_names.insert(t.physical_name()) {
                return Err(ConfigError::Duplicate {
                    kind: "physical table",
                    name: format!("{}.{}", db.alias, t.physical_name()),
                });
            }

            let mut field_names = HashSet::new();
            for f in &t.fields {
                if !field_names.insert(f.name.as_str()) {
                    return Err(ConfigError::Duplicate {
                        kind: "field",
                        name: format!("{}.{}.{}", db.alias, t.name, f.name),
                    });
                }
            }

            let pk = t.fields.iter().find(|f| f.name == t.primary_key);
            match pk {
                Some(f) if f.type_ == FieldTypeConfig::Uuid && !f.nullable => {}
                _ => {
                    return Err(ConfigError::InvalidPrimaryKey {
                        table: format!("{}.{}", db.alias, t.name),
                        field: t.primary_key.clone(),
                    })
                }
            }

            for f in &t.fields {
                match (f.type_, &f.references) {
                    (FieldTypeConfig::ForeignKey, Some(reference)) => {
                        let (alias, table) = split_reference(&db.alias, reference);
                        let target = tables_by_alias
                            .get(alias)
                            .and_then(|tables| find_table(tables, table));
                        if target.is_none() {
                            return Err(ConfigError::MissingReference {
                                kind: "foreign key target",
                                id: reference.clone(),
                            });
                        }
                    }
                    (FieldTypeConfig::ForeignKey, None) => {
                        return Err(ConfigError::Validation(format!(
                            "{}.{}.{}: foreign_key field needs references",
                            db.alias, t.name, f.name
                        )));
                    }
                    (_, Some(_)) => {
                        return Err(ConfigError::Validation(format!(
                            "{}.{}.{}: references is only valid on foreign_key fields",
                            db.alias, t.name, f.name
                        )));
                    }
                    _ => {}
                }
                if f.auto_now && f.type_ != FieldTypeConfig::Timestamp {
                    return Err(ConfigError::Validation(format!(
                        "{}.{}.{}: auto_now requires a timestamp field",
                        db.alias, t.name, f.name
                    )));
                }
            }
        }
    }

    Ok(())
}
