//! Generic row codec: stored rows to JSON and inbound JSON to rows, driven only by the table schema.

pub mod coerce;
pub mod rules;

pub use coerce::{coerce_json, coerce_str, scalar_to_json};

use crate::catalog::{FieldDefault, FieldSchema, FieldType, TableSchema};
use crate::error::{AppError, FieldViolation};
use crate::resolver::ModelResolver;
use crate::value::{RowValue, Scalar};
use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Key used for problems that belong to the payload as a whole.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeMode {
    /// Required fields must be present; the key is generated when omitted.
    Create,
    /// Full update of the row with this key: required fields must be present,
    /// omitted optional fields keep their stored values.
    Replace(Uuid),
    /// Only supplied fields are validated and changed.
    Partial(Uuid),
}

impl DecodeMode {
    fn path_id(self) -> Option<Uuid> {
        match self {
            DecodeMode::Create => None,
            DecodeMode::Replace(id) | DecodeMode::Partial(id) => Some(id),
        }
    }
}

/// Stored row to JSON, fields in declared order. Undeclared keys are dropped.
pub fn encode(schema: &TableSchema, row: &RowValue) -> Value {
    let mut out = Map::with_capacity(schema.fields.len());
    for f in &schema.fields {
        let v = row.get(&f.name).map(scalar_to_json).unwrap_or(Value::Null);
        out.insert(f.name.clone(), v);
    }
    Value::Object(out)
}

/// Inbound JSON to a row ready for persistence.
///
/// Every field is checked in one pass and all violations are reported together.
/// Foreign-key existence is not checked here; see [`verify_references`].
pub fn decode(schema: &TableSchema, payload: &Value, mode: DecodeMode) -> Result<RowValue, AppError> {
    let Some(obj) = payload.as_object() else {
        return Err(AppError::invalid(NON_FIELD_ERRORS, "expected a JSON object"));
    };
    let now = Utc::now();
    let mut row = RowValue::new();
    let mut violations = Vec::new();

    for f in &schema.fields {
        let supplied = obj.get(&f.name);

        if f.primary_key {
            if let Some(id) = decode_key(f, supplied, mode, &mut violations) {
                row.set(f.name.clone(), id);
            }
            continue;
        }
        if f.auto_now {
            row.set(f.name.clone(), now_for(&f.field_type, now));
            continue;
        }

        match supplied {
            None => match mode {
                DecodeMode::Create => match &f.default {
                    Some(FieldDefault::Now) => row.set(f.name.clone(), now_for(&f.field_type, now)),
                    Some(FieldDefault::Value(v)) => row.set(f.name.clone(), v.clone()),
                    None if f.is_required() => violations.push(FieldViolation::new(&f.name, "this field is required")),
                    None => {}
                },
                DecodeMode::Replace(_) if f.is_required() => {
                    violations.push(FieldViolation::new(&f.name, "this field is required"))
                }
                DecodeMode::Replace(_) | DecodeMode::Partial(_) => {}
            },
            Some(Value::Null) => {
                if f.nullable {
                    row.set(f.name.clone(), Scalar::Null);
                } else {
                    violations.push(FieldViolation::new(&f.name, "may not be null"));
                }
            }
            Some(v) => match coerce_json(&f.field_type, v) {
                Ok(mut scalar) => {
                    rules::check_field(f, &mut scalar, &mut violations);
                    row.set(f.name.clone(), scalar);
                }
                Err(reason) => violations.push(FieldViolation::new(&f.name, reason)),
            },
        }
    }

    if violations.is_empty() {
        Ok(row)
    } else {
        Err(AppError::Validation(violations))
    }
}

/// On create the key is taken from the payload or generated. On update a supplied
/// key must equal the path id and is never written.
fn decode_key(
    f: &FieldSchema,
    supplied: Option<&Value>,
    mode: DecodeMode,
    violations: &mut Vec<FieldViolation>,
) -> Option<Scalar> {
    match (mode.path_id(), supplied) {
        (None, None | Some(Value::Null)) => Some(Scalar::Uuid(Uuid::new_v4())),
        (None, Some(v)) => match coerce_json(&f.field_type, v) {
            Ok(id) => Some(id),
            Err(reason) => {
                violations.push(FieldViolation::new(&f.name, reason));
                None
            }
        },
        (Some(_), None) => None,
        (Some(path_id), Some(v)) => {
            if coerce_json(&f.field_type, v).ok().and_then(|s| s.as_uuid()) != Some(path_id) {
                violations.push(FieldViolation::new(&f.name, "must match the identifier in the path"));
            }
            None
        }
    }
}

fn now_for(field_type: &FieldType, now: chrono::DateTime<Utc>) -> Scalar {
    match field_type {
        FieldType::Date => Scalar::Date(now.date_naive()),
        _ => Scalar::Timestamp(now),
    }
}

/// Check that every non-null foreign key in `row` names an existing row. Each
/// target is looked up through its own alias connection. Misses are aggregated
/// into one [`AppError::ForeignKeyViolation`].
pub async fn verify_references(
    resolver: &ModelResolver<'_>,
    schema: &TableSchema,
    row: &RowValue,
) -> Result<(), AppError> {
    let mut violations = Vec::new();
    for (field, target) in schema.foreign_keys() {
        let Some(value) = row.get(&field.name).filter(|v| !v.is_null()) else {
            continue;
        };
        let handle = resolver.resolve_reference(target).await?;
        let target_schema = handle.schema();
        let key = target_schema
            .field(&target.field)
            .unwrap_or_else(|| target_schema.primary_key_field());
        let found = handle
            .store()
            .exists(target_schema, key, value)
            .await
            .map_err(|e| AppError::from_store(target_schema, "reference check", e))?;
        if !found {
            violations.push(FieldViolation::new(
                &field.name,
                format!("no {} exists with this identifier", target.table),
            ));
        }
    }
    if violations.is_empty() {
        Ok(())
    } else {
        Err(AppError::ForeignKeyViolation(violations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::IsolationRouter;
    use crate::storage::TableStore;
    use crate::test_support::{sample_catalog, StaticConnector};
    use serde_json::json;

    fn violations(err: AppError) -> Vec<FieldViolation> {
        match err {
            AppError::Validation(v) | AppError::ForeignKeyViolation(v) => v,
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_create_generates_key_and_applies_defaults() {
        let catalog = sample_catalog();
        let movie = catalog.describe_table("db3", "movie").unwrap();
        let row = decode(&movie, &json!({ "title": "Heat" }), DecodeMode::Create).unwrap();
        assert!(row.get("id").and_then(|v| v.as_uuid()).is_some());
        assert_eq!(row.get("in_stock"), Some(&Scalar::Boolean(true)));
        assert!(!row.contains("released"));
    }

    #[test]
    fn test_create_aggregates_every_violation() {
        let catalog = sample_catalog();
        let animal = catalog.describe_table("db2", "animal").unwrap();
        let err = decode(&animal, &json!({ "age": "old", "breed": "nope" }), DecodeMode::Create).unwrap_err();
        let v = violations(err);
        let fields: Vec<&str> = v.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "age", "breed"]);
    }

    #[test]
    fn test_nul_in_text_is_a_field_violation() {
        let catalog = sample_catalog();
        let product = catalog.describe_table("db1", "product").unwrap();
        let v = violations(decode(&product, &json!({ "name": "a\u{0}b", "price": 1 }), DecodeMode::Create).unwrap_err());
        assert_eq!(v, vec![FieldViolation::new("name", "may not contain NUL characters")]);
    }

    #[test]
    fn test_non_object_payload() {
        let catalog = sample_catalog();
        let animal = catalog.describe_table("db2", "animal").unwrap();
        let v = violations(decode(&animal, &json!([1, 2]), DecodeMode::Create).unwrap_err());
        assert_eq!(v[0].field, NON_FIELD_ERRORS);
    }

    #[test]
    fn test_partial_only_carries_supplied_fields() {
        let catalog = sample_catalog();
        let animal = catalog.describe_table("db2", "animal").unwrap();
        let id = Uuid::new_v4();
        let row = decode(&animal, &json!({ "age": 4 }), DecodeMode::Partial(id)).unwrap();
        assert_eq!(row.get("age"), Some(&Scalar::Integer(4)));
        assert!(!row.contains("name"));
        assert!(!row.contains("id"));
        // auto_now is refreshed on every write
        assert!(row.contains("updated"));
    }

    #[test]
    fn test_replace_requires_required_fields() {
        let catalog = sample_catalog();
        let animal = catalog.describe_table("db2", "animal").unwrap();
        let v = violations(decode(&animal, &json!({ "age": 4 }), DecodeMode::Replace(Uuid::new_v4())).unwrap_err());
        assert_eq!(v, vec![FieldViolation::new("name", "this field is required")]);
    }

    #[test]
    fn test_update_key_must_match_path() {
        let catalog = sample_catalog();
        let animal = catalog.describe_table("db2", "animal").unwrap();
        let id = Uuid::new_v4();
        let same = json!({ "id": id.to_string(), "age": 4 });
        assert!(decode(&animal, &same, DecodeMode::Partial(id)).is_ok());
        let other = json!({ "id": Uuid::new_v4().to_string() });
        let v = violations(decode(&animal, &other, DecodeMode::Partial(id)).unwrap_err());
        assert_eq!(v[0].field, "id");
    }

    #[test]
    fn test_null_handling() {
        let catalog = sample_catalog();
        let product = catalog.describe_table("db1", "product").unwrap();
        let row = decode(
            &product,
            &json!({ "name": "Widget", "price": 1, "description": null }),
            DecodeMode::Create,
        )
        .unwrap();
        assert_eq!(row.get("description"), Some(&Scalar::Null));
        let v = violations(decode(&product, &json!({ "name": null, "price": 1 }), DecodeMode::Create).unwrap_err());
        assert_eq!(v, vec![FieldViolation::new("name", "may not be null")]);
    }

    #[test]
    fn test_encode_declared_order_and_formats() {
        let catalog = sample_catalog();
        let product = catalog.describe_table("db1", "product").unwrap();
        let row = decode(&product, &json!({ "price": 9.99, "name": "Widget", "extra": 1 }), DecodeMode::Create).unwrap();
        let out = encode(&product, &row);
        let keys: Vec<&String> = out.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["id", "name", "description", "price", "category"]);
        assert_eq!(out["price"], json!(9.99));
        assert_eq!(out["description"], Value::Null);
        assert!(out["id"].is_string());
    }

    #[tokio::test]
    async fn test_verify_references_reports_missing_targets() {
        let catalog = sample_catalog();
        let router = IsolationRouter::new(&catalog, StaticConnector::for_catalog(&catalog));
        let resolver = ModelResolver::new(&catalog, &router);
        let animal = catalog.describe_table("db2", "animal").unwrap();
        let row = decode(
            &animal,
            &json!({ "name": "Rex", "breed": Uuid::new_v4().to_string() }),
            DecodeMode::Create,
        )
        .unwrap();
        let err = verify_references(&resolver, &animal, &row).await.unwrap_err();
        assert!(matches!(&err, AppError::ForeignKeyViolation(v) if v[0].field == "breed"));
    }

    #[tokio::test]
    async fn test_verify_references_crosses_into_target_alias() {
        let catalog = sample_catalog();
        let connector = StaticConnector::for_catalog(&catalog);
        let router = IsolationRouter::new(&catalog, connector.clone());
        let resolver = ModelResolver::new(&catalog, &router);

        let product = catalog.describe_table("db1", "product").unwrap();
        let stored = decode(&product, &json!({ "name": "Widget", "price": 2 }), DecodeMode::Create).unwrap();
        connector.store("db1").insert(&product, &stored).await.unwrap();

        let movie = catalog.describe_table("db3", "movie").unwrap();
        let product_id = stored.get("id").and_then(|v| v.as_uuid()).unwrap();
        let row = decode(
            &movie,
            &json!({ "title": "Heat", "featured_product": product_id.to_string() }),
            DecodeMode::Create,
        )
        .unwrap();
        verify_references(&resolver, &movie, &row).await.unwrap();
    }
}
