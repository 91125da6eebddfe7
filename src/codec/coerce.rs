//! JSON and query-string values to typed scalars, and back.

use crate::catalog::FieldType;
use crate::value::Scalar;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde_json::{Number, Value};
use std::str::FromStr;
use uuid::Uuid;

/// Coerce one JSON value to `field_type`. `null` passes through; nullability is the caller's check.
/// The error is a human-readable reason, without the offending value.
pub fn coerce_json(field_type: &FieldType, v: &Value) -> Result<Scalar, String> {
    if v.is_null() {
        return Ok(Scalar::Null);
    }
    match field_type {
        FieldType::Text => match v {
            // PostgreSQL text cannot hold NUL.
            Value::String(s) if s.contains('\0') => Err("may not contain NUL characters".into()),
            Value::String(s) => Ok(Scalar::Text(s.clone())),
            _ => Err("must be a string".into()),
        },
        FieldType::Integer => match v {
            Value::Number(n) => n
                .as_i64()
                .map(Scalar::Integer)
                .ok_or_else(|| "must be a whole number".to_string()),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Scalar::Integer)
                .map_err(|_| "must be a whole number".to_string()),
            _ => Err("must be a whole number".into()),
        },
        FieldType::Decimal => match v {
            Value::Number(n) => parse_decimal(&n.to_string()).map(Scalar::Decimal),
            Value::String(s) => parse_decimal(s.trim()).map(Scalar::Decimal),
            _ => Err("must be a number".into()),
        },
        FieldType::Boolean => match v {
            Value::Bool(b) => Ok(Scalar::Boolean(*b)),
            Value::String(s) => parse_bool(s).map(Scalar::Boolean),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Ok(Scalar::Boolean(false)),
                Some(1) => Ok(Scalar::Boolean(true)),
                _ => Err("must be a boolean".into()),
            },
            _ => Err("must be a boolean".into()),
        },
        FieldType::Timestamp => match v {
            Value::String(s) => parse_timestamp(s).map(Scalar::Timestamp),
            _ => Err("must be an ISO 8601 datetime string".into()),
        },
        FieldType::Date => match v {
            Value::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map(Scalar::Date)
                .map_err(|_| "must be a date in YYYY-MM-DD format".to_string()),
            _ => Err("must be a date in YYYY-MM-DD format".into()),
        },
        FieldType::Uuid | FieldType::ForeignKey(_) => match v {
            Value::String(s) => Uuid::parse_str(s.trim())
                .map(Scalar::Uuid)
                .map_err(|_| "must be a valid UUID".to_string()),
            _ => Err("must be a valid UUID".into()),
        },
    }
}

/// Query-string filters arrive as text; reuse the JSON rules through a string value.
pub fn coerce_str(field_type: &FieldType, raw: &str) -> Result<Scalar, String> {
    coerce_json(field_type, &Value::String(raw.to_string()))
}

fn parse_decimal(s: &str) -> Result<Decimal, String> {
    let parsed = if s.contains(['e', 'E']) {
        Decimal::from_scientific(s)
    } else {
        Decimal::from_str_exact(s)
    };
    parsed.map_err(|_| "must be a number".to_string())
}

fn parse_bool(s: &str) -> Result<bool, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err("must be a boolean".into()),
    }
}

/// RFC 3339 with offset; a naive datetime is taken as UTC.
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(t.and_utc());
        }
    }
    Err("must be an ISO 8601 datetime string".into())
}

/// Canonical JSON for a stored scalar: identifiers and dates as strings,
/// decimals as exact numeric literals.
pub fn scalar_to_json(v: &Scalar) -> Value {
    match v {
        Scalar::Null => Value::Null,
        Scalar::Text(s) => Value::String(s.clone()),
        Scalar::Integer(n) => Value::Number((*n).into()),
        Scalar::Decimal(d) => Number::from_str(&d.to_string())
            .map(Value::Number)
            .unwrap_or_else(|_| Value::String(d.to_string())),
        Scalar::Boolean(b) => Value::Bool(*b),
        Scalar::Timestamp(t) => Value::String(t.to_rfc3339_opts(SecondsFormat::Micros, true)),
        Scalar::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
        Scalar::Uuid(u) => Value::String(u.to_string()),
    }
}
