//! Per-field checks applied after type coercion: column constraints and the config `rules` block.

use crate::catalog::{FieldRules, FieldSchema};
use crate::codec::coerce::scalar_to_json;
use crate::error::FieldViolation;
use crate::value::Scalar;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;

/// Check a coerced, non-null value. Decimals may be rescaled to the field's
/// `decimal_places`, so the value is taken mutably. Every problem is pushed to `out`.
pub fn check_field(field: &FieldSchema, value: &mut Scalar, out: &mut Vec<FieldViolation>) {
    if value.is_null() {
        return;
    }
    let before = out.len();
    match value {
        Scalar::Text(s) => {
            if let Some(max) = field.max_length {
                if s.chars().count() > max as usize {
                    out.push(FieldViolation::new(
                        &field.name,
                        format!("must be at most {} characters", max),
                    ));
                }
            }
        }
        Scalar::Decimal(d) => check_digits(field, d, out),
        _ => {}
    }
    if out.len() == before {
        check_rules(&field.name, &field.rules, value, out);
    }
}

/// `max_digits` counts digits on both sides of the point; `decimal_places` caps the
/// fractional part and the value is padded to exactly that scale.
fn check_digits(field: &FieldSchema, d: &mut Decimal, out: &mut Vec<FieldViolation>) {
    let normalized = d.normalize();
    let places = normalized.scale();
    let whole = whole_digits(&normalized);

    if let Some(dp) = field.decimal_places {
        if places > dp {
            out.push(FieldViolation::new(
                &field.name,
                format!("must have no more than {} decimal places", dp),
            ));
            return;
        }
    }
    if let Some(max) = field.max_digits {
        if whole + places > max {
            out.push(FieldViolation::new(
                &field.name,
                format!("must have no more than {} digits in total", max),
            ));
            return;
        }
        if let Some(dp) = field.decimal_places {
            if whole > max.saturating_sub(dp) {
                out.push(FieldViolation::new(
                    &field.name,
                    format!(
                        "must have no more than {} digits before the decimal point",
                        max.saturating_sub(dp)
                    ),
                ));
                return;
            }
        }
    }
    if let Some(dp) = field.decimal_places {
        d.rescale(dp);
    }
}

fn whole_digits(d: &Decimal) -> u32 {
    let mut int = d.trunc().abs();
    let mut n = 0;
    while !int.is_zero() {
        int = (int / Decimal::TEN).trunc();
        n += 1;
    }
    n
}

fn check_rules(name: &str, rules: &FieldRules, value: &Scalar, out: &mut Vec<FieldViolation>) {
    if let Some(format) = &rules.format {
        check_format(name, value, format, out);
    }
    if let Scalar::Text(s) = value {
        let len = s.chars().count();
        if let Some(max) = rules.max_length {
            if len > max as usize {
                out.push(FieldViolation::new(name, format!("must be at most {} characters", max)));
            }
        }
        if let Some(min) = rules.min_length {
            if len < min as usize {
                out.push(FieldViolation::new(name, format!("must be at least {} characters", min)));
            }
        }
        if let Some(re) = &rules.pattern {
            if !re.is_match(s) {
                out.push(FieldViolation::new(name, "does not match required pattern"));
            }
        }
    }
    if let Some(allowed) = &rules.allowed {
        let json = scalar_to_json(value);
        if !allowed.iter().any(|a| value_eq(&json, a)) {
            out.push(FieldViolation::new(
                name,
                format!(
                    "must be one of: {}",
                    allowed.iter().take(5).map(|a| a.to_string()).collect::<Vec<_>>().join(", ")
                ),
            ));
        }
    }
    let numeric = match value {
        Scalar::Integer(n) => Some(*n as f64),
        Scalar::Decimal(d) => d.to_f64(),
        _ => None,
    };
    if let Some(n) = numeric {
        if let Some(min) = rules.minimum {
            if n < min {
                out.push(FieldViolation::new(name, format!("must be at least {}", min)));
            }
        }
        if let Some(max) = rules.maximum {
            if n > max {
                out.push(FieldViolation::new(name, format!("must be at most {}", max)));
            }
        }
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn check_format(name: &str, value: &Scalar, format: &str, out: &mut Vec<FieldViolation>) {
    let Scalar::Text(s) = value else { return };
    match format.to_lowercase().as_str() {
        "email" => {
            let valid = match s.split_once('@') {
                Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
                None => false,
            };
            if !valid {
                out.push(FieldViolation::new(name, "must be a valid email address"));
            }
        }
        "uuid" => {
            if uuid::Uuid::parse_str(s).is_err() {
                out.push(FieldViolation::new(name, "must be a valid UUID"));
            }
        }
        _ => {}
    }
}
