//! Typed scalars and generic rows shared by the codec and the storage drivers.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use uuid::Uuid;

/// One stored cell, already coerced to its field's logical type.
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Null,
    Text(String),
    Integer(i64),
    Decimal(Decimal),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Uuid(Uuid),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Scalar::Uuid(u) => Some(*u),
            _ => None,
        }
    }

    /// Ordering used for `ordering=` on lists. Nulls sort last, as PostgreSQL
    /// does by default; values of different kinds never compare.
    pub fn compare(&self, other: &Scalar) -> Option<Ordering> {
        match (self, other) {
            (Scalar::Null, Scalar::Null) => Some(Ordering::Equal),
            (Scalar::Null, _) => Some(Ordering::Greater),
            (_, Scalar::Null) => Some(Ordering::Less),
            (Scalar::Text(a), Scalar::Text(b)) => Some(a.cmp(b)),
            (Scalar::Integer(a), Scalar::Integer(b)) => Some(a.cmp(b)),
            (Scalar::Decimal(a), Scalar::Decimal(b)) => Some(a.cmp(b)),
            (Scalar::Boolean(a), Scalar::Boolean(b)) => Some(a.cmp(b)),
            (Scalar::Timestamp(a), Scalar::Timestamp(b)) => Some(a.cmp(b)),
            (Scalar::Date(a), Scalar::Date(b)) => Some(a.cmp(b)),
            (Scalar::Uuid(a), Scalar::Uuid(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// A record as an ordered mapping from field name to scalar.
///
/// Keys are API field names, not physical column names. Insertion order is
/// kept so a row decoded from a schema lists its fields in declared order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowValue {
    entries: Vec<(String, Scalar)>,
}

impl RowValue {
    pub fn new() -> Self {
        RowValue { entries: Vec::new() }
    }

    pub fn get(&self, field: &str) -> Option<&Scalar> {
        self.entries.iter().find(|(k, _)| k == field).map(|(_, v)| v)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == field)
    }

    /// Insert or replace a field, keeping its original position on replace.
    pub fn set(&mut self, field: impl Into<String>, value: Scalar) {
        let field = field.into();
        match self.entries.iter_mut().find(|(k, _)| *k == field) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((field, value)),
        }
    }

    pub fn remove(&mut self, field: &str) -> Option<Scalar> {
        let pos = self.entries.iter().position(|(k, _)| k == field)?;
        Some(self.entries.remove(pos).1)
    }

    /// Overwrite fields of `self` with every field present in `changes`.
    pub fn merge(&mut self, changes: &RowValue) {
        for (k, v) in changes.iter() {
            self.set(k, v.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Scalar)> for RowValue {
    fn from_iter<I: IntoIterator<Item = (String, Scalar)>>(iter: I) -> Self {
        let mut row = RowValue::new();
        for (k, v) in iter {
            row.set(k, v);
        }
        row
    }
}
