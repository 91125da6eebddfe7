//! Bind typed scalars to sqlx queries.

use crate::value::Scalar;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::{Query, QueryScalar};

/// Bind one scalar with its native PostgreSQL type. Nulls go in as untyped
/// text; the builder's `$n::type` cast gives them the column type.
pub fn bind_scalar<'q>(query: Query<'q, Postgres, PgArguments>, value: &Scalar) -> Query<'q, Postgres, PgArguments> {
    match value {
        Scalar::Null => query.bind(None::<String>),
        Scalar::Text(s) => query.bind(s.clone()),
        Scalar::Integer(n) => query.bind(*n),
        Scalar::Decimal(d) => query.bind(*d),
        Scalar::Boolean(b) => query.bind(*b),
        Scalar::Timestamp(t) => query.bind(*t),
        Scalar::Date(d) => query.bind(*d),
        Scalar::Uuid(u) => query.bind(*u),
    }
}

pub fn bind_all<'q>(mut query: Query<'q, Postgres, PgArguments>, params: &[Scalar]) -> Query<'q, Postgres, PgArguments> {
    for p in params {
        query = bind_scalar(query, p);
    }
    query
}

/// Same as [`bind_scalar`] for single-column queries.
pub fn bind_scalar_as<'q, O>(
    query: QueryScalar<'q, Postgres, O, PgArguments>,
    value: &Scalar,
) -> QueryScalar<'q, Postgres, O, PgArguments> {
    match value {
        Scalar::Null => query.bind(None::<String>),
        Scalar::Text(s) => query.bind(s.clone()),
        Scalar::Integer(n) => query.bind(*n),
        Scalar::Decimal(d) => query.bind(*d),
        Scalar::Boolean(b) => query.bind(*b),
        Scalar::Timestamp(t) => query.bind(*t),
        Scalar::Date(d) => query.bind(*d),
        Scalar::Uuid(u) => query.bind(*u),
    }
}
