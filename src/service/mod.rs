//! CrudService: generic CRUD over a resolved handle, plus list-query parsing.

mod crud;
pub mod query;

pub use crud::{CrudService, Page};
pub use query::{list_query, DEFAULT_LIMIT, MAX_LIMIT};
