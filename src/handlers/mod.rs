//! HTTP handlers for the generic CRUD endpoint.

pub mod gateway;
pub use gateway::*;
