//! CRUD gateway: one HTTP endpoint serving any configured table in any of several
//! isolated databases, selected by the `db` and `table` query parameters.

pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod resolver;
pub mod response;
pub mod router;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod storage;
pub mod value;

#[cfg(test)]
pub(crate) mod test_support;

pub use catalog::Catalog;
pub use config::{load_config_file, parse_config, GatewayConfig, Settings};
pub use error::{AppError, ConfigError, FieldViolation};
pub use extractors::Principal;
pub use resolver::{ModelResolver, ResolvedHandle};
pub use router::{Connector, DriverConnector, IsolationRouter};
pub use routes::{app, common_routes, gateway_routes, DEFAULT_BODY_LIMIT};
pub use service::CrudService;
pub use state::AppState;
pub use storage::{MemoryStore, PgStore, StoreError, TableStore};
pub use value::{RowValue, Scalar};
