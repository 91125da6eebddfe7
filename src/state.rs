//! Shared application state for all routes. Everything in it is read-only after startup.

use crate::catalog::{self, Catalog};
use crate::config::{AuthConfig, GatewayConfig};
use crate::error::ConfigError;
use crate::resolver::ModelResolver;
use crate::router::{Connector, DriverConnector, IsolationRouter};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub router: Arc<IsolationRouter>,
    pub auth: Arc<AuthConfig>,
}

impl AppState {
    /// Build the catalog and a router that opens each alias with its configured driver.
    pub fn initialize(config: &GatewayConfig) -> Result<Self, ConfigError> {
        Self::initialize_with(config, Arc::new(DriverConnector))
    }

    pub fn initialize_with(config: &GatewayConfig, connector: Arc<dyn Connector>) -> Result<Self, ConfigError> {
        let catalog = Arc::new(catalog::build(config)?);
        let router = Arc::new(IsolationRouter::new(&catalog, connector));
        Ok(AppState {
            catalog,
            router,
            auth: Arc::new(config.auth.clone()),
        })
    }

    /// Compare the catalog with every database's physical tables. Connects each alias.
    pub async fn verify(&self) -> Result<(), ConfigError> {
        self.catalog.verify_physical(&self.router).await
    }

    pub fn resolver(&self) -> ModelResolver<'_> {
        ModelResolver::new(&self.catalog, &self.router)
    }
}
