//! Load the gateway document from disk and process settings from the environment.

use crate::config::{validate, ConnectionConfig, GatewayConfig};
use crate::error::ConfigError;
use crate::routes::DEFAULT_BODY_LIMIT;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Process-level settings. Read once at startup.
#[derive(Clone, Debug)]
pub struct Settings {
    pub config_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub body_limit: usize,
}

impl Settings {
    /// Reads `GATEWAY_CONFIG`, `GATEWAY_HOST`, `GATEWAY_PORT`, `GATEWAY_BODY_LIMIT`.
    /// Loading a `.env` file is left to the binary.
    pub fn from_env() -> Self {
        let config_path = std::env::var("GATEWAY_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("gateway.json"));
        let host = std::env::var("GATEWAY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = std::env::var("GATEWAY_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8000);
        let body_limit = std::env::var("GATEWAY_BODY_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_BODY_LIMIT);
        Settings {
            config_path,
            host,
            port,
            body_limit,
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::Load(format!("invalid listen address: {}", e)))
    }
}

/// Parse a gateway document. Structural checks run in [`load_config_file`] and again at catalog build.
pub fn parse_config(json: &str) -> Result<GatewayConfig, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))
}

pub fn load_config_file(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    let config = parse_config(&text)?;
    validate(&config)?;
    tracing::info!(
        path = %path.display(),
        databases = config.databases.len(),
        "gateway config loaded"
    );
    Ok(config)
}

impl ConnectionConfig {
    /// DSN for this connection: `url_env` when set, else `url`.
    pub fn resolve_url(&self) -> Result<String, ConfigError> {
        if let Some(var) = &self.url_env {
            return std::env::var(var)
                .map_err(|_| ConfigError::Load(format!("environment variable {} is not set", var)));
        }
        self.url
            .clone()
            .ok_or_else(|| ConfigError::Validation("connection url missing".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Driver, FieldDefaultConfig, FieldTypeConfig};

    #[test]
    fn test_parse_applies_defaults() {
        let config = parse_config(
            r#"{
                "databases": [{
                    "alias": "db3",
                    "connection": { "driver": "postgres", "url": "postgres://localhost/db3" },
                    "tables": [{
                        "name": "movie",
                        "table": "app3_movie",
                        "fields": [
                            { "name": "id", "type": "uuid" },
                            { "name": "title", "type": "text", "max_length": 255 },
                            { "name": "added", "type": "timestamp", "default": "now" },
                            { "name": "rating", "type": "integer", "default": 3 }
                        ]
                    }]
                }]
            }"#,
        )
        .unwrap();
        let db = &config.databases[0];
        assert_eq!(db.connection.driver, Driver::Postgres);
        assert_eq!(db.connection.schema, "public");
        assert_eq!(db.connection.max_connections, 5);
        let table = &db.tables[0];
        assert_eq!(table.primary_key, "id");
        assert_eq!(table.physical_name(), "app3_movie");
        assert_eq!(table.fields[1].type_, FieldTypeConfig::Text);
        assert!(!table.fields[1].nullable);
        assert!(matches!(table.fields[2].default, Some(FieldDefaultConfig::Now)));
        assert!(matches!(table.fields[3].default, Some(FieldDefaultConfig::Value(_))));
        assert!(config.auth.required);
        assert_eq!(config.auth.principal_header, "x-authenticated-user");
    }

    #[test]
    fn test_settings_from_process_environment() {
        std::env::set_var("GATEWAY_PORT", "9123");
        std::env::set_var("GATEWAY_BODY_LIMIT", "not-a-number");
        let settings = Settings::from_env();
        assert_eq!(settings.port, 9123);
        assert_eq!(settings.body_limit, DEFAULT_BODY_LIMIT);
        std::env::remove_var("GATEWAY_PORT");
        std::env::remove_var("GATEWAY_BODY_LIMIT");
    }

    #[test]
    fn test_resolve_url_prefers_env() {
        std::env::set_var("CRUD_GATEWAY_TEST_DSN", "postgres://env/db");
        let conn: ConnectionConfig = serde_json::from_value(serde_json::json!({
            "driver": "postgres",
            "url": "postgres://file/db",
            "url_env": "CRUD_GATEWAY_TEST_DSN"
        }))
        .unwrap();
        assert_eq!(conn.resolve_url().unwrap(), "postgres://env/db");
    }

    #[test]
    fn test_parse_rejects_unknown_type() {
        let err = parse_config(
            r#"{ "databases": [{ "alias": "a", "connection": { "driver": "memory" },
                 "tables": [{ "name": "t", "fields": [{ "name": "id", "type": "blob" }] }] }] }"#,
        );
        assert!(matches!(err, Err(ConfigError::Load(_))));
    }
}
