//! Raw config types matching the gateway JSON document.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub databases: Vec<DatabaseConfig>,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub alias: String,
    /// Other accepted spellings of the alias (exact match, case-sensitive).
    #[serde(default)]
    pub alternates: Vec<String>,
    pub connection: ConnectionConfig,
    /// Physical tables that exist in the database but are not served (e.g. migration bookkeeping).
    #[serde(default)]
    pub ignore_tables: Vec<String>,
    #[serde(default)]
    pub tables: Vec<TableConfig>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Driver {
    Postgres,
    /// In-process storage for development and tests.
    Memory,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub driver: Driver,
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the DSN; takes precedence over `url`.
    #[serde(default)]
    pub url_env: Option<String>,
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

fn default_schema() -> String {
    "public".into()
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout() -> u64 {
    5
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableConfig {
    pub name: String,
    /// Alternate/plural names resolvable through the gateway.
    #[serde(default)]
    pub alternates: Vec<String>,
    /// Physical table name; defaults to `name`.
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    pub fields: Vec<FieldConfig>,
}

fn default_primary_key() -> String {
    "id".into()
}

impl TableConfig {
    pub fn physical_name(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldTypeConfig {
    Text,
    Integer,
    Decimal,
    Boolean,
    Timestamp,
    Date,
    Uuid,
    ForeignKey,
}

#[derive(Clone, Debug, Serialize)]
pub enum FieldDefaultConfig {
    /// Current time at insert.
    Now,
    Value(serde_json::Value),
}

impl<'de> Deserialize<'de> for FieldDefaultConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;
        match v {
            serde_json::Value::String(s) if s == "now" => Ok(FieldDefaultConfig::Now),
            serde_json::Value::Object(mut obj) => match obj.remove("value") {
                Some(inner) => Ok(FieldDefaultConfig::Value(inner)),
                None => Err(serde::de::Error::custom(format!(
                    "field default must be a literal, \"now\", or {{ \"value\": ... }}; got object with keys: {:?}",
                    obj.keys().collect::<Vec<_>>()
                ))),
            },
            serde_json::Value::Null => Err(serde::de::Error::custom(
                "field default cannot be null; mark the field nullable instead",
            )),
            other => Ok(FieldDefaultConfig::Value(other)),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    /// Physical column; defaults to `name`.
    #[serde(default)]
    pub column: Option<String>,
    #[serde(rename = "type")]
    pub type_: FieldTypeConfig,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<FieldDefaultConfig>,
    /// Refreshed to the current time on every write.
    #[serde(default)]
    pub auto_now: bool,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub max_digits: Option<u32>,
    #[serde(default)]
    pub decimal_places: Option<u32>,
    /// Foreign-key target: `"table"` in the same database or `"alias.table"`.
    #[serde(default)]
    pub references: Option<String>,
    #[serde(default)]
    pub rules: ValidationRule,
}

impl FieldConfig {
    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Reject requests that carry no authenticated principal.
    #[serde(default = "default_true")]
    pub required: bool,
    /// Header a trusted upstream proxy uses to forward the authenticated identity.
    #[serde(default = "default_principal_header")]
    pub principal_header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            required: true,
            principal_header: default_principal_header(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_principal_header() -> String {
    "x-authenticated-user".into()
}
