//! Configuration handling for the Snowflake MCP Server.
//!
//! Two layers:
//! - [`Config`]: CLI arguments with environment-variable fallbacks (credentials,
//!   transport, logging, timeouts).
//! - [`ServiceConfig`]: the YAML service-configuration document (Cortex services,
//!   enabled tool groups, SQL statement permissions).

use crate::error::{ServerError, ServerResult};
use crate::warehouse::SessionParams;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_MCP_ENDPOINT: &str = "/";
pub const DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// Snowflake's own upper bound for STATEMENT_TIMEOUT_IN_SECONDS (7 days).
pub const MAX_STATEMENT_TIMEOUT_SECS: u64 = 604_800;
pub const MAX_CONNECT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_SEARCH_LIMIT: u32 = 10;

/// Transport mode for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportMode {
    /// Standard input/output (for CLI integration)
    #[default]
    Stdio,
    /// Streamable HTTP (for web clients)
    Http,
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// What happens to a statement type that is in neither the allowed nor the
/// disallowed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnlistedStatements {
    #[default]
    Allow,
    Deny,
}

impl fmt::Display for UnlistedStatements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => write!(f, "allow"),
            Self::Deny => write!(f, "deny"),
        }
    }
}

/// Configuration for the Snowflake MCP Server.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "snowflake-mcp-server",
    about = "MCP server for Snowflake - SQL execution, schema introspection and Cortex services for AI assistants",
    version,
    author
)]
pub struct Config {
    /// Snowflake account identifier (e.g. myorg-myaccount)
    #[arg(long, env = "SNOWFLAKE_ACCOUNT")]
    pub account: Option<String>,

    /// Snowflake user name
    #[arg(long, env = "SNOWFLAKE_USER")]
    pub user: Option<String>,

    /// Programmatic access token used as the password
    #[arg(long, env = "SNOWFLAKE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Default warehouse
    #[arg(long, env = "SNOWFLAKE_WAREHOUSE")]
    pub warehouse: Option<String>,

    /// Default database
    #[arg(long, env = "SNOWFLAKE_DATABASE")]
    pub database: Option<String>,

    /// Default schema
    #[arg(long, env = "SNOWFLAKE_SCHEMA")]
    pub schema: Option<String>,

    /// Default role
    #[arg(long, env = "SNOWFLAKE_ROLE")]
    pub role: Option<String>,

    /// Base URL of the Snowflake REST API (default: https://<account>.snowflakecomputing.com)
    #[arg(long, env = "SNOWFLAKE_HOST")]
    pub host: Option<String>,

    /// Path to the YAML service configuration file
    #[arg(long, value_name = "PATH", env = "SERVICE_CONFIG_FILE")]
    pub service_config_file: Option<PathBuf>,

    /// QUERY_TAG session parameter attached to every statement
    #[arg(long, env = "SNOWFLAKE_QUERY_TAG")]
    pub query_tag: Option<String>,

    /// Policy for statement types not listed in sql_statement_permissions.
    /// Overrides the value from the service configuration file.
    #[arg(long, value_enum, env = "MCP_UNLISTED_STATEMENTS")]
    pub unlisted_statements: Option<UnlistedStatements>,

    /// Statement timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_STATEMENT_TIMEOUT_SECS,
        env = "MCP_STATEMENT_TIMEOUT"
    )]
    pub statement_timeout: u64,

    /// Connection timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        env = "MCP_CONNECT_TIMEOUT"
    )]
    pub connect_timeout: u64,

    /// Transport mode (stdio or http)
    #[arg(
        short,
        long,
        value_enum,
        default_value = "stdio",
        env = "MCP_TRANSPORT"
    )]
    pub transport: TransportMode,

    /// HTTP host to bind to (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_HTTP_HOST,
        env = "MCP_HTTP_HOST"
    )]
    pub http_host: String,

    /// HTTP port to bind to (only used with http transport)
    #[arg(
        long,
        default_value_t = DEFAULT_HTTP_PORT,
        env = "MCP_HTTP_PORT"
    )]
    pub http_port: u16,

    /// MCP endpoint path (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_MCP_ENDPOINT,
        env = "MCP_ENDPOINT"
    )]
    pub mcp_endpoint: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "MCP_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "MCP_JSON_LOGS")]
    pub json_logs: bool,

    /// Enable logging output (disabled by default to avoid interfering with stdio transport)
    #[arg(long, env = "MCP_ENABLE_LOGS")]
    pub enable_logs: bool,
}

impl Config {
    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            account: None,
            user: None,
            password: None,
            warehouse: None,
            database: None,
            schema: None,
            role: None,
            host: None,
            query_tag: None,
            service_config_file: None,
            unlisted_statements: None,
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT_SECS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            transport: TransportMode::Stdio,
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            mcp_endpoint: DEFAULT_MCP_ENDPOINT.to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            enable_logs: false,
        }
    }

    /// Resolve and validate connection parameters.
    ///
    /// Account, user and password are required and must be non-blank.
    /// Optional values that are blank are treated as absent.
    pub fn connection_params(&self) -> ServerResult<ConnectionParams> {
        self.validate()?;
        let required = [
            ("SNOWFLAKE_ACCOUNT", &self.account),
            ("SNOWFLAKE_USER", &self.user),
            ("SNOWFLAKE_PASSWORD", &self.password),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, v)| non_blank(v).is_none())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(ServerError::configuration(format!(
                "Missing required Snowflake credentials: {}. Set them in the environment or pass --account/--user/--password.",
                missing.join(", ")
            )));
        }

        let params = ConnectionParams {
            account: non_blank(&self.account).unwrap_or_default(),
            user: non_blank(&self.user).unwrap_or_default(),
            password: non_blank(&self.password).unwrap_or_default(),
            warehouse: non_blank(&self.warehouse),
            database: non_blank(&self.database),
            schema: non_blank(&self.schema),
            role: non_blank(&self.role),
            host: non_blank(&self.host),
            statement_timeout: self.statement_timeout_duration(),
            connect_timeout: self.connect_timeout_duration(),
        };
        // Fail at startup rather than on the first tool call.
        params.base_url()?;
        Ok(params)
    }

    /// Load the service configuration file, or the defaults if none is set.
    pub fn service_config(&self) -> ServerResult<ServiceConfig> {
        match &self.service_config_file {
            Some(path) => ServiceConfig::load(path),
            None => Ok(ServiceConfig::default()),
        }
    }

    /// Session parameters applied to every statement.
    pub fn session_params(&self) -> SessionParams {
        let mut params = SessionParams::new();
        if let Some(tag) = non_blank(&self.query_tag) {
            params.insert("QUERY_TAG".to_string(), serde_json::Value::String(tag));
        }
        params
    }

    /// Reject settings that would make every statement fail.
    pub fn validate(&self) -> ServerResult<()> {
        check_timeout("statement_timeout", self.statement_timeout, MAX_STATEMENT_TIMEOUT_SECS)?;
        check_timeout("connect_timeout", self.connect_timeout, MAX_CONNECT_TIMEOUT_SECS)?;
        Ok(())
    }

    /// Get the statement timeout as a Duration.
    pub fn statement_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.statement_timeout)
    }

    /// Get the connection timeout as a Duration.
    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

fn check_timeout(name: &str, secs: u64, max: u64) -> ServerResult<()> {
    if secs == 0 {
        return Err(ServerError::configuration(format!(
            "{} must be greater than 0",
            name
        )));
    }
    if secs > max {
        return Err(ServerError::configuration(format!(
            "{} ({}s) cannot exceed {}s",
            name, secs, max
        )));
    }
    Ok(())
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Resolved connection parameters. Immutable after startup.
#[derive(Clone)]
pub struct ConnectionParams {
    pub account: String,
    pub user: String,
    /// Sensitive - never logged or exposed through resources.
    pub password: String,
    pub warehouse: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub role: Option<String>,
    pub host: Option<String>,
    pub statement_timeout: Duration,
    pub connect_timeout: Duration,
}

impl ConnectionParams {
    /// Base URL of the REST API.
    pub fn base_url(&self) -> ServerResult<Url> {
        let raw = match &self.host {
            Some(host) if host.contains("://") => host.clone(),
            Some(host) => format!("https://{}", host),
            None => format!("https://{}.snowflakecomputing.com", self.account),
        };
        Url::parse(&raw).map_err(|e| {
            ServerError::configuration(format!("Invalid Snowflake host '{}': {}", raw, e))
        })
    }

    /// Connection parameters with the secret removed.
    pub fn redacted(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("account".into(), self.account.clone().into());
        map.insert("user".into(), self.user.clone().into());
        let optional = [
            ("warehouse", &self.warehouse),
            ("database", &self.database),
            ("schema", &self.schema),
            ("role", &self.role),
            ("host", &self.host),
        ];
        for (key, value) in optional {
            if let Some(v) = value {
                map.insert(key.into(), v.clone().into());
            }
        }
        serde_json::Value::Object(map)
    }

    /// Whether the identifying parameters are present.
    pub fn is_configured(&self) -> bool {
        !self.account.is_empty() && !self.user.is_empty()
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("account", &self.account)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("role", &self.role)
            .field("host", &self.host)
            .field("statement_timeout", &self.statement_timeout)
            .finish()
    }
}

// =========================================================================
// Service configuration (YAML)
// =========================================================================

/// The service configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub search_services: Vec<SearchServiceConfig>,

    #[serde(default)]
    pub analyst_services: Vec<AnalystServiceConfig>,

    #[serde(default)]
    pub other_services: OtherServices,

    #[serde(default)]
    pub sql_statement_permissions: Vec<PermissionRule>,

    /// Policy for statement types in neither set (default: allow)
    #[serde(default)]
    pub unlisted_statements: Option<UnlistedStatements>,
}

impl ServiceConfig {
    /// Load and parse a YAML service configuration file.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ServerError::configuration(format!(
                "Failed to read service config '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content).map_err(|e| match e {
            ServerError::Configuration { message } => {
                ServerError::configuration(format!("{}: {}", path.display(), message))
            }
            other => other,
        })
    }

    /// Parse a YAML document. An empty document yields the defaults.
    pub fn from_yaml(content: &str) -> ServerResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
            .map_err(|e| ServerError::configuration(format!("Invalid service config: {}", e)))
    }

    /// Flatten the permission rules into `(token, allow)` pairs, in document order.
    pub fn permission_pairs(&self) -> Vec<(String, bool)> {
        self.sql_statement_permissions
            .iter()
            .flat_map(PermissionRule::pairs)
            .collect()
    }
}

/// A Cortex Search service exposed as `search_<name>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchServiceConfig {
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub database_name: String,
    #[serde(default)]
    pub schema_name: String,
    /// Columns returned when the caller does not ask for specific ones
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    /// Maximum results per query (default: 10)
    #[serde(default)]
    pub limit: Option<u32>,
}

impl SearchServiceConfig {
    pub fn limit_or_default(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_SEARCH_LIMIT)
    }
}

/// A Cortex Analyst service exposed as `analyst_<name>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalystServiceConfig {
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub description: String,
    /// Stage path to a semantic model YAML (`@db.schema.stage/file.yaml`)
    /// or a fully qualified semantic view name
    #[serde(default)]
    pub semantic_model: String,
}

/// Toggles for the built-in tool groups. All default to enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtherServices {
    #[serde(default = "enabled")]
    pub object_manager: bool,
    #[serde(default = "enabled")]
    pub query_manager: bool,
    #[serde(default = "enabled")]
    pub semantic_manager: bool,
}

fn enabled() -> bool {
    true
}

impl Default for OtherServices {
    fn default() -> Self {
        Self {
            object_manager: true,
            query_manager: true,
            semantic_manager: true,
        }
    }
}

/// One entry of `sql_statement_permissions`.
///
/// Accepts both `{type: Select, allow: true}` and the single-key shorthand
/// `- Select: true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PermissionRule {
    Explicit {
        #[serde(rename = "type")]
        statement_type: String,
        allow: bool,
    },
    Shorthand(BTreeMap<String, bool>),
}

impl PermissionRule {
    pub fn pairs(&self) -> Vec<(String, bool)> {
        match self {
            Self::Explicit {
                statement_type,
                allow,
            } => vec![(statement_type.clone(), *allow)],
            Self::Shorthand(map) => map.iter().map(|(k, v)| (k.clone(), *v)).collect(),
        }
    }
}
