//! Read-only MCP resources.

use crate::config::ConnectionParams;
use crate::error::{ServerError, ServerResult};
use serde_json::{Value as JsonValue, json};

pub const CONNECTION_INFO_URI: &str = "snowflake://connection-info";
pub const QUERY_EXAMPLES_URI: &str = "snowflake://query-examples";

/// A static resource definition.
#[derive(Debug, Clone, Copy)]
pub struct ResourceDef {
    pub uri: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub const RESOURCES: [ResourceDef; 2] = [
    ResourceDef {
        uri: CONNECTION_INFO_URI,
        name: "connection-info",
        description: "Current Snowflake connection parameters, excluding the secret",
    },
    ResourceDef {
        uri: QUERY_EXAMPLES_URI,
        name: "query-examples",
        description: "Example SQL queries for common Snowflake operations",
    },
];

const QUERY_EXAMPLES: [(&str, &str); 6] = [
    ("Show current warehouse", "SHOW WAREHOUSES"),
    (
        "Get current database and schema",
        "SELECT CURRENT_DATABASE(), CURRENT_SCHEMA()",
    ),
    ("List all tables with row counts", "SHOW TABLES"),
    ("Query sample data", "SELECT * FROM table_name LIMIT 10"),
    (
        "Get table DDL",
        "SELECT GET_DDL('TABLE', 'database.schema.table_name')",
    ),
    ("Show user privileges", "SHOW GRANTS TO USER"),
];

pub fn connection_info(params: &ConnectionParams) -> JsonValue {
    json!({
        "connection_params": params.redacted(),
        "configured": params.is_configured(),
    })
}

pub fn query_examples() -> JsonValue {
    let examples: Vec<JsonValue> = QUERY_EXAMPLES
        .iter()
        .map(|(description, query)| json!({"description": description, "query": query}))
        .collect();
    json!({ "examples": examples })
}

/// Resolve a resource URI to its JSON body.
pub fn read(uri: &str, params: &ConnectionParams) -> ServerResult<JsonValue> {
    match uri {
        CONNECTION_INFO_URI => Ok(connection_info(params)),
        QUERY_EXAMPLES_URI => Ok(query_examples()),
        other => Err(ServerError::validation(format!("Unknown resource: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn params() -> ConnectionParams {
        Config {
            account: Some("myorg-acct".into()),
            user: Some("alice".into()),
            password: Some("pat-secret".into()),
            warehouse: Some("WH".into()),
            ..Config::default()
        }
        .connection_params()
        .unwrap()
    }

    #[test]
    fn test_connection_info_hides_secret() {
        let info = read(CONNECTION_INFO_URI, &params()).unwrap();
        assert_eq!(info["configured"], json!(true));
        assert_eq!(info["connection_params"]["account"], json!("myorg-acct"));
        assert!(info["connection_params"].get("password").is_none());
        assert!(!info.to_string().contains("pat-secret"));
    }

    #[test]
    fn test_query_examples() {
        let examples = read(QUERY_EXAMPLES_URI, &params()).unwrap();
        let list = examples["examples"].as_array().unwrap();
        assert_eq!(list.len(), 6);
        assert_eq!(list[0]["query"], json!("SHOW WAREHOUSES"));
    }

    #[test]
    fn test_unknown_resource() {
        assert!(read("snowflake://nope", &params()).is_err());
    }
}
