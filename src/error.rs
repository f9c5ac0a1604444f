//! Error types for the Snowflake MCP Server.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Each error variant carries a message written for the calling agent, so that a
//! failed tool call can be understood and corrected without reading server logs.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Invalid input: {message}")]
    Validation { message: String },

    #[error("Statement not permitted: {statement_type} statements are disallowed by the server policy")]
    Authorization { statement_type: String },

    #[error("Execution failed: {message}")]
    Execution {
        message: String,
        /// e.g., "002003" for object does not exist
        sql_state: Option<String>,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ServerError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an authorization error for a denied statement type.
    pub fn authorization(statement_type: impl Into<String>) -> Self {
        Self::Authorization {
            statement_type: statement_type.into(),
        }
    }

    /// Create an execution error with optional SQL state.
    pub fn execution(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Execution {
            message: message.into(),
            sql_state,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Message as shown inside a failed tool envelope.
    pub fn envelope_message(&self) -> String {
        match self {
            Self::Execution {
                message,
                sql_state: Some(code),
            } => format!("{} (SQLSTATE: {})", message, code),
            Self::Connection {
                message,
                suggestion,
            } => format!("Connection failed: {}. {}", message, suggestion),
            other => other.to_string(),
        }
    }
}

/// Convert reqwest errors to ServerError.
impl From<reqwest::Error> for ServerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServerError::connection(
                format!("Request timed out: {}", err),
                "Check network connectivity or raise the statement timeout",
            )
        } else if err.is_connect() || err.is_request() {
            ServerError::connection(
                err.to_string(),
                "Check the account identifier and that Snowflake is reachable",
            )
        } else if err.is_decode() {
            ServerError::internal(format!("Failed to decode Snowflake response: {}", err))
        } else {
            ServerError::internal(format!("HTTP client error: {}", err))
        }
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        ServerError::validation(format!("Invalid arguments: {}", err))
    }
}

/// Result type alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Build suggestion data as JSON value.
fn suggestion_data(suggestion: Option<&str>) -> Option<serde_json::Value> {
    suggestion.map(|s| serde_json::json!({ "suggestion": s }))
}

/// Convert ServerError to MCP ErrorData for protocol-level failures
/// (unknown tool, unknown resource). Tool-time failures never take this path.
impl From<ServerError> for rmcp::ErrorData {
    fn from(err: ServerError) -> Self {
        match &err {
            ServerError::Validation { .. } | ServerError::Authorization { .. } => {
                rmcp::ErrorData::invalid_params(err.to_string(), None)
            }
            ServerError::Execution { .. } => {
                rmcp::ErrorData::invalid_params(err.envelope_message(), None)
            }
            ServerError::Connection { suggestion, .. } => {
                rmcp::ErrorData::internal_error(err.to_string(), suggestion_data(Some(suggestion)))
            }
            ServerError::Configuration { .. } | ServerError::Internal { .. } => {
                rmcp::ErrorData::internal_error(err.to_string(), None)
            }
        }
    }
}
