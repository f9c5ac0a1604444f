//! Snowflake MCP Server Library
//!
//! Exposes Snowflake SQL execution, schema introspection, table DDL and Cortex
//! Search / Cortex Analyst services as MCP tools for AI assistants.

pub mod config;
pub mod error;
pub mod mcp;
pub mod policy;
pub mod registry;
pub mod resources;
pub mod sql;
pub mod tools;
pub mod transport;
pub mod warehouse;

pub use config::Config;
pub use error::{ServerError, ServerResult};
pub use mcp::SnowflakeService;
pub use registry::ToolRegistry;
