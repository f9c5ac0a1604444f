//! MCP server integration module.
//!
//! Bridges the rmcp protocol handler to the tool registry and resources.

pub mod service;

pub use service::SnowflakeService;
