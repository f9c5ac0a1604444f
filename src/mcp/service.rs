//! MCP service implementation using rmcp.
//!
//! The tool set is only known after the service configuration is read, so
//! `ServerHandler` is implemented by hand over a [`ToolRegistry`] instead of
//! through the `#[tool_router]` macros.

use crate::config::{Config, ConnectionParams};
use crate::error::ServerResult;
use crate::policy::StatementPolicy;
use crate::registry::ToolRegistry;
use crate::resources::{self, RESOURCES};
use crate::warehouse::{SnowflakeProvider, StatementExecutor};
use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    model::{
        AnnotateAble, CallToolRequestParam, CallToolResult, Implementation, ListResourcesResult,
        ListToolsResult, PaginatedRequestParam, ProtocolVersion, RawResource,
        ReadResourceRequestParam, ReadResourceResult, Resource, ResourceContents,
        ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct SnowflakeService {
    /// Tools built at startup; shared read-only across sessions
    registry: Arc<ToolRegistry>,
    /// Resolved connection parameters, for the connection-info resource
    params: Arc<ConnectionParams>,
}

impl SnowflakeService {
    pub fn new(registry: Arc<ToolRegistry>, params: Arc<ConnectionParams>) -> Self {
        Self { registry, params }
    }

    /// Resolve credentials, load the service configuration and build the
    /// policy, provider and tool registry. Any failure here is fatal at startup.
    pub fn from_config(config: &Config) -> ServerResult<Self> {
        let params = config.connection_params()?;
        let service_config = config.service_config()?;
        let policy = StatementPolicy::from_service_config(&service_config, config.unlisted_statements)?;
        info!(
            allowed = policy.allowed().len(),
            disallowed = policy.disallowed().len(),
            unlisted = ?policy.unlisted(),
            "Statement policy loaded"
        );

        let provider =
            SnowflakeProvider::new(params.clone())?.with_session_params(config.session_params());
        let executor = StatementExecutor::new(Arc::new(provider), Arc::new(policy));
        let registry = ToolRegistry::build(&service_config, executor)?;
        Ok(Self::new(Arc::new(registry), Arc::new(params)))
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    fn resource_list() -> Vec<Resource> {
        RESOURCES
            .iter()
            .map(|def| {
                let mut raw = RawResource::new(def.uri, def.name);
                raw.description = Some(def.description.to_string());
                raw.mime_type = Some("application/json".to_string());
                raw.no_annotation()
            })
            .collect()
    }
}

impl ServerHandler for SnowflakeService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: "snowflake-mcp-server".to_owned(),
                title: Some("Snowflake MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Snowflake tools for querying and managing a Snowflake account.\n\
                \n\
                ## Workflow\n\
                1. Discover objects with `list_databases`, `list_schemas`, `list_tables`\n\
                2. Inspect a table with `describe_table` before writing queries against it\n\
                3. Run SQL with `execute_query`; pass `limit` to cap large results\n\
                \n\
                ## Responses\n\
                Every tool returns `{\"success\": true, ...}` or `{\"success\": false, \"error\": \"...\"}`.\n\
                Statements rejected by the server's permission policy fail with an error naming the\n\
                statement type; they are never sent to Snowflake.\n\
                \n\
                ## Cortex\n\
                `search_<service>` tools query Cortex Search services and accept an optional filter.\n\
                `analyst_<service>` tools send a natural language question to Cortex Analyst.\n\
                \n\
                ## Resources\n\
                - `snowflake://connection-info`: connection parameters (secret removed)\n\
                - `snowflake://query-examples`: example queries"
                    .to_string(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        async move { Ok(ListToolsResult::with_all_items(self.registry.list())) }
    }

    fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            let name: &str = &request.name;
            debug!(tool = %name, "Tool call");
            let call = self
                .registry
                .call(name, request.arguments.unwrap_or_default())
                .map_err(|e| {
                    warn!(tool = %name, "Unknown tool requested");
                    McpError::from(e)
                })?;
            Ok(call.await)
        }
    }

    fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        async move { Ok(ListResourcesResult::with_all_items(Self::resource_list())) }
    }

    fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ReadResourceResult, McpError>> + Send + '_ {
        async move {
            let uri = request.uri.as_str();
            let body = resources::read(uri, &self.params).map_err(|_| {
                McpError::resource_not_found(format!("Unknown resource: {}", uri), None)
            })?;
            let text = serde_json::to_string_pretty(&body)
                .map_err(|e| McpError::internal_error(e.to_string(), None))?;
            Ok(ReadResourceResult {
                contents: vec![ResourceContents::text(text, uri)],
            })
        }
    }
}
