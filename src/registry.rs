//! Tool registry.
//!
//! Built once at startup from the service configuration: the built-in tool groups
//! enabled by `other_services`, then one `search_<name>` tool per Cortex Search
//! service and one `analyst_<name>` tool per Cortex Analyst service. Registered
//! names are unique; a collision is a configuration error.

use crate::config::{AnalystServiceConfig, SearchServiceConfig, ServiceConfig};
use crate::error::{ServerError, ServerResult};
use crate::tools::{
    AnalystInput, CortexAnalystTool, CortexSearchTool, CreateTableInput, DdlToolHandler,
    DescribeSemanticViewInput, DescribeTableInput, DropTableInput, Envelope, ListDatabasesInput,
    ListSchemasInput, ListSemanticViewsInput, ListTablesInput, QueryInput, QueryToolHandler,
    SchemaToolHandler, SearchInput, SemanticToolHandler,
};
use crate::warehouse::StatementExecutor;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use rmcp::model::{CallToolResult, JsonObject, Tool};
use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A type-erased tool body: arguments in, finished envelope out.
pub type ToolHandler = Arc<dyn Fn(JsonObject) -> BoxFuture<'static, CallToolResult> + Send + Sync>;

#[derive(Clone)]
pub struct RegisteredTool {
    pub tool: Tool,
    handler: ToolHandler,
}

impl RegisteredTool {
    pub fn call(&self, args: JsonObject) -> BoxFuture<'static, CallToolResult> {
        (self.handler)(args)
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

/// Turn a service name into a tool-name suffix: lowercase, with every
/// non-alphanumeric character replaced by `_`.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn input_schema<I: JsonSchema>() -> Arc<JsonObject> {
    match serde_json::to_value(schemars::schema_for!(I)) {
        Ok(JsonValue::Object(map)) => Arc::new(map),
        _ => Arc::new(JsonObject::new()),
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Fails if the name is already taken.
    pub fn register(&mut self, tool: Tool, handler: ToolHandler) -> ServerResult<()> {
        let name = tool.name.to_string();
        if self.tools.contains_key(&name) {
            return Err(ServerError::configuration(format!(
                "Duplicate tool name '{}'",
                name
            )));
        }
        debug!(tool = %name, "Registered tool");
        self.tools.insert(name, RegisteredTool { tool, handler });
        Ok(())
    }

    /// Register an async function taking a typed input. Arguments that do not
    /// deserialize into `I` produce a failure envelope without calling `f`.
    pub fn register_typed<I, O, F, Fut>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        f: F,
    ) -> ServerResult<()>
    where
        I: DeserializeOwned + JsonSchema + Send + 'static,
        O: Serialize + Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServerResult<O>> + Send + 'static,
    {
        let name = name.into();
        let tool = Tool::new(name.clone(), description.into(), input_schema::<I>());

        let handler: ToolHandler = Arc::new(move |args: JsonObject| {
            let tool_name = name.clone();
            match serde_json::from_value::<I>(JsonValue::Object(args)) {
                Ok(input) => {
                    let fut = f(input);
                    async move { Envelope::from_result(&tool_name, fut.await).into_call_result() }
                        .boxed()
                }
                Err(e) => {
                    let err = ServerError::from(e);
                    warn!(tool = %tool_name, error = %err, "Rejected tool arguments");
                    futures_util::future::ready(Envelope::<O>::failure(&err).into_call_result())
                        .boxed()
                }
            }
        });
        self.register(tool, handler)
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Start a call. Unknown names are an error; everything after lookup ends
    /// up in the returned envelope.
    pub fn call(&self, name: &str, args: JsonObject) -> ServerResult<BoxFuture<'static, CallToolResult>> {
        self.get(name)
            .map(|t| t.call(args))
            .ok_or_else(|| ServerError::validation(format!("Unknown tool: {}", name)))
    }

    /// Tool definitions, ordered by name.
    pub fn list(&self) -> Vec<Tool> {
        self.tools.values().map(|t| t.tool.clone()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Build the full tool set for a service configuration.
    pub fn build(config: &ServiceConfig, executor: StatementExecutor) -> ServerResult<Self> {
        let mut registry = Self::new();
        let toggles = config.other_services;

        if toggles.query_manager {
            registry.register_query_tools(&executor)?;
        }
        if toggles.object_manager {
            registry.register_object_tools(&executor)?;
        }
        if toggles.semantic_manager {
            registry.register_semantic_tools(&executor)?;
        }

        for service in &config.search_services {
            if service.service_name.trim().is_empty() {
                warn!(kind = "search", "Skipping service with empty service_name");
                continue;
            }
            registry.register_search_service(service, &executor)?;
        }
        for service in &config.analyst_services {
            if service.service_name.trim().is_empty() {
                warn!(kind = "analyst", "Skipping service with empty service_name");
                continue;
            }
            registry.register_analyst_service(service, &executor)?;
        }

        info!(
            tools = registry.len(),
            search_services = config.search_services.len(),
            analyst_services = config.analyst_services.len(),
            "Tool registry built"
        );
        Ok(registry)
    }

    fn register_query_tools(&mut self, executor: &StatementExecutor) -> ServerResult<()> {
        let handler = QueryToolHandler::new(executor.clone());
        self.register_typed(
            "execute_query",
            "Execute a SQL query on Snowflake and return the results.\n\
             Rows come back as JSON objects keyed by column name.\n\
             When limit is given it is appended as a LIMIT clause to queries that have none,\n\
             and applied to the returned rows for other statements.",
            move |input: QueryInput| {
                let handler = handler.clone();
                async move { handler.execute_query(input).await }
            },
        )
    }

    fn register_object_tools(&mut self, executor: &StatementExecutor) -> ServerResult<()> {
        let schema = SchemaToolHandler::new(executor.clone());
        let ddl = DdlToolHandler::new(executor.clone());

        let h = schema.clone();
        self.register_typed(
            "list_databases",
            "List all databases in the Snowflake account.\nOptionally filter names with a SQL LIKE pattern.",
            move |input: ListDatabasesInput| {
                let h = h.clone();
                async move { h.list_databases(input).await }
            },
        )?;

        let h = schema.clone();
        self.register_typed(
            "list_schemas",
            "List all schemas in a database.\nOptionally filter names with a SQL LIKE pattern.",
            move |input: ListSchemasInput| {
                let h = h.clone();
                async move { h.list_schemas(input).await }
            },
        )?;

        let h = schema.clone();
        self.register_typed(
            "list_tables",
            "List all tables in a specific schema, with kind, row count and size.\n\
             Views are excluded unless include_views is true.",
            move |input: ListTablesInput| {
                let h = h.clone();
                async move { h.list_tables(input).await }
            },
        )?;

        let h = schema;
        self.register_typed(
            "describe_table",
            "Get detailed information about a table: kind, owner, row count, size,\n\
             and every column with type, nullability, default, key flags and comment.",
            move |input: DescribeTableInput| {
                let h = h.clone();
                async move { h.describe_table(input).await }
            },
        )?;

        let h = ddl.clone();
        self.register_typed(
            "create_table",
            "Create a new table in Snowflake.\n\
             Each column takes name, type, nullable (default true), and optional default and comment.\n\
             Set replace_if_exists to use CREATE OR REPLACE.",
            move |input: CreateTableInput| {
                let h = h.clone();
                async move { h.create_table(input).await }
            },
        )?;

        let h = ddl;
        self.register_typed(
            "drop_table",
            "Drop a table from Snowflake. Uses IF EXISTS unless if_exists is false.",
            move |input: DropTableInput| {
                let h = h.clone();
                async move { h.drop_table(input).await }
            },
        )
    }

    fn register_semantic_tools(&mut self, executor: &StatementExecutor) -> ServerResult<()> {
        let semantic = SemanticToolHandler::new(executor.clone());

        let h = semantic.clone();
        self.register_typed(
            "list_semantic_views",
            "List semantic views in a schema.\nOptionally filter names with a SQL LIKE pattern.",
            move |input: ListSemanticViewsInput| {
                let h = h.clone();
                async move { h.list_semantic_views(input).await }
            },
        )?;

        let h = semantic;
        self.register_typed(
            "describe_semantic_view",
            "Describe a semantic view: its tables, relationships, dimensions, facts and metrics.",
            move |input: DescribeSemanticViewInput| {
                let h = h.clone();
                async move { h.describe_semantic_view(input).await }
            },
        )
    }

    fn register_search_service(
        &mut self,
        service: &SearchServiceConfig,
        executor: &StatementExecutor,
    ) -> ServerResult<()> {
        let name = service.service_name.trim();
        if service.database_name.trim().is_empty() || service.schema_name.trim().is_empty() {
            return Err(ServerError::configuration(format!(
                "Search service '{}' requires database_name and schema_name",
                name
            )));
        }
        for part in [name, service.database_name.as_str(), service.schema_name.as_str()] {
            if part.contains(['/', '?', '#']) {
                return Err(ServerError::configuration(format!(
                    "Search service '{}' has an invalid path component '{}'",
                    name, part
                )));
            }
        }

        let description = if service.description.trim().is_empty() {
            format!("Search the {} Cortex Search service.", name)
        } else {
            service.description.clone()
        };
        let tool = CortexSearchTool::new(service.clone(), executor.clone());
        self.register_typed(
            format!("search_{}", sanitize(name)),
            description,
            move |input: SearchInput| {
                let tool = tool.clone();
                async move { tool.search(input).await }
            },
        )
    }

    fn register_analyst_service(
        &mut self,
        service: &AnalystServiceConfig,
        executor: &StatementExecutor,
    ) -> ServerResult<()> {
        let name = service.service_name.trim();
        if service.semantic_model.trim().is_empty() {
            return Err(ServerError::configuration(format!(
                "Analyst service '{}' requires semantic_model",
                name
            )));
        }

        let description = if service.description.trim().is_empty() {
            format!("Ask the {} Cortex Analyst service a question in natural language.", name)
        } else {
            service.description.clone()
        };
        let tool = CortexAnalystTool::new(service.clone(), executor.clone());
        self.register_typed(
            format!("analyst_{}", sanitize(name)),
            description,
            move |input: AnalystInput| {
                let tool = tool.clone();
                async move { tool.ask(input).await }
            },
        )
    }
}
