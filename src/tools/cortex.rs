//! Cortex Search and Cortex Analyst tools.
//!
//! One tool instance exists per configured service. Each captures its descriptor
//! and posts to the Cortex REST API through the executor. These calls carry no
//! SQL and are not subject to the statement policy.

use crate::config::{AnalystServiceConfig, SearchServiceConfig};
use crate::error::{ServerError, ServerResult};
use crate::warehouse::StatementExecutor;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use tracing::info;
use url::Url;

pub const ANALYST_PATH: &str = "/api/v2/cortex/analyst/message";

/// Input for a `search_<service>` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchInput {
    /// User query to search in search service
    pub query: String,
    /// Optional list of columns to return for each relevant result in the response
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    /// Optional filter query dictionary. Filters apply to the ATTRIBUTES columns
    /// of the search service. Matching operators: `@eq` (text or numeric equality),
    /// `@contains` (array contains), `@gte` and `@lte` (numeric or date/timestamp
    /// bounds). Combine them with `@and`, `@or` and `@not`. Dates take the form
    /// YYYY-MM-DD, or YYYY-MM-DD+HH:MM with a timezone offset (UTC otherwise).
    /// Example: `{"@and": [{"@gte": {"numeric_col": 10.5}}, {"@lte": {"numeric_col": 12.5}}]}`
    #[serde(default)]
    pub filter_query: Option<JsonValue>,
}

/// Input for an `analyst_<service>` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AnalystInput {
    /// Rephrased natural language query to submit to Cortex Analyst
    pub query: String,
}

/// Output from both Cortex tools: the raw API response.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CortexOutput {
    pub service: String,
    pub response: JsonValue,
}

/// REST path of a search service. Each name is percent-encoded as its own
/// path segment, so quoted identifiers with spaces or `%` stay intact.
pub fn search_path(service: &SearchServiceConfig) -> ServerResult<String> {
    let invalid = || ServerError::internal("Failed to build Cortex Search path");
    let mut url = Url::parse("https://localhost/").map_err(|_| invalid())?;
    let endpoint = format!("{}:query", service.service_name);
    url.path_segments_mut()
        .map_err(|_| invalid())?
        .clear()
        .extend([
            "api",
            "v2",
            "databases",
            service.database_name.as_str(),
            "schemas",
            service.schema_name.as_str(),
            "cortex-search-services",
            endpoint.as_str(),
        ]);
    Ok(url.path().to_string())
}

/// Build the Cortex Search request body. Caller-supplied columns win over the
/// descriptor's; `columns` is omitted when neither is non-empty.
pub fn search_body(service: &SearchServiceConfig, input: &SearchInput) -> JsonValue {
    let mut body = json!({
        "query": input.query,
        "filter": input.filter_query.clone().unwrap_or_else(|| json!({})),
        "limit": service.limit_or_default(),
    });
    let columns = input
        .columns
        .as_ref()
        .filter(|c| !c.is_empty())
        .or(service.columns.as_ref())
        .filter(|c| !c.is_empty());
    if let Some(columns) = columns {
        body["columns"] = json!(columns);
    }
    body
}

/// Build the Cortex Analyst request body. Stage paths to a YAML file are sent as
/// `semantic_model_file`, anything else as `semantic_view`.
pub fn analyst_body(service: &AnalystServiceConfig, query: &str) -> JsonValue {
    let model = service.semantic_model.as_str();
    let key = if model.starts_with('@') && model.ends_with(".yaml") {
        "semantic_model_file"
    } else {
        "semantic_view"
    };
    let mut body = json!({
        "messages": [{
            "role": "user",
            "content": [{"type": "text", "text": query}],
        }],
        "stream": false,
    });
    body[key] = json!(model);
    body
}

fn non_empty_query(query: &str) -> ServerResult<&str> {
    let query = query.trim();
    if query.is_empty() {
        return Err(ServerError::validation("query must not be empty"));
    }
    Ok(query)
}

#[derive(Clone)]
pub struct CortexSearchTool {
    service: SearchServiceConfig,
    executor: StatementExecutor,
}

impl CortexSearchTool {
    pub fn new(service: SearchServiceConfig, executor: StatementExecutor) -> Self {
        Self { service, executor }
    }

    pub async fn search(&self, input: SearchInput) -> ServerResult<CortexOutput> {
        non_empty_query(&input.query)?;
        let body = search_body(&self.service, &input);
        let path = search_path(&self.service)?;
        let response = self.executor.post(&path, &body).await?;

        info!(service = %self.service.service_name, "Cortex Search query completed");
        Ok(CortexOutput {
            service: self.service.service_name.clone(),
            response,
        })
    }
}

#[derive(Clone)]
pub struct CortexAnalystTool {
    service: AnalystServiceConfig,
    executor: StatementExecutor,
}

impl CortexAnalystTool {
    pub fn new(service: AnalystServiceConfig, executor: StatementExecutor) -> Self {
        Self { service, executor }
    }

    pub async fn ask(&self, input: AnalystInput) -> ServerResult<CortexOutput> {
        let query = non_empty_query(&input.query)?;
        let body = analyst_body(&self.service, query);
        let response = self.executor.post(ANALYST_PATH, &body).await?;

        info!(service = %self.service.service_name, "Cortex Analyst message completed");
        Ok(CortexOutput {
            service: self.service.service_name.clone(),
            response,
        })
    }
}
