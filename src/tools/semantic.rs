//! Semantic view tools: `list_semantic_views` and `describe_semantic_view`.

use crate::error::{ServerError, ServerResult};
use crate::sql::builders;
use crate::tools::{required, row_text};
use crate::warehouse::StatementExecutor;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Input for the list_semantic_views tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListSemanticViewsInput {
    /// Name of the database
    pub database_name: String,
    /// Name of the schema
    pub schema_name: String,
    /// Optional pattern to filter view names (SQL LIKE pattern)
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SemanticViewInfo {
    pub name: Option<String>,
    pub database_name: Option<String>,
    pub schema_name: Option<String>,
    pub comment: Option<String>,
    pub owner: Option<String>,
    pub created_on: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListSemanticViewsOutput {
    pub database: String,
    pub schema: String,
    pub count: usize,
    pub semantic_views: Vec<SemanticViewInfo>,
}

/// Input for the describe_semantic_view tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DescribeSemanticViewInput {
    /// Name of the database
    pub database_name: String,
    /// Name of the schema
    pub schema_name: String,
    /// Name of the semantic view
    pub view_name: String,
}

/// One row of `DESCRIBE SEMANTIC VIEW`: a property of a table, dimension,
/// fact, metric or relationship.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SemanticViewProperty {
    pub object_kind: Option<String>,
    pub object_name: Option<String>,
    pub parent_entity: Option<String>,
    pub property: Option<String>,
    pub property_value: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DescribeSemanticViewOutput {
    pub database: String,
    pub schema: String,
    pub view: String,
    pub count: usize,
    pub properties: Vec<SemanticViewProperty>,
}

#[derive(Clone)]
pub struct SemanticToolHandler {
    executor: StatementExecutor,
}

impl SemanticToolHandler {
    pub fn new(executor: StatementExecutor) -> Self {
        Self { executor }
    }

    pub async fn list_semantic_views(
        &self,
        input: ListSemanticViewsInput,
    ) -> ServerResult<ListSemanticViewsOutput> {
        let database = required("database_name", &input.database_name)?;
        let schema = required("schema_name", &input.schema_name)?;

        let sql = builders::build_show_semantic_views(database, schema, input.pattern.as_deref());
        let result = self.executor.execute(&sql).await?;

        let semantic_views: Vec<SemanticViewInfo> = result
            .rows
            .iter()
            .map(|row| SemanticViewInfo {
                name: row_text(row, "name"),
                database_name: row_text(row, "database_name"),
                schema_name: row_text(row, "schema_name"),
                comment: row_text(row, "comment"),
                owner: row_text(row, "owner"),
                created_on: row_text(row, "created_on"),
            })
            .collect();

        info!(database, schema, count = semantic_views.len(), "list_semantic_views completed");
        Ok(ListSemanticViewsOutput {
            database: database.to_string(),
            schema: schema.to_string(),
            count: semantic_views.len(),
            semantic_views,
        })
    }

    pub async fn describe_semantic_view(
        &self,
        input: DescribeSemanticViewInput,
    ) -> ServerResult<DescribeSemanticViewOutput> {
        let database = required("database_name", &input.database_name)?;
        let schema = required("schema_name", &input.schema_name)?;
        let view = required("view_name", &input.view_name)?;

        let sql = builders::build_describe_semantic_view(database, schema, view);
        let result = self.executor.execute(&sql).await?;

        let properties: Vec<SemanticViewProperty> = result
            .rows
            .iter()
            .map(|row| SemanticViewProperty {
                object_kind: row_text(row, "object_kind"),
                object_name: row_text(row, "object_name"),
                parent_entity: row_text(row, "parent_entity"),
                property: row_text(row, "property"),
                property_value: row_text(row, "property_value"),
            })
            .collect();

        if properties.is_empty() {
            return Err(ServerError::execution(
                format!("Semantic view {}.{}.{} not found", database, schema, view),
                None,
            ));
        }

        info!(database, schema, view, count = properties.len(), "describe_semantic_view completed");
        Ok(DescribeSemanticViewOutput {
            database: database.to_string(),
            schema: schema.to_string(),
            view: view.to_string(),
            count: properties.len(),
            properties,
        })
    }
}
