//! Table DDL tools: `create_table` and `drop_table`.

use crate::error::ServerResult;
use crate::sql::ColumnSpec;
use crate::sql::builders;
use crate::tools::required;
use crate::warehouse::StatementExecutor;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

fn default_true() -> bool {
    true
}

/// Input for the create_table tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateTableInput {
    /// Name of the database
    pub database_name: String,
    /// Name of the schema
    pub schema_name: String,
    /// Name of the table to create
    pub table_name: String,
    /// Column definitions, in table order
    pub columns: Vec<ColumnSpec>,
    /// Optional table comment
    #[serde(default)]
    pub comment: Option<String>,
    /// Replace the table if it already exists. Default: false
    #[serde(default)]
    pub replace_if_exists: bool,
}

/// Input for the drop_table tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DropTableInput {
    /// Name of the database
    pub database_name: String,
    /// Name of the schema
    pub schema_name: String,
    /// Name of the table to drop
    pub table_name: String,
    /// Do not fail when the table does not exist. Default: true
    #[serde(default = "default_true")]
    pub if_exists: bool,
}

/// Output from the DDL tools.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DdlOutput {
    pub message: String,
    /// The statement that was executed
    pub query: String,
}

#[derive(Clone)]
pub struct DdlToolHandler {
    executor: StatementExecutor,
}

impl DdlToolHandler {
    pub fn new(executor: StatementExecutor) -> Self {
        Self { executor }
    }

    pub async fn create_table(&self, input: CreateTableInput) -> ServerResult<DdlOutput> {
        let database = required("database_name", &input.database_name)?;
        let schema = required("schema_name", &input.schema_name)?;
        let table = required("table_name", &input.table_name)?;

        let sql = builders::build_create_table(
            database,
            schema,
            table,
            &input.columns,
            input.comment.as_deref(),
            input.replace_if_exists,
        )?;
        self.executor.execute(&sql).await?;

        info!(database, schema, table, columns = input.columns.len(), "Table created");
        Ok(DdlOutput {
            message: format!("Table {}.{}.{} created successfully", database, schema, table),
            query: sql,
        })
    }

    pub async fn drop_table(&self, input: DropTableInput) -> ServerResult<DdlOutput> {
        let database = required("database_name", &input.database_name)?;
        let schema = required("schema_name", &input.schema_name)?;
        let table = required("table_name", &input.table_name)?;

        let sql = builders::build_drop_table(database, schema, table, input.if_exists);
        self.executor.execute(&sql).await?;

        info!(database, schema, table, "Table dropped");
        Ok(DdlOutput {
            message: format!("Table {}.{}.{} dropped successfully", database, schema, table),
            query: sql,
        })
    }
}
