//! Schema introspection tools.
//!
//! This module implements `list_databases`, `list_schemas`, `list_tables` and
//! `describe_table` on top of Snowflake `SHOW` / `DESCRIBE` output.

use crate::error::{ServerError, ServerResult};
use crate::sql::builders;
use crate::tools::{required, row_bool_flag, row_text, row_value};
use crate::warehouse::{Row, StatementExecutor};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::info;

/// Input for the list_databases tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListDatabasesInput {
    /// Optional pattern to filter database names (SQL LIKE pattern)
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DatabaseInfo {
    pub name: Option<String>,
    pub owner: Option<String>,
    pub comment: Option<String>,
    pub created_on: Option<String>,
}

/// Output for the list_databases tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListDatabasesOutput {
    pub count: usize,
    pub databases: Vec<DatabaseInfo>,
}

/// Input for the list_schemas tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListSchemasInput {
    /// Name of the database
    pub database_name: String,
    /// Optional pattern to filter schema names (SQL LIKE pattern)
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SchemaInfo {
    pub name: Option<String>,
    pub database_name: Option<String>,
    pub owner: Option<String>,
    pub comment: Option<String>,
    pub created_on: Option<String>,
}

/// Output for the list_schemas tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListSchemasOutput {
    pub database: String,
    pub count: usize,
    pub schemas: Vec<SchemaInfo>,
}

/// Input for the list_tables tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListTablesInput {
    /// Name of the database
    pub database_name: String,
    /// Name of the schema
    pub schema_name: String,
    /// Optional pattern to filter table names (SQL LIKE pattern)
    #[serde(default)]
    pub pattern: Option<String>,
    /// Whether to include views in the results. Default: false
    #[serde(default)]
    pub include_views: bool,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TableInfo {
    pub name: Option<String>,
    pub database_name: Option<String>,
    pub schema_name: Option<String>,
    /// "TABLE", "TRANSIENT", "TEMPORARY" or "VIEW"
    pub kind: Option<String>,
    pub comment: Option<String>,
    pub rows: JsonValue,
    pub bytes: JsonValue,
    /// Human-readable form of `bytes`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_formatted: Option<String>,
    pub created_on: Option<String>,
}

/// Output from the list_tables tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListTablesOutput {
    pub database: String,
    pub schema: String,
    pub count: usize,
    pub tables: Vec<TableInfo>,
}

/// Input for the describe_table tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DescribeTableInput {
    /// Name of the database
    pub database_name: String,
    /// Name of the schema
    pub schema_name: String,
    /// Name of the table
    pub table_name: String,
}

/// Table-level metadata from `SHOW TABLES`. Empty when the table is not listed.
#[derive(Debug, Clone, Default, Serialize, JsonSchema)]
pub struct TableDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "JsonValue::is_null")]
    pub rows: JsonValue,
    #[serde(skip_serializing_if = "JsonValue::is_null")]
    pub bytes: JsonValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ColumnInfo {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub data_type: Option<String>,
    pub nullable: bool,
    pub default: Option<String>,
    pub primary_key: bool,
    pub unique_key: bool,
    pub comment: Option<String>,
}

/// Output from the describe_table tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DescribeTableOutput {
    pub database: String,
    pub schema: String,
    pub table: String,
    pub info: TableDetails,
    pub columns: Vec<ColumnInfo>,
}

/// Format bytes as human-readable size string.
///
/// Uses binary units (1 KB = 1024 bytes), powered by the `humansize` crate.
///
/// # Examples
///
/// ```
/// use snowflake_mcp_server::tools::schema::format_size;
///
/// assert_eq!(format_size(512), "512 B");
/// assert_eq!(format_size(1024), "1 kB");
/// ```
pub fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::WINDOWS)
}

fn table_info(row: &Row, kind_fallback: Option<&str>) -> TableInfo {
    let bytes = row_value(row, "bytes");
    TableInfo {
        name: row_text(row, "name"),
        database_name: row_text(row, "database_name"),
        schema_name: row_text(row, "schema_name"),
        kind: row_text(row, "kind").or_else(|| kind_fallback.map(String::from)),
        comment: row_text(row, "comment"),
        rows: row_value(row, "rows"),
        size_formatted: bytes.as_u64().map(format_size),
        bytes,
        created_on: row_text(row, "created_on"),
    }
}

fn is_view(table: &TableInfo) -> bool {
    table
        .kind
        .as_deref()
        .is_some_and(|k| k.eq_ignore_ascii_case("VIEW"))
}

/// Handler for schema introspection tools.
#[derive(Clone)]
pub struct SchemaToolHandler {
    executor: StatementExecutor,
}

impl SchemaToolHandler {
    pub fn new(executor: StatementExecutor) -> Self {
        Self { executor }
    }

    pub async fn list_databases(&self, input: ListDatabasesInput) -> ServerResult<ListDatabasesOutput> {
        let sql = builders::build_show_databases(input.pattern.as_deref());
        let result = self.executor.execute(&sql).await?;

        let databases: Vec<DatabaseInfo> = result
            .rows
            .iter()
            .map(|row| DatabaseInfo {
                name: row_text(row, "name"),
                owner: row_text(row, "owner"),
                comment: row_text(row, "comment"),
                created_on: row_text(row, "created_on"),
            })
            .collect();

        info!(count = databases.len(), "list_databases completed");
        Ok(ListDatabasesOutput {
            count: databases.len(),
            databases,
        })
    }

    pub async fn list_schemas(&self, input: ListSchemasInput) -> ServerResult<ListSchemasOutput> {
        let database = required("database_name", &input.database_name)?;
        let sql = builders::build_show_schemas(database, input.pattern.as_deref());
        let result = self.executor.execute(&sql).await?;

        let schemas: Vec<SchemaInfo> = result
            .rows
            .iter()
            .map(|row| SchemaInfo {
                name: row_text(row, "name"),
                database_name: row_text(row, "database_name"),
                owner: row_text(row, "owner"),
                comment: row_text(row, "comment"),
                created_on: row_text(row, "created_on"),
            })
            .collect();

        info!(database, count = schemas.len(), "list_schemas completed");
        Ok(ListSchemasOutput {
            database: database.to_string(),
            count: schemas.len(),
            schemas,
        })
    }

    /// List tables in a schema. `SHOW TABLES` rows of kind `VIEW` are dropped
    /// unless views are requested, in which case `SHOW VIEWS` is merged in.
    pub async fn list_tables(&self, input: ListTablesInput) -> ServerResult<ListTablesOutput> {
        let database = required("database_name", &input.database_name)?;
        let schema = required("schema_name", &input.schema_name)?;
        let pattern = input.pattern.as_deref();

        let sql = builders::build_show_tables(database, schema, pattern);
        let result = self.executor.execute(&sql).await?;

        let mut tables: Vec<TableInfo> = result
            .rows
            .iter()
            .map(|row| table_info(row, None))
            .filter(|t| input.include_views || !is_view(t))
            .collect();

        if input.include_views {
            let sql = builders::build_show_views(database, schema, pattern);
            let views = self.executor.execute(&sql).await?;
            for row in &views.rows {
                let view = table_info(row, Some("VIEW"));
                if !tables.iter().any(|t| t.name == view.name) {
                    tables.push(view);
                }
            }
        }

        info!(
            database,
            schema,
            count = tables.len(),
            include_views = input.include_views,
            "list_tables completed"
        );
        Ok(ListTablesOutput {
            database: database.to_string(),
            schema: schema.to_string(),
            count: tables.len(),
            tables,
        })
    }

    pub async fn describe_table(&self, input: DescribeTableInput) -> ServerResult<DescribeTableOutput> {
        let database = required("database_name", &input.database_name)?;
        let schema = required("schema_name", &input.schema_name)?;
        let table = required("table_name", &input.table_name)?;

        let sql = builders::build_describe_table(database, schema, table);
        let described = self.executor.execute(&sql).await?;

        let columns: Vec<ColumnInfo> = described
            .rows
            .iter()
            .map(|row| ColumnInfo {
                name: row_text(row, "name"),
                data_type: row_text(row, "type"),
                nullable: row_bool_flag(row, "null?"),
                default: row_text(row, "default"),
                primary_key: row_bool_flag(row, "primary key"),
                unique_key: row_bool_flag(row, "unique key"),
                comment: row_text(row, "comment"),
            })
            .collect();

        if columns.is_empty() {
            return Err(ServerError::execution(
                format!("Table {}.{}.{} has no columns or does not exist", database, schema, table),
                None,
            ));
        }

        let sql = builders::build_show_table_info(database, schema, table);
        let listed = self.executor.execute(&sql).await?;
        // LIKE treats `_` and `%` as wildcards, so prefer the exact name.
        let info = listed
            .rows
            .iter()
            .find(|row| {
                row_text(row, "name").is_some_and(|n| n.eq_ignore_ascii_case(table))
            })
            .or_else(|| listed.rows.first())
            .map(|row| TableDetails {
                kind: row_text(row, "kind"),
                comment: row_text(row, "comment"),
                rows: row_value(row, "rows"),
                bytes: row_value(row, "bytes"),
                created_on: row_text(row, "created_on"),
                owner: row_text(row, "owner"),
            })
            .unwrap_or_default();

        info!(database, schema, table, columns = columns.len(), "describe_table completed");
        Ok(DescribeTableOutput {
            database: database.to_string(),
            schema: schema.to_string(),
            table: table.to_string(),
            info,
            columns,
        })
    }
}
