//! SQL statement builders.
//!
//! Pure functions mapping typed arguments to Snowflake SQL text. Nothing here touches
//! the network. Identifiers go through [`quote_ident`](super::ident::quote_ident),
//! LIKE patterns and comments through [`quote_literal`](super::ident::quote_literal),
//! and column types / defaults are re-rendered from a `sqlparser` parse.

use crate::error::{ServerError, ServerResult};
use crate::sql::ident::{qualified, quote_ident, quote_literal};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sqlparser::dialect::SnowflakeDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;

/// Column definition accepted by `create_table`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnSpec {
    /// Column name
    pub name: String,

    /// Snowflake data type, e.g. `NUMBER(38,0)`, `VARCHAR(255)`, `TIMESTAMP_NTZ`
    #[serde(rename = "type")]
    pub data_type: String,

    /// Whether the column accepts NULL (default: true)
    #[serde(default = "default_nullable")]
    pub nullable: bool,

    /// Default value expression, e.g. `0` or `CURRENT_TIMESTAMP()`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Column comment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

fn default_nullable() -> bool {
    true
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            default: None,
            comment: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

fn like_clause(pattern: Option<&str>) -> String {
    match pattern {
        Some(p) if !p.is_empty() => format!(" LIKE {}", quote_literal(p)),
        _ => String::new(),
    }
}

pub fn build_show_databases(pattern: Option<&str>) -> String {
    format!("SHOW DATABASES{}", like_clause(pattern))
}

pub fn build_show_schemas(database: &str, pattern: Option<&str>) -> String {
    format!(
        "SHOW SCHEMAS{} IN DATABASE {}",
        like_clause(pattern),
        quote_ident(database)
    )
}

pub fn build_show_tables(database: &str, schema: &str, pattern: Option<&str>) -> String {
    format!(
        "SHOW TABLES{} IN SCHEMA {}",
        like_clause(pattern),
        qualified(&[database, schema])
    )
}

/// `SHOW VIEWS` in a schema; merged into `list_tables` when views are requested.
pub fn build_show_views(database: &str, schema: &str, pattern: Option<&str>) -> String {
    format!(
        "SHOW VIEWS{} IN SCHEMA {}",
        like_clause(pattern),
        qualified(&[database, schema])
    )
}

/// Metadata row for a single table. The LIKE pattern is the exact table name.
pub fn build_show_table_info(database: &str, schema: &str, table: &str) -> String {
    format!(
        "SHOW TABLES LIKE {} IN SCHEMA {}",
        quote_literal(table),
        qualified(&[database, schema])
    )
}

pub fn build_describe_table(database: &str, schema: &str, table: &str) -> String {
    format!("DESCRIBE TABLE {}", qualified(&[database, schema, table]))
}

pub fn build_show_semantic_views(database: &str, schema: &str, pattern: Option<&str>) -> String {
    format!(
        "SHOW SEMANTIC VIEWS{} IN SCHEMA {}",
        like_clause(pattern),
        qualified(&[database, schema])
    )
}

pub fn build_describe_semantic_view(database: &str, schema: &str, view: &str) -> String {
    format!(
        "DESCRIBE SEMANTIC VIEW {}",
        qualified(&[database, schema, view])
    )
}

/// Build a `CREATE [OR REPLACE] TABLE` statement.
///
/// Every column is validated before any text is produced: empty names or types,
/// types that do not parse as a SQL data type, and defaults that do not parse as
/// a single expression are rejected with [`ServerError::Validation`].
pub fn build_create_table(
    database: &str,
    schema: &str,
    table: &str,
    columns: &[ColumnSpec],
    comment: Option<&str>,
    replace: bool,
) -> ServerResult<String> {
    if columns.is_empty() {
        return Err(ServerError::validation(
            "create_table requires at least one column",
        ));
    }

    let mut defs = Vec::with_capacity(columns.len());
    for (idx, col) in columns.iter().enumerate() {
        defs.push(render_column(idx, col)?);
    }

    let verb = if replace { "CREATE OR REPLACE" } else { "CREATE" };
    let mut sql = format!(
        "{} TABLE {} (\n{}\n)",
        verb,
        qualified(&[database, schema, table]),
        defs.iter()
            .map(|d| format!("    {}", d))
            .collect::<Vec<_>>()
            .join(",\n")
    );

    if let Some(c) = comment.filter(|c| !c.is_empty()) {
        sql.push_str(&format!(" COMMENT = {}", quote_literal(c)));
    }

    Ok(sql)
}

pub fn build_drop_table(database: &str, schema: &str, table: &str, if_exists: bool) -> String {
    format!(
        "DROP TABLE {}{}",
        if if_exists { "IF EXISTS " } else { "" },
        qualified(&[database, schema, table])
    )
}

fn render_column(idx: usize, col: &ColumnSpec) -> ServerResult<String> {
    let name = col.name.trim();
    if name.is_empty() {
        return Err(ServerError::validation(format!(
            "Column {} is missing a name",
            idx + 1
        )));
    }
    if col.data_type.trim().is_empty() {
        return Err(ServerError::validation(format!(
            "Column '{}' is missing a type",
            name
        )));
    }

    let data_type = normalize_data_type(&col.data_type).map_err(|e| {
        ServerError::validation(format!(
            "Column '{}' has an invalid type '{}': {}",
            name, col.data_type, e
        ))
    })?;

    let mut def = format!("{} {}", quote_ident(name), data_type);

    if !col.nullable {
        def.push_str(" NOT NULL");
    }

    if let Some(default) = &col.default {
        let expr = normalize_expr(default).map_err(|e| {
            ServerError::validation(format!(
                "Column '{}' has an invalid default '{}': {}",
                name, default, e
            ))
        })?;
        def.push_str(&format!(" DEFAULT {}", expr));
    }

    if let Some(comment) = &col.comment {
        def.push_str(&format!(" COMMENT {}", quote_literal(comment)));
    }

    Ok(def)
}

/// Parse a data type and render it back, rejecting any trailing tokens.
fn normalize_data_type(text: &str) -> Result<String, String> {
    let dialect = SnowflakeDialect {};
    let mut parser = Parser::new(&dialect)
        .try_with_sql(text)
        .map_err(|e| e.to_string())?;
    let data_type = parser.parse_data_type().map_err(|e| e.to_string())?;
    expect_end(&mut parser)?;
    Ok(data_type.to_string())
}

/// Parse a single expression and render it back, rejecting any trailing tokens.
fn normalize_expr(text: &str) -> Result<String, String> {
    let dialect = SnowflakeDialect {};
    let mut parser = Parser::new(&dialect)
        .try_with_sql(text)
        .map_err(|e| e.to_string())?;
    let expr = parser.parse_expr().map_err(|e| e.to_string())?;
    expect_end(&mut parser)?;
    Ok(expr.to_string())
}

fn expect_end(parser: &mut Parser<'_>) -> Result<(), String> {
    let next = parser.peek_token();
    if next.token == Token::EOF {
        Ok(())
    } else {
        Err(format!("unexpected trailing input near '{}'", next.token))
    }
}
