//! MCP tool implementations.
//!
//! - `query`: `execute_query`
//! - `schema`: `list_databases`, `list_schemas`, `list_tables`, `describe_table`
//! - `ddl`: `create_table`, `drop_table`
//! - `semantic`: `list_semantic_views`, `describe_semantic_view`
//! - `cortex`: per-service Cortex Search and Cortex Analyst tools
//! - `envelope`: the `{success, ...}` response wrapper shared by all of them

pub mod cortex;
pub mod ddl;
pub mod envelope;
pub mod query;
pub mod schema;
pub mod semantic;

pub use cortex::{AnalystInput, CortexAnalystTool, CortexOutput, CortexSearchTool, SearchInput};
pub use ddl::{CreateTableInput, DdlOutput, DdlToolHandler, DropTableInput};
pub use envelope::Envelope;
pub use query::{QueryInput, QueryOutput, QueryToolHandler};
pub use schema::{
    DescribeTableInput, DescribeTableOutput, ListDatabasesInput, ListDatabasesOutput,
    ListSchemasInput, ListSchemasOutput, ListTablesInput, ListTablesOutput, SchemaToolHandler,
};
pub use semantic::{
    DescribeSemanticViewInput, DescribeSemanticViewOutput, ListSemanticViewsInput,
    ListSemanticViewsOutput, SemanticToolHandler,
};

use crate::error::{ServerError, ServerResult};
use crate::warehouse::Row;
use serde_json::Value as JsonValue;

/// Reject a blank required argument, returning it trimmed.
pub(crate) fn required<'a>(field: &str, value: &'a str) -> ServerResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServerError::validation(format!("{} must not be empty", field)));
    }
    Ok(trimmed)
}

/// A cell rendered as text. Null and missing cells are `None`.
pub(crate) fn row_text(row: &Row, column: &str) -> Option<String> {
    match row.get(column)? {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// A cell as-is, `null` when missing.
pub(crate) fn row_value(row: &Row, column: &str) -> JsonValue {
    row.get(column).cloned().unwrap_or(JsonValue::Null)
}

/// `Y`/`N` flag columns from `DESCRIBE` output.
pub(crate) fn row_bool_flag(row: &Row, column: &str) -> bool {
    match row.get(column) {
        Some(JsonValue::String(s)) => s.eq_ignore_ascii_case("Y"),
        Some(JsonValue::Bool(b)) => *b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_required_trims() {
        assert_eq!(required("database_name", "  DB ").unwrap(), "DB");
        assert!(required("database_name", "   ").is_err());
    }

    #[test]
    fn test_row_helpers() {
        let row = json!({"name": "T", "rows": 3, "comment": null, "null?": "Y", "unique key": "N"})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(row_text(&row, "name").as_deref(), Some("T"));
        assert_eq!(row_text(&row, "rows").as_deref(), Some("3"));
        assert_eq!(row_text(&row, "comment"), None);
        assert_eq!(row_text(&row, "missing"), None);
        assert_eq!(row_value(&row, "missing"), JsonValue::Null);
        assert!(row_bool_flag(&row, "null?"));
        assert!(!row_bool_flag(&row, "unique key"));
        assert!(!row_bool_flag(&row, "primary key"));
    }
}
