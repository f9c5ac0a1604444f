//! Query execution tool.
//!
//! Implements `execute_query`: run arbitrary SQL through the gated executor and
//! return the rows. A caller-supplied row limit is pushed into the statement as a
//! `LIMIT` clause when the statement is a single query without one, and applied to
//! the returned rows otherwise.

use crate::error::{ServerError, ServerResult};
use crate::sql::classifier::{self, StatementType};
use crate::warehouse::{Row, SessionParams, StatementExecutor};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Input for the execute_query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QueryInput {
    /// The SQL statement to execute
    pub query: String,
    /// Optional limit on the number of rows to return
    #[serde(default)]
    pub limit: Option<u64>,
    /// Optional Snowflake session parameters for this statement only,
    /// e.g. {"QUERY_TAG": "monthly-report", "TIMEZONE": "UTC"}
    #[serde(default)]
    pub session_parameters: Option<SessionParams>,
}

/// Output from the execute_query tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct QueryOutput {
    /// Number of rows returned
    pub row_count: usize,
    /// Result rows as column-name keyed objects
    pub data: Vec<Row>,
}

/// How a row limit is applied to a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitPlan {
    pub sql: String,
    /// Rows to keep client-side, when the limit could not go into the SQL.
    pub truncate_to: Option<usize>,
}

/// Decide how to apply `limit` to `query`.
pub fn plan_limit(query: &str, limit: Option<u64>) -> ServerResult<LimitPlan> {
    let types = classifier::classify(query)?;

    let Some(limit) = limit else {
        return Ok(LimitPlan {
            sql: query.to_string(),
            truncate_to: None,
        });
    };
    if limit == 0 {
        return Err(ServerError::validation("limit must be greater than 0"));
    }

    let single_query = types.as_slice() == [StatementType::Select];
    if single_query && classifier::has_row_limit(query) {
        return Ok(LimitPlan {
            sql: query.to_string(),
            truncate_to: None,
        });
    }
    if single_query {
        return Ok(LimitPlan {
            sql: classifier::append_limit(query, limit),
            truncate_to: None,
        });
    }

    Ok(LimitPlan {
        sql: query.to_string(),
        truncate_to: Some(usize::try_from(limit).unwrap_or(usize::MAX)),
    })
}

/// Upper-case parameter names; blank names are rejected.
fn normalize_session_params(params: &SessionParams) -> ServerResult<SessionParams> {
    params
        .iter()
        .map(|(name, value)| {
            let name = name.trim();
            if name.is_empty() {
                return Err(ServerError::validation(
                    "session parameter names must not be empty",
                ));
            }
            Ok((name.to_ascii_uppercase(), value.clone()))
        })
        .collect()
}

/// Handler for the execute_query tool.
#[derive(Clone)]
pub struct QueryToolHandler {
    executor: StatementExecutor,
}

impl QueryToolHandler {
    pub fn new(executor: StatementExecutor) -> Self {
        Self { executor }
    }

    pub async fn execute_query(&self, input: QueryInput) -> ServerResult<QueryOutput> {
        let query = input.query.trim();
        if query.is_empty() {
            return Err(ServerError::validation("query must not be empty"));
        }

        let plan = plan_limit(query, input.limit)?;
        let session_params = input
            .session_parameters
            .as_ref()
            .map(normalize_session_params)
            .transpose()?;
        let result = self
            .executor
            .execute_with_params(&plan.sql, session_params.as_ref())
            .await?;

        let mut data = result.rows;
        if let Some(n) = plan.truncate_to {
            data.truncate(n);
        }

        info!(row_count = data.len(), limit = ?input.limit, "execute_query completed");
        Ok(QueryOutput {
            row_count: data.len(),
            data,
        })
    }
}
