//! Gated statement execution.
//!
//! [`StatementExecutor`] is the single path from a tool to the warehouse. For SQL it
//! runs the permission policy first; a denied statement never reaches the
//! provider. Every call opens its own session and closes it on every exit path.
//! Close failures are logged and never replace the primary result.

use crate::error::ServerResult;
use crate::policy::StatementPolicy;
use crate::warehouse::provider::{ConnectionProvider, SessionParams, WarehouseSession};
use crate::warehouse::types::ResultSet;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct StatementExecutor {
    provider: Arc<dyn ConnectionProvider>,
    policy: Arc<StatementPolicy>,
}

impl StatementExecutor {
    pub fn new(provider: Arc<dyn ConnectionProvider>, policy: Arc<StatementPolicy>) -> Self {
        Self { provider, policy }
    }

    /// Authorize and execute one statement.
    pub async fn execute(&self, sql: &str) -> ServerResult<ResultSet> {
        self.execute_with_params(sql, None).await
    }

    /// Authorize and execute one statement with extra session parameters,
    /// merged over the provider's defaults.
    pub async fn execute_with_params(
        &self,
        sql: &str,
        session_params: Option<&SessionParams>,
    ) -> ServerResult<ResultSet> {
        let types = self.policy.authorize(sql)?;
        debug!(sql = %sql, statement_types = ?types, "Statement authorized");

        let start = Instant::now();
        let mut session = self.provider.connect(session_params).await?;
        let result = session.execute(sql).await;
        close_quietly(session).await;

        if let Ok(rs) = &result {
            debug!(
                rows = rs.len(),
                execution_time_ms = start.elapsed().as_millis() as u64,
                "Statement executed"
            );
        }
        result
    }

    /// POST to a REST endpoint. Not gated: REST payloads carry no SQL.
    pub async fn post(&self, api_path: &str, body: &JsonValue) -> ServerResult<JsonValue> {
        let mut session = self.provider.connect(None).await?;
        let result = session.post(api_path, body).await;
        close_quietly(session).await;
        result
    }
}

async fn close_quietly(session: Box<dyn WarehouseSession>) {
    if let Err(e) = session.close().await {
        warn!(error = %e, "Failed to close warehouse session");
    }
}
