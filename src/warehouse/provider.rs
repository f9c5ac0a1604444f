//! Connection provider abstraction.
//!
//! A [`ConnectionProvider`] holds resolved credentials and opens a fresh
//! [`WarehouseSession`] on demand. Sessions are never pooled or shared: callers open
//! one per statement and close it afterwards (see
//! [`StatementExecutor`](super::executor::StatementExecutor)).

use crate::error::ServerResult;
use crate::warehouse::types::ResultSet;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Snowflake session parameters (e.g. `QUERY_TAG`), merged over the provider's
/// defaults when a session is opened.
pub type SessionParams = BTreeMap<String, JsonValue>;

#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Open a new session. Fails with a connection error when the service is
    /// unreachable or the credentials are rejected.
    async fn connect(
        &self,
        session_params: Option<&SessionParams>,
    ) -> ServerResult<Box<dyn WarehouseSession>>;
}

#[async_trait]
pub trait WarehouseSession: Send {
    /// Execute one SQL statement and return all of its rows.
    async fn execute(&mut self, sql: &str) -> ServerResult<ResultSet>;

    /// POST a JSON body to a REST endpoint (Cortex Search / Analyst) and
    /// return the JSON response.
    async fn post(&mut self, api_path: &str, body: &JsonValue) -> ServerResult<JsonValue>;

    /// Release the session.
    async fn close(self: Box<Self>) -> ServerResult<()>;
}
