//! Snowflake implementation of the connection provider, over the REST APIs.
//!
//! Statements go through the SQL API v2 (`/api/v2/statements`); Cortex Search and
//! Cortex Analyst are plain REST endpoints under the same host. Authentication uses
//! a programmatic access token as a bearer token.
//!
//! # Statement lifecycle
//!
//! 1. `POST /api/v2/statements?requestId=<uuid>` submits the statement.
//! 2. HTTP 200 carries the first result partition; HTTP 202 means the statement is
//!    still running and is polled at `GET /api/v2/statements/<handle>` until it
//!    finishes or the statement timeout passes.
//! 3. Remaining partitions are fetched with `?partition=N`.

use crate::config::ConnectionParams;
use crate::error::{ServerError, ServerResult};
use crate::warehouse::provider::{ConnectionProvider, SessionParams, WarehouseSession};
use crate::warehouse::types::{ColumnMeta, ResultSet};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, header};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

pub const STATEMENTS_PATH: &str = "/api/v2/statements";
const TOKEN_TYPE_HEADER: &str = "x-snowflake-authorization-token-type";
const TOKEN_TYPE: &str = "PROGRAMMATIC_ACCESS_TOKEN";
const POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Headroom on top of the statement timeout for the HTTP request itself.
const REQUEST_TIMEOUT_SLACK: Duration = Duration::from_secs(15);

/// Opens sessions against a Snowflake account.
#[derive(Debug, Clone)]
pub struct SnowflakeProvider {
    params: ConnectionParams,
    base_url: Url,
    default_session_params: SessionParams,
}

impl SnowflakeProvider {
    pub fn new(params: ConnectionParams) -> ServerResult<Self> {
        let base_url = params.base_url()?;
        Ok(Self {
            params,
            base_url,
            default_session_params: SessionParams::new(),
        })
    }

    /// Session parameters applied to every session this provider opens.
    pub fn with_session_params(mut self, params: SessionParams) -> Self {
        self.default_session_params = params;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn build_client(&self) -> ServerResult<Client> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", self.params.password)).map_err(
                |_| ServerError::configuration("SNOWFLAKE_PASSWORD contains invalid characters"),
            )?,
        );
        headers.insert(
            header::HeaderName::from_static(TOKEN_TYPE_HEADER),
            header::HeaderValue::from_static(TOKEN_TYPE),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        // One client per session and no idle connections: nothing is pooled.
        Client::builder()
            .default_headers(headers)
            .user_agent(concat!("snowflake-mcp-server/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(self.params.connect_timeout)
            .timeout(self.params.statement_timeout + REQUEST_TIMEOUT_SLACK)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| {
                ServerError::connection(
                    format!("Failed to build HTTP client: {}", e),
                    "Check the TLS configuration of this build",
                )
            })
    }
}

#[async_trait]
impl ConnectionProvider for SnowflakeProvider {
    async fn connect(
        &self,
        session_params: Option<&SessionParams>,
    ) -> ServerResult<Box<dyn WarehouseSession>> {
        let client = self.build_client()?;

        let mut merged = self.default_session_params.clone();
        if let Some(extra) = session_params {
            merged.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        debug!(
            account = %self.params.account,
            user = %self.params.user,
            session_params = merged.len(),
            "Opening Snowflake session"
        );

        Ok(Box::new(SnowflakeSession {
            client,
            base_url: self.base_url.clone(),
            params: self.params.clone(),
            session_params: merged,
        }))
    }
}

/// A single-use session. Holds its own HTTP client.
pub struct SnowflakeSession {
    client: Client,
    base_url: Url,
    params: ConnectionParams,
    session_params: SessionParams,
}

/// SQL API response body, for both results and errors.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    sql_state: Option<String>,
    #[serde(default)]
    statement_handle: Option<String>,
    #[serde(default)]
    result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    #[serde(default)]
    row_type: Vec<ColumnMeta>,
    #[serde(default)]
    partition_info: Vec<JsonValue>,
}

impl SnowflakeSession {
    fn url(&self, api_path: &str) -> ServerResult<Url> {
        self.base_url
            .join(api_path)
            .map_err(|e| ServerError::internal(format!("Invalid API path '{}': {}", api_path, e)))
    }

    fn statement_body(&self, sql: &str) -> JsonValue {
        let mut body = json!({
            "statement": sql,
            "timeout": self.params.statement_timeout.as_secs(),
        });
        let optional = [
            ("warehouse", &self.params.warehouse),
            ("database", &self.params.database),
            ("schema", &self.params.schema),
            ("role", &self.params.role),
        ];
        for (key, value) in optional {
            if let Some(v) = value {
                body[key] = json!(v);
            }
        }
        if !self.session_params.is_empty() {
            // The SQL API expects parameter values as strings.
            let parameters: serde_json::Map<String, JsonValue> = self
                .session_params
                .iter()
                .map(|(k, v)| {
                    let value = match v {
                        JsonValue::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), JsonValue::String(value))
                })
                .collect();
            body["parameters"] = JsonValue::Object(parameters);
        }
        body
    }

    /// Poll a running statement until it completes or the deadline passes.
    async fn wait_for(&self, handle: &str, started: Instant) -> ServerResult<StatementResponse> {
        let url = self.url(&format!("{}/{}", STATEMENTS_PATH, handle))?;
        loop {
            if started.elapsed() >= self.params.statement_timeout {
                self.cancel(handle).await;
                return Err(ServerError::execution(
                    format!(
                        "Statement {} did not finish within {}s",
                        handle,
                        self.params.statement_timeout.as_secs()
                    ),
                    None,
                ));
            }
            tokio::time::sleep(POLL_INTERVAL).await;

            let response = self.client.get(url.clone()).send().await?;
            if response.status() == StatusCode::ACCEPTED {
                debug!(handle, "Statement still running");
                continue;
            }
            return parse_statement_response(response).await;
        }
    }

    async fn cancel(&self, handle: &str) {
        let Ok(url) = self.url(&format!("{}/{}/cancel", STATEMENTS_PATH, handle)) else {
            return;
        };
        if let Err(e) = self.client.post(url).send().await {
            warn!(handle, error = %e, "Failed to cancel timed-out statement");
        }
    }

    async fn fetch_partition(&self, handle: &str, partition: usize) -> ServerResult<StatementResponse> {
        let url = self.url(&format!("{}/{}", STATEMENTS_PATH, handle))?;
        let response = self
            .client
            .get(url)
            .query(&[("partition", partition)])
            .send()
            .await?;
        parse_statement_response(response).await
    }
}

#[async_trait]
impl WarehouseSession for SnowflakeSession {
    async fn execute(&mut self, sql: &str) -> ServerResult<ResultSet> {
        let started = Instant::now();
        let request_id = uuid::Uuid::new_v4().to_string();
        let url = self.url(STATEMENTS_PATH)?;

        debug!(request_id = %request_id, sql = %sql, "Submitting statement");

        let response = self
            .client
            .post(url)
            .query(&[("requestId", request_id.as_str())])
            .json(&self.statement_body(sql))
            .send()
            .await?;

        let first = if response.status() == StatusCode::ACCEPTED {
            let pending: StatementResponse = response.json().await.unwrap_or_default();
            let handle = pending.statement_handle.ok_or_else(|| {
                ServerError::internal("SQL API accepted the statement without a handle")
            })?;
            self.wait_for(&handle, started).await?
        } else {
            parse_statement_response(response).await?
        };

        let meta = first.result_set_meta_data.unwrap_or_default();
        let partitions = meta.partition_info.len();
        let mut result = ResultSet::from_raw(meta.row_type, first.data);

        if partitions > 1 {
            let handle = first.statement_handle.ok_or_else(|| {
                ServerError::internal("Partitioned result without a statement handle")
            })?;
            for partition in 1..partitions {
                let page = self.fetch_partition(&handle, partition).await?;
                result.extend_raw(page.data);
            }
        }

        debug!(
            rows = result.len(),
            partitions,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Statement finished"
        );
        Ok(result)
    }

    async fn post(&mut self, api_path: &str, body: &JsonValue) -> ServerResult<JsonValue> {
        let url = self.url(api_path)?;
        debug!(api_path, "POST");

        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let text = response.text().await.unwrap_or_default();
        Err(status_error(status, api_path, &text))
    }

    async fn close(self: Box<Self>) -> ServerResult<()> {
        // Dropping the client closes its connections.
        debug!("Closing Snowflake session");
        Ok(())
    }
}

async fn parse_statement_response(response: Response) -> ServerResult<StatementResponse> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<StatementResponse>(&text) {
        Ok(body) if body.message.is_some() && !is_auth_failure(status) => {
            let message = body.message.unwrap_or_default();
            let message = match body.code {
                Some(code) => format!("{} (code {})", message, code),
                None => message,
            };
            Err(ServerError::execution(message, body.sql_state))
        }
        _ => Err(status_error(status, STATEMENTS_PATH, &text)),
    }
}

fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

fn status_error(status: StatusCode, api_path: &str, body: &str) -> ServerError {
    if is_auth_failure(status) {
        return ServerError::connection(
            format!("Snowflake rejected the credentials (HTTP {})", status.as_u16()),
            "Check SNOWFLAKE_USER and that SNOWFLAKE_PASSWORD is a valid programmatic access token",
        );
    }
    let detail = serde_json::from_str::<JsonValue>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| body.trim().to_string());
    ServerError::execution(
        format!(
            "{} failed with HTTP {}: {}",
            api_path,
            status.as_u16(),
            detail
        ),
        None,
    )
}
