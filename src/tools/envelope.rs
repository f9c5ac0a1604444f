//! Uniform tool response envelope.
//!
//! Every tool call produces exactly one envelope:
//! `{"success": true, ...operation fields}` or `{"success": false, "error": "..."}`.
//! Errors raised inside a tool are captured here and never escape as protocol faults.

use crate::error::{ServerError, ServerResult};
use rmcp::model::{CallToolResult, Content};
use serde::Serialize;
use tracing::error;

#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(flatten)]
    pub payload: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(payload: T) -> Self {
        Self {
            success: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn failure(err: &ServerError) -> Self {
        Self {
            success: false,
            payload: None,
            error: Some(err.envelope_message()),
        }
    }

    pub fn from_result(tool: &str, result: ServerResult<T>) -> Self {
        match result {
            Ok(payload) => Self::success(payload),
            Err(e) => {
                error!(tool, error = %e, "Tool failed");
                Self::failure(&e)
            }
        }
    }

    /// Render as pretty JSON text. Failures are flagged with `is_error`.
    pub fn into_call_result(self) -> CallToolResult {
        match serde_json::to_string_pretty(&self) {
            Ok(text) if self.success => CallToolResult::success(vec![Content::text(text)]),
            Ok(text) => CallToolResult::error(vec![Content::text(text)]),
            Err(e) => {
                error!(error = %e, "Failed to serialize tool response");
                let fallback = serde_json::json!({
                    "success": false,
                    "error": format!("Internal error: failed to serialize response: {}", e),
                });
                CallToolResult::error(vec![Content::text(fallback.to_string())])
            }
        }
    }
}
