//! Dispatches tool-call requests to the session that owns the tool.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::ToolRegistry;
use crate::types::{ContentItem, ToolCallRequest, ToolResult};

/// Tool-side failures. Recoverable: the agent loop folds them into the history.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool '{name}' is not available. Available tools: {available}")]
    UnknownTool { name: String, available: String },

    #[error("Tool '{tool}' failed: {message}")]
    Execution { tool: String, message: String },

    #[error("Tool '{tool}' timed out after {:.1}s", timeout.as_secs_f64())]
    Timeout { tool: String, timeout: Duration },
}

#[derive(Clone, Debug)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Option<Duration>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Invokes the tool named by `call` and converts the raw response.
    #[instrument(skip(self, call), fields(tool = %call.name(), call_id = %call.id()))]
    pub async fn invoke(&self, call: &ToolCallRequest) -> Result<ToolResult, ToolError> {
        let session =
            self.registry
                .session_for(call.name())
                .ok_or_else(|| ToolError::UnknownTool {
                    name: call.name().to_string(),
                    available: self.registry.names().collect::<Vec<_>>().join(", "),
                })?;

        let request = session.call_tool(call.name(), call.arguments().clone());
        let response = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, request)
                .await
                .map_err(|_| ToolError::Timeout {
                    tool: call.name().to_string(),
                    timeout: limit,
                })?,
            None => request.await,
        }
        .map_err(|e| ToolError::Execution {
            tool: call.name().to_string(),
            message: e.to_string(),
        })?;

        if response.is_error {
            let detail = crate::types::content::render_items(&response.content);
            return Err(ToolError::Execution {
                tool: call.name().to_string(),
                message: if detail.is_empty() {
                    "remote tool reported an error".to_string()
                } else {
                    detail
                },
            });
        }

        let content = if response.content.is_empty() {
            vec![ContentItem::text("")]
        } else {
            response.content
        };
        debug!(items = content.len(), "Tool call succeeded");
        Ok(ToolResult::success(call.id(), content))
    }

    /// Like [`invoke`](Self::invoke), but a failure becomes an error result for the
    /// same call id so the model can react to it.
    pub async fn execute(&self, call: &ToolCallRequest) -> ToolResult {
        match self.invoke(call).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = %call.name(), call_id = %call.id(), error = %e, "Tool call folded into error result");
                ToolResult::error(call.id(), e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::{McpError, McpToolResult};
    use crate::tools::testing::StaticSession;
    use serde_json::json;

    fn call(name: &str, args: serde_json::Value) -> ToolCallRequest {
        let args = args.as_object().cloned().unwrap_or_default();
        ToolCallRequest::new("call_1", name, args)
    }

    async fn executor(session: StaticSession) -> ToolExecutor {
        let registry = ToolRegistry::discover(Arc::new(session)).await.unwrap();
        ToolExecutor::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn test_invoke_passes_arguments() {
        let session = StaticSession::new("text").with_tool("translate", "", |args| {
            let text = args["text"].as_str().unwrap_or_default();
            let language = args["language"].as_str().unwrap_or_default();
            Ok(McpToolResult::text(format!("{text} in {language}")))
        });
        let executor = executor(session).await;

        let result = executor
            .invoke(&call("translate", json!({"text": "hello", "language": "French"})))
            .await
            .unwrap();
        assert_eq!(result.call_id(), "call_1");
        assert_eq!(result.text(), "hello in French");
        assert!(!result.is_error());
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let executor =
            executor(StaticSession::new("text").with_tool("summarize", "", |_| Ok(McpToolResult::text("")))).await;

        let err = executor.invoke(&call("weather", json!({}))).await.unwrap_err();
        assert!(matches!(&err, ToolError::UnknownTool { name, .. } if name == "weather"));
        assert!(err.to_string().contains("summarize"));

        let folded = executor.execute(&call("weather", json!({}))).await;
        assert!(folded.is_error());
        assert_eq!(folded.call_id(), "call_1");
        assert!(folded.text().contains("not available"));
    }

    #[tokio::test]
    async fn test_remote_error_is_execution_error() {
        let session = StaticSession::new("text")
            .with_tool("boom", "", |_| {
                Err(McpError::JsonRpc {
                    code: -32602,
                    message: "missing field `text`".into(),
                })
            })
            .with_tool("soft", "", |_| {
                Ok(McpToolResult {
                    content: vec![ContentItem::text("quota exceeded")],
                    is_error: true,
                })
            });
        let executor = executor(session).await;

        let err = executor.invoke(&call("boom", json!({}))).await.unwrap_err();
        assert!(matches!(&err, ToolError::Execution { message, .. } if message.contains("missing field")));

        let err = executor.invoke(&call("soft", json!({}))).await.unwrap_err();
        assert!(matches!(&err, ToolError::Execution { message, .. } if message == "quota exceeded"));
    }

    #[tokio::test]
    async fn test_timeout_is_folded() {
        let session = StaticSession::new("slow")
            .with_tool("wait", "", |_| Ok(McpToolResult::text("late")))
            .with_delay(Duration::from_secs(5));
        let executor = executor(session).await.with_timeout(Duration::from_millis(20));

        let result = executor.execute(&call("wait", json!({}))).await;
        assert!(result.is_error());
        assert!(result.text().contains("timed out"));
    }

    #[tokio::test]
    async fn test_empty_success_has_one_text_item() {
        let session = StaticSession::new("s").with_tool("noop", "", |_| {
            Ok(McpToolResult {
                content: vec![],
                is_error: false,
            })
        });
        let result = executor(session).await.invoke(&call("noop", json!({}))).await.unwrap();
        assert_eq!(result.content(), &[ContentItem::text("")]);
    }
}
