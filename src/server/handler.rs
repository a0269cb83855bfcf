//! MCP handler exposing [`TextOps`] through rmcp's tool router.

use std::sync::Arc;

use rmcp::{
    ErrorData, ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::warn;

use super::TextOps;
use crate::client::ModelResult;

pub const SERVER_NAME: &str = "text";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TextRequest {
    /// Input text
    pub text: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TranslateRequest {
    /// Input text
    pub text: String,
    /// Target language, for example "French"
    pub language: String,
}

#[derive(Clone)]
pub struct TextServer {
    ops: Arc<TextOps>,
    tool_router: ToolRouter<Self>,
}

/// One text item on success. A model failure becomes an error result, not a protocol error.
fn text_result(operation: &str, result: ModelResult<String>) -> Result<CallToolResult, ErrorData> {
    match result {
        Ok(text) => Ok(CallToolResult::success(vec![Content::text(text)])),
        Err(e) => {
            warn!(operation, error = %e, "Text operation failed");
            Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
        }
    }
}

#[tool_router]
impl TextServer {
    pub fn new(ops: TextOps) -> Self {
        Self {
            ops: Arc::new(ops),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Summarize the input text to about one quarter of its length")]
    async fn summarize(
        &self,
        Parameters(req): Parameters<TextRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        text_result("summarize", self.ops.summarize(&req.text).await)
    }

    #[tool(description = "Extract 5 to 10 keywords from the input text")]
    async fn extract_keywords(
        &self,
        Parameters(req): Parameters<TextRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        text_result("extract_keywords", self.ops.extract_keywords(&req.text).await)
    }

    #[tool(description = "Translate the input text into the given language")]
    async fn translate(
        &self,
        Parameters(req): Parameters<TranslateRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        text_result(
            "translate",
            self.ops.translate(&req.text, &req.language).await,
        )
    }
}

#[tool_handler]
impl ServerHandler for TextServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                ..Implementation::from_build_env()
            },
            instructions: Some(
                "Text utilities: summarize, extract_keywords and translate.".to_string(),
            ),
            ..Default::default()
        }
    }
}
