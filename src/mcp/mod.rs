//! MCP (Model Context Protocol) tool server sessions.

#[cfg(feature = "mcp")]
pub mod client;
pub mod session;

#[cfg(feature = "mcp")]
pub use client::McpSession;
pub use session::{SessionSet, ToolSession};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::ContentItem;

#[cfg(feature = "mcp")]
pub(crate) const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05", "2025-03-26", "2025-06-18"];

#[cfg(feature = "mcp")]
pub(crate) const MCP_CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);
#[cfg(feature = "mcp")]
pub(crate) const MCP_LIST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Connection target for one tool server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum McpServerConfig {
    /// Child process speaking MCP over stdin/stdout
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cwd: Option<String>,
    },
}

impl McpServerConfig {
    pub fn stdio(command: impl Into<String>, args: Vec<String>) -> Self {
        McpServerConfig::Stdio {
            command: command.into(),
            args,
            env: HashMap::new(),
            cwd: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpServerInfo {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub protocol_version: String,
}

/// Raw tool definition as listed by a server. `name` is not validated here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: serde_json::Value,
}

/// Raw response of a `call_tool` request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct McpToolResult {
    pub content: Vec<ContentItem>,
    #[serde(default)]
    pub is_error: bool,
}

impl McpToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::text(text)],
            is_error: false,
        }
    }

    pub fn to_string_content(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentItem::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("Connection to '{server}' failed: {message}")]
    ConnectionFailed { server: String, message: String },

    #[error("Session '{server}' is closed")]
    Closed { server: String },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc { code: i32, message: String },

    #[error("Tool not found: {name}")]
    ToolNotFound { name: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type McpResult<T> = std::result::Result<T, McpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stdio_config_deserialize() {
        let json = r#"{
            "transport": "stdio",
            "command": "python",
            "args": ["servers/text_server.py"],
            "env": {"OPENAI_API_KEY": "sk-test"}
        }"#;
        let config: McpServerConfig = serde_json::from_str(json).unwrap();
        match config {
            McpServerConfig::Stdio {
                command, args, env, cwd,
            } => {
                assert_eq!(command, "python");
                assert_eq!(args, vec!["servers/text_server.py"]);
                assert_eq!(env.get("OPENAI_API_KEY").map(String::as_str), Some("sk-test"));
                assert!(cwd.is_none());
            }
        }
    }

    #[test]
    fn test_unknown_transport_rejected() {
        let json = r#"{"transport": "carrier-pigeon", "command": "x"}"#;
        assert!(serde_json::from_str::<McpServerConfig>(json).is_err());
    }

    #[test]
    fn test_tool_result_text_content() {
        let result = McpToolResult {
            content: vec![
                ContentItem::text("line 1"),
                ContentItem::Image {
                    data: "AAAA".into(),
                    mime_type: "image/png".into(),
                },
                ContentItem::text("line 2"),
            ],
            is_error: false,
        };
        assert_eq!(result.to_string_content(), "line 1\nline 2");
    }
}
