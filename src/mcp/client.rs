//! rmcp-backed tool session.

use tokio::process::Command;
use tokio::sync::RwLock;
use tokio::time::timeout;

use rmcp::{
    RoleClient,
    model::{CallToolRequestParam, RawContent, ResourceContents},
    service::{RunningService, ServiceError, ServiceExt},
    transport::{ConfigureCommandExt, TokioChildProcess},
};

use super::{
    McpError, McpResult, McpServerConfig, McpServerInfo, McpToolDefinition, McpToolResult,
    ToolSession,
};
use crate::types::{Arguments, ContentItem};

type McpRunningService = RunningService<RoleClient, ()>;

/// Convert rmcp ServiceError into McpError, preserving JSON-RPC error codes.
fn map_service_error(e: ServiceError, context: &str) -> McpError {
    match e {
        ServiceError::McpError(err_data) => McpError::JsonRpc {
            code: err_data.code.0,
            message: err_data.message.to_string(),
        },
        _ => McpError::Protocol {
            message: format!("{}: {}", context, e),
        },
    }
}

fn map_content(raw: RawContent) -> ContentItem {
    match raw {
        RawContent::Text(t) => ContentItem::Text { text: t.text },
        RawContent::Image(i) => ContentItem::Image {
            data: i.data,
            mime_type: i.mime_type,
        },
        RawContent::Resource(r) => match r.resource {
            ResourceContents::TextResourceContents {
                uri,
                mime_type,
                text,
                ..
            } => ContentItem::Resource {
                uri,
                text: Some(text),
                mime_type,
            },
            ResourceContents::BlobResourceContents { uri, mime_type, .. } => {
                ContentItem::Resource {
                    uri,
                    text: None,
                    mime_type,
                }
            }
        },
        RawContent::Audio(a) => ContentItem::Text {
            text: format!("[audio: {}]", a.mime_type),
        },
        RawContent::ResourceLink(r) => ContentItem::Resource {
            uri: r.uri,
            text: None,
            mime_type: r.mime_type,
        },
    }
}

/// A live MCP client connection to one tool server.
///
/// Dropping the session cancels the underlying service, which also stops a
/// spawned child process.
pub struct McpSession {
    name: String,
    server_info: Option<McpServerInfo>,
    service: RwLock<Option<McpRunningService>>,
}

impl McpSession {
    /// Spawns the configured server process and completes the MCP handshake.
    pub async fn connect(name: impl Into<String>, config: &McpServerConfig) -> McpResult<Self> {
        let name = name.into();
        let McpServerConfig::Stdio {
            command,
            args,
            env,
            cwd,
        } = config;

        let transport = TokioChildProcess::new(Command::new(command).configure(|cmd| {
            cmd.args(args);
            cmd.envs(env);
            if let Some(dir) = cwd {
                cmd.current_dir(dir);
            }
        }))
        .map_err(|e| McpError::ConnectionFailed {
            server: name.clone(),
            message: format!("Failed to spawn '{}': {}", command, e),
        })?;

        let service: McpRunningService = timeout(super::MCP_CONNECT_TIMEOUT, ().serve(transport))
            .await
            .map_err(|_| McpError::ConnectionFailed {
                server: name.clone(),
                message: format!(
                    "Connection timed out after {:?}",
                    super::MCP_CONNECT_TIMEOUT
                ),
            })?
            .map_err(|e| McpError::ConnectionFailed {
                server: name.clone(),
                message: format!("Handshake failed: {}", e),
            })?;

        Ok(Self::from_service(name, service))
    }

    /// Wraps an already initialized client service, for example one running over an
    /// in-memory transport.
    pub fn from_service(name: impl Into<String>, service: McpRunningService) -> Self {
        let name = name.into();
        let server_info = service.peer_info().map(|info| {
            let protocol_version = info.protocol_version.to_string();
            if !super::SUPPORTED_PROTOCOL_VERSIONS.contains(&protocol_version.as_str()) {
                tracing::warn!(
                    server = %name,
                    protocol = %protocol_version,
                    supported = ?super::SUPPORTED_PROTOCOL_VERSIONS,
                    "MCP protocol version mismatch"
                );
            }
            McpServerInfo {
                name: info.server_info.name.to_string(),
                version: info.server_info.version.to_string(),
                protocol_version,
            }
        });

        match &server_info {
            Some(info) => tracing::info!(
                server = %name,
                server_name = %info.name,
                server_version = %info.version,
                protocol = %info.protocol_version,
                "MCP session connected"
            ),
            None => tracing::info!(server = %name, "MCP session connected"),
        }
        Self {
            name,
            server_info,
            service: RwLock::new(Some(service)),
        }
    }

    pub fn server_info(&self) -> Option<&McpServerInfo> {
        self.server_info.as_ref()
    }

    pub async fn is_connected(&self) -> bool {
        self.service.read().await.is_some()
    }

    fn closed(&self) -> McpError {
        McpError::Closed {
            server: self.name.clone(),
        }
    }
}

#[async_trait::async_trait]
impl ToolSession for McpSession {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> McpResult<Vec<McpToolDefinition>> {
        let guard = self.service.read().await;
        let service = guard.as_ref().ok_or_else(|| self.closed())?;

        let tools = timeout(super::MCP_LIST_TIMEOUT, service.list_all_tools())
            .await
            .map_err(|_| McpError::Protocol {
                message: format!(
                    "Listing tools on '{}' timed out after {:?}",
                    self.name,
                    super::MCP_LIST_TIMEOUT
                ),
            })?
            .map_err(|e| map_service_error(e, "Failed to list tools"))?;

        Ok(tools
            .into_iter()
            .map(|t| McpToolDefinition {
                name: t.name.to_string(),
                description: t.description.map(|d| d.to_string()).unwrap_or_default(),
                input_schema: serde_json::Value::Object((*t.input_schema).clone()),
            })
            .collect())
    }

    async fn call_tool(&self, name: &str, arguments: Arguments) -> McpResult<McpToolResult> {
        let guard = self.service.read().await;
        let service = guard.as_ref().ok_or_else(|| self.closed())?;

        let result = service
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: Some(arguments),
            })
            .await
            .map_err(|e| map_service_error(e, "Tool call failed"))?;

        Ok(McpToolResult {
            content: result.content.into_iter().map(|c| map_content(c.raw)).collect(),
            is_error: result.is_error.unwrap_or(false),
        })
    }

    async fn close(&self) -> McpResult<()> {
        if let Some(service) = self.service.write().await.take() {
            service.cancel().await.map_err(|e| McpError::Protocol {
                message: format!("Failed to cancel: {}", e),
            })?;
            tracing::info!(server = %self.name, "MCP session closed");
        }
        Ok(())
    }
}
