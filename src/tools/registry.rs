//! Tool discovery and the immutable registry snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::mcp::{McpError, ToolSession};
use crate::types::ToolDescriptor;

/// Discovery failures. Fatal at startup.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Failed to list tools on '{server}': {source}")]
    ListFailed {
        server: String,
        #[source]
        source: McpError,
    },

    #[error("Server '{server}' returned a tool without a name (position {position})")]
    MissingName { server: String, position: usize },

    #[error("Tool '{name}' is exposed by both '{first}' and '{second}'")]
    DuplicateTool {
        name: String,
        first: String,
        second: String,
    },
}

struct RegisteredTool {
    descriptor: ToolDescriptor,
    session: Arc<dyn ToolSession>,
}

/// Snapshot of the tools discovered at one point in time.
///
/// Never refreshed in place; run discovery again to observe server-side changes.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub async fn discover(session: Arc<dyn ToolSession>) -> Result<Self, DiscoveryError> {
        Self::discover_all(&[session]).await
    }

    /// Queries every session and merges their tools. Names must be unique across sessions.
    pub async fn discover_all(sessions: &[Arc<dyn ToolSession>]) -> Result<Self, DiscoveryError> {
        let mut registry = Self::default();

        for session in sessions {
            let definitions =
                session
                    .list_tools()
                    .await
                    .map_err(|source| DiscoveryError::ListFailed {
                        server: session.name().to_string(),
                        source,
                    })?;

            for (position, def) in definitions.into_iter().enumerate() {
                if def.name.trim().is_empty() {
                    return Err(DiscoveryError::MissingName {
                        server: session.name().to_string(),
                        position,
                    });
                }
                if let Some(&existing) = registry.index.get(&def.name) {
                    return Err(DiscoveryError::DuplicateTool {
                        name: def.name,
                        first: registry.tools[existing].session.name().to_string(),
                        second: session.name().to_string(),
                    });
                }

                debug!(server = %session.name(), tool = %def.name, "Discovered tool");
                registry.index.insert(def.name.clone(), registry.tools.len());
                registry.tools.push(RegisteredTool {
                    descriptor: ToolDescriptor::new(def.name, def.description, def.input_schema),
                    session: Arc::clone(session),
                });
            }
        }

        info!(
            servers = sessions.len(),
            tools = registry.tools.len(),
            "Tool discovery complete"
        );
        Ok(registry)
    }

    /// Descriptors in discovery order.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.tools[i].descriptor)
    }

    pub fn session_for(&self, name: &str) -> Option<&Arc<dyn ToolSession>> {
        self.index.get(name).map(|&i| &self.tools[i].session)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|t| t.descriptor.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::{McpToolDefinition, McpToolResult};
    use crate::tools::testing::StaticSession;
    use serde_json::json;

    fn text_session() -> Arc<StaticSession> {
        Arc::new(
            StaticSession::new("text")
                .with_tool("summarize", "Summarize text", |_| {
                    Ok(McpToolResult::text("short"))
                })
                .with_tool("translate", "Translate text", |_| {
                    Ok(McpToolResult::text("Bonjour"))
                }),
        )
    }

    #[tokio::test]
    async fn test_discover_collects_descriptors() {
        let registry = ToolRegistry::discover(text_session()).await.unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["summarize", "translate"]);
        assert_eq!(registry.get("translate").unwrap().description, "Translate text");
        assert!(registry.session_for("summarize").is_some());
        assert!(!registry.contains("weather"));
    }

    #[tokio::test]
    async fn test_discovery_is_idempotent() {
        let session = text_session();
        let first = ToolRegistry::discover(session.clone()).await.unwrap();
        let second = ToolRegistry::discover(session).await.unwrap();
        assert_eq!(first.descriptors(), second.descriptors());
    }

    #[tokio::test]
    async fn test_missing_name_is_malformed() {
        let session = Arc::new(StaticSession::new("bad").with_definition(McpToolDefinition {
            name: "".into(),
            description: "nameless".into(),
            input_schema: json!({}),
        }));
        let err = ToolRegistry::discover(session).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::MissingName { position: 0, .. }));
    }

    #[tokio::test]
    async fn test_list_failure_surfaces() {
        let session = Arc::new(StaticSession::new("down").failing_list());
        let err = ToolRegistry::discover(session).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::ListFailed { server, .. } if server == "down"));
    }

    #[tokio::test]
    async fn test_duplicate_names_across_servers() {
        let a: Arc<dyn ToolSession> =
            Arc::new(StaticSession::new("a").with_tool("echo", "", |_| Ok(McpToolResult::text(""))));
        let b: Arc<dyn ToolSession> =
            Arc::new(StaticSession::new("b").with_tool("echo", "", |_| Ok(McpToolResult::text(""))));

        let err = ToolRegistry::discover_all(&[a, b]).await.unwrap_err();
        assert!(matches!(
            err,
            DiscoveryError::DuplicateTool { name, first, second }
                if name == "echo" && first == "a" && second == "b"
        ));
    }
}
