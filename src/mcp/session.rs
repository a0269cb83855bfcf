//! Session abstraction over tool servers and the scoped set that owns them.

use std::future::Future;
use std::sync::Arc;

use tracing::{info, warn};

use super::{McpResult, McpToolDefinition, McpToolResult};
use crate::types::Arguments;

/// An established connection to a tool-hosting process.
#[async_trait::async_trait]
pub trait ToolSession: Send + Sync {
    fn name(&self) -> &str;

    async fn list_tools(&self) -> McpResult<Vec<McpToolDefinition>>;

    async fn call_tool(&self, name: &str, arguments: Arguments) -> McpResult<McpToolResult>;

    async fn close(&self) -> McpResult<()> {
        Ok(())
    }
}

/// Owns every session opened for one run and releases them together.
pub struct SessionSet {
    sessions: Vec<Arc<dyn ToolSession>>,
}

impl SessionSet {
    pub fn new(sessions: Vec<Arc<dyn ToolSession>>) -> Self {
        Self { sessions }
    }

    /// Connects every configured server. Sessions opened before a failure are closed again.
    #[cfg(feature = "mcp")]
    pub async fn connect(config: &crate::config::ServerConfigFile) -> McpResult<Self> {
        let mut sessions: Vec<Arc<dyn ToolSession>> = Vec::with_capacity(config.len());
        for (name, server) in config.servers() {
            match super::McpSession::connect(name, server).await {
                Ok(session) => sessions.push(Arc::new(session)),
                Err(e) => {
                    if let Err(close_err) = Self::new(sessions).close().await {
                        warn!(error = %close_err, "Failed to close sessions after connect error");
                    }
                    return Err(e);
                }
            }
        }
        info!(count = sessions.len(), "Tool server sessions established");
        Ok(Self::new(sessions))
    }

    pub fn sessions(&self) -> &[Arc<dyn ToolSession>] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Closes every session. All sessions are attempted; the first failure is returned.
    pub async fn close(self) -> McpResult<()> {
        let mut first_error = None;
        for session in &self.sessions {
            if let Err(e) = session.close().await {
                warn!(server = %session.name(), error = %e, "Failed to close session");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Runs `f` with the sessions and closes them afterwards, whether `f` succeeded or not.
    ///
    /// If the returned future is dropped before completion, each session's own drop
    /// handling tears down the underlying connection.
    pub async fn scoped<T, F, Fut>(self, f: F) -> crate::Result<T>
    where
        F: FnOnce(Vec<Arc<dyn ToolSession>>) -> Fut,
        Fut: Future<Output = crate::Result<T>>,
    {
        let result = f(self.sessions.clone()).await;
        let closed = self.close().await;
        match (result, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_err)) => {
                warn!(error = %close_err, "Session close failed after run error");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::StaticSession;

    #[tokio::test]
    async fn test_scoped_closes_on_success() {
        let session = Arc::new(StaticSession::new("text"));
        let set = SessionSet::new(vec![session.clone()]);

        let value = set.scoped(|sessions| async move { Ok(sessions.len()) }).await.unwrap();

        assert_eq!(value, 1);
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn test_scoped_closes_on_error() {
        let session = Arc::new(StaticSession::new("text"));
        let set = SessionSet::new(vec![session.clone()]);

        let result: crate::Result<()> = set
            .scoped(|_| async { Err(crate::Error::Internal("boom".into())) })
            .await;

        assert!(result.is_err());
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn test_close_attempts_every_session() {
        let a = Arc::new(StaticSession::new("a").failing_close());
        let b = Arc::new(StaticSession::new("b"));
        let set = SessionSet::new(vec![a.clone(), b.clone()]);

        assert!(set.close().await.is_err());
        assert!(b.is_closed());
    }
}
