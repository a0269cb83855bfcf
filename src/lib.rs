//! # mcp-agent
//!
//! Tool-calling conversational agent. Tools are discovered from MCP servers and
//! invoked on the model's request, looping between reasoning and tool execution
//! until the model produces a final answer, which is streamed back to the caller.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use futures::StreamExt;
//! use mcp_agent::{AgentBuilder, ServerConfigFile, SessionSet, Settings, ThreadId, ToolRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mcp_agent::Error> {
//!     mcp_agent::config::load_dotenv();
//!     let settings = Settings::from_env()?;
//!     let servers = ServerConfigFile::load("mcp_config.json")?;
//!
//!     SessionSet::connect(&servers)
//!         .await?
//!         .scoped(|sessions| async move {
//!             let tools = ToolRegistry::discover_all(&sessions).await?;
//!             let agent = AgentBuilder::from_settings(&settings)
//!                 .tools(Arc::new(tools))
//!                 .build()?;
//!
//!             let mut fragments = agent.submit_turn(&ThreadId::from("chat-1"), "Translate 'hello' to French");
//!             while let Some(fragment) = fragments.next().await {
//!                 print!("{}", fragment?);
//!             }
//!             Ok(())
//!         })
//!         .await
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod agent;
pub mod client;
pub mod config;
pub mod mcp;
pub mod prelude;
pub mod server;
pub mod session;
pub mod tools;
pub mod types;

pub use agent::{
    Agent, AgentBuilder, AgentConfig, AgentEvent, AgentMetrics, ExecutionConfig, FragmentPolicy,
    LoopState, ModelConfig, PromptConfig, Route, ToolStats, TurnConfig, TurnResult,
};
pub use client::{ModelError, ModelProvider, OpenAiProvider, ScriptedProvider};
pub use config::{ConfigError, ServerConfigFile, Settings};
#[cfg(feature = "mcp")]
pub use mcp::McpSession;
pub use mcp::{McpError, McpServerConfig, SessionSet, ToolSession};
pub use session::{ConversationStore, JsonlStore, MemoryStore, StoreError, ThreadId};
pub use tools::{DiscoveryError, ToolError, ToolExecutor, ToolRegistry};
pub use types::{ContentItem, Message, Role, ToolCallRequest, ToolDescriptor, ToolResult, Usage};

/// Error type for mcp-agent operations.
///
/// Tool failures never appear here: the agent loop folds them into the history.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Tool discovery failed.
    #[error("Tool discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    /// The model provider failed.
    #[error("Model invocation failed: {0}")]
    ModelInvocation(#[from] ModelError),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Conversation store rejected or failed an operation.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// MCP session failure outside of a tool call.
    #[error("MCP error: {0}")]
    Mcp(#[from] McpError),

    /// A turn ran more reasoning steps than allowed.
    #[error("Cycle limit reached: {limit} reasoning steps without a final answer")]
    CycleLimit { limit: usize },

    /// A fatal error inside a turn, with the thread and the last loop state.
    #[error("Turn on thread '{thread}' failed in state {state}: {source}")]
    Turn {
        thread: ThreadId,
        state: LoopState,
        #[source]
        source: Box<Error>,
    },

    /// File system or terminal IO failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error category for unified error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Configuration, discovery, or setup errors
    Configuration,
    /// Network, rate limit, or transient errors that may succeed on retry
    Transient,
    /// Store, MCP, or other stateful operation errors
    Stateful,
    /// Internal errors and non-retryable provider failures
    Internal,
    /// Resource limits (cycle cap)
    ResourceLimit,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::Discovery(_) => ErrorCategory::Configuration,
            Error::ModelInvocation(e) if e.is_retryable() => ErrorCategory::Transient,
            Error::ModelInvocation(ModelError::Auth(_) | ModelError::InvalidRequest(_)) => {
                ErrorCategory::Configuration
            }
            Error::Store(_) | Error::Mcp(_) => ErrorCategory::Stateful,
            Error::CycleLimit { .. } => ErrorCategory::ResourceLimit,
            Error::Turn { source, .. } => source.category(),
            Error::ModelInvocation(_) | Error::Io(_) | Error::Internal(_) => ErrorCategory::Internal,
        }
    }

    pub fn is_configuration_error(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    pub fn is_resource_limit(&self) -> bool {
        self.category() == ErrorCategory::ResourceLimit
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }

    /// The innermost error, looking through [`Error::Turn`].
    pub fn root(&self) -> &Error {
        match self {
            Error::Turn { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn thread(&self) -> Option<&ThreadId> {
        match self {
            Error::Turn { thread, .. } => Some(thread),
            _ => None,
        }
    }

    pub fn retry_after(&self) -> Option<std::time::Duration> {
        match self.root() {
            Error::ModelInvocation(e) => e.retry_after(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
