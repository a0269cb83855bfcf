//! Prelude module for convenient imports.
//!
//! # Usage
//!
//! ```rust
//! use mcp_agent::prelude::*;
//! ```

// Core types
pub use crate::Agent;
pub use crate::AgentBuilder;
pub use crate::AgentEvent;
pub use crate::Error;
pub use crate::Result;
pub use crate::TurnResult;

// Model providers
pub use crate::client::{ModelProvider, OpenAiProvider};

// Tools
pub use crate::mcp::{SessionSet, ToolSession};
pub use crate::tools::{ToolExecutor, ToolRegistry};

// Types
pub use crate::types::{ContentItem, Message, Role, ToolCallRequest, ToolResult, Usage};

// Conversation state
pub use crate::session::{ConversationStore, MemoryStore, ThreadId};

// Configuration
pub use crate::config::{ServerConfigFile, Settings};
