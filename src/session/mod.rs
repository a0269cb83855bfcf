//! Conversation state: per-thread append-only histories and their storage backends.

pub mod log;
pub mod persistence;
pub mod persistence_jsonl;

pub use log::ConversationLog;
pub use persistence::MemoryStore;
pub use persistence_jsonl::JsonlStore;

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::Message;

/// Identity of a conversation whose history spans multiple turns.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ThreadId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ThreadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Tool result for call '{call_id}' has no matching pending tool call")]
    OrphanToolResult { call_id: String },

    #[error("Tool call id '{call_id}' is empty or already in use")]
    DuplicateCallId { call_id: String },

    #[error("Thread id '{id}' cannot be used by this store")]
    InvalidThreadId { id: String },

    #[error("Corrupt history at {}:{line}: {message}", path.display())]
    Corrupt {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Storage for thread histories.
///
/// Appends on one thread are applied in call order. Different threads are independent.
/// Callers must serialize concurrent turns on the same thread themselves.
#[async_trait::async_trait]
pub trait ConversationStore: Send + Sync {
    fn name(&self) -> &str;

    /// Appends to the thread, creating it on first use.
    async fn append(&self, thread: &ThreadId, message: Message) -> StoreResult<()>;

    /// Full ordered history. Unknown threads read as empty.
    async fn read(&self, thread: &ThreadId) -> StoreResult<Vec<Message>>;

    async fn threads(&self) -> StoreResult<Vec<ThreadId>>;

    async fn len(&self, thread: &ThreadId) -> StoreResult<usize> {
        Ok(self.read(thread).await?.len())
    }

    /// Call ids on the thread that have no tool result yet, in issue order.
    async fn pending_calls(&self, thread: &ThreadId) -> StoreResult<Vec<String>> {
        let log = ConversationLog::from_messages(self.read(thread).await?)?;
        Ok(log.pending_calls().map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_id_display_and_parse() {
        let id: ThreadId = "chat-1".parse().unwrap();
        assert_eq!(id.to_string(), "chat-1");
        assert_eq!(id, ThreadId::from("chat-1"));
        assert_ne!(ThreadId::random(), ThreadId::random());
    }

    #[test]
    fn test_thread_id_serde_transparent() {
        let json = serde_json::to_string(&ThreadId::new("t")).unwrap();
        assert_eq!(json, "\"t\"");
    }
}
