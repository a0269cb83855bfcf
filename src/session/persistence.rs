//! In-memory conversation store.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::{ConversationLog, ConversationStore, StoreResult, ThreadId};
use crate::types::Message;

/// Process-lifetime store (for tests and single-instance deployments).
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    threads: Arc<RwLock<HashMap<ThreadId, ConversationLog>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.threads.read().await.len()
    }
}

#[async_trait::async_trait]
impl ConversationStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn append(&self, thread: &ThreadId, message: Message) -> StoreResult<()> {
        let mut threads = self.threads.write().await;
        threads.entry(thread.clone()).or_default().append(message)
    }

    async fn read(&self, thread: &ThreadId) -> StoreResult<Vec<Message>> {
        let threads = self.threads.read().await;
        Ok(threads
            .get(thread)
            .map(|log| log.messages().to_vec())
            .unwrap_or_default())
    }

    async fn threads(&self) -> StoreResult<Vec<ThreadId>> {
        let threads = self.threads.read().await;
        let mut ids: Vec<ThreadId> = threads.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn len(&self, thread: &ThreadId) -> StoreResult<usize> {
        Ok(self.threads.read().await.get(thread).map_or(0, ConversationLog::len))
    }

    async fn pending_calls(&self, thread: &ThreadId) -> StoreResult<Vec<String>> {
        let threads = self.threads.read().await;
        Ok(threads
            .get(thread)
            .map(|log| log.pending_calls().map(str::to_string).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::StoreError;
    use crate::types::{ContentItem, ToolCallRequest, ToolResult};

    #[tokio::test]
    async fn test_lazy_thread_creation() {
        let store = MemoryStore::new();
        let thread = ThreadId::from("t1");

        assert!(store.read(&thread).await.unwrap().is_empty());
        assert_eq!(store.count().await, 0);

        store.append(&thread, Message::user("hello")).await.unwrap();
        assert_eq!(store.count().await, 1);
        assert_eq!(store.len(&thread).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_threads_are_independent() {
        let store = MemoryStore::new();
        let a = ThreadId::from("a");
        let b = ThreadId::from("b");

        store.append(&a, Message::user("for a")).await.unwrap();
        store.append(&b, Message::user("for b")).await.unwrap();
        store.append(&a, Message::assistant("reply a")).await.unwrap();

        assert_eq!(store.len(&a).await.unwrap(), 2);
        assert_eq!(store.read(&b).await.unwrap(), vec![Message::user("for b")]);
        assert_eq!(store.threads().await.unwrap(), vec![a, b]);
    }

    #[tokio::test]
    async fn test_rejects_orphan_result() {
        let store = MemoryStore::new();
        let thread = ThreadId::from("t");
        let orphan = Message::Tool(ToolResult::success("nope", vec![ContentItem::text("x")]));

        let err = store.append(&thread, orphan).await.unwrap_err();
        assert!(matches!(err, StoreError::OrphanToolResult { .. }));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MemoryStore::new();
        let other = store.clone();
        let thread = ThreadId::from("t");
        store.append(&thread, Message::user("x")).await.unwrap();
        assert_eq!(other.len(&thread).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_pending_calls_in_issue_order() {
        let store = MemoryStore::new();
        let thread = ThreadId::from("t");
        let calls = ["c", "a", "b"]
            .map(|id| ToolCallRequest::new(id, "summarize", Default::default()))
            .to_vec();

        store.append(&thread, Message::user("go")).await.unwrap();
        store
            .append(&thread, Message::assistant_with_calls("", calls))
            .await
            .unwrap();
        store
            .append(&thread, Message::Tool(ToolResult::success("a", vec![ContentItem::text("ok")])))
            .await
            .unwrap();

        assert_eq!(store.pending_calls(&thread).await.unwrap(), vec!["c", "b"]);
        assert!(store.pending_calls(&ThreadId::from("other")).await.unwrap().is_empty());
    }
}
