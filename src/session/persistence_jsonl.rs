//! JSONL-based durable conversation store.
//!
//! Each thread lives in `<dir>/<thread>.jsonl`, one timestamped message per line.
//! Appends write through to disk before they become visible to readers, and a
//! thread's log is rebuilt from its file on first access.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use super::{ConversationLog, ConversationStore, StoreError, StoreResult, ThreadId};
use crate::types::Message;

const EXTENSION: &str = "jsonl";

#[derive(Clone, Debug, Serialize, Deserialize)]
struct JsonlEntry {
    timestamp: DateTime<Utc>,
    message: Message,
}

#[derive(Debug, Clone)]
pub struct JsonlStore {
    dir: PathBuf,
    logs: Arc<RwLock<HashMap<ThreadId, ConversationLog>>>,
}

impl JsonlStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            logs: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, thread: &ThreadId) -> StoreResult<PathBuf> {
        let id = thread.as_str();
        let valid = !id.is_empty()
            && !id.starts_with('.')
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(StoreError::InvalidThreadId { id: id.to_string() });
        }
        Ok(self.dir.join(format!("{}.{}", id, EXTENSION)))
    }

    async fn load_log(path: &Path) -> StoreResult<ConversationLog> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ConversationLog::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut log = ConversationLog::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let corrupt = |message: String| StoreError::Corrupt {
                path: path.to_path_buf(),
                line: index + 1,
                message,
            };
            let entry: JsonlEntry =
                serde_json::from_str(line).map_err(|e| corrupt(e.to_string()))?;
            log.append(entry.message)
                .map_err(|e| corrupt(e.to_string()))?;
        }
        tracing::debug!(path = %path.display(), messages = log.len(), "Loaded thread history");
        Ok(log)
    }

    async fn ensure_loaded<'a>(
        &self,
        logs: &'a mut HashMap<ThreadId, ConversationLog>,
        thread: &ThreadId,
    ) -> StoreResult<&'a mut ConversationLog> {
        if !logs.contains_key(thread) {
            let log = Self::load_log(&self.path_for(thread)?).await?;
            logs.insert(thread.clone(), log);
        }
        logs.get_mut(thread)
            .ok_or_else(|| StoreError::InvalidThreadId {
                id: thread.to_string(),
            })
    }
}

#[async_trait::async_trait]
impl ConversationStore for JsonlStore {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn append(&self, thread: &ThreadId, message: Message) -> StoreResult<()> {
        let path = self.path_for(thread)?;
        let mut logs = self.logs.write().await;
        let log = self.ensure_loaded(&mut logs, thread).await?;
        log.validate(&message)?;

        let entry = JsonlEntry {
            timestamp: Utc::now(),
            message,
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        log.append(entry.message)
    }

    async fn read(&self, thread: &ThreadId) -> StoreResult<Vec<Message>> {
        {
            let logs = self.logs.read().await;
            if let Some(log) = logs.get(thread) {
                return Ok(log.messages().to_vec());
            }
        }
        let mut logs = self.logs.write().await;
        let log = self.ensure_loaded(&mut logs, thread).await?;
        Ok(log.messages().to_vec())
    }

    async fn threads(&self) -> StoreResult<Vec<ThreadId>> {
        let mut ids: Vec<ThreadId> = self.logs.read().await.keys().cloned().collect();

        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(EXTENSION)
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                ids.push(ThreadId::from(stem));
            }
        }

        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentItem, ToolCallRequest, ToolResult};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_history_survives_reopen() {
        let dir = tempdir().unwrap();
        let thread = ThreadId::from("chat-1");
        {
            let store = JsonlStore::open(dir.path()).await.unwrap();
            store.append(&thread, Message::user("hi")).await.unwrap();
            store
                .append(
                    &thread,
                    Message::assistant_with_calls(
                        "",
                        vec![ToolCallRequest::new("call_1", "summarize", Default::default())],
                    ),
                )
                .await
                .unwrap();
            store
                .append(
                    &thread,
                    Message::Tool(ToolResult::success("call_1", vec![ContentItem::text("short")])),
                )
                .await
                .unwrap();
        }

        let reopened = JsonlStore::open(dir.path()).await.unwrap();
        let messages = reopened.read(&thread).await.unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], Message::user("hi"));
        assert_eq!(messages[2].as_tool_result().unwrap().call_id(), "call_1");
        assert_eq!(reopened.threads().await.unwrap(), vec![thread]);
    }

    #[tokio::test]
    async fn test_rejected_message_not_written() {
        let dir = tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).await.unwrap();
        let thread = ThreadId::from("t");

        let orphan = Message::Tool(ToolResult::success("ghost", vec![ContentItem::text("x")]));
        assert!(store.append(&thread, orphan).await.is_err());
        assert!(!dir.path().join("t.jsonl").exists());
    }

    #[tokio::test]
    async fn test_invalid_thread_id() {
        let dir = tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).await.unwrap();
        let err = store
            .append(&ThreadId::from("../escape"), Message::user("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidThreadId { .. }));
    }

    #[tokio::test]
    async fn test_corrupt_line_reported() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("bad.jsonl"), "{\"nope\":true}\n").unwrap();
        let store = JsonlStore::open(dir.path()).await.unwrap();
        let err = store.read(&ThreadId::from("bad")).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { line: 1, .. }));
    }
}
