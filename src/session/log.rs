//! Append-only conversation log for a single thread.

use std::collections::HashSet;

use tracing::warn;

use super::{StoreError, StoreResult};
use crate::types::Message;

/// Ordered message history of one thread.
///
/// Messages are only ever appended. A tool result is accepted only when it answers
/// a call issued by an earlier assistant message that has not been answered yet.
#[derive(Clone, Debug, Default)]
pub struct ConversationLog {
    messages: Vec<Message>,
    pending_calls: HashSet<String>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a log by appending `messages` in order.
    pub fn from_messages(messages: impl IntoIterator<Item = Message>) -> StoreResult<Self> {
        let mut log = Self::new();
        for message in messages {
            log.append(message)?;
        }
        Ok(log)
    }

    /// Checks whether `message` may be appended next, without appending it.
    pub fn validate(&self, message: &Message) -> StoreResult<()> {
        match message {
            Message::Assistant { tool_calls, .. } => {
                let mut seen = HashSet::with_capacity(tool_calls.len());
                for call in tool_calls {
                    if call.id().is_empty()
                        || !seen.insert(call.id())
                        || self.pending_calls.contains(call.id())
                    {
                        return Err(StoreError::DuplicateCallId {
                            call_id: call.id().to_string(),
                        });
                    }
                }
                Ok(())
            }
            Message::Tool(result) if !self.pending_calls.contains(result.call_id()) => {
                Err(StoreError::OrphanToolResult {
                    call_id: result.call_id().to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    pub fn append(&mut self, message: Message) -> StoreResult<()> {
        self.validate(&message)?;
        match &message {
            Message::Assistant { tool_calls, .. } => {
                self.pending_calls
                    .extend(tool_calls.iter().map(|c| c.id().to_string()));
            }
            Message::Tool(result) => {
                self.pending_calls.remove(result.call_id());
            }
            Message::User { .. } if !self.pending_calls.is_empty() => {
                warn!(
                    unanswered = self.pending_calls.len(),
                    "User message appended after an abandoned tool dispatch"
                );
            }
            _ => {}
        }
        self.messages.push(message);
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Call ids issued by the model that have no result yet, in issue order.
    pub fn pending_calls(&self) -> impl Iterator<Item = &str> {
        self.messages
            .iter()
            .flat_map(Message::tool_calls)
            .map(|call| call.id())
            .filter(|id| self.pending_calls.contains(*id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentItem, ToolCallRequest, ToolResult};

    fn call(id: &str) -> ToolCallRequest {
        ToolCallRequest::new(id, "summarize", Default::default())
    }

    fn result(id: &str) -> Message {
        Message::Tool(ToolResult::success(id, vec![ContentItem::text("ok")]))
    }

    #[test]
    fn test_append_preserves_order() {
        let mut log = ConversationLog::new();
        log.append(Message::user("one")).unwrap();
        log.append(Message::assistant("two")).unwrap();
        log.append(Message::user("three")).unwrap();

        let texts: Vec<_> = log.messages().iter().map(Message::text).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_orphan_tool_result_rejected() {
        let mut log = ConversationLog::new();
        log.append(Message::user("hi")).unwrap();
        let err = log.append(result("call_x")).unwrap_err();
        assert!(matches!(err, StoreError::OrphanToolResult { call_id } if call_id == "call_x"));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_each_call_answered_once() {
        let mut log = ConversationLog::new();
        log.append(Message::assistant_with_calls("", vec![call("a"), call("b")]))
            .unwrap();
        log.append(result("a")).unwrap();
        assert_eq!(log.pending_calls().collect::<Vec<_>>(), vec!["b"]);
        assert!(log.append(result("a")).is_err());
        log.append(result("b")).unwrap();
        assert_eq!(log.pending_calls().count(), 0);
    }

    #[test]
    fn test_duplicate_call_ids_rejected() {
        let mut log = ConversationLog::new();
        let err = log
            .append(Message::assistant_with_calls("", vec![call("a"), call("a")]))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateCallId { .. }));
        assert!(log.is_empty());
    }

    #[test]
    fn test_from_messages_replays_validation() {
        let log = ConversationLog::from_messages(vec![
            Message::user("q"),
            Message::assistant_with_calls("", vec![call("a")]),
            result("a"),
            Message::assistant("answer"),
        ])
        .unwrap();
        assert_eq!(log.len(), 4);
        assert!(ConversationLog::from_messages(vec![result("z")]).is_err());
    }
}
